use std::fmt;
use std::str::FromStr;

use crate::error::{Result, UnifyError};

/// Highest row number accepted by the xlsx format.
pub const MAX_ROW: u32 = 1_048_576;
/// Highest column number accepted by the xlsx format.
pub const MAX_COLUMN: u32 = 16_384;

/// Converts a 1-based column number into its letter form (`1` → `A`, `28` → `AB`).
pub fn column_letter(column: u32) -> String {
    let mut letters = Vec::new();
    let mut remaining = column;
    while remaining > 0 {
        let rem = (remaining - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Converts a column in letter form into its 1-based number.
pub fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut value: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = u32::from(ch.to_ascii_uppercase() as u8 - b'A') + 1;
        value = value.checked_mul(26)?.checked_add(digit)?;
    }
    (value <= MAX_COLUMN).then_some(value)
}

/// A single `(row, column)` coordinate, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub column: u32,
}

impl CellRef {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Rejects coordinates outside the worksheet limits.
    pub fn validate(self) -> Result<Self> {
        if self.row == 0 || self.row > MAX_ROW || self.column == 0 || self.column > MAX_COLUMN {
            return Err(UnifyError::InvalidAddress {
                row: self.row,
                column: self.column,
            });
        }
        Ok(self)
    }

    /// Absolute form used inside formulas, e.g. `$H$12`.
    pub fn absolute(self) -> String {
        format!("${}${}", column_letter(self.column), self.row)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letter(self.column), self.row)
    }
}

impl FromStr for CellRef {
    type Err = UnifyError;

    fn from_str(reference: &str) -> Result<Self> {
        let trimmed = reference.trim().replace('$', "");
        let split = trimmed
            .find(|ch: char| ch.is_ascii_digit())
            .ok_or_else(|| UnifyError::InvalidReference(reference.to_string()))?;
        let (letters, digits) = trimmed.split_at(split);
        let column = column_number(letters)
            .ok_or_else(|| UnifyError::InvalidReference(reference.to_string()))?;
        let row = digits
            .parse::<u32>()
            .map_err(|_| UnifyError::InvalidReference(reference.to_string()))?;
        CellRef::new(row, column).validate()
    }
}

/// A rectangular block of cells, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    /// Builds a range, normalising the corners so `start` is top-left.
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            start: CellRef::new(a.row.min(b.row), a.column.min(b.column)),
            end: CellRef::new(a.row.max(b.row), a.column.max(b.column)),
        }
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&cell.row)
            && (self.start.column..=self.end.column).contains(&cell.column)
    }

    pub fn intersects(&self, other: &CellRange) -> bool {
        self.start.row <= other.end.row
            && other.start.row <= self.end.row
            && self.start.column <= other.end.column
            && other.start.column <= self.end.column
    }

    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }

    /// Every coordinate covered by the range, row-major.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.start.row..=self.end.row).flat_map(move |row| {
            (self.start.column..=self.end.column).map(move |column| CellRef::new(row, column))
        })
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for CellRange {
    type Err = UnifyError;

    fn from_str(reference: &str) -> Result<Self> {
        match reference.split_once(':') {
            Some((first, last)) => Ok(CellRange::new(first.parse()?, last.parse()?)),
            None => {
                let cell: CellRef = reference.parse()?;
                Ok(CellRange::new(cell, cell))
            }
        }
    }
}
