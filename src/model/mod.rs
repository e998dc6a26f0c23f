//! In-memory workbook representation mutated by the pipeline stages.
//!
//! The grid is sparse: only cells that carry a value or a non-default style
//! are stored. Coordinates are 1-based `(row, column)` pairs, mirroring A1
//! notation.

pub mod address;
pub mod style;

use std::collections::BTreeMap;
use std::fmt;

pub use address::{CellRange, CellRef, column_letter, column_number};
pub use style::{
    Alignment, Border, BorderLine, CellStyle, Fill, Font, HorizontalAlign, Protection,
    VerticalAlign,
};

use crate::error::{Result, UnifyError};

/// Longest sheet title accepted by spreadsheet applications.
pub const MAX_SHEET_TITLE: usize = 31;

/// Value held by a cell. Formulas are kept as text including the leading `=`
/// and are never evaluated.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Formula(String),
}

impl CellValue {
    /// Builds a value from raw text, treating a leading `=` as a formula.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.starts_with('=') {
            CellValue::Formula(text)
        } else {
            CellValue::Text(text)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Truthiness as the template rules use it: empty values, blank text,
    /// zero and `false` do not count as content.
    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Empty => false,
            CellValue::Text(text) => !text.is_empty(),
            CellValue::Number(number) => *number != 0.0,
            CellValue::Bool(flag) => *flag,
            CellValue::Formula(_) => true,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, CellValue::Number(_))
    }

    /// Trimmed display text; empty for [`CellValue::Empty`].
    pub fn trimmed(&self) -> String {
        self.to_string().trim().to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) | CellValue::Formula(text) => f.write_str(text),
            CellValue::Number(number) => {
                if number.fract() == 0.0 && number.abs() < 1e15 {
                    write!(f, "{}", *number as i64)
                } else {
                    write!(f, "{number}")
                }
            }
            CellValue::Bool(flag) => write!(f, "{}", if *flag { "TRUE" } else { "FALSE" }),
        }
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        CellValue::from_text(text)
    }
}

impl From<String> for CellValue {
    fn from(text: String) -> Self {
        CellValue::from_text(text)
    }
}

impl From<f64> for CellValue {
    fn from(number: f64) -> Self {
        CellValue::Number(number)
    }
}

impl From<i32> for CellValue {
    fn from(number: i32) -> Self {
        CellValue::Number(f64::from(number))
    }
}

impl From<bool> for CellValue {
    fn from(flag: bool) -> Self {
        CellValue::Bool(flag)
    }
}

/// A cell owns its value and its style outright; copies never share state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

impl Cell {
    pub fn has_style(&self) -> bool {
        !self.style.is_default()
    }

    fn is_blank(&self) -> bool {
        self.value.is_empty() && !self.has_style()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowDimension {
    pub height: Option<f64>,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnDimension {
    pub width: Option<f64>,
    pub hidden: bool,
}

/// A sparse worksheet grid plus its merged ranges and dimension metadata.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub title: String,
    cells: BTreeMap<(u32, u32), Cell>,
    merged: Vec<CellRange>,
    rows: BTreeMap<u32, RowDimension>,
    columns: BTreeMap<u32, ColumnDimension>,
}

static EMPTY_VALUE: CellValue = CellValue::Empty;

impl Sheet {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Highest row holding a value or a styled cell, `0` for an empty sheet.
    pub fn max_row(&self) -> u32 {
        self.cells.keys().map(|(row, _)| *row).max().unwrap_or(0)
    }

    /// Highest column holding a value or a styled cell, `0` for an empty sheet.
    pub fn max_column(&self) -> u32 {
        self.cells.keys().map(|(_, column)| *column).max().unwrap_or(0)
    }

    pub fn cell(&self, row: u32, column: u32) -> Option<&Cell> {
        self.cells.get(&(row, column))
    }

    pub fn value(&self, row: u32, column: u32) -> &CellValue {
        self.cell(row, column)
            .map(|cell| &cell.value)
            .unwrap_or(&EMPTY_VALUE)
    }

    /// Trimmed display text of a cell, empty when the cell holds nothing.
    pub fn text(&self, row: u32, column: u32) -> String {
        self.value(row, column).trimmed()
    }

    /// Mutable access, creating the cell on first use.
    pub fn cell_mut(&mut self, row: u32, column: u32) -> Result<&mut Cell> {
        CellRef::new(row, column).validate()?;
        Ok(self.cells.entry((row, column)).or_default())
    }

    pub fn set_value(&mut self, row: u32, column: u32, value: impl Into<CellValue>) -> Result<()> {
        self.cell_mut(row, column)?.value = value.into();
        Ok(())
    }

    pub fn set_value_at(&mut self, reference: &str, value: impl Into<CellValue>) -> Result<()> {
        let cell: CellRef = reference.parse()?;
        self.set_value(cell.row, cell.column, value)
    }

    /// Mutable access through an A1 reference.
    pub fn cell_at_mut(&mut self, reference: &str) -> Result<&mut Cell> {
        let cell: CellRef = reference.parse()?;
        self.cell_mut(cell.row, cell.column)
    }

    /// Sets only the value of an existing cell to empty, keeping its style.
    pub fn clear_value(&mut self, row: u32, column: u32) {
        if let Some(cell) = self.cells.get_mut(&(row, column)) {
            cell.value = CellValue::Empty;
            if cell.is_blank() {
                self.cells.remove(&(row, column));
            }
        }
    }

    /// Resets a cell to an empty value with the default style.
    pub fn clear_cell(&mut self, row: u32, column: u32) {
        self.cells.remove(&(row, column));
    }

    /// Copies the value and, when the source is styled, a deep copy of its
    /// style. An absent source empties the target value.
    pub fn copy_cell(&mut self, from: CellRef, to: CellRef) -> Result<()> {
        let source = self.cell(from.row, from.column).cloned().unwrap_or_default();
        let target = self.cell_mut(to.row, to.column)?;
        target.value = source.value;
        if source.style != CellStyle::default() {
            target.style = source.style;
        }
        Ok(())
    }

    /// Copies a cell to a new position and fully clears the source.
    pub fn move_cell(&mut self, from: CellRef, to: CellRef) -> Result<()> {
        self.copy_cell(from, to)?;
        self.clear_cell(from.row, from.column);
        Ok(())
    }

    /// Iterates occupied cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.cells
            .iter()
            .map(|((row, column), cell)| (CellRef::new(*row, *column), cell))
    }

    /// Deletes `amount` rows starting at `first`, shifting everything below
    /// upwards. Merged ranges touching the deleted band are dropped.
    pub fn delete_rows(&mut self, first: u32, amount: u32) {
        if amount == 0 || first == 0 {
            return;
        }
        let last = first.saturating_add(amount - 1);
        let shift = |row: u32| {
            if row > last {
                Some(row - amount)
            } else if row < first {
                Some(row)
            } else {
                None
            }
        };

        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter_map(|((row, column), cell)| shift(row).map(|row| ((row, column), cell)))
            .collect();
        self.rows = std::mem::take(&mut self.rows)
            .into_iter()
            .filter_map(|(row, dimension)| shift(row).map(|row| (row, dimension)))
            .collect();
        self.merged = std::mem::take(&mut self.merged)
            .into_iter()
            .filter_map(|range| {
                let start = shift(range.start.row)?;
                let end = shift(range.end.row)?;
                Some(CellRange::new(
                    CellRef::new(start, range.start.column),
                    CellRef::new(end, range.end.column),
                ))
            })
            .collect();
    }

    /// Deletes `amount` columns starting at `first`, shifting everything to
    /// the right leftwards. Merged ranges touching the deleted band are dropped.
    pub fn delete_columns(&mut self, first: u32, amount: u32) {
        if amount == 0 || first == 0 {
            return;
        }
        let last = first.saturating_add(amount - 1);
        let shift = |column: u32| {
            if column > last {
                Some(column - amount)
            } else if column < first {
                Some(column)
            } else {
                None
            }
        };

        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter_map(|((row, column), cell)| shift(column).map(|column| ((row, column), cell)))
            .collect();
        self.columns = std::mem::take(&mut self.columns)
            .into_iter()
            .filter_map(|(column, dimension)| shift(column).map(|column| (column, dimension)))
            .collect();
        self.merged = std::mem::take(&mut self.merged)
            .into_iter()
            .filter_map(|range| {
                let start = shift(range.start.column)?;
                let end = shift(range.end.column)?;
                Some(CellRange::new(
                    CellRef::new(range.start.row, start),
                    CellRef::new(range.end.row, end),
                ))
            })
            .collect();
    }

    pub fn merged_ranges(&self) -> &[CellRange] {
        &self.merged
    }

    /// Removes every merged range, returning how many were removed. Cell
    /// values are untouched.
    pub fn unmerge_all(&mut self) -> usize {
        let count = self.merged.len();
        self.merged.clear();
        count
    }

    /// Merges a range. Values of every cell except the top-left anchor are
    /// discarded, matching spreadsheet semantics.
    pub fn merge(&mut self, reference: &str) -> Result<CellRange> {
        let range: CellRange = reference.parse()?;
        if let Some(existing) = self.merged.iter().find(|existing| existing.intersects(&range)) {
            return Err(UnifyError::MergeOverlap {
                requested: range.to_string(),
                existing: existing.to_string(),
            });
        }
        for cell in range.cells().skip(1) {
            self.clear_value(cell.row, cell.column);
        }
        self.merged.push(range);
        Ok(range)
    }

    /// Pre-existing merge used while copying a sheet verbatim.
    pub fn push_merged(&mut self, range: CellRange) {
        self.merged.push(range);
    }

    pub fn row_dimensions(&self) -> &BTreeMap<u32, RowDimension> {
        &self.rows
    }

    pub fn row_dimension_mut(&mut self, row: u32) -> &mut RowDimension {
        self.rows.entry(row).or_default()
    }

    pub fn column_dimensions(&self) -> &BTreeMap<u32, ColumnDimension> {
        &self.columns
    }

    pub fn column_dimension_mut(&mut self, column: u32) -> &mut ColumnDimension {
        self.columns.entry(column).or_default()
    }

    /// Inserts a fully built cell, used by readers and sheet copies.
    pub fn insert_cell(&mut self, row: u32, column: u32, cell: Cell) -> Result<()> {
        CellRef::new(row, column).validate()?;
        if cell.is_blank() {
            self.cells.remove(&(row, column));
        } else {
            self.cells.insert((row, column), cell);
        }
        Ok(())
    }
}

/// Ordered collection of uniquely titled sheets.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheets_mut(&mut self) -> &mut [Sheet] {
        &mut self.sheets
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    /// Index of the first sheet whose title satisfies `predicate`.
    pub fn position(&self, predicate: impl Fn(&str) -> bool) -> Option<usize> {
        self.sheets.iter().position(|sheet| predicate(&sheet.title))
    }

    /// Appends a sheet, renaming it when its title is taken or too long.
    pub fn add_sheet(&mut self, mut sheet: Sheet) -> &mut Sheet {
        sheet.title = self.unique_title(&sheet.title);
        self.sheets.push(sheet);
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }

    /// Derives a title that fits the length limit and does not collide with
    /// an existing sheet: `Title`, `Title_2`, `Title_3`, …
    pub fn unique_title(&self, desired: &str) -> String {
        let trimmed = desired.trim();
        let base = truncate_chars(if trimmed.is_empty() { "Planilha" } else { trimmed }, MAX_SHEET_TITLE);
        let taken = |candidate: &str| self.sheets.iter().any(|sheet| sheet.title == candidate);
        if !taken(&base) {
            return base;
        }

        let mut counter = 2;
        loop {
            let suffix = format!("_{counter}");
            let prefix = truncate_chars(&base, MAX_SHEET_TITLE - suffix.chars().count());
            let candidate = format!("{prefix}{suffix}");
            if !taken(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
