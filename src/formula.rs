//! Formula templates emitted by the pipeline.
//!
//! Formulas are rendered to text and stored in cells; nothing here parses or
//! evaluates them.

use std::fmt;

use crate::model::{CellRef, column_letter};

/// Value returned when a lookup fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Fallback {
    Zero,
    Placeholder(String),
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::Zero => f.write_str("0"),
            Fallback::Placeholder(text) => write!(f, "\"{}\"", text.replace('"', "\"\"")),
        }
    }
}

/// Quotes a sheet title for use in a cross-sheet reference.
pub fn quote_sheet(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Every formula shape the pipeline writes.
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    /// `=J5*(1-K5)`: base price after the row discount.
    Discounted { row: u32, base: u32, discount: u32 },
    /// `=F5*G5`: plain product of two columns of one row.
    Product { row: u32, left: u32, right: u32 },
    /// `=TRUNC((G5*H5),2)`.
    TruncatedProduct { row: u32, left: u32, right: u32 },
    /// `=TRUNC((G5*(1+$G$2)),2)`: value with the markup rate applied.
    TruncatedMarkup { row: u32, value: u32, rate: String },
    /// `=SUM(H5:H9,H12)`.
    Sum(Vec<String>),
    /// `=H5/$H$40`: share of a fixed total cell.
    Share { row: u32, column: u32, total: CellRef },
    /// `=1-I2/J2`.
    Complement { numerator: CellRef, denominator: CellRef },
    /// `=H40-H38`.
    Difference { minuend: CellRef, subtrahend: CellRef },
    /// `=0`.
    Zero,
    /// `=I12`: same-sheet reference.
    Reference(CellRef),
    /// `='Sheet'!H40`.
    SheetReference { sheet: String, cell: CellRef },
    /// `=IFERROR(VLOOKUP(B5,'Sheet'!$A:$G,7,FALSE),0)`.
    LookupByCode {
        key: CellRef,
        sheet: String,
        first_column: u32,
        last_column: u32,
        fallback: Fallback,
    },
    /// `=IFERROR(INDEX('Sheet'!$G:$G,MATCH(D5,'Sheet'!$C:$C,0)),0)`.
    LookupByDescription {
        key: CellRef,
        sheet: String,
        value_column: u32,
        match_column: u32,
        fallback: Fallback,
    },
}

fn whole_column(column: u32) -> String {
    let letter = column_letter(column);
    format!("${letter}:${letter}")
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Discounted { row, base, discount } => write!(
                f,
                "={}{row}*(1-{}{row})",
                column_letter(*base),
                column_letter(*discount)
            ),
            Formula::Product { row, left, right } => write!(
                f,
                "={}{row}*{}{row}",
                column_letter(*left),
                column_letter(*right)
            ),
            Formula::TruncatedProduct { row, left, right } => write!(
                f,
                "=TRUNC(({}{row}*{}{row}),2)",
                column_letter(*left),
                column_letter(*right)
            ),
            Formula::TruncatedMarkup { row, value, rate } => {
                write!(f, "=TRUNC(({}{row}*(1+{rate})),2)", column_letter(*value))
            }
            Formula::Sum(tokens) => write!(f, "=SUM({})", tokens.join(",")),
            Formula::Share { row, column, total } => {
                write!(f, "={}{row}/{}", column_letter(*column), total.absolute())
            }
            Formula::Complement {
                numerator,
                denominator,
            } => write!(f, "=1-{numerator}/{denominator}"),
            Formula::Difference {
                minuend,
                subtrahend,
            } => write!(f, "={minuend}-{subtrahend}"),
            Formula::Zero => f.write_str("=0"),
            Formula::Reference(cell) => write!(f, "={cell}"),
            Formula::SheetReference { sheet, cell } => write!(f, "={}!{cell}", quote_sheet(sheet)),
            Formula::LookupByCode {
                key,
                sheet,
                first_column,
                last_column,
                fallback,
            } => write!(
                f,
                "=IFERROR(VLOOKUP({key},{}!${}:${},{},FALSE),{fallback})",
                quote_sheet(sheet),
                column_letter(*first_column),
                column_letter(*last_column),
                last_column.saturating_sub(*first_column) + 1
            ),
            Formula::LookupByDescription {
                key,
                sheet,
                value_column,
                match_column,
                fallback,
            } => {
                let sheet = quote_sheet(sheet);
                write!(
                    f,
                    "=IFERROR(INDEX({sheet}!{},MATCH({key},{sheet}!{},0)),{fallback})",
                    whole_column(*value_column),
                    whole_column(*match_column)
                )
            }
        }
    }
}
