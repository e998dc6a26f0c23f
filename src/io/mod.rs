//! Spreadsheet input and output.
//!
//! Values and formulas are read with `calamine`; the styling, merged ranges
//! and row/column dimensions that `calamine` does not expose are read
//! straight from the OOXML package by [`package`]. The consolidated workbook
//! is written with `rust_xlsxwriter`.

pub mod excel_read;
pub mod excel_write;
pub mod package;

pub use excel_read::read_first_sheet;
pub use excel_write::write_workbook;
