//! Stage functions, grouped by the sheet they rewrite.
//!
//! Every stage has the [`StageFn`](crate::pipeline::StageFn) signature. A
//! stage whose sheet is not bound marks itself skipped and returns `Ok`;
//! faults on a single row are recorded with [`StageReport::warn_row`] and
//! the loop moves on.

pub mod abc;
pub mod compositions;
pub mod finishing;
pub mod synthetic;

use tracing::debug;

use crate::error::Result;
use crate::formula::Formula;
use crate::model::{CellStyle, CellValue, Sheet};
use crate::pipeline::{SheetRole, StageContext, StageReport};

/// Removes every merged range of every sheet.
pub fn unmerge_all(context: &mut StageContext, _report: &mut StageReport) -> Result<()> {
    for sheet in context.workbook.sheets_mut() {
        let removed = sheet.unmerge_all();
        debug!(sheet = %sheet.title, removed, "unmerged ranges");
    }
    Ok(())
}

/// Sheet bound to `role`, or `None` after marking the stage skipped.
fn bound_sheet<'a>(
    context: &'a mut StageContext,
    role: SheetRole,
    report: &mut StageReport,
) -> Option<&'a mut Sheet> {
    let sheet = context.sheet_mut(role);
    if sheet.is_none() {
        report.skip(format!("no {role} sheet in the workbook"));
    }
    sheet
}

/// Stores a formula, counting it on success and recording a row warning
/// otherwise.
fn write_formula(
    sheet: &mut Sheet,
    row: u32,
    column: u32,
    formula: &Formula,
    report: &mut StageReport,
) -> bool {
    match sheet.set_value(row, column, CellValue::Formula(formula.to_string())) {
        Ok(()) => {
            report.count_formulas(1);
            true
        }
        Err(error) => {
            report.warn_row(row, error);
            false
        }
    }
}

/// Applies `edit` to the style of a cell, creating the cell when needed.
fn restyle(
    sheet: &mut Sheet,
    row: u32,
    column: u32,
    edit: impl FnOnce(&mut CellStyle),
) -> Result<()> {
    edit(&mut sheet.cell_mut(row, column)?.style);
    Ok(())
}

fn restyle_at(sheet: &mut Sheet, reference: &str, edit: impl FnOnce(&mut CellStyle)) -> Result<()> {
    edit(&mut sheet.cell_at_mut(reference)?.style);
    Ok(())
}

fn set_number_format(sheet: &mut Sheet, row: u32, column: u32, format: &str) -> Result<()> {
    restyle(sheet, row, column, |style| style.number_format = format.to_string())
}

/// Merges a range, downgrading an overlap to a stage warning.
fn merge_or_warn(sheet: &mut Sheet, reference: &str, report: &mut StageReport) -> bool {
    match sheet.merge(reference) {
        Ok(_) => true,
        Err(error) => {
            report.warn(format!("merge {reference} skipped: {error}"));
            false
        }
    }
}

/// Resets every cell of `row` from column A through `last_column`.
fn clear_row(sheet: &mut Sheet, row: u32, last_column: u32) {
    for column in 1..=last_column {
        sheet.clear_cell(row, column);
    }
}

/// Whether any cell of `row` up to `last_column` contains `needle`.
fn row_contains(sheet: &Sheet, row: u32, last_column: u32, needle: &str) -> bool {
    (1..=last_column).any(|column| sheet.value(row, column).to_string().contains(needle))
}
