//! Stages over the input-cost ABC curve.
//!
//! The raw export carries thirteen columns; [`prepare`] reduces it to the
//! A..L layout described in [`crate::layout::abc`], which every later stage
//! assumes.

use tracing::{debug, info};

use super::{bound_sheet, merge_or_warn, restyle, restyle_at, set_number_format, write_formula};
use crate::codes::AmbiguousCodes;
use crate::color::{ColorClass, class_at};
use crate::error::Result;
use crate::formula::Formula;
use crate::layout::{
    BAND_BLUE, COL_A, COL_D, COL_E, COL_F, COL_G, COL_H, COL_I, COL_J, COL_K, COL_L,
    CURRENCY_FORMAT, PERCENT_FORMAT, THOUSANDS_FORMAT, WHITE, abc,
};
use crate::model::{Alignment, Border, BorderLine, CellRef, Fill, Font, Sheet};
use crate::pipeline::{SheetRole, StageContext, StageReport};
use crate::ranges::range_tokens;
use crate::text::parse_localized_number;

/// Reduces the raw ABC export to the working layout and styles it.
///
/// Expects the sheet exactly as exported, after unmerging.
pub fn prepare(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Abc, report) else {
        return Ok(());
    };
    debug!(rows = sheet.max_row(), columns = sheet.max_column(), "raw ABC size");

    for column in abc::REMOVED_COLUMNS {
        sheet.delete_columns(column, 1);
    }
    sheet.delete_rows(abc::REMOVED_ROW, 1);
    sheet.set_value_at("I4", abc::SHARE_HEADER)?;

    for column in 1..=sheet.max_column() {
        if sheet.value(2, column).is_truthy() {
            restyle(sheet, 2, column, |style| style.alignment.wrap_text = true)?;
        }
    }

    let max_row = sheet.max_row();
    for row in 1..=max_row {
        sheet.copy_cell(
            CellRef::new(row, abc::UNIT_PRICE_COLUMN),
            CellRef::new(row, abc::BASE_PRICE_COLUMN),
        )?;
    }
    sheet.set_value_at("J4", abc::BASE_PRICE_HEADER)?;
    sheet.set_value_at("L4", abc::NOTES_HEADER)?;

    convert_numeric_text(sheet, max_row)?;
    move_bank_labels(sheet)?;

    for (reference, label) in abc::PARAMETER_LABELS {
        let cell = sheet.cell_at_mut(reference)?;
        cell.value = label.into();
        cell.style.font = Font::default();
    }
    sheet.set_value_at("J2", 1)?;
    let complement = Formula::Complement {
        numerator: CellRef::new(2, COL_I),
        denominator: CellRef::new(2, COL_J),
    };
    write_formula(sheet, 2, COL_K, &complement, report);
    sheet.set_value_at("L2", abc::NOTES_PLACEHOLDER)?;

    if merge_or_warn(sheet, "A3:L3", report) {
        restyle(sheet, abc::BAND_ROW, COL_A, |style| {
            style.fill = Fill::solid(BAND_BLUE);
            style.font = Font::colored(WHITE);
            style.alignment = Alignment::centered();
        })?;
    }

    let last_row = sheet.max_row();
    apply_grid_formats(sheet, last_row)?;

    for column in 1..=sheet.max_column() {
        if sheet.value(abc::HEADER_ROW, column).is_truthy() {
            restyle(sheet, abc::HEADER_ROW, column, |style| {
                style.font = Font::bold();
                style.alignment = Alignment::centered();
            })?;
        }
    }

    for row in abc::FIRST_ITEM_ROW..=last_row {
        let filled = sheet
            .cell(row, abc::NOTES_COLUMN)
            .is_some_and(|cell| cell.style.fill != Fill::none());
        if filled {
            restyle(sheet, row, abc::NOTES_COLUMN, |style| style.fill = Fill::none())?;
        }
        sheet.clear_value(row, abc::NOTES_COLUMN);
    }

    for reference in ["G2", "E2"] {
        restyle_at(sheet, reference, |style| style.alignment = Alignment::centered_wrapped())?;
    }
    set_number_format(sheet, 2, COL_F, THOUSANDS_FORMAT)?;

    info!(rows = sheet.max_row(), columns = sheet.max_column(), "ABC curve prepared");
    Ok(())
}

/// Turns numeric text in F..L into numbers; unparsable text stays as is.
fn convert_numeric_text(sheet: &mut Sheet, max_row: u32) -> Result<()> {
    for row in 1..=max_row {
        for column in abc::NUMERIC_COLUMNS {
            let parsed = sheet
                .value(row, column)
                .as_text()
                .and_then(parse_localized_number);
            if let Some(number) = parsed {
                sheet.set_value(row, column, number)?;
            }
        }
    }
    Ok(())
}

/// Shifts the bank label/value pair from D1:D2 to E1:E2, keeping D's style.
fn move_bank_labels(sheet: &mut Sheet) -> Result<()> {
    for row in [1, 2] {
        sheet.copy_cell(CellRef::new(row, COL_D), CellRef::new(row, COL_E))?;
        sheet.clear_value(row, COL_D);
    }
    Ok(())
}

fn apply_grid_formats(sheet: &mut Sheet, last_row: u32) -> Result<()> {
    for row in 1..=last_row {
        for column in 1..=abc::LAST_COLUMN {
            restyle(sheet, row, column, |style| style.border = Border::all(BorderLine::Thin))?;
        }
    }

    set_number_format(sheet, 2, COL_I, CURRENCY_FORMAT)?;
    set_number_format(sheet, 2, COL_F, PERCENT_FORMAT)?;
    for row in 1..=last_row {
        for column in [COL_G, COL_H, COL_J] {
            set_number_format(sheet, row, column, CURRENCY_FORMAT)?;
        }
        set_number_format(sheet, row, COL_K, PERCENT_FORMAT)?;
        let share_format = if row == 2 { THOUSANDS_FORMAT } else { PERCENT_FORMAT };
        set_number_format(sheet, row, COL_I, share_format)?;
        if row != 2 {
            set_number_format(sheet, row, COL_F, THOUSANDS_FORMAT)?;
        }
        set_number_format(sheet, row, COL_L, THOUSANDS_FORMAT)?;
    }

    for row in 1..=2 {
        for column in COL_D..=abc::LAST_COLUMN {
            restyle(sheet, row, column, |style| {
                style.font = Font::bold().with_name("Arial").with_size(11.0);
                style.alignment = Alignment::centered_wrapped();
            })?;
        }
    }
    Ok(())
}

/// Formulas of an item row, keyed by the class of the target cell itself.
fn item_formula(column: u32, class: ColorClass, row: u32) -> Option<Formula> {
    if !class.is_abc_item() {
        return None;
    }
    match column {
        COL_G => Some(Formula::Discounted {
            row,
            base: abc::BASE_PRICE_COLUMN,
            discount: abc::DISCOUNT_COLUMN,
        }),
        COL_H => Some(Formula::Product {
            row,
            left: abc::QUANTITY_COLUMN,
            right: abc::UNIT_PRICE_COLUMN,
        }),
        _ => None,
    }
}

/// Discounted unit price in G and line total in H for every item row.
pub fn item_formulas(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Abc, report) else {
        return Ok(());
    };
    for row in 1..=sheet.max_row() {
        for column in [abc::UNIT_PRICE_COLUMN, abc::TOTAL_COLUMN] {
            if let Some(formula) = item_formula(column, class_at(sheet, row, column), row) {
                write_formula(sheet, row, column, &formula, report);
            }
        }
    }
    Ok(())
}

/// Rows whose cell in `column` carries an item color.
fn item_rows(sheet: &Sheet, column: u32) -> Vec<u32> {
    (1..=sheet.max_row())
        .filter(|row| class_at(sheet, *row, column).is_abc_item())
        .collect()
}

/// Grand total of H under the last filled H cell, then each item's share
/// of it in I and a zero discount in K.
pub fn totals(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Abc, report) else {
        return Ok(());
    };
    let colored = item_rows(sheet, abc::TOTAL_COLUMN);
    if colored.is_empty() {
        report.warn("no priced item rows in column H");
        return Ok(());
    }

    let last_filled = (1..=sheet.max_row())
        .rev()
        .find(|row| !sheet.value(*row, abc::TOTAL_COLUMN).is_empty())
        .unwrap_or(0);
    let sum_row = last_filled + 1;
    let sum = Formula::Sum(range_tokens(abc::TOTAL_COLUMN, &colored));
    write_formula(sheet, sum_row, abc::TOTAL_COLUMN, &sum, report);

    let total = CellRef::new(sum_row, abc::TOTAL_COLUMN);
    for row in colored {
        if class_at(sheet, row, abc::SHARE_COLUMN).is_abc_item() {
            let share = Formula::Share {
                row,
                column: abc::TOTAL_COLUMN,
                total,
            };
            write_formula(sheet, row, abc::SHARE_COLUMN, &share, report);
        }
        if class_at(sheet, row, abc::DISCOUNT_COLUMN).is_abc_item() {
            write_formula(sheet, row, abc::DISCOUNT_COLUMN, &Formula::Zero, report);
        }
    }
    Ok(())
}

/// Sum of the shares under the last colored I cell; everything below is
/// deleted and the footer is left borderless and centered.
pub fn share_total(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Abc, report) else {
        return Ok(());
    };
    let colored = item_rows(sheet, abc::SHARE_COLUMN);
    let Some(&last_colored) = colored.last() else {
        report.warn("no item rows in column I; trailing rows kept");
        return Ok(());
    };

    let sum_row = last_colored + 1;
    let sum = Formula::Sum(range_tokens(abc::SHARE_COLUMN, &colored));
    write_formula(sheet, sum_row, abc::SHARE_COLUMN, &sum, report);

    let max_row = sheet.max_row();
    if max_row > sum_row {
        sheet.delete_rows(sum_row + 1, max_row - sum_row);
    }

    for row in sum_row..=sheet.max_row() {
        for column in 1..=abc::LAST_COLUMN {
            restyle(sheet, row, column, |style| {
                style.border = Border::none();
                style.alignment = Alignment::centered();
            })?;
        }
    }
    Ok(())
}

/// Records the codes that appear under more than one bank.
pub fn scan_ambiguity(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = context.sheet(SheetRole::Abc) else {
        report.skip("no ABC curve sheet in the workbook");
        return Ok(());
    };
    let ambiguous = AmbiguousCodes::scan(sheet);
    info!(codes = ambiguous.len(), "ambiguous ABC codes");
    context.ambiguous = ambiguous;
    Ok(())
}
