//! Cross-sheet finishing stages: links between the ABC curve and the
//! synthetic budget, band colors and the final header pass.

use tracing::debug;

use super::{bound_sheet, merge_or_warn, restyle, restyle_at, write_formula};
use crate::color::{ColorClass, class_at};
use crate::error::Result;
use crate::formula::Formula;
use crate::layout::{
    ACCOUNTING_FORMAT, BAND_STEEL, COL_D, COL_F, COL_G, COL_H, COL_I, TEXT_FORMAT, THOUSANDS_FORMAT,
    WHITE, abc, synthetic,
};
use crate::model::{Alignment, CellRef, CellValue, Fill, Font, Sheet};
use crate::pipeline::{SheetRole, StageContext, StageReport};
use crate::text::normalize_hierarchy_code;

/// Copies value and, when styled, style of a cell from one sheet to
/// another. Returns `false` when either sheet is unbound.
fn copy_across(
    context: &mut StageContext,
    from: (SheetRole, CellRef),
    to: (SheetRole, CellRef),
) -> Result<bool> {
    let Some(source) = context.sheet(from.0) else {
        return Ok(false);
    };
    let source = source.cell(from.1.row, from.1.column).cloned().unwrap_or_default();
    let Some(target_sheet) = context.sheet_mut(to.0) else {
        return Ok(false);
    };
    let target = target_sheet.cell_mut(to.1.row, to.1.column)?;
    let styled = source.has_style();
    target.value = source.value;
    if styled {
        target.style = source.style;
    }
    Ok(true)
}

/// Final ABC merges and the links to the synthetic grand total and BDI rate.
pub fn abc_links(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(synthetic_sheet) = context.sheet(SheetRole::Synthetic) else {
        report.skip("no synthetic budget sheet in the workbook");
        return Ok(());
    };
    let synthetic_title = synthetic_sheet.title.clone();
    let grand_total = (1..=synthetic_sheet.max_row()).find(|row| {
        synthetic_sheet.text(*row, synthetic::UNIT_PRICE_COLUMN) == synthetic::GRAND_TOTAL
    });

    let Some(sheet) = bound_sheet(context, SheetRole::Abc, report) else {
        return Ok(());
    };
    for reference in abc::FINAL_MERGES {
        merge_or_warn(sheet, reference, report);
    }

    match grand_total {
        Some(row) => {
            let link = Formula::SheetReference {
                sheet: synthetic_title.clone(),
                cell: CellRef::new(row, synthetic::UNIT_WITH_BDI_COLUMN),
            };
            write_formula(sheet, 2, abc::SHARE_COLUMN, &link, report);
        }
        None => report.warn(format!(
            "label '{}' not found in the synthetic budget",
            synthetic::GRAND_TOTAL
        )),
    }
    let rate = Formula::SheetReference {
        sheet: synthetic_title,
        cell: CellRef::new(2, synthetic::UNIT_PRICE_COLUMN),
    };
    write_formula(sheet, 2, abc::QUANTITY_COLUMN, &rate, report);
    Ok(())
}

/// Repaints saturated blue bands in steel blue with a white bold font.
fn recolor_bands(sheet: &mut Sheet, rows: &[u32], center: bool) -> Result<usize> {
    let mut recolored = 0;
    for &row in rows {
        for column in 1..=sheet.max_column() {
            if class_at(sheet, row, column) != ColorClass::HeaderBand {
                continue;
            }
            restyle(sheet, row, column, |style| {
                style.fill = Fill::solid(BAND_STEEL);
                style.font = Font::colored(WHITE).with_bold(true);
                if center {
                    style.alignment = Alignment::centered();
                }
            })?;
            recolored += 1;
        }
    }
    Ok(recolored)
}

/// Copies the bank label to the ABC curve and recolors every title band.
pub fn header_bands(context: &mut StageContext, _report: &mut StageReport) -> Result<()> {
    copy_across(
        context,
        (SheetRole::Synthetic, CellRef::new(2, synthetic::BANK_COLUMN)),
        (SheetRole::Abc, CellRef::new(2, COL_D)),
    )?;

    let bands = [
        (SheetRole::Synthetic, &[synthetic::BAND_ROW][..], true),
        (SheetRole::Abc, &[abc::BAND_ROW][..], false),
        (SheetRole::Compositions, &[1, 2][..], false),
    ];
    for (role, rows, center) in bands {
        if let Some(sheet) = context.sheet_mut(role) {
            let recolored = recolor_bands(sheet, rows, center)?;
            debug!(%role, recolored, "bands recolored");
        }
    }
    Ok(())
}

/// Restores the synthetic headers, applies the accounting format and the
/// last ABC labels and wraps.
pub fn final_headers(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    if context.sheet(SheetRole::Synthetic).is_none() && context.sheet(SheetRole::Abc).is_none() {
        report.skip("neither the synthetic budget nor the ABC curve is present");
        return Ok(());
    }

    if let Some(sheet) = context.sheet_mut(SheetRole::Synthetic) {
        for (reference, header) in synthetic::HEADERS {
            sheet.set_value_at(reference, header)?;
        }
        let mut formatted = 0;
        for row in 1..=sheet.max_row() {
            for column in [COL_G, COL_H, COL_I] {
                if row == 2 && column == COL_G {
                    continue;
                }
                let value = sheet.value(row, column);
                if value.is_number() || value.is_formula() {
                    restyle(sheet, row, column, |style| {
                        style.number_format = ACCOUNTING_FORMAT.to_string();
                    })?;
                    formatted += 1;
                }
            }
        }
        debug!(formatted, "accounting format applied");
    }

    if let Some(sheet) = context.sheet_mut(SheetRole::Abc) {
        sheet.set_value_at("G1", abc::SOCIAL_CHARGES_HEADER)?;
        sheet.set_value_at("K4", abc::DISCOUNT_HEADER)?;
    }
    copy_across(
        context,
        (SheetRole::Synthetic, CellRef::new(2, synthetic::UNIT_WITH_BDI_COLUMN)),
        (SheetRole::Abc, CellRef::new(2, abc::UNIT_PRICE_COLUMN)),
    )?;

    if let Some(sheet) = context.sheet_mut(SheetRole::Synthetic) {
        for reference in ["H2", "E2"] {
            restyle_at(sheet, reference, |style| style.alignment = Alignment::centered_wrapped())?;
        }
    }
    if let Some(sheet) = context.sheet_mut(SheetRole::Abc) {
        for reference in ["G2", "E2"] {
            restyle_at(sheet, reference, |style| style.alignment = Alignment::centered_wrapped())?;
        }
        for row in 1..=sheet.max_row() {
            if sheet.value(row, COL_F).is_number() {
                restyle(sheet, row, COL_F, |style| {
                    style.number_format = THOUSANDS_FORMAT.to_string();
                })?;
            }
        }
    }
    Ok(())
}

/// Rewrites hierarchy codes that still use commas, spaces or numbers as
/// dotted text.
pub fn hierarchy_codes(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Synthetic, report) else {
        return Ok(());
    };
    let mut converted = 0;
    for row in synthetic::FIRST_ITEM_ROW..=sheet.max_row() {
        let value = sheet.value(row, synthetic::HIERARCHY_COLUMN);
        if !value.is_truthy() {
            continue;
        }
        let Some(code) = normalize_hierarchy_code(value) else {
            continue;
        };
        let code = CellValue::Text(code);
        if *value == code {
            continue;
        }
        let cell = sheet.cell_mut(row, synthetic::HIERARCHY_COLUMN)?;
        cell.value = code;
        cell.style.number_format = TEXT_FORMAT.to_string();
        converted += 1;
    }
    debug!(converted, "hierarchy codes converted");
    Ok(())
}
