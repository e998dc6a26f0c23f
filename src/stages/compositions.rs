//! Stages over the unit-price composition sheet.
//!
//! After [`prepare`] the sheet has lost its two leading rows and column F, so
//! every later stage uses the layout in [`crate::layout::compositions`].

use std::collections::HashMap;

use tracing::{debug, info};

use super::{bound_sheet, clear_row, merge_or_warn, restyle, row_contains, write_formula};
use crate::codes::LookupStrategy;
use crate::color::{ColorClass, class_at};
use crate::error::Result;
use crate::formula::{Fallback, Formula};
use crate::layout::{BAND_BLUE, COL_A, WHITE, abc, compositions};
use crate::model::{Alignment, CellRef, Fill, Font, Sheet};
use crate::pipeline::{SheetRole, StageContext, StageReport};
use crate::text::{code_key, description_key};

/// Drops the two leading rows and column F, clears calculation notes and
/// shows rows the export hid.
pub fn prepare(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Compositions, report) else {
        return Ok(());
    };
    sheet.delete_rows(1, compositions::REMOVED_LEADING_ROWS);
    sheet.delete_columns(compositions::REMOVED_COLUMN, 1);

    let mut cleared = 0;
    for row in 1..=sheet.max_row() {
        let note = sheet.text(row, compositions::NOTE_COLUMN);
        if compositions::CLEARED_NOTES
            .iter()
            .any(|marker| note.contains(marker))
        {
            sheet.clear_value(row, compositions::NOTE_COLUMN);
            cleared += 1;
        }
    }

    let max_row = sheet.max_row();
    let hidden: Vec<u32> = sheet
        .row_dimensions()
        .iter()
        .filter(|(row, dimension)| {
            **row <= max_row && (dimension.hidden || dimension.height == Some(0.0))
        })
        .map(|(row, _)| *row)
        .collect();
    for row in &hidden {
        let dimension = sheet.row_dimension_mut(*row);
        dimension.hidden = false;
        dimension.height = None;
    }

    debug!(cleared, unhidden = hidden.len(), "compositions prepared");
    Ok(())
}

/// Resets every row that holds a with-BDI or with-social-charges footer.
pub fn clear_footers(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Compositions, report) else {
        return Ok(());
    };
    let last_column = sheet.max_column();
    let rows: Vec<u32> = (1..=sheet.max_row())
        .filter(|row| {
            compositions::CLEARED_ROW_MARKERS
                .iter()
                .any(|marker| row_contains(sheet, *row, last_column, marker))
        })
        .collect();
    for row in &rows {
        clear_row(sheet, *row, last_column);
    }
    debug!(rows = rows.len(), "footer rows cleared");
    Ok(())
}

const CHILD_KINDS: [&str; 3] = [
    compositions::ITEM_KIND,
    compositions::INPUT_KIND,
    compositions::AUXILIARY_KIND,
];
const ORSE_CHILD_KINDS: [&str; 2] = [compositions::INPUT_KIND, compositions::ITEM_KIND];

/// Child block `(start, end)` summed into the unit price of the composition
/// at `row`, or `None` when the block is empty.
///
/// ORSE compositions list their inputs under a detail marker, two rows
/// below it; other compositions list them right after the header row.
pub fn child_block(sheet: &Sheet, row: u32, last_row: u32) -> Option<(u32, u32)> {
    let source = sheet.text(row, compositions::SOURCE_COLUMN).to_uppercase();
    let (start, kinds) = if source.contains(compositions::ORSE_SOURCE) {
        let marker = (row + 1..=last_row).find(|candidate| {
            sheet
                .text(*candidate, compositions::KIND_COLUMN)
                .contains(compositions::ORSE_DETAIL_MARKER)
        })?;
        (marker + 2, &ORSE_CHILD_KINDS[..])
    } else {
        (row + 1, &CHILD_KINDS[..])
    };

    let end = (start..=last_row)
        .find(|candidate| {
            let kind = sheet.text(*candidate, compositions::KIND_COLUMN);
            !kinds.contains(&kind.as_str())
        })
        .map(|boundary| boundary - 1)
        .unwrap_or(last_row);
    (start <= end).then_some((start, end))
}

/// Shows composition rows, writes line costs in I and sums each
/// composition's child block into its unit price.
pub fn costs(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Compositions, report) else {
        return Ok(());
    };

    let last_column = sheet.max_column();
    let last_row = sheet.max_row();
    for row in 1..=last_row {
        let green = (1..=last_column)
            .any(|column| class_at(sheet, row, column) == ColorClass::PrimaryComposition);
        if green {
            let dimension = sheet.row_dimension_mut(row);
            dimension.hidden = false;
            dimension.height = Some(compositions::VISIBLE_ROW_HEIGHT);
        }
    }

    for row in 1..=last_row {
        if class_at(sheet, row, compositions::TOTAL_COLUMN).is_costed_composition_line() {
            let cost = Formula::TruncatedProduct {
                row,
                left: compositions::QUANTITY_COLUMN,
                right: compositions::UNIT_PRICE_COLUMN,
            };
            write_formula(sheet, row, compositions::TOTAL_COLUMN, &cost, report);
        }
    }

    for row in 1..=last_row {
        if class_at(sheet, row, compositions::UNIT_PRICE_COLUMN) != ColorClass::PrimaryComposition {
            continue;
        }
        match child_block(sheet, row, last_row) {
            Some((start, end)) => {
                let sum = Formula::Sum(vec![format!("I{start}:I{end}")]);
                write_formula(sheet, row, compositions::UNIT_PRICE_COLUMN, &sum, report);
            }
            None => sheet.set_value(row, compositions::UNIT_PRICE_COLUMN, 0.0)?,
        }
    }
    Ok(())
}

/// Points each auxiliary composition's unit price at the priced
/// composition with the same normalised key.
pub fn auxiliary_links(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Compositions, report) else {
        return Ok(());
    };
    let last_row = sheet.max_row();

    let mut priced: HashMap<String, u32> = HashMap::new();
    for row in 1..=last_row {
        if class_at(sheet, row, compositions::UNIT_PRICE_COLUMN) == ColorClass::PrimaryComposition {
            let key = description_key(sheet.value(row, compositions::LINK_KEY_COLUMN));
            if !key.is_empty() {
                priced.insert(key, row);
            }
        }
    }
    if priced.is_empty() {
        report.warn("no priced compositions to link against");
        return Ok(());
    }

    let mut self_references = 0;
    for row in 1..=last_row {
        if class_at(sheet, row, compositions::UNIT_PRICE_COLUMN) != ColorClass::AuxiliaryComposition
        {
            continue;
        }
        let key = description_key(sheet.value(row, compositions::LINK_KEY_COLUMN));
        match priced.get(&key) {
            Some(&target) if target == row => self_references += 1,
            Some(&target) => {
                let link = Formula::Reference(CellRef::new(target, compositions::TOTAL_COLUMN));
                write_formula(sheet, row, compositions::UNIT_PRICE_COLUMN, &link, report);
            }
            None => {}
        }
    }
    debug!(self_references, "auxiliary links written");
    Ok(())
}

/// Lookup of an input's unit price in the ABC curve.
pub fn input_lookup(strategy: LookupStrategy, row: u32, abc_title: &str) -> Formula {
    match strategy {
        LookupStrategy::ByDescription => Formula::LookupByDescription {
            key: CellRef::new(row, compositions::DESCRIPTION_COLUMN),
            sheet: abc_title.to_string(),
            value_column: abc::UNIT_PRICE_COLUMN,
            match_column: abc::DESCRIPTION_COLUMN,
            fallback: Fallback::Placeholder(compositions::DESCRIPTION_NOT_FOUND.to_string()),
        },
        LookupStrategy::ByCode => Formula::LookupByCode {
            key: CellRef::new(row, compositions::CODE_COLUMN),
            sheet: abc_title.to_string(),
            first_column: abc::CODE_COLUMN,
            last_column: abc::UNIT_PRICE_COLUMN,
            fallback: Fallback::Placeholder(compositions::CODE_NOT_FOUND.to_string()),
        },
    }
}

/// Prices input lines from the ABC curve, by description when their code
/// is ambiguous.
pub fn input_lookups(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(abc_title) = context.title(SheetRole::Abc) else {
        report.skip("no ABC curve sheet to look prices up in");
        return Ok(());
    };
    let ambiguous = context.ambiguous.clone();
    let Some(sheet) = bound_sheet(context, SheetRole::Compositions, report) else {
        return Ok(());
    };

    let mut by_description = 0;
    for row in 1..=sheet.max_row() {
        if class_at(sheet, row, compositions::UNIT_PRICE_COLUMN) != ColorClass::SecondaryAuxiliary {
            continue;
        }
        let code = code_key(sheet.value(row, compositions::CODE_COLUMN));
        let strategy = ambiguous.strategy_for(&code);
        if strategy == LookupStrategy::ByDescription {
            by_description += 1;
        }
        let lookup = input_lookup(strategy, row, &abc_title);
        write_formula(sheet, row, compositions::UNIT_PRICE_COLUMN, &lookup, report);
    }
    info!(by_description, "input prices linked to the ABC curve");
    Ok(())
}

/// Empties composition header rows that carry no description.
pub fn clear_empty(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Compositions, report) else {
        return Ok(());
    };
    let last_column = sheet.max_column();
    let mut cleared = 0;
    for row in (1..=sheet.max_row()).rev() {
        if class_at(sheet, row, compositions::KIND_COLUMN) == ColorClass::PrimaryComposition
            && sheet.text(row, compositions::DESCRIPTION_COLUMN).is_empty()
        {
            for column in 1..=last_column {
                sheet.clear_value(row, column);
            }
            cleared += 1;
        }
    }
    debug!(cleared, "empty compositions cleared");
    Ok(())
}

fn paint_band(sheet: &mut Sheet, row: u32, font: Font) -> Result<()> {
    restyle(sheet, row, COL_A, |style| {
        style.fill = Fill::solid(BAND_BLUE);
        style.font = font;
        style.alignment = Alignment::centered();
    })
}

/// Title bands on rows 1 and 2 and on the auxiliary section header, then
/// drops trailing rows after the last composition line.
pub fn bands(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Compositions, report) else {
        return Ok(());
    };

    let title_font = Font::colored(WHITE)
        .with_name("Arial")
        .with_size(compositions::BAND_FONT_SIZE);
    for row in [1, 2] {
        if merge_or_warn(sheet, &format!("A{row}:I{row}"), report) {
            paint_band(sheet, row, title_font.clone())?;
        }
    }

    let section = (3..=sheet.max_row()).find(|row| {
        sheet
            .text(*row, compositions::KIND_COLUMN)
            .contains(compositions::AUXILIARY_SECTION)
    });
    match section {
        Some(row) => {
            if merge_or_warn(sheet, &format!("A{row}:I{row}"), report) {
                let font = Font::colored(WHITE).with_size(compositions::BAND_FONT_SIZE);
                paint_band(sheet, row, font)?;
            }
        }
        None => report.warn("auxiliary compositions section not found"),
    }

    let max_row = sheet.max_row();
    let last_line = (1..=max_row)
        .rev()
        .find(|row| class_at(sheet, *row, COL_A).is_costed_composition_line());
    match last_line {
        Some(last) if last < max_row => sheet.delete_rows(last + 1, max_row - last),
        Some(_) => {}
        None => report.warn("no composition lines found; trailing rows kept"),
    }
    debug!(rows = sheet.max_row(), "composition bands applied");
    Ok(())
}
