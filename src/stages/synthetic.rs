//! Stages over the synthetic budget.
//!
//! [`prepare`] moves the BDI rate to G2 and removes the export's helper
//! columns; from then on the sheet follows [`crate::layout::synthetic`].

use std::collections::HashMap;

use tracing::{debug, info};

use super::{
    bound_sheet, clear_row, merge_or_warn, restyle, restyle_at, set_number_format, write_formula,
};
use crate::codes::LookupStrategy;
use crate::color::{ColorClass, class_at, classify, hex_at};
use crate::error::Result;
use crate::formula::{Fallback, Formula};
use crate::hierarchy::{level_one_rows, outline, parent_groups};
use crate::layout::{
    BAND_BLUE, COL_E, COL_G, COL_H, COL_I, COL_J, DOLLAR_FORMAT, PERCENT_FORMAT, TEXT_FORMAT,
    WHITE, abc, compositions, synthetic,
};
use crate::model::{
    Alignment, Border, BorderLine, CellRef, CellValue, Fill, Font, HorizontalAlign, Sheet,
    VerticalAlign,
};
use crate::pipeline::{SheetRole, StageContext, StageReport};
use crate::ranges::range_tokens;
use crate::text::{code_key, normalize_hierarchy_code};

/// Moves the BDI rate pair to G1:G2, trims the export to A..K, writes the
/// working headers and the unit price with BDI.
pub fn prepare(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Synthetic, report) else {
        return Ok(());
    };

    for row in [1, 2] {
        sheet.move_cell(CellRef::new(row, COL_H), CellRef::new(row, COL_G))?;
    }
    for column in 1..=sheet.max_column() {
        if sheet.value(2, column).is_truthy() {
            restyle(sheet, 2, column, |style| {
                let alignment = &mut style.alignment;
                alignment.wrap_text = true;
                alignment.horizontal = alignment.horizontal.or(Some(HorizontalAlign::Center));
                alignment.vertical = alignment.vertical.or(Some(VerticalAlign::Center));
            })?;
        }
    }

    sheet.delete_rows(synthetic::REMOVED_ROW, 1);
    for column in synthetic::REMOVED_COLUMNS {
        sheet.delete_columns(column, 1);
    }

    for (reference, header) in synthetic::HEADERS {
        sheet.set_value_at(reference, header)?;
    }
    sheet.set_value_at("K1", synthetic::COLLECTION_HEADER)?;
    sheet.set_value_at("K2", synthetic::COLLECTION_PLACEHOLDER)?;
    for reference in ["H2", "E2"] {
        restyle_at(sheet, reference, |style| style.alignment = Alignment::centered_wrapped())?;
    }

    for row in 1..=sheet.max_row() {
        if class_at(sheet, row, synthetic::UNIT_WITH_BDI_COLUMN).is_priced_budget_line() {
            let markup = Formula::TruncatedMarkup {
                row,
                value: synthetic::UNIT_PRICE_COLUMN,
                rate: synthetic::BDI_RATE.to_string(),
            };
            write_formula(sheet, row, synthetic::UNIT_WITH_BDI_COLUMN, &markup, report);
        }
    }
    Ok(())
}

/// Line totals without and with BDI, then hierarchy codes stored as text.
pub fn line_totals(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Synthetic, report) else {
        return Ok(());
    };

    for row in 1..=sheet.max_row() {
        let targets = [
            (synthetic::TOTAL_COLUMN, synthetic::UNIT_PRICE_COLUMN),
            (synthetic::TOTAL_WITH_BDI_COLUMN, synthetic::UNIT_WITH_BDI_COLUMN),
        ];
        for (column, price) in targets {
            if class_at(sheet, row, column).is_priced_budget_line() {
                let total = Formula::Product {
                    row,
                    left: price,
                    right: synthetic::QUANTITY_COLUMN,
                };
                write_formula(sheet, row, column, &total, report);
            }
        }
    }

    let mut normalized = 0;
    for row in synthetic::FIRST_ITEM_ROW..=sheet.max_row() {
        let value = sheet.value(row, synthetic::HIERARCHY_COLUMN);
        let Some(code) = normalize_hierarchy_code(value) else {
            continue;
        };
        if code.is_empty() {
            sheet.clear_value(row, synthetic::HIERARCHY_COLUMN);
            continue;
        }
        if *value != CellValue::Text(code.clone()) {
            normalized += 1;
        }
        let cell = sheet.cell_mut(row, synthetic::HIERARCHY_COLUMN)?;
        cell.value = CellValue::Text(code);
        cell.style.number_format = TEXT_FORMAT.to_string();
    }
    debug!(normalized, "hierarchy codes stored as text");
    Ok(())
}

/// Unit-price template for a budget line: compositions come from the
/// composition sheet, inputs from the ABC curve.
pub fn price_lookup(
    class: ColorClass,
    strategy: LookupStrategy,
    row: u32,
    compositions_title: &str,
    abc_title: &str,
) -> Option<Formula> {
    match (class, strategy) {
        (ColorClass::PrimaryComposition, _) => Some(Formula::LookupByCode {
            key: CellRef::new(row, synthetic::CODE_COLUMN),
            sheet: compositions_title.to_string(),
            first_column: compositions::CODE_COLUMN,
            last_column: compositions::UNIT_PRICE_COLUMN,
            fallback: Fallback::Zero,
        }),
        (ColorClass::InputItem, LookupStrategy::ByDescription) => {
            Some(Formula::LookupByDescription {
                key: CellRef::new(row, synthetic::DESCRIPTION_COLUMN),
                sheet: abc_title.to_string(),
                value_column: abc::UNIT_PRICE_COLUMN,
                match_column: abc::DESCRIPTION_COLUMN,
                fallback: Fallback::Zero,
            })
        }
        (ColorClass::InputItem, LookupStrategy::ByCode) => Some(Formula::LookupByCode {
            key: CellRef::new(row, synthetic::CODE_COLUMN),
            sheet: abc_title.to_string(),
            first_column: abc::CODE_COLUMN,
            last_column: abc::UNIT_PRICE_COLUMN,
            fallback: Fallback::Zero,
        }),
        _ => None,
    }
}

/// Fills the unit price column from the composition sheet and the ABC curve.
pub fn price_lookups(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let (Some(compositions_title), Some(abc_title)) = (
        context.title(SheetRole::Compositions),
        context.title(SheetRole::Abc),
    ) else {
        report.skip("composition or ABC curve sheet missing");
        return Ok(());
    };
    let ambiguous = context.ambiguous.clone();
    let Some(sheet) = bound_sheet(context, SheetRole::Synthetic, report) else {
        return Ok(());
    };

    for row in 1..=sheet.max_row() {
        let class = class_at(sheet, row, synthetic::UNIT_PRICE_COLUMN);
        let code = code_key(sheet.value(row, synthetic::CODE_COLUMN));
        let strategy = ambiguous.strategy_for(&code);
        if let Some(lookup) = price_lookup(class, strategy, row, &compositions_title, &abc_title) {
            write_formula(sheet, row, synthetic::UNIT_PRICE_COLUMN, &lookup, report);
        }
    }
    Ok(())
}

/// Sums each outline parent's direct children into its I and J cells.
/// Parents without children keep their current values.
pub fn aggregate_hierarchy(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Synthetic, report) else {
        return Ok(());
    };
    let rows = outline(sheet, synthetic::HIERARCHY_COLUMN, 1);
    let groups = parent_groups(&rows);
    for (parent, children) in &groups {
        for column in [synthetic::TOTAL_COLUMN, synthetic::TOTAL_WITH_BDI_COLUMN] {
            let sum = Formula::Sum(range_tokens(column, children));
            write_formula(sheet, *parent, column, &sum, report);
        }
    }
    info!(parents = groups.len(), "outline aggregated");
    Ok(())
}

/// Rows of the footer labels, searched below the header row. A label that
/// occurs more than once resolves to its last occurrence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TotalRows {
    pub without_bdi: Option<u32>,
    pub grand: Option<u32>,
    pub bdi: Option<u32>,
}

impl TotalRows {
    pub fn locate(sheet: &Sheet, label_column: u32) -> Self {
        let mut rows = Self::default();
        for row in synthetic::HEADER_ROW + 1..=sheet.max_row() {
            match sheet.text(row, label_column).as_str() {
                synthetic::TOTAL_WITHOUT_BDI => rows.without_bdi = Some(row),
                synthetic::GRAND_TOTAL => rows.grand = Some(row),
                synthetic::BDI_TOTAL => rows.bdi = Some(row),
                _ => {}
            }
        }
        rows
    }

    pub fn contains(&self, row: u32) -> bool {
        [self.without_bdi, self.grand, self.bdi].contains(&Some(row))
    }
}

fn write_currency_formula(
    sheet: &mut Sheet,
    row: u32,
    column: u32,
    formula: &Formula,
    report: &mut StageReport,
) -> Result<()> {
    if write_formula(sheet, row, column, formula, report) {
        set_number_format(sheet, row, column, DOLLAR_FORMAT)?;
    }
    Ok(())
}

/// Footer totals in J from the top-level parents, then clears the arrow
/// row and everything below the grand total.
pub fn grand_totals(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Synthetic, report) else {
        return Ok(());
    };
    let totals = TotalRows::locate(sheet, synthetic::TOTAL_COLUMN);
    let arrow = (synthetic::HEADER_ROW + 1..=sheet.max_row())
        .rev()
        .find(|row| sheet.text(*row, synthetic::UNIT_WITH_BDI_COLUMN) == synthetic::TOTALS_ARROW);

    let level_one: Vec<u32> = level_one_rows(&outline(sheet, synthetic::HIERARCHY_COLUMN, 1), true)
        .into_iter()
        .filter(|row| !totals.contains(*row) && Some(*row) != arrow)
        .collect();
    debug!(rows = level_one.len(), "top-level parents");

    let column = synthetic::TOTAL_WITH_BDI_COLUMN;
    if !level_one.is_empty() {
        if let Some(row) = totals.without_bdi {
            let sum = Formula::Sum(range_tokens(synthetic::TOTAL_COLUMN, &level_one));
            write_currency_formula(sheet, row, column, &sum, report)?;
        }
        if let Some(row) = totals.grand {
            let sum = Formula::Sum(range_tokens(column, &level_one));
            write_currency_formula(sheet, row, column, &sum, report)?;
        }
    } else {
        report.warn("no top-level parents to total");
    }
    if let (Some(bdi), Some(grand), Some(without)) = (totals.bdi, totals.grand, totals.without_bdi) {
        let difference = Formula::Difference {
            minuend: CellRef::new(grand, column),
            subtrahend: CellRef::new(without, column),
        };
        write_currency_formula(sheet, bdi, column, &difference, report)?;
    }

    let last_column = sheet.max_column();
    if let Some(row) = arrow {
        clear_row(sheet, row, last_column);
    }
    match totals.grand {
        Some(grand) => {
            for row in grand + 1..=sheet.max_row() {
                clear_row(sheet, row, last_column);
            }
        }
        None => report.warn(format!("label '{}' not found", synthetic::GRAND_TOTAL)),
    }
    Ok(())
}

/// Moves footer labels and values from I/J to G/H and writes each line's
/// weight against the grand total.
pub fn weights(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Synthetic, report) else {
        return Ok(());
    };

    let mut moved: HashMap<String, u32> = HashMap::new();
    for row in synthetic::HEADER_ROW + 1..=sheet.max_row() {
        let label = sheet.text(row, synthetic::TOTAL_COLUMN);
        if [
            synthetic::TOTAL_WITHOUT_BDI,
            synthetic::GRAND_TOTAL,
            synthetic::BDI_TOTAL,
        ]
        .contains(&label.as_str())
        {
            sheet.move_cell(CellRef::new(row, COL_I), CellRef::new(row, COL_G))?;
            sheet.move_cell(CellRef::new(row, COL_J), CellRef::new(row, COL_H))?;
            moved.insert(label, row);
        }
    }

    let located = |label: &str| moved.get(label).copied();
    if let (Some(bdi), Some(grand), Some(without)) = (
        located(synthetic::BDI_TOTAL),
        located(synthetic::GRAND_TOTAL),
        located(synthetic::TOTAL_WITHOUT_BDI),
    ) {
        let difference = Formula::Difference {
            minuend: CellRef::new(grand, COL_H),
            subtrahend: CellRef::new(without, COL_H),
        };
        write_currency_formula(sheet, bdi, COL_H, &difference, report)?;
    }

    let Some(grand) = located(synthetic::GRAND_TOTAL) else {
        report.warn(format!("label '{}' not found; weights skipped", synthetic::GRAND_TOTAL));
        return Ok(());
    };
    let total = CellRef::new(grand, synthetic::UNIT_WITH_BDI_COLUMN);
    let moved_rows: Vec<u32> = moved.values().copied().collect();

    for row in 1..=sheet.max_row() {
        if moved_rows.contains(&row) {
            continue;
        }
        let hex = hex_at(sheet, row, synthetic::TOTAL_WITH_BDI_COLUMN)
            .or_else(|| hex_at(sheet, row, synthetic::UNIT_WITH_BDI_COLUMN));
        if !classify(hex.as_deref()).is_weighted_budget_line() {
            continue;
        }
        let weight = Formula::Share {
            row,
            column: synthetic::TOTAL_WITH_BDI_COLUMN,
            total,
        };
        if write_formula(sheet, row, synthetic::WEIGHT_COLUMN, &weight, report) {
            set_number_format(sheet, row, synthetic::WEIGHT_COLUMN, PERCENT_FORMAT)?;
        }
    }
    Ok(())
}

/// Grand totals in H, summed over every level-1 row regardless of color.
pub fn level_one_totals(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Synthetic, report) else {
        return Ok(());
    };
    let rows = outline(sheet, synthetic::HIERARCHY_COLUMN, synthetic::FIRST_ITEM_ROW);
    let level_one = level_one_rows(&rows, false);
    if level_one.is_empty() {
        report.warn("no level-1 rows found");
        return Ok(());
    }

    let totals = TotalRows::locate(sheet, synthetic::UNIT_PRICE_COLUMN);
    let targets = [
        (totals.without_bdi, synthetic::TOTAL_COLUMN),
        (totals.grand, synthetic::TOTAL_WITH_BDI_COLUMN),
    ];
    for (row, column) in targets {
        match row {
            Some(row) => {
                let sum = Formula::Sum(range_tokens(column, &level_one));
                write_currency_formula(sheet, row, COL_H, &sum, report)?;
            }
            None => report.warn("total label missing in column G"),
        }
    }
    Ok(())
}

fn is_total_row(sheet: &Sheet, row: u32) -> bool {
    (1..=synthetic::LAST_COLUMN).any(|column| {
        let text = sheet.value(row, column).to_string();
        synthetic::TOTAL_KEYWORDS
            .iter()
            .any(|keyword| text.contains(keyword))
    })
}

/// Borders down to the last colored line, bold header rows and the title
/// band on row 3.
pub fn borders(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Synthetic, report) else {
        return Ok(());
    };
    let last_row = sheet.max_row();
    let last_colored = (1..=last_row)
        .rev()
        .filter(|row| !is_total_row(sheet, *row))
        .find(|row| {
            (1..=synthetic::LAST_COLUMN).any(|column| hex_at(sheet, *row, column).is_some())
        })
        .unwrap_or(1);

    for row in 1..=last_colored {
        for column in 1..=synthetic::LAST_COLUMN {
            restyle(sheet, row, column, |style| style.border = Border::all(BorderLine::Thin))?;
        }
    }
    for row in last_colored + 1..=last_row {
        for column in 1..=synthetic::LAST_COLUMN {
            if sheet.cell(row, column).is_some() {
                restyle(sheet, row, column, |style| style.border = Border::none())?;
            }
        }
    }

    for row in [1, 2, synthetic::HEADER_ROW] {
        for column in 1..=synthetic::LAST_COLUMN {
            restyle(sheet, row, column, |style| style.font = Font::bold().with_name("Arial"))?;
        }
    }

    if merge_or_warn(sheet, "A3:K3", report) {
        let band = sheet.cell_mut(synthetic::BAND_ROW, 1)?;
        band.value = synthetic::TITLE.into();
        band.style.fill = Fill::solid(BAND_BLUE);
        band.style.font = Font::colored(WHITE);
        band.style.alignment = Alignment::centered();
    }
    debug!(last_colored, "synthetic borders applied");
    Ok(())
}

/// Header merges, total column widths and centered parameter rows.
pub fn merges(context: &mut StageContext, report: &mut StageReport) -> Result<()> {
    let Some(sheet) = bound_sheet(context, SheetRole::Synthetic, report) else {
        return Ok(());
    };
    for reference in synthetic::HEADER_MERGES {
        merge_or_warn(sheet, reference, report);
    }
    for column in [COL_H, COL_I, COL_J] {
        sheet.column_dimension_mut(column).width = Some(synthetic::TOTAL_COLUMN_WIDTH);
    }
    for row in 1..=2 {
        for column in COL_E..=synthetic::LAST_COLUMN {
            restyle(sheet, row, column, |style| style.alignment = Alignment::centered())?;
        }
    }
    Ok(())
}
