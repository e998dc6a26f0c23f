//! Fill-color extraction and the fixed palette that tags row roles.

use serde::Serialize;

use crate::model::{Cell, Sheet};

/// Semantic role of a cell, derived from its solid fill color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ColorClass {
    /// `DFF0D8`: a priced composition, or a composition line in the budget.
    PrimaryComposition,
    /// `D6D6D6`: an auxiliary composition reused inside other compositions.
    AuxiliaryComposition,
    /// `EFEFEF`: a secondary auxiliary line (input lines inside compositions).
    SecondaryAuxiliary,
    /// `F7F3DF`: an input item priced from the ABC curve.
    InputItem,
    /// `D8ECF6`: an outline parent in the synthetic budget.
    HierarchyParent,
    /// `0000FF` / `00FF`: a title band.
    HeaderBand,
    None,
}

impl ColorClass {
    /// Item lines of the ABC curve that carry unit prices.
    pub fn is_abc_item(self) -> bool {
        matches!(
            self,
            ColorClass::AuxiliaryComposition | ColorClass::SecondaryAuxiliary | ColorClass::InputItem
        )
    }

    /// Composition lines whose cost column is a truncated product.
    pub fn is_costed_composition_line(self) -> bool {
        matches!(
            self,
            ColorClass::PrimaryComposition
                | ColorClass::AuxiliaryComposition
                | ColorClass::SecondaryAuxiliary
        )
    }

    /// Budget lines that are priced directly (compositions and inputs).
    pub fn is_priced_budget_line(self) -> bool {
        matches!(self, ColorClass::PrimaryComposition | ColorClass::InputItem)
    }

    /// Budget lines that take part in the weight column.
    pub fn is_weighted_budget_line(self) -> bool {
        matches!(
            self,
            ColorClass::PrimaryComposition | ColorClass::HierarchyParent | ColorClass::InputItem
        )
    }
}

/// Canonical 6-hex fill color of a cell, if it has a solid fill.
///
/// Eight-character values carry a leading alpha byte which is dropped.
pub fn color_of(cell: &Cell) -> Option<String> {
    if !cell.style.fill.solid {
        return None;
    }
    canonical_hex(cell.style.fill.fg_color.as_deref()?)
}

/// Normalises a raw ARGB/RGB string into upper-case 6-hex form.
pub fn canonical_hex(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if !raw.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    match raw.len() {
        8 => Some(raw[2..].to_ascii_uppercase()),
        6 => Some(raw.to_ascii_uppercase()),
        _ => None,
    }
}

pub fn classify(hex: Option<&str>) -> ColorClass {
    match hex.map(str::to_ascii_uppercase).as_deref() {
        Some("DFF0D8") => ColorClass::PrimaryComposition,
        Some("D6D6D6") => ColorClass::AuxiliaryComposition,
        Some("EFEFEF") => ColorClass::SecondaryAuxiliary,
        Some("F7F3DF") => ColorClass::InputItem,
        Some("D8ECF6") => ColorClass::HierarchyParent,
        Some("0000FF") | Some("00FF") => ColorClass::HeaderBand,
        _ => ColorClass::None,
    }
}

/// Class of the cell at `(row, column)`; absent cells are [`ColorClass::None`].
pub fn class_at(sheet: &Sheet, row: u32, column: u32) -> ColorClass {
    sheet
        .cell(row, column)
        .map(|cell| classify(color_of(cell).as_deref()))
        .unwrap_or(ColorClass::None)
}

/// Raw 6-hex color of the cell at `(row, column)`.
pub fn hex_at(sheet: &Sheet, row: u32, column: u32) -> Option<String> {
    sheet.cell(row, column).and_then(color_of)
}
