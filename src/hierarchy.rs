//! Outline aggregation over dotted hierarchy codes.

use crate::color::{ColorClass, class_at};
use crate::model::Sheet;
use crate::text::hierarchy_level;

/// One row of the outline as seen by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineRow {
    pub row: u32,
    /// Depth of the code, `-1` when the row carries no code.
    pub level: i32,
    pub parent: bool,
}

/// Reads the outline of `column` from `first_row` through the last row.
/// Parent rows carry the hierarchy-parent fill on that same column.
pub fn outline(sheet: &Sheet, column: u32, first_row: u32) -> Vec<OutlineRow> {
    (first_row..=sheet.max_row())
        .map(|row| OutlineRow {
            row,
            level: hierarchy_level(sheet.value(row, column)),
            parent: class_at(sheet, row, column) == ColorClass::HierarchyParent,
        })
        .collect()
}

/// Direct children of the row at `index`: rows exactly one level deeper,
/// up to the first coded row at the same level or above.
pub fn child_rows(rows: &[OutlineRow], index: usize) -> Vec<u32> {
    let Some(parent) = rows.get(index) else {
        return Vec::new();
    };
    if parent.level < 0 {
        return Vec::new();
    }

    let mut children = Vec::new();
    for candidate in &rows[index + 1..] {
        if candidate.level != -1 && candidate.level <= parent.level {
            break;
        }
        if candidate.level == parent.level + 1 {
            children.push(candidate.row);
        }
    }
    children
}

/// Every parent row that has at least one direct child, with its children.
pub fn parent_groups(rows: &[OutlineRow]) -> Vec<(u32, Vec<u32>)> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| row.parent && row.level >= 0)
        .filter_map(|(index, row)| {
            let children = child_rows(rows, index);
            (!children.is_empty()).then_some((row.row, children))
        })
        .collect()
}

/// Top-level rows, optionally restricted to parent rows.
pub fn level_one_rows(rows: &[OutlineRow], parents_only: bool) -> Vec<u32> {
    rows.iter()
        .filter(|row| row.level == 1 && (!parents_only || row.parent))
        .map(|row| row.row)
        .collect()
}
