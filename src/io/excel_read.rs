use std::path::Path;

use calamine::{CellType, DataType, Range, Reader, Xlsx, open_workbook};
use tracing::debug;

use crate::error::{Result, UnifyError};
use crate::io::package::{FirstSheetPackage, read_first_sheet_package};
use crate::model::{Cell, CellValue, Sheet};

/// Reads the first worksheet of a workbook with its values, formulas,
/// styles, merged ranges and row/column dimensions.
///
/// The returned sheet keeps the source title; callers rename it when it is
/// added to the consolidated workbook.
pub fn read_first_sheet(path: &Path) -> Result<Sheet> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let title = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| UnifyError::EmptyWorkbook(path.to_path_buf()))?;

    let values = read_required_sheet(&mut workbook, &title)?;
    let formulas = match workbook.worksheet_formula(&title) {
        Some(result) => Some(result?),
        None => None,
    };
    let package = read_first_sheet_package(path)?;

    let sheet = assemble(&title, &values, formulas.as_ref(), package)?;
    debug!(
        path = %path.display(),
        sheet = %sheet.title,
        rows = sheet.max_row(),
        columns = sheet.max_column(),
        merged = sheet.merged_ranges().len(),
        "worksheet loaded"
    );
    Ok(sheet)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| UnifyError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(UnifyError::from)?;
    Ok(range)
}

/// Absolute 1-based coordinates of every used cell of a range.
fn absolute_cells<T: CellType>(
    range: &Range<T>,
) -> impl Iterator<Item = (u32, u32, &T)> {
    let (first_row, first_column) = range.start().unwrap_or((0, 0));
    range.used_cells().map(move |(row, column, value)| {
        (
            first_row + row as u32 + 1,
            first_column + column as u32 + 1,
            value,
        )
    })
}

fn assemble(
    title: &str,
    values: &Range<DataType>,
    formulas: Option<&Range<String>>,
    package: FirstSheetPackage,
) -> Result<Sheet> {
    let FirstSheetPackage { stylesheet, layout } = package;
    let mut sheet = Sheet::new(title);

    let style_for = |row: u32, column: u32| {
        layout
            .style_indices
            .get(&(row, column))
            .map(|index| stylesheet.style(*index))
            .unwrap_or_default()
    };

    for (row, column, value) in absolute_cells(values) {
        let cell = Cell {
            value: cell_value(value),
            style: style_for(row, column),
        };
        sheet.insert_cell(row, column, cell)?;
    }

    if let Some(formulas) = formulas {
        for (row, column, formula) in absolute_cells(formulas) {
            if formula.is_empty() {
                continue;
            }
            let text = if formula.starts_with('=') {
                formula.clone()
            } else {
                format!("={formula}")
            };
            sheet.cell_mut(row, column)?.value = CellValue::Formula(text);
        }
    }

    for (&(row, column), index) in &layout.style_indices {
        if sheet.cell(row, column).is_none() {
            let cell = Cell {
                value: CellValue::Empty,
                style: stylesheet.style(*index),
            };
            sheet.insert_cell(row, column, cell)?;
        } else if let Ok(cell) = sheet.cell_mut(row, column) {
            if !cell.has_style() {
                cell.style = stylesheet.style(*index);
            }
        }
    }

    for range in layout.merged {
        sheet.push_merged(range);
    }
    for (row, dimension) in layout.rows {
        *sheet.row_dimension_mut(row) = dimension;
    }
    for (column, dimension) in layout.columns {
        *sheet.column_dimension_mut(column) = dimension;
    }
    Ok(sheet)
}

/// Converts a raw cell into the pipeline's value type. Dates stay as their
/// serial number; error cells keep their display text.
fn cell_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::DateTime(value) => CellValue::Number(*value),
        DataType::Empty => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}
