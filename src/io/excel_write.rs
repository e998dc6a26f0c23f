use std::path::Path;

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook as XlsxWorkbook, Worksheet};
use tracing::debug;

use crate::color::canonical_hex;
use crate::error::Result;
use crate::model::style::GENERAL_FORMAT;
use crate::model::{
    BorderLine, CellStyle, CellValue, HorizontalAlign, Sheet, VerticalAlign, Workbook,
};

/// Writes every sheet of the workbook, in order, to `path`. Missing parent
/// directories are created.
pub fn write_workbook(path: &Path, workbook: &Workbook) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut workbook_writer = XlsxWorkbook::new();
    for sheet in workbook.sheets() {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(&sheet.title)?;
        write_sheet(worksheet, sheet)?;
    }

    workbook_writer.save(path)?;
    debug!(path = %path.display(), sheets = workbook.sheets().len(), "workbook saved");
    Ok(())
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet) -> Result<()> {
    for (&row, dimension) in sheet.row_dimensions() {
        if let Some(height) = dimension.height {
            worksheet.set_row_height(row - 1, height)?;
        }
        if dimension.hidden {
            worksheet.set_row_hidden(row - 1)?;
        }
    }
    for (&column, dimension) in sheet.column_dimensions() {
        let column = (column - 1) as u16;
        if let Some(width) = dimension.width {
            worksheet.set_column_width(column, width)?;
        }
        if dimension.hidden {
            worksheet.set_column_hidden(column)?;
        }
    }

    // Merges go first: `merge_range` blanks the covered cells, the anchor is
    // rewritten below with its real value.
    for range in sheet.merged_ranges() {
        if range.is_single_cell() {
            continue;
        }
        let anchor = sheet
            .cell(range.start.row, range.start.column)
            .map(|cell| to_format(&cell.style))
            .unwrap_or_default();
        worksheet.merge_range(
            range.start.row - 1,
            (range.start.column - 1) as u16,
            range.end.row - 1,
            (range.end.column - 1) as u16,
            "",
            &anchor,
        )?;
    }

    for (position, cell) in sheet.cells() {
        let row = position.row - 1;
        let column = (position.column - 1) as u16;
        let format = to_format(&cell.style);
        match &cell.value {
            CellValue::Empty => {
                worksheet.write_blank(row, column, &format)?;
            }
            CellValue::Text(text) => {
                worksheet.write_string_with_format(row, column, text, &format)?;
            }
            CellValue::Number(number) => {
                worksheet.write_number_with_format(row, column, *number, &format)?;
            }
            CellValue::Bool(flag) => {
                worksheet.write_boolean_with_format(row, column, *flag, &format)?;
            }
            CellValue::Formula(formula) => {
                worksheet.write_formula_with_format(row, column, formula.as_str(), &format)?;
            }
        }
    }
    Ok(())
}

fn rgb(raw: &str) -> Option<Color> {
    let hex = canonical_hex(raw)?;
    u32::from_str_radix(&hex, 16).ok().map(Color::RGB)
}

fn border(line: BorderLine) -> FormatBorder {
    match line {
        BorderLine::None => FormatBorder::None,
        BorderLine::Thin => FormatBorder::Thin,
        BorderLine::Medium => FormatBorder::Medium,
        BorderLine::Thick => FormatBorder::Thick,
        BorderLine::Dashed => FormatBorder::Dashed,
        BorderLine::Dotted => FormatBorder::Dotted,
        BorderLine::Double => FormatBorder::Double,
        BorderLine::Hair => FormatBorder::Hair,
    }
}

fn horizontal(align: HorizontalAlign) -> FormatAlign {
    match align {
        HorizontalAlign::General => FormatAlign::General,
        HorizontalAlign::Left => FormatAlign::Left,
        HorizontalAlign::Center => FormatAlign::Center,
        HorizontalAlign::Right => FormatAlign::Right,
        HorizontalAlign::Fill => FormatAlign::Fill,
        HorizontalAlign::Justify => FormatAlign::Justify,
        HorizontalAlign::CenterContinuous => FormatAlign::CenterAcross,
        HorizontalAlign::Distributed => FormatAlign::Distributed,
    }
}

fn vertical(align: VerticalAlign) -> FormatAlign {
    match align {
        VerticalAlign::Top => FormatAlign::Top,
        VerticalAlign::Center => FormatAlign::VerticalCenter,
        VerticalAlign::Bottom => FormatAlign::Bottom,
        VerticalAlign::Justify => FormatAlign::VerticalJustify,
        VerticalAlign::Distributed => FormatAlign::VerticalDistributed,
    }
}

/// Translates a cell style into an xlsx format.
fn to_format(style: &CellStyle) -> Format {
    let mut format = Format::new();

    let font = &style.font;
    if let Some(name) = &font.name {
        format = format.set_font_name(name.as_str());
    }
    if let Some(size) = font.size {
        format = format.set_font_size(size);
    }
    if font.bold {
        format = format.set_bold();
    }
    if font.italic {
        format = format.set_italic();
    }
    if let Some(color) = font.color.as_deref().and_then(rgb) {
        format = format.set_font_color(color);
    }

    if style.fill.solid {
        if let Some(color) = style.fill.fg_color.as_deref().and_then(rgb) {
            format = format.set_background_color(color);
        }
    }

    let edges = style.border;
    if edges.left != BorderLine::None {
        format = format.set_border_left(border(edges.left));
    }
    if edges.right != BorderLine::None {
        format = format.set_border_right(border(edges.right));
    }
    if edges.top != BorderLine::None {
        format = format.set_border_top(border(edges.top));
    }
    if edges.bottom != BorderLine::None {
        format = format.set_border_bottom(border(edges.bottom));
    }

    if style.number_format != GENERAL_FORMAT {
        format = format.set_num_format(style.number_format.as_str());
    }

    let alignment = style.alignment;
    if let Some(align) = alignment.horizontal {
        format = format.set_align(horizontal(align));
    }
    if let Some(align) = alignment.vertical {
        format = format.set_align(vertical(align));
    }
    if alignment.wrap_text {
        format = format.set_text_wrap();
    }
    if alignment.indent > 0 {
        format = format.set_indent(alignment.indent);
    }
    if alignment.text_rotation != 0 {
        format = format.set_rotation(alignment.text_rotation);
    }

    if !style.protection.locked {
        format = format.set_unlocked();
    }
    if style.protection.hidden {
        format = format.set_hidden();
    }
    format
}
