//! Minimal OOXML package reader for the parts the value reader ignores:
//! the stylesheet and the worksheet layout (cell style indices, merged
//! ranges, row heights and column widths).

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::Reader as XmlReader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{Result, UnifyError};
use crate::model::address::MAX_COLUMN;
use crate::model::style::GENERAL_FORMAT;
use crate::model::{
    Alignment, Border, BorderLine, CellRange, CellRef, CellStyle, ColumnDimension, Fill, Font,
    HorizontalAlign, Protection, RowDimension, VerticalAlign,
};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";

/// Layout of a worksheet part: style index per cell plus merges and
/// dimensions.
#[derive(Debug, Default)]
pub struct SheetLayout {
    pub style_indices: BTreeMap<(u32, u32), usize>,
    pub merged: Vec<CellRange>,
    pub rows: BTreeMap<u32, RowDimension>,
    pub columns: BTreeMap<u32, ColumnDimension>,
}

/// Resolved `cellXfs` table; index `s` of a `<c>` element maps into it.
#[derive(Debug, Default)]
pub struct Stylesheet {
    styles: Vec<CellStyle>,
}

impl Stylesheet {
    /// Style for a cell style index; out-of-range indices fall back to the
    /// default style.
    pub fn style(&self, index: usize) -> CellStyle {
        self.styles.get(index).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// Styles and layout of the first worksheet of a package.
#[derive(Debug, Default)]
pub struct FirstSheetPackage {
    pub stylesheet: Stylesheet,
    pub layout: SheetLayout,
}

/// Opens the package and reads the stylesheet plus the layout of the first
/// worksheet in workbook order.
pub fn read_first_sheet_package(path: &Path) -> Result<FirstSheetPackage> {
    let mut archive = ZipArchive::new(File::open(path)?)?;

    let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?
        .ok_or_else(|| UnifyError::InvalidWorkbook(format!("missing {WORKBOOK_PART}")))?;
    let relationship = first_sheet_relationship(&workbook_xml)?
        .ok_or_else(|| UnifyError::EmptyWorkbook(path.to_path_buf()))?;
    let rels_xml = read_part(&mut archive, WORKBOOK_RELS_PART)?
        .ok_or_else(|| UnifyError::InvalidWorkbook(format!("missing {WORKBOOK_RELS_PART}")))?;
    let target = relationship_target(&rels_xml, &relationship)?.ok_or_else(|| {
        UnifyError::InvalidWorkbook(format!("relationship '{relationship}' not found"))
    })?;

    let sheet_xml = read_part(&mut archive, &part_name(&target))?
        .ok_or_else(|| UnifyError::InvalidWorkbook(format!("missing worksheet part {target}")))?;
    let layout = parse_sheet_layout(&sheet_xml)?;

    let stylesheet = match read_part(&mut archive, STYLES_PART)? {
        Some(xml) => parse_stylesheet(&xml)?,
        None => Stylesheet::default(),
    };

    Ok(FirstSheetPackage { stylesheet, layout })
}

fn read_part(archive: &mut ZipArchive<File>, name: &str) -> Result<Option<String>> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

/// Relationship targets are relative to `xl/` unless absolute.
fn part_name(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

fn attribute(element: &BytesStart<'_>, key: &str) -> Option<String> {
    element
        .try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|value| value.into_owned()))
}

/// Attribute matched on its local name, ignoring the namespace prefix.
fn local_attribute(element: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == local)
        .and_then(|attr| attr.unescape_value().ok().map(|value| value.into_owned()))
}

fn flag(element: &BytesStart<'_>, key: &str) -> Option<bool> {
    attribute(element, key).map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
}

fn number<T: std::str::FromStr>(element: &BytesStart<'_>, key: &str) -> Option<T> {
    attribute(element, key).and_then(|value| value.trim().parse().ok())
}

fn first_sheet_relationship(xml: &str) -> Result<Option<String>> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                return Ok(local_attribute(&e, b"id"));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn relationship_target(xml: &str, id: &str) -> Result<Option<String>> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e)
                if e.local_name().as_ref() == b"Relationship"
                    && attribute(&e, "Id").as_deref() == Some(id) =>
            {
                return Ok(attribute(&e, "Target"));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

/// Parses `<c s>`, `<row>`, `<col>` and `<mergeCell>` elements of a
/// worksheet part.
pub fn parse_sheet_layout(xml: &str) -> Result<SheetLayout> {
    let mut layout = SheetLayout::default();
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"c" => {
                    let index = number::<usize>(&e, "s").unwrap_or(0);
                    let reference = attribute(&e, "r").and_then(|r| r.parse::<CellRef>().ok());
                    if let (Some(cell), true) = (reference, index > 0) {
                        layout.style_indices.insert((cell.row, cell.column), index);
                    }
                }
                b"row" => {
                    let height = number::<f64>(&e, "ht");
                    let hidden = flag(&e, "hidden").unwrap_or(false);
                    if let (Some(row), true) = (number::<u32>(&e, "r"), height.is_some() || hidden) {
                        layout.rows.insert(row, RowDimension { height, hidden });
                    }
                }
                b"col" => {
                    let width = number::<f64>(&e, "width");
                    let hidden = flag(&e, "hidden").unwrap_or(false);
                    let bounds = number::<u32>(&e, "min").zip(number::<u32>(&e, "max"));
                    if let (Some((min, max)), true) = (bounds, width.is_some() || hidden) {
                        for column in min..=max.min(MAX_COLUMN) {
                            layout.columns.insert(column, ColumnDimension { width, hidden });
                        }
                    }
                }
                b"mergeCell" => {
                    if let Some(range) = attribute(&e, "ref").and_then(|r| r.parse().ok()) {
                        layout.merged.push(range);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(layout)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    NumFmts,
    Fonts,
    Fills,
    Borders,
    CellXfs,
    Skipped,
}

#[derive(Debug, Default)]
struct XfRecord {
    num_fmt_id: u32,
    font_id: usize,
    fill_id: usize,
    border_id: usize,
    alignment: Alignment,
    protection: Protection,
}

#[derive(Debug, Default)]
struct RawStyles {
    num_fmts: HashMap<u32, String>,
    fonts: Vec<Font>,
    fills: Vec<Fill>,
    borders: Vec<Border>,
    xfs: Vec<XfRecord>,
}

/// Format code of the built-in number formats the templates rely on.
fn builtin_format(id: u32) -> Option<&'static str> {
    Some(match id {
        0 => GENERAL_FORMAT,
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        14 => "mm-dd-yy",
        20 => "h:mm",
        22 => "m/d/yy h:mm",
        49 => "@",
        _ => return None,
    })
}

/// Parses `xl/styles.xml` into one resolved [`CellStyle`] per `cellXfs`
/// entry.
pub fn parse_stylesheet(xml: &str) -> Result<Stylesheet> {
    let mut raw = RawStyles::default();
    let mut section = Section::Outside;
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"numFmts" => section = Section::NumFmts,
                    b"fonts" => section = Section::Fonts,
                    b"fills" => section = Section::Fills,
                    b"borders" => section = Section::Borders,
                    b"cellXfs" => section = Section::CellXfs,
                    b"cellStyleXfs" | b"dxfs" | b"cellStyles" | b"colors" | b"extLst" => {
                        section = Section::Skipped
                    }
                    other => style_element(&mut raw, section, other, &e),
                }
            }
            Event::Empty(e) => {
                let name = e.local_name();
                style_element(&mut raw, section, name.as_ref(), &e);
            }
            Event::End(e) => {
                if matches!(
                    e.local_name().as_ref(),
                    b"numFmts"
                        | b"fonts"
                        | b"fills"
                        | b"borders"
                        | b"cellXfs"
                        | b"cellStyleXfs"
                        | b"dxfs"
                        | b"cellStyles"
                        | b"colors"
                        | b"extLst"
                ) {
                    section = Section::Outside;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(resolve(raw))
}

fn style_element(raw: &mut RawStyles, section: Section, name: &[u8], e: &BytesStart<'_>) {
    match (section, name) {
        (Section::NumFmts, b"numFmt") => {
            if let (Some(id), Some(code)) = (number::<u32>(e, "numFmtId"), attribute(e, "formatCode")) {
                raw.num_fmts.insert(id, code);
            }
        }
        (Section::Fonts, b"font") => raw.fonts.push(Font::default()),
        (Section::Fonts, child) => {
            let Some(font) = raw.fonts.last_mut() else {
                return;
            };
            match child {
                b"b" => font.bold = flag(e, "val").unwrap_or(true),
                b"i" => font.italic = flag(e, "val").unwrap_or(true),
                b"sz" => font.size = number(e, "val"),
                b"name" => font.name = attribute(e, "val"),
                b"color" => font.color = attribute(e, "rgb"),
                _ => {}
            }
        }
        (Section::Fills, b"fill") => raw.fills.push(Fill::default()),
        (Section::Fills, child) => {
            let Some(fill) = raw.fills.last_mut() else {
                return;
            };
            match child {
                b"patternFill" => fill.solid = attribute(e, "patternType").as_deref() == Some("solid"),
                b"fgColor" => fill.fg_color = attribute(e, "rgb"),
                _ => {}
            }
        }
        (Section::Borders, b"border") => raw.borders.push(Border::default()),
        (Section::Borders, side) => {
            let Some(border) = raw.borders.last_mut() else {
                return;
            };
            let line = attribute(e, "style")
                .map(|style| BorderLine::from_ooxml(&style))
                .unwrap_or_default();
            match side {
                b"left" | b"start" => border.left = line,
                b"right" | b"end" => border.right = line,
                b"top" => border.top = line,
                b"bottom" => border.bottom = line,
                _ => {}
            }
        }
        (Section::CellXfs, b"xf") => raw.xfs.push(XfRecord {
            num_fmt_id: number(e, "numFmtId").unwrap_or(0),
            font_id: number(e, "fontId").unwrap_or(0),
            fill_id: number(e, "fillId").unwrap_or(0),
            border_id: number(e, "borderId").unwrap_or(0),
            ..XfRecord::default()
        }),
        (Section::CellXfs, child) => {
            let Some(xf) = raw.xfs.last_mut() else {
                return;
            };
            match child {
                b"alignment" => {
                    xf.alignment = Alignment {
                        horizontal: attribute(e, "horizontal")
                            .and_then(|value| HorizontalAlign::from_ooxml(&value)),
                        vertical: attribute(e, "vertical")
                            .and_then(|value| VerticalAlign::from_ooxml(&value)),
                        wrap_text: flag(e, "wrapText").unwrap_or(false),
                        indent: number(e, "indent").unwrap_or(0),
                        text_rotation: number(e, "textRotation").unwrap_or(0),
                    }
                }
                b"protection" => {
                    xf.protection = Protection {
                        locked: flag(e, "locked").unwrap_or(true),
                        hidden: flag(e, "hidden").unwrap_or(false),
                    }
                }
                _ => {}
            }
        }
        _ => {}
    }
}

fn resolve(raw: RawStyles) -> Stylesheet {
    let styles = raw
        .xfs
        .iter()
        .map(|xf| CellStyle {
            font: raw.fonts.get(xf.font_id).cloned().unwrap_or_default(),
            fill: raw.fills.get(xf.fill_id).cloned().unwrap_or_default(),
            border: raw.borders.get(xf.border_id).copied().unwrap_or_default(),
            number_format: raw
                .num_fmts
                .get(&xf.num_fmt_id)
                .cloned()
                .or_else(|| builtin_format(xf.num_fmt_id).map(str::to_string))
                .unwrap_or_else(|| GENERAL_FORMAT.to_string()),
            alignment: xf.alignment,
            protection: xf.protection,
        })
        .collect();
    Stylesheet { styles }
}
