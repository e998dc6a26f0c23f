/// Number format code used when a cell carries no explicit format.
pub const GENERAL_FORMAT: &str = "General";

/// Font attributes carried by a cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Font {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    /// Raw color as stored in the package (`FFRRGGBB` or `RRGGBB`).
    pub color: Option<String>,
}

impl Font {
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    pub fn colored(color: &str) -> Self {
        Self {
            color: Some(color.to_string()),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }
}

/// Background fill. Only solid pattern fills carry a meaningful color for
/// this workbook family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fill {
    pub solid: bool,
    /// Raw foreground color as stored in the package (`FFRRGGBB` or `RRGGBB`).
    pub fg_color: Option<String>,
}

impl Fill {
    pub fn solid(color: &str) -> Self {
        Self {
            solid: true,
            fg_color: Some(color.to_string()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BorderLine {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
}

impl BorderLine {
    pub fn from_ooxml(style: &str) -> Self {
        match style {
            "thin" => BorderLine::Thin,
            "medium" | "mediumDashed" | "mediumDashDot" | "mediumDashDotDot" => BorderLine::Medium,
            "thick" => BorderLine::Thick,
            "dashed" | "dashDot" | "dashDotDot" | "slantDashDot" => BorderLine::Dashed,
            "dotted" => BorderLine::Dotted,
            "double" => BorderLine::Double,
            "hair" => BorderLine::Hair,
            _ => BorderLine::None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Border {
    pub left: BorderLine,
    pub right: BorderLine,
    pub top: BorderLine,
    pub bottom: BorderLine,
}

impl Border {
    pub fn all(line: BorderLine) -> Self {
        Self {
            left: line,
            right: line,
            top: line,
            bottom: line,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAlign {
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterContinuous,
    Distributed,
}

impl HorizontalAlign {
    pub fn from_ooxml(value: &str) -> Option<Self> {
        Some(match value {
            "general" => HorizontalAlign::General,
            "left" => HorizontalAlign::Left,
            "center" => HorizontalAlign::Center,
            "right" => HorizontalAlign::Right,
            "fill" => HorizontalAlign::Fill,
            "justify" => HorizontalAlign::Justify,
            "centerContinuous" => HorizontalAlign::CenterContinuous,
            "distributed" => HorizontalAlign::Distributed,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    Center,
    Bottom,
    Justify,
    Distributed,
}

impl VerticalAlign {
    pub fn from_ooxml(value: &str) -> Option<Self> {
        Some(match value {
            "top" => VerticalAlign::Top,
            "center" => VerticalAlign::Center,
            "bottom" => VerticalAlign::Bottom,
            "justify" => VerticalAlign::Justify,
            "distributed" => VerticalAlign::Distributed,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alignment {
    pub horizontal: Option<HorizontalAlign>,
    pub vertical: Option<VerticalAlign>,
    pub wrap_text: bool,
    pub indent: u8,
    pub text_rotation: i16,
}

impl Alignment {
    /// Horizontally and vertically centered.
    pub fn centered() -> Self {
        Self {
            horizontal: Some(HorizontalAlign::Center),
            vertical: Some(VerticalAlign::Center),
            ..Self::default()
        }
    }

    /// Centered with text wrapping enabled.
    pub fn centered_wrapped() -> Self {
        Self {
            wrap_text: true,
            ..Self::centered()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protection {
    pub locked: bool,
    pub hidden: bool,
}

impl Default for Protection {
    fn default() -> Self {
        Self {
            locked: true,
            hidden: false,
        }
    }
}

/// Complete visual style of a cell. Cloning yields an independent deep copy.
#[derive(Debug, Clone, PartialEq)]
pub struct CellStyle {
    pub font: Font,
    pub fill: Fill,
    pub border: Border,
    pub number_format: String,
    pub alignment: Alignment,
    pub protection: Protection,
}

impl Default for CellStyle {
    fn default() -> Self {
        Self {
            font: Font::default(),
            fill: Fill::default(),
            border: Border::default(),
            number_format: GENERAL_FORMAT.to_string(),
            alignment: Alignment::default(),
            protection: Protection::default(),
        }
    }
}

impl CellStyle {
    pub fn is_default(&self) -> bool {
        *self == CellStyle::default()
    }
}
