use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::Diagnostic;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub fn as_css(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "rule", content = "value", rename_all = "camelCase")]
pub enum LineHeight {
    Auto(f32),    // multiplier of the font size
    Exact(f32),   // px
    AtLeast(f32), // px
}

impl LineHeight {
    /// Value for a CSS `line-height` declaration.
    pub fn css_value(self) -> String {
        match self {
            LineHeight::Auto(ratio) => format!("{ratio:.6}"),
            LineHeight::Exact(px) | LineHeight::AtLeast(px) => format!("{}px", trim_fixed(px)),
        }
    }

    pub fn to_px(self, font_px: f32) -> f32 {
        match self {
            LineHeight::Auto(ratio) => ratio * font_px,
            LineHeight::Exact(px) => px,
            LineHeight::AtLeast(px) => px.max(font_px * 1.2),
        }
    }
}

/// `{:.2}` without trailing zeros: 24.0 prints as `24`, 10.5 as `10.5`.
pub(crate) fn trim_fixed(value: f32) -> String {
    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// First-line and hanging indents are mutually exclusive; Word lets hanging win.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TextIndent {
    FirstLine(f32),
    Hanging(f32),
}

impl TextIndent {
    /// Signed value for CSS `text-indent`.
    pub fn css_px(self) -> f32 {
        match self {
            TextIndent::FirstLine(px) => px,
            TextIndent::Hanging(px) => -px,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Indent {
    pub left_px: Option<f32>,
    pub right_px: Option<f32>,
    pub text: Option<TextIndent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberFormat {
    #[default]
    Decimal,
    LowerLetter,
    UpperLetter,
    LowerRoman,
    UpperRoman,
    Bullet,
}

impl NumberFormat {
    /// Map a `w:numFmt` value. Formats outside the supported set number as decimal.
    pub fn from_ooxml(val: &str) -> Self {
        match val.to_ascii_lowercase().as_str() {
            "lowerletter" => NumberFormat::LowerLetter,
            "upperletter" => NumberFormat::UpperLetter,
            "lowerroman" => NumberFormat::LowerRoman,
            "upperroman" => NumberFormat::UpperRoman,
            "bullet" | "none" => NumberFormat::Bullet,
            _ => NumberFormat::Decimal,
        }
    }

    /// Render `value` in this format, without any trailing punctuation.
    pub fn format(self, value: u32) -> String {
        match self {
            NumberFormat::Decimal => value.to_string(),
            NumberFormat::LowerLetter => to_letters(value),
            NumberFormat::UpperLetter => to_letters(value).to_uppercase(),
            NumberFormat::LowerRoman => to_roman(value),
            NumberFormat::UpperRoman => to_roman(value).to_uppercase(),
            NumberFormat::Bullet => "\u{2022}".to_string(),
        }
    }
}

fn to_letters(value: u32) -> String {
    if value == 0 {
        return "a".to_string();
    }
    let mut n = value - 1;
    let mut result = String::new();
    loop {
        result.insert(0, (b'a' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

fn to_roman(mut n: u32) -> String {
    const TABLE: &[(u32, &str)] = &[
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    if n == 0 {
        return "i".to_string();
    }
    let mut result = String::new();
    for &(value, numeral) in TABLE {
        while n >= value {
            result.push_str(numeral);
            n -= value;
        }
    }
    result
}

/// Numbering bound to one paragraph.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBinding {
    pub num_id: u32,
    pub level: usize,
    pub format: NumberFormat,
    /// `lvlText` with `%N` placeholders (1-based levels).
    pub pattern: String,
    pub start_at: u32,
    /// Formats of every level of the definition, indexed by level. May be empty.
    pub level_formats: Vec<NumberFormat>,
}

impl ListBinding {
    pub fn new(num_id: u32, level: usize, format: NumberFormat, pattern: &str) -> Self {
        Self {
            num_id,
            level,
            format,
            pattern: pattern.to_string(),
            start_at: 1,
            level_formats: Vec::new(),
        }
    }
}

/// Fully materialized formatting of one run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStyle {
    pub font_family: Option<String>,
    pub font_size_px: Option<f32>,
    pub color: Option<String>,
    pub highlight_color: Option<String>,
    pub shading_color: Option<String>,
    pub char_spacing_px: Option<f32>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub superscript: bool,
    pub subscript: bool,
    pub shadow: bool,
}

/// A drawing resolved through the relationship table. Unresolved references keep
/// their frame size but carry no bytes and a zero intrinsic size.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePlaceholder {
    pub rel_id: String,
    pub part_name: Option<String>,
    pub mime_type: Option<&'static str>,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub intrinsic_width_px: u32,
    pub intrinsic_height_px: u32,
    pub frame_width_px: f32,
    pub frame_height_px: f32,
}

impl ImagePlaceholder {
    pub fn is_resolved(&self) -> bool {
        self.part_name.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Run {
    pub text: String,
    pub style: RunStyle,
    pub image: Option<ImagePlaceholder>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphProfile {
    /// Stable source-order position in the paragraph arena.
    pub index: usize,
    pub style_id: Option<String>,
    pub style_name: Option<String>,
    pub text: String,
    pub alignment: Alignment,
    pub before_px: Option<f32>,
    pub after_px: Option<f32>,
    pub line_height: Option<LineHeight>,
    pub indent: Indent,
    pub list: Option<ListBinding>,
    pub keep_next: bool,
    pub keep_lines: bool,
    pub page_break_before: bool,
    pub section_break_before: bool,
    pub in_table: bool,
    pub runs: Vec<Run>,
}

impl ParagraphProfile {
    /// Bare paragraph with the given text in a single unstyled run.
    pub fn with_text(index: usize, text: &str) -> Self {
        let runs = if text.is_empty() {
            Vec::new()
        } else {
            vec![Run {
                text: text.to_string(),
                ..Run::default()
            }]
        };
        Self {
            index,
            text: text.to_string(),
            runs,
            ..Self::default()
        }
    }

    pub fn has_media(&self) -> bool {
        self.runs.iter().any(|r| r.image.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && !self.has_media()
    }

    /// Outline level implied by the paragraph style: `Title` and `heading 1` are 1.
    pub fn heading_level(&self) -> Option<u8> {
        self.style_name
            .as_deref()
            .and_then(heading_level_of)
            .or_else(|| self.style_id.as_deref().and_then(heading_level_of))
    }
}

pub(crate) fn heading_level_of(style: &str) -> Option<u8> {
    let lower = style.to_ascii_lowercase().replace(' ', "");
    if lower == "title" {
        return Some(1);
    }
    let level = lower.strip_prefix("heading")?.parse::<u8>().ok()?;
    (1..=6).contains(&level).then_some(level)
}

/// Page size and margins, in px at 96 dpi.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub width_px: f32,
    pub height_px: f32,
    pub margin_top_px: f32,
    pub margin_bottom_px: f32,
    pub margin_left_px: f32,
    pub margin_right_px: f32,
}

impl Default for PageGeometry {
    /// A4 with Word's default margins (1in top/bottom, 1.25in left/right).
    fn default() -> Self {
        Self {
            width_px: 793.73,
            height_px: 1122.53,
            margin_top_px: 96.0,
            margin_bottom_px: 96.0,
            margin_left_px: 120.0,
            margin_right_px: 120.0,
        }
    }
}

impl PageGeometry {
    pub fn content_width(&self) -> f32 {
        self.width_px - self.margin_left_px - self.margin_right_px
    }

    pub fn content_height(&self) -> f32 {
        self.height_px - self.margin_top_px - self.margin_bottom_px
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellPadding {
    pub top_px: f32,
    pub left_px: f32,
    pub bottom_px: f32,
    pub right_px: f32,
}

impl Default for CellPadding {
    fn default() -> Self {
        Self {
            top_px: 0.0,
            left_px: 7.2,
            bottom_px: 0.0,
            right_px: 7.2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VMerge {
    #[default]
    None,
    Restart,
    Continue,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCell {
    pub blocks: Vec<Block>,
    pub grid_span: u16,
    pub v_merge: VMerge,
    pub width_px: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub style_id: Option<String>,
    pub cell_padding: CellPadding,
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Arena indices of every paragraph inside the table, nested tables included.
    pub fn paragraph_indices(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for row in &self.rows {
            for cell in &row.cells {
                collect_paragraph_indices(&cell.blocks, &mut out);
            }
        }
        out
    }
}

fn collect_paragraph_indices(blocks: &[Block], out: &mut Vec<usize>) {
    for block in blocks {
        match block {
            Block::Paragraph(i) => out.push(*i),
            Block::Table(t) => {
                for row in &t.rows {
                    for cell in &row.cells {
                        collect_paragraph_indices(&cell.blocks, out);
                    }
                }
            }
        }
    }
}

/// Body content in source order. Paragraphs refer into [`DocumentModel::paragraphs`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Block {
    Paragraph(usize),
    Table(Table),
}

/// Formatting of the default paragraph style after resolution against the document
/// defaults.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyDefaults {
    pub font_px: f32,
    pub font_family: Option<String>,
    pub line_height: LineHeight,
    pub after_px: f32,
}

impl Default for BodyDefaults {
    fn default() -> Self {
        Self {
            font_px: 14.6667,
            font_family: None,
            line_height: LineHeight::Auto(1.158333),
            after_px: 10.67,
        }
    }
}

/// Structural model of one parsed file.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentModel {
    pub source_name: String,
    pub paragraphs: Vec<ParagraphProfile>,
    pub blocks: Vec<Block>,
    pub page: PageGeometry,
    pub body: BodyDefaults,
    pub fonts: BTreeSet<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DocumentModel {
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            Block::Paragraph(_) => None,
        })
    }

    pub fn image_count(&self) -> usize {
        self.paragraphs
            .iter()
            .flat_map(|p| p.runs.iter())
            .filter(|r| r.image.is_some())
            .count()
    }
}
