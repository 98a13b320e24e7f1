//! Style baseline derived from a parsed document.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::{
    Alignment, Block, CellPadding, DocumentModel, LineHeight, PageGeometry, ParagraphProfile, Table,
};

pub const DEFAULT_TITLE_FONT_PX: f32 = 32.0;
pub const DEFAULT_TITLE_COLOR: &str = "#0F4761";
pub const DEFAULT_TITLE_FAMILY: &str = "DengXian, sans-serif";
pub const DEFAULT_BODY_FAMILY: &str = "Times New Roman, serif";

/// Right-aligned closing block (date or signature) at the end of the document.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailingSignature {
    pub text: String,
    pub aligned_right: bool,
    /// Position in [`WordStyleProfile::paragraphs`].
    pub paragraph_index: usize,
    /// Empty paragraphs directly before it in the source.
    pub empty_paragraphs_before: usize,
}

impl TrailingSignature {
    /// Right-aligned and set off from the body by at least one empty paragraph.
    pub fn is_block(&self) -> bool {
        self.aligned_right && self.empty_paragraphs_before > 0
    }
}

/// Structural counts of the source, for diffing against a rendered tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureCounts {
    pub paragraphs: usize,
    pub non_empty_paragraphs: usize,
    pub headings: usize,
    pub list_paragraphs: usize,
    pub tables: usize,
    pub images: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordStyleProfile {
    pub source_name: String,
    pub title_font_px: f32,
    pub title_color: String,
    pub title_align: Alignment,
    pub title_font_family: String,
    pub body_font_px: f32,
    pub body_font_family: String,
    pub body_line_height: LineHeight,
    pub paragraph_after_px: f32,
    pub content_width_px: f32,
    pub page: PageGeometry,
    pub table_cell_padding: CellPadding,
    pub fonts: BTreeSet<String>,
    pub signature: Option<TrailingSignature>,
    pub paragraphs: Vec<ParagraphProfile>,
    pub structure: StructureCounts,
}

impl Default for WordStyleProfile {
    fn default() -> Self {
        let page = PageGeometry::default();
        Self {
            source_name: String::new(),
            title_font_px: DEFAULT_TITLE_FONT_PX,
            title_color: DEFAULT_TITLE_COLOR.to_string(),
            title_align: Alignment::Center,
            title_font_family: DEFAULT_TITLE_FAMILY.to_string(),
            body_font_px: 14.6667,
            body_font_family: DEFAULT_BODY_FAMILY.to_string(),
            body_line_height: LineHeight::Auto(1.158333),
            paragraph_after_px: 10.67,
            content_width_px: page.content_width(),
            page,
            table_cell_padding: CellPadding::default(),
            fonts: BTreeSet::new(),
            signature: None,
            paragraphs: Vec::new(),
            structure: StructureCounts::default(),
        }
    }
}

impl WordStyleProfile {
    /// Body line height in px at the body font size.
    pub fn body_line_px(&self) -> f32 {
        self.body_line_height.to_px(self.body_font_px)
    }

    /// Profile with the given paragraphs and default typography. Handy for driving
    /// the applier from records that did not come out of a package.
    pub fn with_paragraphs(paragraphs: Vec<ParagraphProfile>) -> Self {
        Self {
            paragraphs,
            ..Self::default()
        }
    }
}

/// Reduce a model to its baseline. Pure; the model is not retained.
pub fn extract(model: &DocumentModel) -> WordStyleProfile {
    let body_paragraphs: Vec<&ParagraphProfile> = model
        .paragraphs
        .iter()
        .filter(|p| !p.in_table && !p.is_empty() && p.heading_level().is_none())
        .collect();

    let body_font_px = most_common(body_paragraphs.iter().filter_map(|p| first_font_size(p)))
        .unwrap_or(model.body.font_px);
    let body_line_height =
        most_common(body_paragraphs.iter().filter_map(|p| p.line_height)).unwrap_or(model.body.line_height);
    let paragraph_after_px =
        most_common(body_paragraphs.iter().filter_map(|p| p.after_px)).unwrap_or(model.body.after_px);
    let body_font_family = most_common(
        body_paragraphs
            .iter()
            .flat_map(|p| p.runs.iter())
            .filter(|r| !r.text.trim().is_empty())
            .filter_map(|r| r.style.font_family.clone()),
    )
    .or_else(|| model.body.font_family.clone())
    .unwrap_or_else(|| DEFAULT_BODY_FAMILY.to_string());

    let mut profile = WordStyleProfile {
        source_name: model.source_name.clone(),
        body_font_px,
        body_font_family,
        body_line_height,
        paragraph_after_px,
        content_width_px: model.page.content_width(),
        page: model.page,
        table_cell_padding: model
            .tables()
            .next()
            .map(|t| t.cell_padding)
            .unwrap_or_default(),
        fonts: model.fonts.clone(),
        signature: trailing_signature(&model.paragraphs),
        paragraphs: model.paragraphs.clone(),
        structure: structure_counts(model),
        ..WordStyleProfile::default()
    };

    if let Some(title) = model.paragraphs.iter().find(|p| p.heading_level().is_some()) {
        let lead = title.runs.iter().find(|r| !r.text.trim().is_empty());
        profile.title_font_px = lead
            .and_then(|r| r.style.font_size_px)
            .unwrap_or(DEFAULT_TITLE_FONT_PX);
        profile.title_color = lead
            .and_then(|r| r.style.color.clone())
            .unwrap_or_else(|| DEFAULT_TITLE_COLOR.to_string());
        profile.title_font_family = lead
            .and_then(|r| r.style.font_family.clone())
            .unwrap_or_else(|| DEFAULT_TITLE_FAMILY.to_string());
        profile.title_align = title.alignment;
    }

    log::debug!(
        "Profile for '{}': body {:.2}px, title {:.2}px, column {:.2}px, signature {}",
        profile.source_name,
        profile.body_font_px,
        profile.title_font_px,
        profile.content_width_px,
        profile.signature.is_some()
    );
    profile
}

fn first_font_size(p: &ParagraphProfile) -> Option<f32> {
    p.runs
        .iter()
        .find(|r| !r.text.trim().is_empty())
        .and_then(|r| r.style.font_size_px)
}

/// Most frequent value; ties go to the value seen first.
fn most_common<T: PartialEq>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut tally: Vec<(T, usize)> = Vec::new();
    for value in values {
        match tally.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => tally.push((value, 1)),
        }
    }
    let best = tally.iter().map(|(_, n)| *n).max()?;
    tally.into_iter().find(|(_, n)| *n == best).map(|(v, _)| v)
}

fn trailing_signature(paragraphs: &[ParagraphProfile]) -> Option<TrailingSignature> {
    let body: Vec<&ParagraphProfile> = paragraphs.iter().filter(|p| !p.in_table).collect();
    let pos = body.iter().rposition(|p| !p.is_empty())?;
    let candidate = body[pos];
    if candidate.text.trim().is_empty() {
        return None;
    }
    let empty_paragraphs_before = body[..pos]
        .iter()
        .rev()
        .take_while(|p| p.is_empty())
        .count();
    Some(TrailingSignature {
        text: candidate.text.trim().to_string(),
        aligned_right: candidate.alignment == Alignment::Right,
        paragraph_index: candidate.index,
        empty_paragraphs_before,
    })
}

fn structure_counts(model: &DocumentModel) -> StructureCounts {
    fn count_tables(blocks: &[Block]) -> usize {
        blocks
            .iter()
            .map(|b| match b {
                Block::Paragraph(_) => 0,
                Block::Table(t) => 1 + nested_tables(t),
            })
            .sum()
    }
    fn nested_tables(table: &Table) -> usize {
        table
            .rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .map(|c| count_tables(&c.blocks))
            .sum()
    }

    StructureCounts {
        paragraphs: model.paragraphs.len(),
        non_empty_paragraphs: model.paragraphs.iter().filter(|p| !p.is_empty()).count(),
        headings: model
            .paragraphs
            .iter()
            .filter(|p| p.heading_level().is_some())
            .count(),
        list_paragraphs: model.paragraphs.iter().filter(|p| p.list.is_some()).count(),
        tables: count_tables(&model.blocks),
        images: model.image_count(),
    }
}
