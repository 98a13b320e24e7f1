//! Read-only checks of a rendered tree against a style baseline.

use serde::Serialize;

use crate::profile::WordStyleProfile;
use crate::render::{MARKER_CLASS, MEDIA_TAGS, PARAGRAPH_TAGS};
use crate::tree::{MeasurementOracle, NodeRef, VisualTree};

/// Expected values of the audited metrics, in px.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTarget {
    pub title_font_px: f32,
    pub body_font_px: f32,
    pub body_line_px: f32,
    pub paragraph_after_px: f32,
    pub content_width_px: f32,
}

impl AuditTarget {
    /// Word's defaults for a blank A4 document.
    pub const FALLBACK: AuditTarget = AuditTarget {
        title_font_px: 32.0,
        body_font_px: 14.6667,
        body_line_px: 16.99,
        paragraph_after_px: 10.67,
        content_width_px: 553.73,
    };

    pub fn from_profile(profile: Option<&WordStyleProfile>) -> Self {
        let Some(profile) = profile else {
            return Self::FALLBACK;
        };
        Self {
            title_font_px: profile.title_font_px,
            body_font_px: profile.body_font_px,
            body_line_px: profile.body_line_px(),
            paragraph_after_px: profile.paragraph_after_px,
            content_width_px: profile.content_width_px,
        }
    }
}

/// Absolute tolerances. The column width is itself an estimate, hence the wider band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AuditTolerance {
    pub typography_px: f32,
    pub column_width_px: f32,
}

impl Default for AuditTolerance {
    fn default() -> Self {
        Self {
            typography_px: 1.0,
            column_width_px: 6.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMetric {
    pub label: &'static str,
    pub actual: f32,
    pub expected: f32,
    /// `actual - expected`, rounded to two decimals.
    pub delta: f32,
    pub tolerance: f32,
    pub pass: bool,
}

impl AuditMetric {
    fn new(label: &'static str, actual: f32, expected: f32, tolerance: f32) -> Self {
        let delta = ((actual - expected) * 100.0).round() / 100.0;
        Self {
            label,
            actual,
            expected,
            delta,
            tolerance,
            pass: delta.abs() <= tolerance,
        }
    }
}

pub fn create_audit_metrics(
    tree: &dyn VisualTree,
    oracle: &dyn MeasurementOracle,
    target: &AuditTarget,
) -> Vec<AuditMetric> {
    create_audit_metrics_with(tree, oracle, target, &AuditTolerance::default())
}

/// Measure the first `<h1>` and first `<p>`. Empty when either is missing.
pub fn create_audit_metrics_with(
    tree: &dyn VisualTree,
    oracle: &dyn MeasurementOracle,
    target: &AuditTarget,
    tolerance: &AuditTolerance,
) -> Vec<AuditMetric> {
    let body = tree.body();
    let (Some(h1), Some(p)) = (
        tree.elements_by_tag(body, &["h1"]).into_iter().next(),
        tree.elements_by_tag(body, &["p"]).into_iter().next(),
    ) else {
        return Vec::new();
    };

    let title = oracle.computed_style(h1);
    let text = oracle.computed_style(p);
    let typography = tolerance.typography_px;
    vec![
        AuditMetric::new("title font size", title.font_size_px, target.title_font_px, typography),
        AuditMetric::new("body font size", text.font_size_px, target.body_font_px, typography),
        AuditMetric::new("body line height", text.line_height_px(), target.body_line_px, typography),
        AuditMetric::new(
            "paragraph after",
            text.margin_bottom_px,
            target.paragraph_after_px,
            typography,
        ),
        AuditMetric::new(
            "content width",
            estimate_content_column_width(tree, oracle),
            target.content_width_px,
            tolerance.column_width_px,
        ),
    ]
}

/// Median width of paragraphs that hold text and no media; the body width when there
/// are none.
pub fn estimate_content_column_width(tree: &dyn VisualTree, oracle: &dyn MeasurementOracle) -> f32 {
    let body = tree.body();
    let mut widths: Vec<f32> = tree
        .elements_by_tag(body, &["p"])
        .into_iter()
        .filter(|p| !tree.text_content(*p).trim().is_empty() && !tree.has_descendant_tag(*p, MEDIA_TAGS))
        .map(|p| oracle.bounding_box(p).width)
        .filter(|w| *w > 0.0)
        .collect();
    if widths.is_empty() {
        return oracle.bounding_box(body).width;
    }
    widths.sort_by(|a, b| a.total_cmp(b));
    let mid = widths.len() / 2;
    if widths.len() % 2 == 0 {
        (widths[mid - 1] + widths[mid]) / 2.0
    } else {
        widths[mid]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureRow {
    pub name: &'static str,
    pub actual: usize,
    pub expected: Option<usize>,
    pub delta: Option<i64>,
    pub pass: bool,
}

impl StructureRow {
    fn new(name: &'static str, actual: usize, expected: Option<usize>, tolerance: usize) -> Self {
        let delta = expected.map(|e| actual as i64 - e as i64);
        Self {
            name,
            actual,
            expected,
            delta,
            pass: delta.is_none_or(|d| d.unsigned_abs() as usize <= tolerance),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StructureReport {
    pub rows: Vec<StructureRow>,
    pub pass: bool,
}

/// Compare structural counts of the tree with the baseline. Without a baseline every
/// row is informational and passes.
pub fn build_structure_report(tree: &dyn VisualTree, profile: Option<&WordStyleProfile>) -> StructureReport {
    let body = tree.body();
    let paragraphs = tree.elements_by_tag(body, PARAGRAPH_TAGS);
    let headings = paragraphs.iter().filter(|n| !tree.has_tag(**n, &["p"])).count();
    let empty = paragraphs
        .iter()
        .filter(|n| tree.attribute(**n, "data-word-empty") == Some("1"))
        .count();
    let list_items = tree.elements_by_tag(body, &["li"]).len()
        + paragraphs.iter().filter(|n| has_marker(tree, **n)).count();
    let structure = profile.map(|p| p.structure);

    let rows = vec![
        StructureRow::new("paragraphs", paragraphs.len(), profile.map(|p| p.paragraphs.len()), 4),
        StructureRow::new("headings", headings, structure.map(|s| s.headings), 0),
        StructureRow::new("list paragraphs", list_items, structure.map(|s| s.list_paragraphs), 0),
        StructureRow::new(
            "tables",
            tree.elements_by_tag(body, &["table"]).len(),
            structure.map(|s| s.tables),
            0,
        ),
        StructureRow::new(
            "images",
            tree.elements_by_tag(body, &["img"]).len(),
            structure.map(|s| s.images),
            0,
        ),
        StructureRow::new(
            "non-empty paragraphs",
            paragraphs.len() - empty,
            structure.map(|s| s.non_empty_paragraphs),
            8,
        ),
    ];
    let pass = rows.iter().all(|r| r.pass);
    StructureReport { rows, pass }
}

fn has_marker(tree: &dyn VisualTree, node: NodeRef) -> bool {
    tree.descendants(node)
        .into_iter()
        .any(|c| tree.has_class(c, MARKER_CLASS) || tree.attribute(c, "data-word-native-marker") == Some("1"))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CoverageItem {
    pub name: &'static str,
    pub supported: bool,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    /// Percentage of supported items, 0–100.
    pub score: u32,
    pub supported_count: usize,
    pub total: usize,
    pub items: Vec<CoverageItem>,
}

/// Which fidelity capabilities the baseline can drive. Nothing is supported without
/// one.
pub fn build_coverage_report(profile: Option<&WordStyleProfile>) -> CoverageReport {
    let items = match profile {
        None => CAPABILITIES
            .iter()
            .map(|name| CoverageItem {
                name: *name,
                supported: false,
                detail: "no style baseline".to_string(),
            })
            .collect::<Vec<_>>(),
        Some(profile) => coverage_items(profile),
    };
    let supported_count = items.iter().filter(|i| i.supported).count();
    let total = items.len();
    CoverageReport {
        score: ((supported_count as f64 / total as f64) * 100.0).round() as u32,
        supported_count,
        total,
        items,
    }
}

const CAPABILITIES: [&str; 6] = [
    "paragraph styles",
    "run styles",
    "list numbering",
    "pagination keep rules",
    "table cell padding",
    "font mapping",
];

fn coverage_items(profile: &WordStyleProfile) -> Vec<CoverageItem> {
    let paragraphs = &profile.paragraphs;
    let styled_runs = paragraphs
        .iter()
        .flat_map(|p| p.runs.iter())
        .filter(|r| r.image.is_none())
        .count();
    let keep_next = paragraphs.iter().filter(|p| p.keep_next).count();
    let keep_lines = paragraphs.iter().filter(|p| p.keep_lines).count();
    let breaks = paragraphs.iter().filter(|p| p.page_break_before).count();
    let pad = &profile.table_cell_padding;

    let details = [
        format!("{} paragraphs: alignment, spacing, line height, indent", paragraphs.len()),
        format!("{styled_runs} runs: font, color, highlight, decoration, scripts"),
        format!(
            "{} list paragraphs from numPr and lvlText templates",
            profile.structure.list_paragraphs
        ),
        format!("keepNext {keep_next}, keepLines {keep_lines}, pageBreakBefore {breaks}"),
        format!(
            "{:.2} / {:.2} / {:.2} / {:.2} px",
            pad.top_px, pad.left_px, pad.bottom_px, pad.right_px
        ),
        format!("{} families from the font table and runs", profile.fonts.len()),
    ];
    CAPABILITIES
        .iter()
        .zip(details)
        .map(|(name, detail)| CoverageItem {
            name: *name,
            supported: true,
            detail,
        })
        .collect()
}
