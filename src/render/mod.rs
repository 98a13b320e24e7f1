//! Render-model applier: projects a [`WordStyleProfile`] onto an externally rendered
//! tree. Every step clears what an earlier pass synthesized before writing, so a
//! second pass over the same tree produces the same markup.

pub mod compat;
pub mod layout;
pub mod list;

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;

use crate::css;
use crate::error::Diagnostic;
use crate::model::{ParagraphProfile, Run, RunStyle, trim_fixed};
use crate::profile::WordStyleProfile;
use crate::tree::{MeasurementOracle, NodeRef, VisualTree};

use self::compat::EMPTY_ATTR;
pub use self::compat::NATIVE_MARKER_ATTR;
use self::layout::SPACER_ATTR;
use self::list::ListCounterState;

pub const STYLE_BLOCK_ID: &str = "__word_style_profile__";
pub const VIEW_OPTIONS_ID: &str = "__word_view_options__";
pub const MARKER_CLASS: &str = "__word-list-marker";
pub const ANCHOR_CLASS: &str = "__word-date-anchor";
pub const P_INDEX_ATTR: &str = "data-word-p-index";
pub const SIGNATURE_SPACER_ATTR: &str = "data-word-signature-spacer";

pub(crate) const PARAGRAPH_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6"];
pub(crate) const MEDIA_TAGS: &[&str] = &["img", "table", "svg", "canvas"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Show paragraph and line-break marks.
    pub show_formatting_marks: bool,
    /// Run the keep-together pagination pass after applying a profile.
    pub paginate: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            show_formatting_marks: false,
            paginate: true,
        }
    }
}

/// What one pass did. Diagnostics are non-fatal; the tree keeps every mutation made
/// up to the point they were raised.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub diagnostics: Vec<Diagnostic>,
    pub empty_paragraphs: usize,
    pub paragraphs_formatted: usize,
    pub runs_rewritten: usize,
    pub markers: usize,
    pub signature_spacers: usize,
    pub page_spacers: usize,
    pub images_contained: usize,
}

/// Apply `profile` to `tree` in place. Without a profile only the compatibility
/// normalization and view options run.
pub fn apply_render_model(
    tree: &mut dyn VisualTree,
    profile: Option<&WordStyleProfile>,
    oracle: &mut dyn MeasurementOracle,
    options: &ApplyOptions,
) -> ApplyReport {
    let t0 = Instant::now();
    let mut report = ApplyReport {
        empty_paragraphs: compat::normalize(tree).empty_paragraphs,
        ..ApplyReport::default()
    };
    apply_view_options(tree, options);

    let Some(profile) = profile else {
        log::debug!("No style profile; normalization only");
        return report;
    };
    strip_synthesized(tree);

    let css = profile_css(profile);
    let block = ensure_style_block(tree, STYLE_BLOCK_ID);
    tree.set_text_content(block, &css);
    let body = tree.body();
    tree.set_style_property(body, "width", &format!("{:.2}px", profile.content_width_px), true);

    let candidates = candidate_count(&*tree);
    if candidates != profile.paragraphs.len() {
        let diagnostic = Diagnostic::ProfileTreeMismatch {
            profile: profile.paragraphs.len(),
            tree: candidates,
        };
        log::warn!("{diagnostic}; applying to the shorter sequence");
        report.diagnostics.push(diagnostic);
    }
    let mapped = map_paragraphs(&*tree, profile);

    let (anchor, inserted) = place_signature(tree, profile, &mapped);
    report.signature_spacers = inserted;

    let mut counters = ListCounterState::new();
    for (pos, node) in &mapped {
        let paragraph = &profile.paragraphs[*pos];
        for (property, value) in paragraph_declarations(paragraph) {
            tree.set_style_property(*node, property, &value, true);
        }
        report.paragraphs_formatted += 1;

        if rewrite_runs(tree, *node, paragraph) {
            report.runs_rewritten += 1;
        }

        if let Some(binding) = &paragraph.list {
            let marker = counters.next_marker(binding, paragraph.section_break_before);
            if !already_marked(&*tree, *node) {
                insert_marker(tree, *node, &marker, binding.level);
                report.markers += 1;
            }
        }

        if anchor == Some(*node) {
            tree.add_class(*node, ANCHOR_CLASS);
        }
    }

    for (_, node) in &mapped {
        if is_visually_empty(&*tree, *node) {
            tree.set_attribute(*node, EMPTY_ATTR, "1");
        } else {
            tree.remove_attribute(*node, EMPTY_ATTR);
        }
    }

    report.images_contained = contain_media(tree, &*oracle, profile.content_width_px);

    if options.paginate {
        report.page_spacers = layout::apply_keep_pagination(tree, oracle, profile);
    }

    log::info!(
        "Applied profile '{}': {} paragraphs, {} run rewrites, {} markers, {} page spacers in {:.1}ms",
        profile.source_name,
        report.paragraphs_formatted,
        report.runs_rewritten,
        report.markers,
        report.page_spacers,
        t0.elapsed().as_secs_f64() * 1000.0
    );
    report
}

/// CSS for one run, as `prop:value` pairs joined by `;`. Empty for an unstyled run.
pub fn run_style_css(style: &RunStyle) -> String {
    let mut declarations: Vec<String> = Vec::new();
    let scripted = style.superscript || style.subscript;
    if let Some(size) = style.font_size_px {
        if scripted {
            declarations.push(format!("font-size:{:.2}px", size * 0.83));
        } else {
            declarations.push(format!("font-size:{size:.2}px"));
        }
    } else if scripted {
        declarations.push("font-size:0.83em".to_string());
    }
    if let Some(color) = &style.color {
        declarations.push(format!("color:{color}"));
    }
    if let Some(background) = style.highlight_color.as_ref().or(style.shading_color.as_ref()) {
        declarations.push(format!("background-color:{background}"));
    }
    if let Some(spacing) = style.char_spacing_px {
        declarations.push(format!("letter-spacing:{spacing:.2}px"));
    }
    if style.shadow {
        declarations.push("text-shadow:0.5px 0.5px 0 rgba(0,0,0,0.28)".to_string());
    }
    if style.bold {
        declarations.push("font-weight:700".to_string());
    }
    if style.italic {
        declarations.push("font-style:italic".to_string());
    }
    let decorations: Vec<&str> = [(style.underline, "underline"), (style.strike, "line-through")]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
    if !decorations.is_empty() {
        declarations.push(format!("text-decoration:{}", decorations.join(" ")));
    }
    if style.superscript {
        declarations.push("vertical-align:super".to_string());
    } else if style.subscript {
        declarations.push("vertical-align:sub".to_string());
    }
    if let Some(family) = &style.font_family {
        declarations.push(format!("font-family:{family}"));
    }
    declarations.join(";")
}

/// Alignment, spacing and indent of a paragraph as CSS properties.
pub(crate) fn paragraph_declarations(p: &ParagraphProfile) -> Vec<(&'static str, String)> {
    let mut out = vec![("text-align", p.alignment.as_css().to_string())];
    if let Some(before) = p.before_px {
        out.push(("margin-top", format!("{before:.2}px")));
    }
    if let Some(after) = p.after_px {
        out.push(("margin-bottom", format!("{after:.2}px")));
    }
    if let Some(line) = p.line_height {
        out.push(("line-height", line.css_value()));
    }
    if let Some(left) = p.indent.left_px {
        out.push(("margin-left", format!("{left:.2}px")));
    }
    if let Some(right) = p.indent.right_px {
        out.push(("margin-right", format!("{right:.2}px")));
    }
    if let Some(text) = p.indent.text {
        out.push(("text-indent", format!("{:.2}px", text.css_px())));
    }
    out
}

fn profile_css(profile: &WordStyleProfile) -> String {
    let page = &profile.page;
    let pad = &profile.table_cell_padding;
    format!(
        "html, body {{ box-sizing: border-box; }}
body {{
  min-height: {page_h:.2}px !important;
  width: {width:.2}px !important;
  max-width: calc(100% - 24px) !important;
  margin-left: auto !important;
  margin-right: auto !important;
  padding-top: {top:.2}px !important;
  padding-bottom: {bottom:.2}px !important;
  padding-left: 0 !important;
  padding-right: 0 !important;
  display: flex !important;
  flex-direction: column !important;
  font-family: {body_family} !important;
}}
p {{
  font-size: {body_px:.4}px !important;
  line-height: {line} !important;
  margin-bottom: {after:.2}px !important;
}}
table {{ border-collapse: collapse !important; border-spacing: 0 !important; }}
td, th {{
  padding-top: {pt:.2}px !important;
  padding-left: {pl:.2}px !important;
  padding-bottom: {pb:.2}px !important;
  padding-right: {pr:.2}px !important;
  vertical-align: top !important;
}}
img {{ max-width: 100% !important; }}
.{anchor} {{
  margin-top: auto !important;
  text-align: right !important;
}}
h1 {{
  font-size: {title_px:.2}px !important;
  color: {title_color} !important;
  text-align: {title_align} !important;
  font-family: {title_family} !important;
}}
",
        page_h = page.height_px,
        width = profile.content_width_px,
        top = page.margin_top_px,
        bottom = page.margin_bottom_px,
        body_family = profile.body_font_family,
        body_px = profile.body_font_px,
        line = profile.body_line_height.css_value(),
        after = profile.paragraph_after_px,
        pt = pad.top_px,
        pl = pad.left_px,
        pb = pad.bottom_px,
        pr = pad.right_px,
        anchor = ANCHOR_CLASS,
        title_px = profile.title_font_px,
        title_color = profile.title_color,
        title_align = profile.title_align.as_css(),
        title_family = profile.title_font_family,
    )
}

fn apply_view_options(tree: &mut dyn VisualTree, options: &ApplyOptions) {
    let mut css = String::from("p[data-word-empty=\"1\"]::before { content: \"\\00a0\"; }\n");
    if options.show_formatting_marks {
        css.push_str("p::after { content: \"\u{21b5}\"; color: #66aef9; }\n");
        css.push_str("br::after { content: \"\u{21b5}\"; color: #66aef9; }\n");
    }
    let block = ensure_style_block(tree, VIEW_OPTIONS_ID);
    tree.set_text_content(block, &css);
}

/// The `<style>` element with `id`, created at the end of `head` if missing.
fn ensure_style_block(tree: &mut dyn VisualTree, id: &str) -> NodeRef {
    if let Some(existing) = tree.element_by_id(id) {
        return existing;
    }
    let block = tree.create_element("style");
    tree.set_attribute(block, "id", id);
    let head = tree.head();
    tree.insert_before(head, block, None);
    block
}

/// Drop list markers and anchor classes written by a previous pass.
fn strip_synthesized(tree: &mut dyn VisualTree) {
    let body = tree.body();
    for node in tree.descendants(body) {
        if tree.has_class(node, MARKER_CLASS) {
            tree.remove(node);
        } else if tree.has_class(node, ANCHOR_CLASS) {
            tree.remove_class(node, ANCHOR_CLASS);
        }
    }
}

/// Paragraph-like elements the order-based mapping would consider.
fn order_candidates(tree: &dyn VisualTree) -> Vec<NodeRef> {
    tree.elements_by_tag(tree.body(), &["p"])
        .into_iter()
        .filter(|n| tree.attribute(*n, SIGNATURE_SPACER_ATTR).is_none())
        .collect()
}

fn indexed_candidates(tree: &dyn VisualTree) -> Vec<(usize, NodeRef)> {
    tree.elements_by_tag(tree.body(), PARAGRAPH_TAGS)
        .into_iter()
        .filter_map(|n| {
            let index = tree.attribute(n, P_INDEX_ATTR)?.trim().parse::<usize>().ok()?;
            Some((index, n))
        })
        .collect()
}

fn candidate_count(tree: &dyn VisualTree) -> usize {
    let indexed = indexed_candidates(tree);
    if indexed.is_empty() {
        order_candidates(tree).len()
    } else {
        indexed.len()
    }
}

/// Pair profile positions with tree nodes, in tree order. Uses `data-word-p-index`
/// when the tree carries it and document order of `<p>` otherwise; bounded by the
/// shorter side.
pub(crate) fn map_paragraphs(tree: &dyn VisualTree, profile: &WordStyleProfile) -> Vec<(usize, NodeRef)> {
    let indexed = indexed_candidates(tree);
    if indexed.is_empty() {
        return order_candidates(tree)
            .into_iter()
            .take(profile.paragraphs.len())
            .enumerate()
            .collect();
    }

    let positions: HashMap<usize, usize> = profile
        .paragraphs
        .iter()
        .enumerate()
        .map(|(pos, p)| (p.index, pos))
        .collect();
    let mut seen = vec![false; profile.paragraphs.len()];
    indexed
        .into_iter()
        .filter_map(|(index, node)| {
            let pos = *positions.get(&index)?;
            if std::mem::replace(&mut seen[pos], true) {
                return None;
            }
            Some((pos, node))
        })
        .collect()
}

/// Text of `node` without synthesized markers.
pub(crate) fn visible_text(tree: &dyn VisualTree, node: NodeRef) -> String {
    let mut out = String::new();
    for child in tree.children(node) {
        if let Some(text) = tree.text(child) {
            out.push_str(text);
        } else if !tree.has_class(child, MARKER_CLASS) {
            out.push_str(&visible_text(tree, child));
        }
    }
    out
}

pub(crate) fn is_visually_empty(tree: &dyn VisualTree, node: NodeRef) -> bool {
    visible_text(tree, node).trim().is_empty() && !tree.has_descendant_tag(node, MEDIA_TAGS)
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Replace the paragraph's content with one span per run, but only when the text
/// already matches and nothing embedded would be lost.
fn rewrite_runs(tree: &mut dyn VisualTree, node: NodeRef, paragraph: &ParagraphProfile) -> bool {
    let text_runs: Vec<&Run> = paragraph.runs.iter().filter(|r| r.image.is_none()).collect();
    if text_runs.is_empty() || tree.has_descendant_tag(node, MEDIA_TAGS) {
        return false;
    }
    let expected = strip_whitespace(&text_runs.iter().map(|r| r.text.as_str()).collect::<String>());
    if expected.is_empty() || strip_whitespace(&visible_text(&*tree, node)) != expected {
        return false;
    }

    tree.clear_children(node);
    for run in text_runs {
        let style = run_style_css(&run.style);
        let container = if style.is_empty() {
            node
        } else {
            let span = tree.create_element("span");
            tree.set_attribute(span, "style", &style);
            tree.insert_before(node, span, None);
            span
        };
        for (i, part) in run.text.split('\n').enumerate() {
            if i > 0 {
                let br = tree.create_element("br");
                tree.insert_before(container, br, None);
            }
            if !part.is_empty() {
                let text = tree.create_text(part);
                tree.insert_before(container, text, None);
            }
        }
    }
    true
}

/// A paragraph is already numbered when the tree marks it, or an element inside it,
/// with [`NATIVE_MARKER_ATTR`]. The text itself is never inspected.
fn already_marked(tree: &dyn VisualTree, node: NodeRef) -> bool {
    compat::has_native_marker(tree, node)
}

/// Inline style of a marker span; deeper levels step in by 1.2em.
pub(crate) fn marker_style(level: usize) -> String {
    let indent = if level > 0 {
        format!("{}em", trim_fixed(level as f32 * 1.2))
    } else {
        "0".to_string()
    };
    format!(
        "display: inline-block; min-width: 1.8em; margin-left: {indent}; color: inherit; font-weight: inherit"
    )
}

fn insert_marker(tree: &mut dyn VisualTree, node: NodeRef, marker: &str, level: usize) {
    let span = tree.create_element("span");
    tree.set_attribute(span, "class", MARKER_CLASS);
    tree.set_attribute(span, "style", &marker_style(level));
    let text = tree.create_text(&format!("{marker} "));
    tree.insert_before(span, text, None);
    tree.prepend(node, span);
}

/// Locate the signature paragraph, pad it with the empty paragraphs the source had
/// before it, and return it for anchoring. Nothing happens when visible content
/// follows it in the tree.
fn place_signature(
    tree: &mut dyn VisualTree,
    profile: &WordStyleProfile,
    mapped: &[(usize, NodeRef)],
) -> (Option<NodeRef>, usize) {
    let Some(signature) = profile.signature.as_ref().filter(|s| s.is_block()) else {
        return (None, 0);
    };
    let by_index = profile
        .paragraphs
        .iter()
        .position(|p| p.index == signature.paragraph_index)
        .and_then(|pos| mapped.iter().find(|(p, _)| *p == pos))
        .map(|(_, node)| *node);
    let node = by_index.or_else(|| {
        let target = strip_whitespace(&signature.text);
        order_candidates(&*tree)
            .into_iter()
            .rev()
            .find(|n| !target.is_empty() && strip_whitespace(&visible_text(&*tree, *n)).contains(&target))
    });
    let Some(node) = node else {
        return (None, 0);
    };
    if follows_visual_content(&*tree, node) {
        log::debug!("Content follows the signature paragraph; not anchoring it");
        return (None, 0);
    }

    let mut existing = 0;
    let mut cursor = tree.previous_element_sibling(node);
    while let Some(prev) = cursor {
        if !tree.has_tag(prev, &["p"]) || !visible_text(&*tree, prev).trim().is_empty() {
            break;
        }
        existing += 1;
        cursor = tree.previous_element_sibling(prev);
    }

    let needed = signature.empty_paragraphs_before.saturating_sub(existing);
    if let Some(parent) = tree.parent(node) {
        for _ in 0..needed {
            let spacer = tree.create_element("p");
            tree.set_attribute(spacer, SIGNATURE_SPACER_ATTR, "1");
            tree.set_attribute(spacer, EMPTY_ATTR, "1");
            let br = tree.create_element("br");
            tree.insert_before(spacer, br, None);
            tree.insert_before(parent, spacer, Some(node));
        }
    }
    (Some(node), needed)
}

/// Whether anything visible comes after `node` in document order.
fn follows_visual_content(tree: &dyn VisualTree, node: NodeRef) -> bool {
    let body = tree.body();
    let mut current = node;
    while current != body {
        let Some(parent) = tree.parent(current) else {
            break;
        };
        let siblings = tree.children(parent);
        let after = siblings
            .iter()
            .position(|s| *s == current)
            .map(|i| &siblings[i + 1..])
            .unwrap_or(&[]);
        for sibling in after {
            if let Some(text) = tree.text(*sibling) {
                if !text.trim().is_empty() {
                    return true;
                }
                continue;
            }
            if tree.attribute(*sibling, SPACER_ATTR).is_some()
                || tree.has_tag(*sibling, &["style", "script"])
            {
                continue;
            }
            if tree.has_tag(*sibling, MEDIA_TAGS) || !is_visually_empty(tree, *sibling) {
                return true;
            }
        }
        current = parent;
    }
    false
}

/// Constrain images wider than the column. An image without a declared width is
/// judged by its measured box. Returns how many were constrained.
fn contain_media(tree: &mut dyn VisualTree, oracle: &dyn MeasurementOracle, column_px: f32) -> usize {
    if column_px <= 0.0 {
        return 0;
    }
    let mut contained = 0;
    for img in tree.elements_by_tag(tree.body(), &["img"]) {
        let declared = tree
            .style_property(img, "width")
            .and_then(|w| css::length_to_px(&w))
            .or_else(|| tree.attribute(img, "width").and_then(|w| css::length_to_px(w)))
            .or_else(|| Some(oracle.bounding_box(img).width).filter(|w| *w > 0.0));
        let Some(width) = declared else {
            continue;
        };
        if width <= column_px + 0.5 {
            continue;
        }
        tree.set_style_property(img, "max-width", &format!("{column_px:.2}px"), true);
        tree.set_style_property(img, "height", "auto", true);
        contained += 1;
    }
    if contained > 0 {
        log::debug!("Constrained {contained} images to the {column_px:.2}px column");
    }
    contained
}
