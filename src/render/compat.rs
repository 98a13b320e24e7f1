//! Normalization of legacy Office HTML: `mso-*` declarations, list-paragraph
//! classes, and paragraphs with nothing to show.

use crate::tree::{NodeRef, VisualTree};

use super::{MARKER_CLASS, is_visually_empty};

/// `mso-*` alternates and the standard property each one stands in for.
const ALTERNATES: &[(&str, &str)] = &[
    ("mso-line-height-alt", "line-height"),
    ("mso-margin-top-alt", "margin-top"),
    ("mso-margin-bottom-alt", "margin-bottom"),
    ("mso-ansi-font-size", "font-size"),
];

/// Set on a paragraph, or an element inside it, whose list marker is already part
/// of the rendered content.
pub const NATIVE_MARKER_ATTR: &str = "data-word-native-marker";
pub(crate) const EMPTY_ATTR: &str = "data-word-empty";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompatStats {
    pub declarations_mapped: usize,
    pub list_paragraphs: usize,
    pub native_markers: usize,
    pub empty_paragraphs: usize,
}

/// Rewrite legacy hints under `body` into standard markup. Safe to repeat.
pub fn normalize(tree: &mut dyn VisualTree) -> CompatStats {
    let mut stats = CompatStats::default();
    let body = tree.body();

    for node in tree.descendants(body) {
        if !tree.is_element(node) || tree.attribute(node, "style").is_none() {
            continue;
        }
        stats.declarations_mapped += map_alternates(tree, node);
        if tree.style_property(node, "mso-list").is_some_and(|v| v.eq_ignore_ascii_case("ignore")) {
            tree.set_attribute(node, NATIVE_MARKER_ATTR, "1");
            stats.native_markers += 1;
        }
    }

    for p in tree.elements_by_tag(body, &["p"]) {
        if is_list_paragraph(tree, p) && flatten_list_indent(tree, p) {
            stats.list_paragraphs += 1;
        }
        if collapse_if_empty(tree, p) {
            stats.empty_paragraphs += 1;
        }
    }

    log::debug!(
        "Compat: {} declarations mapped, {} list paragraphs, {} native markers, {} empty paragraphs",
        stats.declarations_mapped,
        stats.list_paragraphs,
        stats.native_markers,
        stats.empty_paragraphs
    );
    stats
}

fn map_alternates(tree: &mut dyn VisualTree, node: NodeRef) -> usize {
    let mut mapped = 0;
    for (legacy, standard) in ALTERNATES {
        let Some(value) = tree.style_property(node, legacy) else {
            continue;
        };
        if value.eq_ignore_ascii_case("auto") || tree.style_property(node, standard).is_some() {
            continue;
        }
        tree.set_style_property(node, standard, &value, false);
        mapped += 1;
    }
    mapped
}

fn is_list_paragraph(tree: &dyn VisualTree, node: NodeRef) -> bool {
    tree.attribute(node, "class")
        .is_some_and(|c| c.split_whitespace().any(|c| c.starts_with("MsoListParagraph")))
}

/// Move the list indent from `margin-left` to `padding-left` so native markers hang
/// inside the box. Skipped once `padding-left` is present.
fn flatten_list_indent(tree: &mut dyn VisualTree, node: NodeRef) -> bool {
    if tree.style_property(node, "padding-left").is_some() {
        return false;
    }
    let Some(margin) = tree.style_property(node, "margin-left") else {
        return false;
    };
    tree.set_style_property(node, "padding-left", &margin, false);
    tree.set_style_property(node, "margin-left", "0", false);
    tree.set_style_property(node, "text-indent", "0", false);
    true
}

/// Collapse a paragraph without visible content to a single `<br>` and tag it.
pub(crate) fn collapse_if_empty(tree: &mut dyn VisualTree, node: NodeRef) -> bool {
    if !is_visually_empty(tree, node) {
        tree.remove_attribute(node, EMPTY_ATTR);
        return false;
    }
    let only_break = {
        let children = tree.children(node);
        children.len() == 1 && tree.has_tag(children[0], &["br"])
    };
    if !only_break {
        tree.clear_children(node);
        let br = tree.create_element("br");
        tree.insert_before(node, br, None);
    }
    tree.set_attribute(node, EMPTY_ATTR, "1");
    true
}

/// Paragraph already carries a marker that did not come from us.
pub(crate) fn has_native_marker(tree: &dyn VisualTree, node: NodeRef) -> bool {
    if tree.attribute(node, NATIVE_MARKER_ATTR) == Some("1") {
        return true;
    }
    tree.descendants(node).into_iter().any(|n| {
        tree.attribute(n, NATIVE_MARKER_ATTR) == Some("1") && !tree.has_class(n, MARKER_CLASS)
    })
}
