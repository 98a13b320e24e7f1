//! Keep-together pagination: simulate page fill over the mapped paragraphs and insert
//! spacers where Word would start a new page.

use crate::profile::WordStyleProfile;
use crate::tree::{MeasurementOracle, NodeRef, VisualTree};

use super::map_paragraphs;

pub const SPACER_ATTR: &str = "data-word-page-spacer";

/// Height used when neither the box nor the computed line height is usable.
const FALLBACK_HEIGHT_PX: f32 = 16.0;
/// Spacers smaller than this are not worth a node.
const MIN_SPACER_PX: f32 = 0.5;

/// Remove every spacer a previous pass inserted. Returns how many were removed.
pub fn remove_spacers(tree: &mut dyn VisualTree) -> usize {
    let spacers: Vec<NodeRef> = tree
        .descendants(tree.body())
        .into_iter()
        .filter(|n| tree.attribute(*n, SPACER_ATTR) == Some("1"))
        .collect();
    for spacer in &spacers {
        tree.remove(*spacer);
    }
    spacers.len()
}

/// Measured height of a block: its box, then its line height, then a constant.
pub fn block_height(oracle: &dyn MeasurementOracle, node: NodeRef) -> f32 {
    let rect = oracle.bounding_box(node);
    if rect.height > 0.0 {
        return rect.height;
    }
    let line = oracle.computed_style(node).line_height_px();
    if line.is_finite() && line > 0.0 {
        return line;
    }
    FALLBACK_HEIGHT_PX
}

/// Clear old spacers, re-measure, and insert a spacer before each paragraph that
/// starts a simulated page. Returns the number of spacers inserted.
pub fn apply_keep_pagination(
    tree: &mut dyn VisualTree,
    oracle: &mut dyn MeasurementOracle,
    profile: &WordStyleProfile,
) -> usize {
    let removed = remove_spacers(tree);
    let content_height = profile.page.content_height();
    if content_height <= 0.0 {
        log::warn!(
            "Page content height is {content_height:.2}px (page {:.2}px, margins {:.2}/{:.2}); pagination skipped",
            profile.page.height_px,
            profile.page.margin_top_px,
            profile.page.margin_bottom_px
        );
        return 0;
    }

    oracle.request_remeasure(&*tree);
    let mapped = map_paragraphs(&*tree, profile);
    let heights: Vec<f32> = mapped
        .iter()
        .map(|(_, node)| block_height(&*oracle, *node))
        .collect();

    let mut used = 0.0f32;
    let mut inserted = 0;
    for (i, (pos, node)) in mapped.iter().enumerate() {
        let paragraph = &profile.paragraphs[*pos];
        let height = heights[i];

        // A paragraph held to its predecessor by keepNext never opens a page itself.
        let held = i > 0
            && profile.paragraphs[mapped[i - 1].0].keep_next
            && heights[i - 1] + height <= content_height;

        let group = match heights.get(i + 1) {
            Some(next) if paragraph.keep_next && height + next <= content_height => height + next,
            _ => height,
        };

        let forced = paragraph.page_break_before && used > 0.0;
        let kept = !held
            && (paragraph.keep_lines || paragraph.keep_next)
            && used > 0.0
            && used + group > content_height;
        let overflow = !held && used > 0.0 && used + height > content_height;

        if forced || kept || overflow {
            if insert_spacer(tree, *node, content_height - used) {
                inserted += 1;
            }
            used = 0.0;
        }

        used += height;
        if used >= content_height {
            used %= content_height;
        }
    }

    log::debug!(
        "Pagination: {} paragraphs, content height {:.2}px, {} spacers (removed {})",
        mapped.len(),
        content_height,
        inserted,
        removed
    );
    inserted
}

fn insert_spacer(tree: &mut dyn VisualTree, before: NodeRef, height: f32) -> bool {
    if height <= MIN_SPACER_PX {
        return false;
    }
    let Some(parent) = tree.parent(before) else {
        return false;
    };
    let spacer = tree.create_element("div");
    tree.set_attribute(spacer, SPACER_ATTR, "1");
    tree.set_attribute(
        spacer,
        "style",
        &format!("height: {height:.2}px; width: 100%; pointer-events: none; user-select: none"),
    );
    tree.insert_before(parent, spacer, Some(before));
    true
}
