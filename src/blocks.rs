//! Block index over a rendered tree, for block-granular editing, and a simple
//! page assignment of the indexed blocks.

use std::collections::HashMap;

use serde::Serialize;

use crate::tree::{MeasurementOracle, NodeRef, VisualTree};

pub const BLOCK_ID_ATTR: &str = "data-overlay-block-id";

const BLOCK_TAGS: &[&str] = &[
    "p", "table", "img", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "div",
];

/// Blocks narrower or shorter than this are not worth an overlay.
const MIN_BLOCK_PX: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Paragraph,
    Heading,
    Table,
    Image,
    List,
    Quote,
    Generic,
}

impl BlockKind {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "p" => BlockKind::Paragraph,
            "table" => BlockKind::Table,
            "img" => BlockKind::Image,
            "li" => BlockKind::List,
            "blockquote" => BlockKind::Quote,
            t if t.len() == 2 && t.starts_with('h') => BlockKind::Heading,
            _ => BlockKind::Generic,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub id: String,
    pub kind: BlockKind,
    pub tag_name: String,
    #[serde(skip)]
    pub node: NodeRef,
    /// Element path from the document root, e.g. `/html[1]/body[1]/p[2]`.
    pub path: String,
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

/// Index every block of `tree` and stamp it with [`BLOCK_ID_ATTR`]. Geometry is
/// shifted by `frame_offset` (left, top) of the surface hosting the tree.
pub fn build_block_index(
    tree: &mut dyn VisualTree,
    oracle: &dyn MeasurementOracle,
    frame_offset: (f32, f32),
) -> Vec<BlockRecord> {
    let (frame_left, frame_top) = frame_offset;
    let nodes = tree.elements_by_tag(tree.body(), BLOCK_TAGS);
    let mut blocks = Vec::new();

    for (idx, node) in nodes.into_iter().enumerate() {
        if !is_indexable(&*tree, oracle, node) {
            continue;
        }
        let rect = oracle.bounding_box(node);
        let id = format!("block_{idx}_{}", rect.top.round().abs() as i64);
        let tag = tree.tag_name(node).unwrap_or_default().to_string();
        blocks.push(BlockRecord {
            id: id.clone(),
            kind: BlockKind::from_tag(&tag),
            tag_name: tag,
            node,
            path: element_path(&*tree, node),
            top: frame_top + rect.top,
            left: frame_left + rect.left,
            width: rect.width,
            height: rect.height,
        });
        tree.set_attribute(node, BLOCK_ID_ATTR, &id);
    }

    log::debug!("Indexed {} blocks", blocks.len());
    blocks
}

fn is_indexable(tree: &dyn VisualTree, oracle: &dyn MeasurementOracle, node: NodeRef) -> bool {
    let rect = oracle.bounding_box(node);
    if rect.width < MIN_BLOCK_PX || rect.height < MIN_BLOCK_PX {
        return false;
    }
    if !tree.has_tag(node, &["table"]) && tree.has_ancestor_tag(node, &["table"]) {
        return false;
    }
    if tree.has_tag(node, &["div"]) {
        return tree.children(node).iter().filter(|c| tree.is_element(**c)).count() <= 1;
    }
    true
}

fn element_path(tree: &dyn VisualTree, node: NodeRef) -> String {
    if let Some(id) = tree.attribute(node, "id") {
        return format!("//*[@id=\"{id}\"]");
    }
    let mut parts = Vec::new();
    let mut current = Some(node);
    while let Some(n) = current {
        let Some(tag) = tree.tag_name(n) else {
            break;
        };
        let mut position = 1;
        let mut sibling = tree.previous_element_sibling(n);
        while let Some(s) = sibling {
            if tree.tag_name(s) == Some(tag) {
                position += 1;
            }
            sibling = tree.previous_element_sibling(s);
        }
        parts.push(format!("{tag}[{position}]"));
        current = tree.parent(n);
    }
    parts.reverse();
    format!("/{}", parts.join("/"))
}

/// Find a block again by the id [`build_block_index`] stamped on it.
pub fn resolve_block_node(tree: &dyn VisualTree, block_id: &str) -> Option<NodeRef> {
    tree.descendants(tree.body())
        .into_iter()
        .find(|n| tree.attribute(*n, BLOCK_ID_ATTR) == Some(block_id))
}

/// Page box used to lay blocks out, in px.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetrics {
    pub width_px: f32,
    pub height_px: f32,
    pub margin_top_px: f32,
    pub margin_bottom_px: f32,
    pub margin_left_px: f32,
    pub margin_right_px: f32,
    pub header_offset_px: f32,
    pub footer_offset_px: f32,
}

impl Default for PageMetrics {
    /// A4 at 96 dpi with one-inch margins.
    fn default() -> Self {
        Self {
            width_px: 794.0,
            height_px: 1123.0,
            margin_top_px: 96.0,
            margin_bottom_px: 96.0,
            margin_left_px: 96.0,
            margin_right_px: 96.0,
            header_offset_px: 36.0,
            footer_offset_px: 36.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSlot {
    pub index: usize,
    pub start_y: f32,
    pub end_y: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPagination {
    pub pages: Vec<PageSlot>,
    pub block_to_page: HashMap<String, usize>,
    pub total_height: f32,
}

/// Stack blocks into pages by height. A block taller than the content area spans
/// as many extra pages as it fills.
pub fn paginate_blocks(blocks: &[BlockRecord], metrics: &PageMetrics) -> BlockPagination {
    let page_height = metrics.height_px;
    if blocks.is_empty() {
        return BlockPagination {
            pages: vec![page_slot(0, page_height)],
            block_to_page: HashMap::new(),
            total_height: page_height,
        };
    }

    let content_top = metrics.margin_top_px + metrics.header_offset_px;
    let content_bottom = page_height - metrics.margin_bottom_px - metrics.footer_offset_px;
    let content_height = (content_bottom - content_top).max(1.0);

    let mut pages = Vec::new();
    let mut block_to_page = HashMap::new();
    let mut page_index = 0usize;
    let mut page_start = 0.0f32;
    let mut cursor = content_top;

    for block in blocks {
        let height = block.height.max(1.0);
        if cursor + height > page_start + content_bottom && cursor > page_start + content_top {
            pages.push(page_slot(page_index, page_height));
            page_index += 1;
            page_start = page_index as f32 * page_height;
            cursor = page_start + content_top;
        }

        block_to_page.insert(block.id.clone(), page_index);
        cursor += height;

        if height > content_height {
            for _ in 0..(height / content_height).floor() as usize {
                pages.push(page_slot(page_index, page_height));
                page_index += 1;
            }
            page_start = page_index as f32 * page_height;
            cursor = page_start + content_top + height % content_height;
            block_to_page.insert(block.id.clone(), page_index);
        }
    }

    pages.push(page_slot(page_index, page_height));
    let total_height = pages.len() as f32 * page_height;
    BlockPagination {
        pages,
        block_to_page,
        total_height,
    }
}

fn page_slot(index: usize, page_height: f32) -> PageSlot {
    PageSlot {
        index,
        start_y: index as f32 * page_height,
        end_y: (index + 1) as f32 * page_height,
    }
}
