//! The visual tree seam: a narrow handle over an externally rendered node tree, the
//! measurement oracle that reports its geometry, and [`Dom`], the in-crate tree.

use crate::css;

/// Handle to one node of a [`VisualTree`]. Only meaningful for the tree that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(pub usize);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ComputedLineHeight {
    Normal,
    Px(f32),
    Number(f32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComputedStyle {
    pub font_size_px: f32,
    pub line_height: ComputedLineHeight,
    pub margin_bottom_px: f32,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            font_size_px: 16.0,
            line_height: ComputedLineHeight::Normal,
            margin_bottom_px: 0.0,
        }
    }
}

impl ComputedStyle {
    /// Used line height in px; `normal` is 1.2 × font size.
    pub fn line_height_px(&self) -> f32 {
        match self.line_height {
            ComputedLineHeight::Normal => self.font_size_px * 1.2,
            ComputedLineHeight::Px(px) => px,
            ComputedLineHeight::Number(n) => n * self.font_size_px,
        }
    }
}

/// Geometry of a rendered tree. Two-phase: callers invoke [`request_remeasure`] after
/// mutating the tree and only then read boxes and styles.
///
/// [`request_remeasure`]: MeasurementOracle::request_remeasure
pub trait MeasurementOracle {
    fn request_remeasure(&mut self, _tree: &dyn VisualTree) {}

    fn bounding_box(&self, node: NodeRef) -> Rect;

    fn computed_style(&self, node: NodeRef) -> ComputedStyle;
}

/// Oracle for headless use: every box is empty and every style is the UA default, so
/// pagination falls back to line heights.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnmeasuredOracle;

impl MeasurementOracle for UnmeasuredOracle {
    fn bounding_box(&self, _node: NodeRef) -> Rect {
        Rect::default()
    }

    fn computed_style(&self, _node: NodeRef) -> ComputedStyle {
        ComputedStyle::default()
    }
}

pub trait VisualTree {
    fn body(&self) -> NodeRef;

    fn head(&self) -> NodeRef;

    /// Lowercase tag name; `None` for text nodes.
    fn tag_name(&self, node: NodeRef) -> Option<&str>;

    /// Content of a text node; `None` for elements.
    fn text(&self, node: NodeRef) -> Option<&str>;

    fn children(&self, node: NodeRef) -> Vec<NodeRef>;

    fn parent(&self, node: NodeRef) -> Option<NodeRef>;

    fn attribute(&self, node: NodeRef, name: &str) -> Option<&str>;

    fn set_attribute(&mut self, node: NodeRef, name: &str, value: &str);

    fn remove_attribute(&mut self, node: NodeRef, name: &str);

    fn create_element(&mut self, tag: &str) -> NodeRef;

    fn create_text(&mut self, text: &str) -> NodeRef;

    /// Attach `node` under `parent` before `reference`, or last when `reference` is
    /// `None`. A node that is already attached moves.
    fn insert_before(&mut self, parent: NodeRef, node: NodeRef, reference: Option<NodeRef>);

    /// Remove `node` and its subtree. Handles into the removed subtree must not be
    /// used afterwards.
    fn remove(&mut self, node: NodeRef);

    fn is_element(&self, node: NodeRef) -> bool {
        self.tag_name(node).is_some()
    }

    fn has_tag(&self, node: NodeRef, tags: &[&str]) -> bool {
        self.tag_name(node).is_some_and(|t| tags.contains(&t))
    }

    fn text_content(&self, node: NodeRef) -> String {
        let mut out = String::new();
        if let Some(t) = self.text(node) {
            out.push_str(t);
        }
        for d in self.descendants(node) {
            if let Some(t) = self.text(d) {
                out.push_str(t);
            }
        }
        out
    }

    /// Pre-order descendants, excluding `node` itself.
    fn descendants(&self, node: NodeRef) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeRef> = self.children(node).into_iter().rev().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).into_iter().rev());
        }
        out
    }

    fn elements_by_tag(&self, root: NodeRef, tags: &[&str]) -> Vec<NodeRef> {
        self.descendants(root)
            .into_iter()
            .filter(|n| self.has_tag(*n, tags))
            .collect()
    }

    fn has_descendant_tag(&self, node: NodeRef, tags: &[&str]) -> bool {
        self.descendants(node).into_iter().any(|n| self.has_tag(n, tags))
    }

    fn element_by_id(&self, id: &str) -> Option<NodeRef> {
        let root = self.parent(self.body()).unwrap_or(self.body());
        self.descendants(root)
            .into_iter()
            .find(|n| self.attribute(*n, "id") == Some(id))
    }

    fn has_ancestor_tag(&self, node: NodeRef, tags: &[&str]) -> bool {
        let mut cur = self.parent(node);
        while let Some(p) = cur {
            if self.has_tag(p, tags) {
                return true;
            }
            cur = self.parent(p);
        }
        false
    }

    fn previous_element_sibling(&self, node: NodeRef) -> Option<NodeRef> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|s| *s == node)?;
        siblings[..pos]
            .iter()
            .rev()
            .find(|s| self.is_element(**s))
            .copied()
    }

    fn clear_children(&mut self, node: NodeRef) {
        for child in self.children(node) {
            self.remove(child);
        }
    }

    fn prepend(&mut self, parent: NodeRef, node: NodeRef) {
        let first = self.children(parent).first().copied();
        self.insert_before(parent, node, first);
    }

    fn set_text_content(&mut self, node: NodeRef, text: &str) {
        self.clear_children(node);
        let t = self.create_text(text);
        self.insert_before(node, t, None);
    }

    fn style_property(&self, node: NodeRef, property: &str) -> Option<String> {
        self.attribute(node, "style")
            .and_then(|style| css::get_property(style, property))
    }

    fn set_style_property(&mut self, node: NodeRef, property: &str, value: &str, important: bool) {
        let style = self.attribute(node, "style").unwrap_or_default();
        let updated = css::set_property(style, property, value, important);
        self.set_attribute(node, "style", &updated);
    }

    fn remove_style_property(&mut self, node: NodeRef, property: &str) {
        let Some(style) = self.attribute(node, "style") else {
            return;
        };
        let updated = css::remove_property(style, property);
        if updated.is_empty() {
            self.remove_attribute(node, "style");
        } else {
            self.set_attribute(node, "style", &updated);
        }
    }

    fn has_class(&self, node: NodeRef, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    fn add_class(&mut self, node: NodeRef, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        let classes = match self.attribute(node, "class") {
            Some(c) if !c.trim().is_empty() => format!("{} {class}", c.trim()),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", &classes);
    }

    fn remove_class(&mut self, node: NodeRef, class: &str) {
        let Some(current) = self.attribute(node, "class") else {
            return;
        };
        let remaining: Vec<&str> = current.split_whitespace().filter(|c| *c != class).collect();
        if remaining.is_empty() {
            self.remove_attribute(node, "class");
        } else {
            let joined = remaining.join(" ");
            self.set_attribute(node, "class", &joined);
        }
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Clone, Debug)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Clone, Debug)]
struct DomNode {
    data: NodeData,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
}

/// Arena-backed HTML tree. Removed subtrees go on a free list and their slots are
/// reused by later `create_*` calls, so repeated passes do not grow the arena.
#[derive(Clone, Debug)]
pub struct Dom {
    nodes: Vec<DomNode>,
    free: Vec<NodeRef>,
    head: NodeRef,
    body: NodeRef,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// An empty `html`/`head`/`body` document.
    pub fn new() -> Self {
        let mut dom = Dom {
            nodes: Vec::new(),
            free: Vec::new(),
            head: NodeRef(0),
            body: NodeRef(0),
        };
        let html = dom.create_element("html");
        dom.head = dom.create_element("head");
        dom.body = dom.create_element("body");
        dom.insert_before(html, dom.head, None);
        dom.insert_before(html, dom.body, None);
        dom
    }

    /// Parse a document or fragment. Fragments land in `body`.
    pub fn parse(html: &str) -> Self {
        let parsed = scraper::Html::parse_document(html);
        let mut dom = Dom::new();
        let root = parsed.root_element();
        for child in root.children() {
            let Some(element) = scraper::ElementRef::wrap(child) else {
                continue;
            };
            let target = match element.value().name() {
                "head" => dom.head,
                "body" => dom.body,
                _ => continue,
            };
            for (name, value) in element.value().attrs() {
                dom.set_attribute(target, name, value);
            }
            dom.import_children(element, target);
        }
        dom
    }

    fn import_children(&mut self, source: scraper::ElementRef, target: NodeRef) {
        for child in source.children() {
            if let Some(element) = scraper::ElementRef::wrap(child) {
                let node = self.create_element(element.value().name());
                for (name, value) in element.value().attrs() {
                    self.set_attribute(node, name, value);
                }
                self.insert_before(target, node, None);
                self.import_children(element, node);
            } else if let Some(text) = child.value().as_text() {
                let node = self.create_text(text);
                self.insert_before(target, node, None);
            }
        }
    }

    /// Slots allocated in the arena, free ones included.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn html(&self) -> NodeRef {
        self.nodes[self.body.0].parent.unwrap_or(self.body)
    }

    /// Serialize the whole document, doctype included.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>");
        self.write_node(self.html(), &mut out);
        out
    }

    pub fn inner_html(&self, node: NodeRef) -> String {
        let mut out = String::new();
        for child in &self.nodes[node.0].children {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, node: NodeRef, out: &mut String) {
        match &self.nodes[node.0].data {
            NodeData::Text(text) => {
                let raw = self
                    .tag_name_of_parent(node)
                    .is_some_and(|t| t == "style" || t == "script");
                if raw {
                    out.push_str(text);
                } else {
                    out.push_str(&css::escape_text(text));
                }
            }
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push_str(&format!(" {name}=\"{}\"", css::escape_attr(value)));
                }
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                out.push_str(&self.inner_html(node));
                out.push_str(&format!("</{tag}>"));
            }
        }
    }

    fn tag_name_of_parent(&self, node: NodeRef) -> Option<&str> {
        self.nodes[node.0]
            .parent
            .and_then(|p| self.tag_name(p))
    }

    fn detach(&mut self, node: NodeRef) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeRef {
        let node = DomNode {
            data,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot.0] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                NodeRef(self.nodes.len() - 1)
            }
        }
    }

    /// Put `node` and its subtree on the free list. `node` must already be detached.
    fn release(&mut self, node: NodeRef) {
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            let slot = &mut self.nodes[n.0];
            stack.append(&mut slot.children);
            slot.parent = None;
            slot.data = NodeData::Text(String::new());
            self.free.push(n);
        }
    }
}

impl VisualTree for Dom {
    fn body(&self) -> NodeRef {
        self.body
    }

    fn head(&self) -> NodeRef {
        self.head
    }

    fn tag_name(&self, node: NodeRef) -> Option<&str> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    fn text(&self, node: NodeRef) -> Option<&str> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } => None,
        }
    }

    fn children(&self, node: NodeRef) -> Vec<NodeRef> {
        self.nodes
            .get(node.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.nodes.get(node.0)?.parent
    }

    fn attribute(&self, node: NodeRef, name: &str) -> Option<&str> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            NodeData::Text(_) => None,
        }
    }

    fn set_attribute(&mut self, node: NodeRef, name: &str, value: &str) {
        let Some(DomNode {
            data: NodeData::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(node.0)
        else {
            return;
        };
        match attrs.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value.to_string(),
            None => attrs.push((name.to_ascii_lowercase(), value.to_string())),
        }
    }

    fn remove_attribute(&mut self, node: NodeRef, name: &str) {
        if let Some(DomNode {
            data: NodeData::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(node.0)
        {
            attrs.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        }
    }

    fn create_element(&mut self, tag: &str) -> NodeRef {
        self.alloc(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> NodeRef {
        self.alloc(NodeData::Text(text.to_string()))
    }

    fn insert_before(&mut self, parent: NodeRef, node: NodeRef, reference: Option<NodeRef>) {
        if parent.0 >= self.nodes.len() || node.0 >= self.nodes.len() || parent == node {
            return;
        }
        self.detach(node);
        let children = &mut self.nodes[parent.0].children;
        let at = reference
            .and_then(|r| children.iter().position(|c| *c == r))
            .unwrap_or(children.len());
        children.insert(at, node);
        self.nodes[node.0].parent = Some(parent);
    }

    fn remove(&mut self, node: NodeRef) {
        let root = [self.html(), self.head, self.body];
        if node.0 < self.nodes.len() && !root.contains(&node) && !self.free.contains(&node) {
            self.detach(node);
            self.release(node);
        }
    }
}
