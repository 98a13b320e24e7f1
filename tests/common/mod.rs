#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};

use docx_fidelity::tree::{ComputedStyle, Rect};
use docx_fidelity::{Dom, MeasurementOracle, NodeRef, VisualTree};
use zip::write::SimpleFileOptions;

const NAMESPACES: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture""#,
);

pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document {NAMESPACES}><w:body>{body}</w:body></w:document>"#
    )
}

pub fn styles_xml(inner: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:styles {NAMESPACES}>{inner}</w:styles>"#
    )
}

pub fn numbering_xml(inner: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:numbering {NAMESPACES}>{inner}</w:numbering>"#
    )
}

/// `word/_rels/document.xml.rels` with image relationships `(id, target)`.
pub fn image_rels_xml(rels: &[(&str, &str)]) -> String {
    let entries: String = rels
        .iter()
        .map(|(id, target)| {
            format!(
                r#"<Relationship Id="{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="{target}"/>"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{entries}</Relationships>"#
    )
}

/// Inline drawing of `cx` × `cy` EMU pointing at relationship `rel_id`.
pub fn drawing_xml(rel_id: &str, cx: u64, cy: u64) -> String {
    format!(
        r#"<w:drawing><wp:inline><wp:extent cx="{cx}" cy="{cy}"/><a:graphic><a:graphicData><pic:pic><pic:blipFill><a:blip r:embed="{rel_id}"/></pic:blipFill></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#
    )
}

/// In-memory DOCX package.
pub struct DocxBuilder {
    parts: Vec<(String, Vec<u8>)>,
}

impl DocxBuilder {
    /// Package whose main document has `body` inside `w:body`.
    pub fn new(body: &str) -> Self {
        Self {
            parts: vec![("word/document.xml".to_string(), document_xml(body).into_bytes())],
        }
    }

    /// Package without a main document part.
    pub fn empty() -> Self {
        Self { parts: Vec::new() }
    }

    pub fn part(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.parts.push((name.to_string(), content.into()));
        self
    }

    pub fn styles(self, inner: &str) -> Self {
        self.part("word/styles.xml", styles_xml(inner))
    }

    pub fn numbering(self, inner: &str) -> Self {
        self.part("word/numbering.xml", numbering_xml(inner))
    }

    pub fn build(self) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, bytes) in &self.parts {
            zip.start_file(name.as_str(), options).expect("start zip entry");
            zip.write_all(bytes).expect("write zip entry");
        }
        zip.finish().expect("finish zip").into_inner()
    }
}

/// Oracle returning scripted boxes and styles; unknown nodes get an empty box and
/// the default style.
#[derive(Default)]
pub struct ScriptedOracle {
    pub boxes: HashMap<NodeRef, Rect>,
    pub styles: HashMap<NodeRef, ComputedStyle>,
    pub remeasures: usize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_box(&mut self, node: NodeRef, top: f32, left: f32, width: f32, height: f32) {
        self.boxes.insert(
            node,
            Rect {
                top,
                left,
                width,
                height,
            },
        );
    }

    pub fn set_height(&mut self, node: NodeRef, height: f32) {
        self.set_box(node, 0.0, 0.0, 500.0, height);
    }

    pub fn set_style(&mut self, node: NodeRef, style: ComputedStyle) {
        self.styles.insert(node, style);
    }
}

impl MeasurementOracle for ScriptedOracle {
    fn request_remeasure(&mut self, _tree: &dyn VisualTree) {
        self.remeasures += 1;
    }

    fn bounding_box(&self, node: NodeRef) -> Rect {
        self.boxes.get(&node).copied().unwrap_or_default()
    }

    fn computed_style(&self, node: NodeRef) -> ComputedStyle {
        self.styles.get(&node).copied().unwrap_or_default()
    }
}

pub fn node(dom: &Dom, id: &str) -> NodeRef {
    dom.element_by_id(id)
        .unwrap_or_else(|| panic!("no element with id {id}"))
}

pub fn count_attr(dom: &Dom, attr: &str) -> usize {
    dom.descendants(dom.body())
        .into_iter()
        .filter(|n| dom.attribute(*n, attr).is_some())
        .count()
}

pub fn count_class(dom: &Dom, class: &str) -> usize {
    dom.descendants(dom.body())
        .into_iter()
        .filter(|n| dom.has_class(*n, class))
        .count()
}
