//! Document model builder: walks `word/document.xml` into a paragraph arena and block
//! structure with fully resolved formatting.

mod numbering;
mod styles;

use std::collections::{BTreeSet, HashSet};
use std::io::Cursor;

use crate::error::{Diagnostic, Error, Result};
use crate::model::{
    Block, BodyDefaults, DocumentModel, ImagePlaceholder, Indent, PageGeometry, ParagraphProfile,
    Run, Table, TableCell, TableRow, TextIndent, VMerge,
};
use crate::package::{Package, Relationships};

use numbering::Numbering;
use styles::{CellMargins, ParaProps, ResolvedStyle, RunProps, StyleSheet, ThemeFonts};

pub(crate) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub(crate) const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const WPD_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const STYLES_PART: &str = "word/styles.xml";
const NUMBERING_PART: &str = "word/numbering.xml";
const FONT_TABLE_PART: &str = "word/fontTable.xml";
const THEME_PART: &str = "word/theme/theme1.xml";

pub(crate) fn twips_to_px(twips: f32) -> f32 {
    twips / 15.0
}

pub(crate) fn half_points_to_px(half_points: f32) -> f32 {
    half_points / 2.0 * 4.0 / 3.0
}

fn emu_to_px(emu: f32) -> f32 {
    emu / 9525.0
}

/// `RRGGBB` → `#RRGGBB`. `auto` and malformed values are unspecified.
pub(crate) fn parse_hex_color(val: &str) -> Option<String> {
    if val == "auto" || val.len() != 6 || !val.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("#{}", val.to_ascii_uppercase()))
}

pub(crate) fn highlight_color(name: &str) -> Option<String> {
    let hex = match name {
        "yellow" => "#FFFF00",
        "green" => "#00FF00",
        "cyan" => "#00FFFF",
        "magenta" => "#FF00FF",
        "red" => "#FF0000",
        "blue" => "#0000FF",
        "darkYellow" => "#808000",
        "darkGreen" => "#008000",
        "darkCyan" => "#008080",
        "darkMagenta" => "#800080",
        "darkRed" => "#800000",
        "darkBlue" => "#000080",
        "lightGray" => "#C0C0C0",
        "darkGray" => "#808080",
        "black" => "#000000",
        "white" => "#FFFFFF",
        _ => return None,
    };
    Some(hex.to_string())
}

/// Parse a WML boolean toggle element (e.g., w:b, w:i, w:strike).
/// Present with no val or val != "0"/"false" means true.
pub(crate) fn wml_bool(parent: roxmltree::Node, name: &str) -> Option<bool> {
    wml(parent, name).map(|n| {
        n.attribute((WML_NS, "val"))
            .is_none_or(|v| v != "0" && v != "false" && v != "off")
    })
}

pub(crate) fn wml<'a>(
    node: roxmltree::Node<'a, 'a>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(WML_NS))
}

pub(crate) fn wml_attr<'a>(node: roxmltree::Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

pub(crate) fn twips_attr(node: roxmltree::Node, attr: &str) -> Option<f32> {
    node.attribute((WML_NS, attr))
        .and_then(|v| v.parse::<f32>().ok())
        .map(twips_to_px)
}

fn is_wml(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

/// Flatten SDT wrappers: descend into w:sdtContent and collect effective children.
fn collect_block_nodes<'a>(parent: roxmltree::Node<'a, 'a>) -> Vec<roxmltree::Node<'a, 'a>> {
    let mut nodes = Vec::new();
    for child in parent.children() {
        if is_wml(child, "sdt") {
            if let Some(content) = wml(child, "sdtContent") {
                nodes.extend(collect_block_nodes(content));
            }
        } else {
            nodes.push(child);
        }
    }
    nodes
}

/// Run containers Word nests inside a paragraph; their runs are visible text.
fn collect_run_nodes<'a>(parent: roxmltree::Node<'a, 'a>, out: &mut Vec<roxmltree::Node<'a, 'a>>) {
    for child in parent.children() {
        if child.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match child.tag_name().name() {
            "r" => out.push(child),
            "hyperlink" | "smartTag" | "fldSimple" | "ins" | "customXml" => {
                collect_run_nodes(child, out)
            }
            "sdt" => {
                if let Some(content) = wml(child, "sdtContent") {
                    collect_run_nodes(content, out);
                }
            }
            _ => {}
        }
    }
}

fn parse_section_properties(sect: roxmltree::Node) -> PageGeometry {
    let defaults = PageGeometry::default();
    let pg_sz = wml(sect, "pgSz");
    let pg_mar = wml(sect, "pgMar");
    let margin = |name: &str, fallback: f32| {
        pg_mar
            .and_then(|n| twips_attr(n, name))
            .map(f32::abs)
            .unwrap_or(fallback)
    };
    PageGeometry {
        width_px: pg_sz
            .and_then(|n| twips_attr(n, "w"))
            .unwrap_or(defaults.width_px),
        height_px: pg_sz
            .and_then(|n| twips_attr(n, "h"))
            .unwrap_or(defaults.height_px),
        margin_top_px: margin("top", defaults.margin_top_px),
        margin_bottom_px: margin("bottom", defaults.margin_bottom_px),
        margin_left_px: margin("left", defaults.margin_left_px),
        margin_right_px: margin("right", defaults.margin_right_px),
    }
}

fn probe_image(data: &[u8]) -> Option<(u32, u32, &'static str)> {
    let reader = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?;
    let mime = reader.format()?.to_mime_type();
    let (w, h) = reader.into_dimensions().ok()?;
    Some((w, h, mime))
}

fn font_table_names(xml_content: &str) -> Vec<String> {
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        return Vec::new();
    };
    xml.root_element()
        .children()
        .filter(|n| is_wml(*n, "font"))
        .filter_map(|n| n.attribute((WML_NS, "name")))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

struct ParsedRuns {
    runs: Vec<Run>,
    text: String,
    rendered_break: bool,
    /// Paragraph text length at the last explicit page break.
    page_break_at: Option<usize>,
    /// A drawing follows the last explicit page break.
    media_after_break: bool,
}

struct Builder<'p> {
    package: &'p Package,
    theme: ThemeFonts,
    styles: StyleSheet,
    numbering: Numbering,
    rels: Relationships,
    paragraphs: Vec<ParagraphProfile>,
    fonts: BTreeSet<String>,
    diagnostics: Vec<Diagnostic>,
    unknown_styles: HashSet<String>,
    break_pending: bool,
    section_pending: bool,
    last_section: Option<PageGeometry>,
}

impl<'p> Builder<'p> {
    fn new(package: &'p Package, main_name: &str) -> Self {
        let mut diagnostics = Vec::new();
        let mut optional_text = |name: &str| -> Option<String> {
            let Some(part) = package.optional_part(name) else {
                diagnostics.push(Diagnostic::PartMissing {
                    part: name.to_string(),
                });
                return None;
            };
            match part.text() {
                Ok(text) => Some(text.to_string()),
                Err(e) => {
                    log::warn!("{e}");
                    None
                }
            }
        };

        let theme_name = package
            .part_names()
            .find(|n| n.starts_with("word/theme/") && n.ends_with(".xml"))
            .unwrap_or(THEME_PART)
            .to_string();
        let theme = optional_text(&theme_name)
            .map(|xml| ThemeFonts::parse(&xml))
            .unwrap_or_default();
        let styles = optional_text(STYLES_PART)
            .map(|xml| StyleSheet::parse(&xml, &theme))
            .unwrap_or_default();
        let numbering = optional_text(NUMBERING_PART)
            .map(|xml| Numbering::parse(&xml))
            .unwrap_or_default();
        let fonts: BTreeSet<String> = optional_text(FONT_TABLE_PART)
            .map(|xml| font_table_names(&xml).into_iter().collect())
            .unwrap_or_default();

        diagnostics.extend(styles.diagnostics.iter().cloned());

        Self {
            package,
            theme,
            styles,
            numbering,
            rels: package.relationships(main_name),
            paragraphs: Vec::new(),
            fonts,
            diagnostics,
            unknown_styles: HashSet::new(),
            break_pending: false,
            section_pending: false,
            last_section: None,
        }
    }

    fn blocks(&mut self, parent: roxmltree::Node, in_table: bool) -> Vec<Block> {
        let mut blocks = Vec::new();
        for node in collect_block_nodes(parent) {
            if node.tag_name().namespace() != Some(WML_NS) {
                continue;
            }
            match node.tag_name().name() {
                "p" => blocks.push(Block::Paragraph(self.paragraph(node, in_table))),
                "tbl" => blocks.push(Block::Table(self.table(node))),
                _ => {}
            }
        }
        blocks
    }

    fn paragraph_style(&mut self, ppr: Option<roxmltree::Node>) -> Option<ResolvedStyle> {
        let requested = ppr.and_then(|ppr| wml_attr(ppr, "pStyle"));
        if let Some(id) = requested
            && self.styles.get(id).is_none()
            && self.unknown_styles.insert(id.to_string())
        {
            self.diagnostics.push(Diagnostic::MalformedStyleChain {
                style_id: id.to_string(),
                reason: "paragraph style is not defined; default paragraph style used".into(),
            });
        }
        self.styles.paragraph_style(requested).cloned()
    }

    fn paragraph(&mut self, node: roxmltree::Node, in_table: bool) -> usize {
        let ppr = wml(node, "pPr");
        let style = self.paragraph_style(ppr);
        let direct = ppr.map(ParaProps::parse).unwrap_or_default();

        let mut props = self.styles.doc_para.clone();
        if let Some(style) = &style {
            props.merge(&style.para);
        }
        props.merge(&direct);

        let mut base_run = self.styles.doc_run.clone();
        if let Some(style) = &style {
            base_run.merge(&style.run);
        }
        let parsed = self.runs(node, &base_run);

        let list = props.num_id.and_then(|num_id| {
            self.numbering
                .binding(num_id, props.num_level.unwrap_or(0))
        });
        let level_indent = list.as_ref().map(|(_, indent)| *indent).unwrap_or_default();

        // Direct indentation beats the list level, which beats the style.
        let indent = Indent {
            left_px: direct
                .indent_left_px
                .or(level_indent.left_px)
                .or(props.indent_left_px),
            right_px: props.indent_right_px,
            text: direct
                .text_indent
                .or(level_indent.hanging_px.map(TextIndent::Hanging))
                .or(props.text_indent),
        };

        let mut page_break_before =
            props.page_break_before.unwrap_or(false) || std::mem::take(&mut self.break_pending);
        if let Some(at) = parsed.page_break_at {
            if parsed.text[at..].trim().is_empty() && !parsed.media_after_break {
                self.break_pending = true;
            } else {
                page_break_before = true;
            }
        }
        if parsed.rendered_break {
            self.break_pending = true;
        }

        let section_break_before = std::mem::take(&mut self.section_pending);
        if let Some(sect) = ppr.and_then(|ppr| wml(ppr, "sectPr")) {
            self.section_pending = true;
            self.last_section = Some(parse_section_properties(sect));
        }

        let index = self.paragraphs.len();
        self.paragraphs.push(ParagraphProfile {
            index,
            style_id: style.as_ref().map(|s| s.id.clone()),
            style_name: style.as_ref().and_then(|s| s.name.clone()),
            text: parsed.text,
            alignment: props.alignment.unwrap_or_default(),
            before_px: props.before_px,
            after_px: props.after_px,
            line_height: props.line_height,
            indent,
            list: list.map(|(binding, _)| binding),
            keep_next: props.keep_next.unwrap_or(false),
            keep_lines: props.keep_lines.unwrap_or(false),
            page_break_before,
            section_break_before,
            in_table,
            runs: parsed.runs,
        });
        index
    }

    fn runs(&mut self, para: roxmltree::Node, base: &RunProps) -> ParsedRuns {
        let mut run_nodes = Vec::new();
        collect_run_nodes(para, &mut run_nodes);

        let mut parsed = ParsedRuns {
            runs: Vec::new(),
            text: String::new(),
            rendered_break: false,
            page_break_at: None,
            media_after_break: false,
        };

        for run_node in run_nodes {
            let direct = wml(run_node, "rPr")
                .map(|rpr| RunProps::parse(rpr, &self.theme))
                .unwrap_or_default();
            let mut props = base.clone();
            if let Some(cs) = direct
                .style_id
                .as_deref()
                .and_then(|id| self.styles.character_style(id))
            {
                props.merge(&cs.run);
            }
            props.merge(&direct);
            let style = props.materialize();
            for family in [&props.font_family, &props.east_asia_family].into_iter().flatten() {
                self.fonts.insert(family.clone());
            }

            let mut text = String::new();
            for child in run_node.children() {
                if child.tag_name().namespace() != Some(WML_NS) {
                    continue;
                }
                match child.tag_name().name() {
                    // Word treats newlines in w:t as whitespace; only w:br creates line breaks
                    "t" => text.push_str(&child.text().unwrap_or_default().replace('\n', " ")),
                    "tab" => text.push('\t'),
                    "noBreakHyphen" => text.push('\u{2011}'),
                    "cr" => text.push('\n'),
                    "br" => match child.attribute((WML_NS, "type")) {
                        Some("page") => {
                            parsed.page_break_at = Some(parsed.text.len() + text.len());
                            parsed.media_after_break = false;
                        }
                        Some("column") => {}
                        _ => text.push('\n'),
                    },
                    "lastRenderedPageBreak" => parsed.rendered_break = true,
                    "drawing" => {
                        if !text.is_empty() {
                            parsed.text.push_str(&text);
                            parsed.runs.push(Run {
                                text: std::mem::take(&mut text),
                                style: style.clone(),
                                image: None,
                            });
                        }
                        if let Some(image) = self.drawing(child) {
                            parsed.media_after_break |= parsed.page_break_at.is_some();
                            parsed.runs.push(Run {
                                text: String::new(),
                                style: style.clone(),
                                image: Some(image),
                            });
                        }
                    }
                    _ => {}
                }
            }
            if !text.is_empty() {
                parsed.text.push_str(&text);
                parsed.runs.push(Run {
                    text,
                    style,
                    image: None,
                });
            }
        }
        parsed
    }

    fn drawing(&mut self, drawing: roxmltree::Node) -> Option<ImagePlaceholder> {
        let container = drawing.children().find(|n| {
            let name = n.tag_name().name();
            (name == "inline" || name == "anchor") && n.tag_name().namespace() == Some(WPD_NS)
        })?;
        let extent = container
            .children()
            .find(|n| n.tag_name().name() == "extent" && n.tag_name().namespace() == Some(WPD_NS));
        let emu = |attr: &str| {
            extent
                .and_then(|n| n.attribute(attr))
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.0)
        };
        let rel_id = container
            .descendants()
            .find(|n| n.tag_name().name() == "blip" && n.tag_name().namespace() == Some(DML_NS))
            .and_then(|n| n.attribute((REL_NS, "embed")))?
            .to_string();

        let mut placeholder = ImagePlaceholder {
            rel_id: rel_id.clone(),
            part_name: None,
            mime_type: None,
            data: Vec::new(),
            intrinsic_width_px: 0,
            intrinsic_height_px: 0,
            frame_width_px: emu_to_px(emu("cx")),
            frame_height_px: emu_to_px(emu("cy")),
        };

        let part = self
            .rels
            .get(&rel_id)
            .filter(|r| !r.external)
            .and_then(|r| self.package.optional_part(&r.target));
        let Some(part) = part else {
            log::warn!("Drawing references unresolved media relationship {rel_id}");
            self.diagnostics
                .push(Diagnostic::UnresolvedMediaReference { rel_id });
            return Some(placeholder);
        };

        placeholder.part_name = Some(part.name.clone());
        placeholder.data = part.bytes.clone();
        match probe_image(&part.bytes) {
            Some((w, h, mime)) => {
                placeholder.intrinsic_width_px = w;
                placeholder.intrinsic_height_px = h;
                placeholder.mime_type = Some(mime);
            }
            None => {
                log::debug!("Could not probe dimensions of {}", part.name);
                placeholder.mime_type = image::ImageFormat::from_path(&part.name)
                    .ok()
                    .map(|f| f.to_mime_type());
            }
        }
        Some(placeholder)
    }

    fn table(&mut self, tbl: roxmltree::Node) -> Table {
        let tbl_pr = wml(tbl, "tblPr");
        let style_id = tbl_pr.and_then(|pr| wml_attr(pr, "tblStyle"));
        let mut margins = self.styles.table_cell_margins(style_id);
        if let Some(direct) = tbl_pr.and_then(|pr| wml(pr, "tblCellMar")) {
            margins.merge(&CellMargins::parse(direct));
        }

        let mut rows = Vec::new();
        for tr in collect_block_nodes(tbl).into_iter().filter(|n| is_wml(*n, "tr")) {
            let mut cells = Vec::new();
            for tc in collect_block_nodes(tr).into_iter().filter(|n| is_wml(*n, "tc")) {
                let tc_pr = wml(tc, "tcPr");
                let grid_span = tc_pr
                    .and_then(|pr| wml_attr(pr, "gridSpan"))
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or(1)
                    .max(1);
                let v_merge = tc_pr
                    .and_then(|pr| wml(pr, "vMerge"))
                    .map(|n| match n.attribute((WML_NS, "val")) {
                        Some("restart") => VMerge::Restart,
                        _ => VMerge::Continue,
                    })
                    .unwrap_or_default();
                let width_px = tc_pr
                    .and_then(|pr| wml(pr, "tcW"))
                    .filter(|w| w.attribute((WML_NS, "type")).is_none_or(|t| t == "dxa"))
                    .and_then(|w| twips_attr(w, "w"))
                    .filter(|w| *w > 0.0);
                cells.push(TableCell {
                    blocks: self.blocks(tc, true),
                    grid_span,
                    v_merge,
                    width_px,
                });
            }
            rows.push(TableRow { cells });
        }

        Table {
            style_id: style_id.map(str::to_string),
            cell_padding: margins.to_padding(),
            rows,
        }
    }

    fn body_defaults(&self) -> BodyDefaults {
        let fallback = BodyDefaults::default();
        let mut para = self.styles.doc_para.clone();
        let mut run = self.styles.doc_run.clone();
        if let Some(style) = self.styles.default_paragraph() {
            para.merge(&style.para);
            run.merge(&style.run);
        }
        BodyDefaults {
            font_px: run.font_size_px.unwrap_or(fallback.font_px),
            font_family: run.family_list(),
            line_height: para.line_height.unwrap_or(fallback.line_height),
            after_px: para.after_px.unwrap_or(fallback.after_px),
        }
    }
}

/// Build the document model of an opened package.
pub fn build(package: &Package, source_name: &str) -> Result<DocumentModel> {
    let start = std::time::Instant::now();
    let main_name = package.main_document_name();
    let main = package.part(&main_name)?;
    let xml_content = main.text()?;
    let xml = roxmltree::Document::parse(xml_content).map_err(|source| Error::Xml {
        part: main_name.clone(),
        source,
    })?;
    let body = wml(xml.root_element(), "body")
        .ok_or_else(|| Error::CorruptArchive(format!("{main_name} has no w:body")))?;

    let mut builder = Builder::new(package, &main_name);
    let blocks = builder.blocks(body, false);

    let page = body
        .children()
        .filter(|n| is_wml(*n, "sectPr"))
        .last()
        .map(parse_section_properties)
        .or(builder.last_section)
        .unwrap_or_default();
    let body_defaults = builder.body_defaults();
    if let Some(family) = &body_defaults.font_family {
        builder.fonts.extend(family.split(", ").map(str::to_string));
    }

    for diagnostic in &builder.diagnostics {
        log::warn!("{source_name}: {diagnostic}");
    }
    log::info!(
        "Built model of {source_name}: {} paragraphs, {} blocks in {:.1}ms",
        builder.paragraphs.len(),
        blocks.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(DocumentModel {
        source_name: source_name.to_string(),
        paragraphs: builder.paragraphs,
        blocks,
        page,
        body: body_defaults,
        fonts: builder.fonts,
        diagnostics: builder.diagnostics,
    })
}
