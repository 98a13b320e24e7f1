use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::Diagnostic;
use crate::model::{Alignment, CellPadding, LineHeight, RunStyle, TextIndent};

use super::{
    DML_NS, WML_NS, half_points_to_px, highlight_color, parse_hex_color, twips_attr, wml,
    wml_attr, wml_bool,
};

fn dml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(DML_NS))
}

fn typeface<'a>(node: roxmltree::Node<'a, 'a>, script: &str) -> Option<&'a str> {
    dml(node, script)
        .and_then(|n| n.attribute("typeface"))
        .filter(|tf| !tf.is_empty())
}

/// Major/minor font schemes of the document theme.
#[derive(Clone, Debug, Default)]
pub(crate) struct ThemeFonts {
    pub(crate) major: Option<String>,
    pub(crate) minor: Option<String>,
    pub(crate) major_east_asia: Option<String>,
    pub(crate) minor_east_asia: Option<String>,
}

impl ThemeFonts {
    pub(crate) fn parse(xml_content: &str) -> Self {
        let mut fonts = ThemeFonts::default();
        let Ok(xml) = roxmltree::Document::parse(xml_content) else {
            log::warn!("Theme part is not well-formed XML; theme fonts ignored");
            return fonts;
        };
        for node in xml.descendants() {
            if node.tag_name().namespace() != Some(DML_NS) {
                continue;
            }
            match node.tag_name().name() {
                "majorFont" => {
                    fonts.major = typeface(node, "latin").map(str::to_string);
                    fonts.major_east_asia = typeface(node, "ea").map(str::to_string);
                }
                "minorFont" => {
                    fonts.minor = typeface(node, "latin").map(str::to_string);
                    fonts.minor_east_asia = typeface(node, "ea").map(str::to_string);
                }
                _ => {}
            }
        }
        fonts
    }

    fn lookup(&self, theme_ref: &str) -> Option<&str> {
        match theme_ref {
            "majorHAnsi" | "majorAscii" | "majorBidi" => self.major.as_deref(),
            "minorHAnsi" | "minorAscii" | "minorBidi" => self.minor.as_deref(),
            "majorEastAsia" => self.major_east_asia.as_deref(),
            "minorEastAsia" => self.minor_east_asia.as_deref(),
            _ => None,
        }
    }
}

/// Resolve the latin and east-asian faces of a `w:rFonts` element. Explicit names win
/// over theme references.
fn resolve_fonts(rfonts: roxmltree::Node, theme: &ThemeFonts) -> (Option<String>, Option<String>) {
    let pick = |explicit: &str, themed: &str| {
        rfonts
            .attribute((WML_NS, explicit))
            .filter(|f| !f.is_empty())
            .or_else(|| {
                rfonts
                    .attribute((WML_NS, themed))
                    .and_then(|t| theme.lookup(t))
            })
            .map(str::to_string)
    };
    let latin = pick("ascii", "asciiTheme").or_else(|| pick("hAnsi", "hAnsiTheme"));
    let east_asia = pick("eastAsia", "eastAsiaTheme");
    (latin, east_asia)
}

pub(crate) fn parse_alignment(val: &str) -> Alignment {
    match val {
        "center" => Alignment::Center,
        "right" | "end" => Alignment::Right,
        "both" | "distribute" => Alignment::Justify,
        _ => Alignment::Left,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum VertAlign {
    Baseline,
    Superscript,
    Subscript,
}

/// Run formatting of one layer. `None` means "not specified here".
#[derive(Clone, Debug, Default)]
pub(crate) struct RunProps {
    pub(crate) font_family: Option<String>,
    pub(crate) east_asia_family: Option<String>,
    pub(crate) font_size_px: Option<f32>,
    pub(crate) color: Option<String>,
    pub(crate) highlight: Option<String>,
    pub(crate) shading: Option<String>,
    pub(crate) spacing_px: Option<f32>,
    pub(crate) bold: Option<bool>,
    pub(crate) italic: Option<bool>,
    pub(crate) underline: Option<bool>,
    pub(crate) strike: Option<bool>,
    pub(crate) vert_align: Option<VertAlign>,
    pub(crate) shadow: Option<bool>,
    pub(crate) style_id: Option<String>,
}

macro_rules! inherit {
    ($target:expr, $layer:expr, $($field:ident),+ $(,)?) => {
        $(
            if $layer.$field.is_some() {
                $target.$field = $layer.$field.clone();
            }
        )+
    };
}

impl RunProps {
    pub(crate) fn parse(rpr: roxmltree::Node, theme: &ThemeFonts) -> Self {
        let (font_family, east_asia_family) = wml(rpr, "rFonts")
            .map(|rfonts| resolve_fonts(rfonts, theme))
            .unwrap_or((None, None));
        let strike = match (wml_bool(rpr, "strike"), wml_bool(rpr, "dstrike")) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(false) || b.unwrap_or(false)),
        };
        RunProps {
            font_family,
            east_asia_family,
            font_size_px: wml_attr(rpr, "sz")
                .and_then(|v| v.parse::<f32>().ok())
                .map(half_points_to_px),
            color: wml_attr(rpr, "color").and_then(parse_hex_color),
            highlight: wml_attr(rpr, "highlight").and_then(highlight_color),
            shading: wml(rpr, "shd")
                .and_then(|shd| shd.attribute((WML_NS, "fill")))
                .and_then(parse_hex_color),
            spacing_px: wml(rpr, "spacing").and_then(|n| twips_attr(n, "val")),
            bold: wml_bool(rpr, "b"),
            italic: wml_bool(rpr, "i"),
            underline: wml(rpr, "u").map(|u| {
                u.attribute((WML_NS, "val"))
                    .is_none_or(|v| v != "none" && v != "0")
            }),
            strike,
            vert_align: wml_attr(rpr, "vertAlign").map(|v| match v {
                "superscript" => VertAlign::Superscript,
                "subscript" => VertAlign::Subscript,
                _ => VertAlign::Baseline,
            }),
            shadow: wml_bool(rpr, "shadow"),
            style_id: wml_attr(rpr, "rStyle").map(str::to_string),
        }
    }

    /// Override-replace merge: every property `layer` specifies wins.
    pub(crate) fn merge(&mut self, layer: &RunProps) {
        inherit!(
            self,
            layer,
            font_family,
            east_asia_family,
            font_size_px,
            color,
            highlight,
            shading,
            spacing_px,
            bold,
            italic,
            underline,
            strike,
            vert_align,
            shadow,
        );
    }

    /// The CSS family list for these props (latin face first).
    pub(crate) fn family_list(&self) -> Option<String> {
        match (&self.font_family, &self.east_asia_family) {
            (Some(latin), Some(ea)) if latin != ea => Some(format!("{latin}, {ea}")),
            (Some(latin), _) => Some(latin.clone()),
            (None, Some(ea)) => Some(ea.clone()),
            (None, None) => None,
        }
    }

    pub(crate) fn materialize(&self) -> RunStyle {
        RunStyle {
            font_family: self.family_list(),
            font_size_px: self.font_size_px,
            color: self.color.clone(),
            highlight_color: self.highlight.clone(),
            shading_color: self.shading.clone(),
            char_spacing_px: self.spacing_px,
            bold: self.bold.unwrap_or(false),
            italic: self.italic.unwrap_or(false),
            underline: self.underline.unwrap_or(false),
            strike: self.strike.unwrap_or(false),
            superscript: self.vert_align == Some(VertAlign::Superscript),
            subscript: self.vert_align == Some(VertAlign::Subscript),
            shadow: self.shadow.unwrap_or(false),
        }
    }
}

/// Paragraph formatting of one layer.
#[derive(Clone, Debug, Default)]
pub(crate) struct ParaProps {
    pub(crate) alignment: Option<Alignment>,
    pub(crate) before_px: Option<f32>,
    pub(crate) after_px: Option<f32>,
    pub(crate) line_height: Option<LineHeight>,
    pub(crate) indent_left_px: Option<f32>,
    pub(crate) indent_right_px: Option<f32>,
    pub(crate) text_indent: Option<TextIndent>,
    pub(crate) keep_next: Option<bool>,
    pub(crate) keep_lines: Option<bool>,
    pub(crate) page_break_before: Option<bool>,
    pub(crate) num_id: Option<u32>,
    pub(crate) num_level: Option<usize>,
}

pub(crate) fn parse_line_height(spacing: roxmltree::Node) -> Option<LineHeight> {
    let line = spacing
        .attribute((WML_NS, "line"))
        .and_then(|v| v.parse::<f32>().ok())?;
    Some(match spacing.attribute((WML_NS, "lineRule")) {
        Some("exact") => LineHeight::Exact(line / 15.0),
        Some("atLeast") => LineHeight::AtLeast(line / 15.0),
        _ => LineHeight::Auto(line / 240.0),
    })
}

impl ParaProps {
    pub(crate) fn parse(ppr: roxmltree::Node) -> Self {
        let spacing = wml(ppr, "spacing");
        let ind = wml(ppr, "ind");
        let num_pr = wml(ppr, "numPr");

        let text_indent = ind.and_then(|ind| {
            let hanging = twips_attr(ind, "hanging").filter(|v| *v != 0.0);
            let first_line = twips_attr(ind, "firstLine");
            hanging
                .map(TextIndent::Hanging)
                .or(first_line.map(TextIndent::FirstLine))
        });

        ParaProps {
            alignment: wml_attr(ppr, "jc").map(parse_alignment),
            before_px: spacing.and_then(|n| twips_attr(n, "before")),
            after_px: spacing.and_then(|n| twips_attr(n, "after")),
            line_height: spacing.and_then(parse_line_height),
            indent_left_px: ind.and_then(|n| twips_attr(n, "left").or_else(|| twips_attr(n, "start"))),
            indent_right_px: ind.and_then(|n| twips_attr(n, "right").or_else(|| twips_attr(n, "end"))),
            text_indent,
            keep_next: wml_bool(ppr, "keepNext"),
            keep_lines: wml_bool(ppr, "keepLines"),
            page_break_before: wml_bool(ppr, "pageBreakBefore"),
            num_id: num_pr
                .and_then(|n| wml_attr(n, "numId"))
                .and_then(|v| v.parse().ok()),
            num_level: num_pr
                .and_then(|n| wml_attr(n, "ilvl"))
                .and_then(|v| v.parse().ok()),
        }
    }

    pub(crate) fn merge(&mut self, layer: &ParaProps) {
        inherit!(
            self,
            layer,
            alignment,
            before_px,
            after_px,
            line_height,
            indent_left_px,
            indent_right_px,
            text_indent,
            keep_next,
            keep_lines,
            page_break_before,
            num_id,
            num_level,
        );
    }
}

/// Table cell margins of one layer, in px.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct CellMargins {
    pub(crate) top: Option<f32>,
    pub(crate) left: Option<f32>,
    pub(crate) bottom: Option<f32>,
    pub(crate) right: Option<f32>,
}

impl CellMargins {
    pub(crate) fn parse(mar: roxmltree::Node) -> Self {
        let side = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| wml(mar, name))
                .and_then(|n| twips_attr(n, "w"))
        };
        CellMargins {
            top: side(&["top"]),
            left: side(&["left", "start"]),
            bottom: side(&["bottom"]),
            right: side(&["right", "end"]),
        }
    }

    pub(crate) fn merge(&mut self, layer: &CellMargins) {
        inherit!(self, layer, top, left, bottom, right);
    }

    /// Fill unspecified sides with Word's defaults.
    pub(crate) fn to_padding(self) -> CellPadding {
        let defaults = CellPadding::default();
        CellPadding {
            top_px: self.top.unwrap_or(defaults.top_px),
            left_px: self.left.unwrap_or(defaults.left_px),
            bottom_px: self.bottom.unwrap_or(defaults.bottom_px),
            right_px: self.right.unwrap_or(defaults.right_px),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StyleKind {
    Paragraph,
    Character,
    Table,
    Other,
}

struct StyleDef {
    name: Option<String>,
    kind: StyleKind,
    based_on: Option<String>,
    para: ParaProps,
    run: RunProps,
    cell_margins: CellMargins,
}

/// A named style flattened over its `basedOn` chain (document defaults excluded).
#[derive(Clone, Debug)]
pub(crate) struct ResolvedStyle {
    pub(crate) id: String,
    pub(crate) name: Option<String>,
    pub(crate) kind: StyleKind,
    pub(crate) para: ParaProps,
    pub(crate) run: RunProps,
    pub(crate) cell_margins: CellMargins,
}

/// Parsed `styles.xml` with every chain resolved up front.
#[derive(Debug, Default)]
pub(crate) struct StyleSheet {
    pub(crate) doc_run: RunProps,
    pub(crate) doc_para: ParaProps,
    resolved: HashMap<String, ResolvedStyle>,
    default_paragraph: Option<String>,
    default_table: Option<String>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl StyleSheet {
    pub(crate) fn parse(xml_content: &str, theme: &ThemeFonts) -> Self {
        let mut sheet = StyleSheet::default();
        let Ok(xml) = roxmltree::Document::parse(xml_content) else {
            log::warn!("Styles part is not well-formed XML; using document defaults only");
            return sheet;
        };
        let root = xml.root_element();

        if let Some(doc_defaults) = wml(root, "docDefaults") {
            if let Some(rpr) = wml(doc_defaults, "rPrDefault").and_then(|n| wml(n, "rPr")) {
                sheet.doc_run = RunProps::parse(rpr, theme);
            }
            if let Some(ppr) = wml(doc_defaults, "pPrDefault").and_then(|n| wml(n, "pPr")) {
                sheet.doc_para = ParaProps::parse(ppr);
            }
        }

        let mut defs: BTreeMap<String, StyleDef> = BTreeMap::new();
        for style_node in root.children() {
            if style_node.tag_name().name() != "style"
                || style_node.tag_name().namespace() != Some(WML_NS)
            {
                continue;
            }
            let Some(style_id) = style_node.attribute((WML_NS, "styleId")) else {
                continue;
            };
            let kind = match style_node.attribute((WML_NS, "type")) {
                Some("paragraph") => StyleKind::Paragraph,
                Some("character") => StyleKind::Character,
                Some("table") => StyleKind::Table,
                _ => StyleKind::Other,
            };
            let is_default = style_node
                .attribute((WML_NS, "default"))
                .is_some_and(|v| v == "1" || v == "true");
            if is_default {
                match kind {
                    StyleKind::Paragraph => sheet.default_paragraph = Some(style_id.to_string()),
                    StyleKind::Table => sheet.default_table = Some(style_id.to_string()),
                    _ => {}
                }
            }

            defs.insert(
                style_id.to_string(),
                StyleDef {
                    name: wml_attr(style_node, "name").map(str::to_string),
                    kind,
                    based_on: wml_attr(style_node, "basedOn").map(str::to_string),
                    para: wml(style_node, "pPr").map(ParaProps::parse).unwrap_or_default(),
                    run: wml(style_node, "rPr")
                        .map(|rpr| RunProps::parse(rpr, theme))
                        .unwrap_or_default(),
                    cell_margins: wml(style_node, "tblPr")
                        .and_then(|pr| wml(pr, "tblCellMar"))
                        .map(CellMargins::parse)
                        .unwrap_or_default(),
                },
            );
        }

        if sheet.default_paragraph.is_none() && defs.contains_key("Normal") {
            sheet.default_paragraph = Some("Normal".to_string());
        }

        sheet.resolved = resolve_based_on(&defs, &mut sheet.diagnostics);
        log::debug!(
            "Resolved {} styles ({} malformed chains)",
            sheet.resolved.len(),
            sheet.diagnostics.len()
        );
        sheet
    }

    pub(crate) fn get(&self, id: &str) -> Option<&ResolvedStyle> {
        self.resolved.get(id)
    }

    /// Paragraph style by id. Unknown ids fall back to the default paragraph style.
    pub(crate) fn paragraph_style(&self, id: Option<&str>) -> Option<&ResolvedStyle> {
        id.and_then(|id| self.resolved.get(id))
            .filter(|s| s.kind == StyleKind::Paragraph)
            .or_else(|| self.default_paragraph())
    }

    pub(crate) fn default_paragraph(&self) -> Option<&ResolvedStyle> {
        self.default_paragraph
            .as_deref()
            .and_then(|id| self.resolved.get(id))
    }

    pub(crate) fn character_style(&self, id: &str) -> Option<&ResolvedStyle> {
        self.resolved
            .get(id)
            .filter(|s| s.kind == StyleKind::Character)
    }

    /// Cell margins for a table style, falling back to the default table style.
    pub(crate) fn table_cell_margins(&self, id: Option<&str>) -> CellMargins {
        let named = id
            .and_then(|id| self.resolved.get(id))
            .filter(|s| s.kind == StyleKind::Table);
        let default = self.default_table.as_deref().and_then(|id| self.resolved.get(id));
        let mut margins = default.map(|s| s.cell_margins).unwrap_or_default();
        if let Some(style) = named {
            margins.merge(&style.cell_margins);
        }
        margins
    }
}

/// Flatten every style over its `basedOn` chain, furthest ancestor first. A cyclic
/// chain resolves to nothing (document defaults apply); a dangling link keeps the part
/// of the chain that resolved.
fn resolve_based_on(
    defs: &BTreeMap<String, StyleDef>,
    diagnostics: &mut Vec<Diagnostic>,
) -> HashMap<String, ResolvedStyle> {
    let mut resolved = HashMap::with_capacity(defs.len());

    for (id, def) in defs {
        let mut chain: Vec<&StyleDef> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = Some(id.as_str());
        let mut cyclic = false;

        while let Some(cur) = current {
            if !visited.insert(cur) {
                cyclic = true;
                diagnostics.push(Diagnostic::MalformedStyleChain {
                    style_id: id.clone(),
                    reason: format!("basedOn cycle through {cur}"),
                });
                break;
            }
            match defs.get(cur) {
                Some(style) => {
                    chain.push(style);
                    current = style.based_on.as_deref();
                }
                None => {
                    diagnostics.push(Diagnostic::MalformedStyleChain {
                        style_id: id.clone(),
                        reason: format!("basedOn refers to undefined style {cur}"),
                    });
                    break;
                }
            }
        }

        let mut para = ParaProps::default();
        let mut run = RunProps::default();
        let mut cell_margins = CellMargins::default();
        if !cyclic {
            for ancestor in chain.iter().rev() {
                para.merge(&ancestor.para);
                run.merge(&ancestor.run);
                cell_margins.merge(&ancestor.cell_margins);
            }
        }

        resolved.insert(
            id.clone(),
            ResolvedStyle {
                id: id.clone(),
                name: def.name.clone(),
                kind: def.kind,
                para,
                run,
                cell_margins,
            },
        );
    }

    resolved
}
