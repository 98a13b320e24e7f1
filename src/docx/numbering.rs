use std::collections::{BTreeMap, HashMap};

use crate::model::{ListBinding, NumberFormat};

use super::{WML_NS, twips_attr, wml, wml_attr};

#[derive(Clone, Debug)]
struct LevelDef {
    format: NumberFormat,
    pattern: String,
    start: u32,
    indent_left_px: Option<f32>,
    hanging_px: Option<f32>,
}

impl LevelDef {
    fn parse(lvl: roxmltree::Node) -> Self {
        let format = NumberFormat::from_ooxml(wml_attr(lvl, "numFmt").unwrap_or("decimal"));
        let raw_text = wml_attr(lvl, "lvlText").unwrap_or("");
        let pattern = if format == NumberFormat::Bullet {
            let text = normalize_bullet_text(raw_text);
            if text.trim().is_empty() {
                "\u{2022}".to_string()
            } else {
                text
            }
        } else {
            raw_text.to_string()
        };
        let ind = wml(lvl, "pPr").and_then(|ppr| wml(ppr, "ind"));
        LevelDef {
            format,
            pattern,
            start: wml_attr(lvl, "start")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(1),
            indent_left_px: ind.and_then(|n| twips_attr(n, "left").or_else(|| twips_attr(n, "start"))),
            hanging_px: ind.and_then(|n| twips_attr(n, "hanging")),
        }
    }
}

fn levels_of(node: roxmltree::Node) -> BTreeMap<usize, LevelDef> {
    node.children()
        .filter(|n| n.tag_name().name() == "lvl" && n.tag_name().namespace() == Some(WML_NS))
        .filter_map(|lvl| {
            let ilvl = lvl
                .attribute((WML_NS, "ilvl"))
                .and_then(|v| v.parse::<usize>().ok())?;
            Some((ilvl, LevelDef::parse(lvl)))
        })
        .collect()
}

#[derive(Clone, Debug, Default)]
struct LevelOverride {
    start: Option<u32>,
    level: Option<LevelDef>,
}

#[derive(Clone, Debug)]
struct NumInstance {
    abstract_id: String,
    overrides: HashMap<usize, LevelOverride>,
}

/// List templates from `numbering.xml`.
#[derive(Debug, Default)]
pub(crate) struct Numbering {
    abstract_nums: HashMap<String, BTreeMap<usize, LevelDef>>,
    nums: HashMap<u32, NumInstance>,
}

/// Indentation a list level contributes to its paragraphs.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct LevelIndent {
    pub(crate) left_px: Option<f32>,
    pub(crate) hanging_px: Option<f32>,
}

impl Numbering {
    pub(crate) fn parse(xml_content: &str) -> Self {
        let mut numbering = Numbering::default();
        let Ok(xml) = roxmltree::Document::parse(xml_content) else {
            log::warn!("Numbering part is not well-formed XML; lists are unnumbered");
            return numbering;
        };

        for node in xml.root_element().children() {
            if node.tag_name().namespace() != Some(WML_NS) {
                continue;
            }
            match node.tag_name().name() {
                "abstractNum" => {
                    let Some(abs_id) = node.attribute((WML_NS, "abstractNumId")) else {
                        continue;
                    };
                    numbering
                        .abstract_nums
                        .insert(abs_id.to_string(), levels_of(node));
                }
                "num" => {
                    let Some(num_id) = node
                        .attribute((WML_NS, "numId"))
                        .and_then(|v| v.parse::<u32>().ok())
                    else {
                        continue;
                    };
                    let Some(abs_id) = wml_attr(node, "abstractNumId") else {
                        continue;
                    };
                    let mut overrides = HashMap::new();
                    for ov in node.children().filter(|n| {
                        n.tag_name().name() == "lvlOverride"
                            && n.tag_name().namespace() == Some(WML_NS)
                    }) {
                        let Some(ilvl) = ov
                            .attribute((WML_NS, "ilvl"))
                            .and_then(|v| v.parse::<usize>().ok())
                        else {
                            continue;
                        };
                        overrides.insert(
                            ilvl,
                            LevelOverride {
                                start: wml_attr(ov, "startOverride")
                                    .and_then(|v| v.parse::<u32>().ok()),
                                level: wml(ov, "lvl").map(LevelDef::parse),
                            },
                        );
                    }
                    numbering.nums.insert(
                        num_id,
                        NumInstance {
                            abstract_id: abs_id.to_string(),
                            overrides,
                        },
                    );
                }
                _ => {}
            }
        }

        log::debug!(
            "Parsed {} list definitions, {} instances",
            numbering.abstract_nums.len(),
            numbering.nums.len()
        );
        numbering
    }

    /// Effective definition of one level with `w:num` overrides applied.
    fn level(&self, num_id: u32, level: usize) -> Option<LevelDef> {
        let instance = self.nums.get(&num_id)?;
        let ov = instance.overrides.get(&level);
        let mut def = ov
            .and_then(|o| o.level.clone())
            .or_else(|| {
                self.abstract_nums
                    .get(&instance.abstract_id)
                    .and_then(|levels| levels.get(&level))
                    .cloned()
            })?;
        if let Some(start) = ov.and_then(|o| o.start) {
            def.start = start;
        }
        Some(def)
    }

    /// Template for (`num_id`, `level`). `numId` 0 means "numbering removed".
    pub(crate) fn binding(&self, num_id: u32, level: usize) -> Option<(ListBinding, LevelIndent)> {
        if num_id == 0 {
            return None;
        }
        let def = self.level(num_id, level)?;
        let depth = self
            .nums
            .get(&num_id)
            .and_then(|i| self.abstract_nums.get(&i.abstract_id))
            .and_then(|levels| levels.keys().next_back().copied())
            .unwrap_or(level)
            .max(level);
        let level_formats = (0..=depth)
            .map(|l| {
                self.level(num_id, l)
                    .map(|d| d.format)
                    .unwrap_or_default()
            })
            .collect();

        let binding = ListBinding {
            num_id,
            level,
            format: def.format,
            pattern: def.pattern,
            start_at: def.start,
            level_formats,
        };
        let indent = LevelIndent {
            left_px: def.indent_left_px,
            hanging_px: def.hanging_px,
        };
        Some((binding, indent))
    }
}

/// Map Symbol-font private-use bullet glyphs to their Unicode equivalents.
fn normalize_bullet_text(text: &str) -> String {
    text.chars()
        .map(|c| {
            let cp = c as u32;
            if (0xF000..=0xF0FF).contains(&cp) {
                symbol_pua_to_unicode(cp).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

fn symbol_pua_to_unicode(cp: u32) -> Option<char> {
    let sym = cp - 0xF000;
    let mapped = match sym {
        0xB7 => '\u{2022}',
        0xA7 => '\u{25A0}',
        0xA8 => '\u{25CB}',
        0xD8 => '\u{2666}',
        0x76 => '\u{221A}',
        0x6C => '\u{25CF}',
        0x6E => '\u{25A0}',
        _ => return char::from_u32(sym),
    };
    Some(mapped)
}

