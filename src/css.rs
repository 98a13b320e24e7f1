//! Inline `style` attribute helpers.

use once_cell::sync::Lazy;
use regex::Regex;

static LENGTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(-?\d+(?:\.\d+)?|-?\.\d+)\s*(px|pt|in|cm|mm|pc)?\s*$").unwrap()
});

/// One `property: value` pair of an inline style.
#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// Split a declaration block on `;`, ignoring separators inside quotes or parentheses
/// (data URIs carry `;base64`).
pub fn parse_declarations(style: &str) -> Vec<Declaration> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                push_declaration(&style[start..i], &mut out);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_declaration(&style[start..], &mut out);
    out
}

fn push_declaration(raw: &str, out: &mut Vec<Declaration>) {
    let Some((property, value)) = raw.split_once(':') else {
        return;
    };
    let property = property.trim().to_ascii_lowercase();
    if property.is_empty() {
        return;
    }
    let mut value = value.trim();
    let mut important = false;
    if let Some(bang) = value.rfind('!')
        && value[bang + 1..].trim().eq_ignore_ascii_case("important")
    {
        important = true;
        value = value[..bang].trim_end();
    }
    out.push(Declaration {
        property,
        value: value.to_string(),
        important,
    });
}

pub fn serialize_declarations(declarations: &[Declaration]) -> String {
    declarations
        .iter()
        .map(|d| {
            if d.important {
                format!("{}: {} !important", d.property, d.value)
            } else {
                format!("{}: {}", d.property, d.value)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn get_property(style: &str, property: &str) -> Option<String> {
    parse_declarations(style)
        .into_iter()
        .rev()
        .find(|d| d.property.eq_ignore_ascii_case(property))
        .map(|d| d.value)
}

/// Replace every declaration of `property` with a single one, in place of the first.
pub fn set_property(style: &str, property: &str, value: &str, important: bool) -> String {
    let property = property.to_ascii_lowercase();
    let mut declarations = parse_declarations(style);
    let replacement = Declaration {
        property: property.clone(),
        value: value.to_string(),
        important,
    };
    match declarations.iter().position(|d| d.property == property) {
        Some(first) => {
            declarations[first] = replacement;
            let mut seen = false;
            declarations.retain(|d| {
                if d.property != property {
                    return true;
                }
                let keep = !seen;
                seen = true;
                keep
            });
        }
        None => declarations.push(replacement),
    }
    serialize_declarations(&declarations)
}

pub fn remove_property(style: &str, property: &str) -> String {
    let mut declarations = parse_declarations(style);
    declarations.retain(|d| !d.property.eq_ignore_ascii_case(property));
    serialize_declarations(&declarations)
}

/// Absolute CSS length in px. Relative units and keywords yield `None`.
pub fn length_to_px(value: &str) -> Option<f32> {
    let caps = LENGTH.captures(value)?;
    let number: f32 = caps[1].parse().ok()?;
    let factor = match caps.get(2).map(|m| m.as_str()) {
        None | Some("px") => 1.0,
        Some("pt") => 4.0 / 3.0,
        Some("pc") => 16.0,
        Some("in") => 96.0,
        Some("cm") => 96.0 / 2.54,
        Some("mm") => 96.0 / 25.4,
        Some(_) => return None,
    };
    Some(number * factor)
}

/// Escape text for element content.
pub(crate) fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape text for a double-quoted attribute value.
pub(crate) fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}
