//! Heading extraction from rendered HTML.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::worker::Heading;

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h([1-6])(\s[^>]*)?>(.*?)</h[1-6]\s*>").expect("valid regex")
});

static ID_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bid\s*=\s*["']([^"']*)["']"#).expect("valid regex"));

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos|nbsp);").expect("valid regex")
});

/// Collect `<h1>`..`<h6>` headings in document order.
///
/// Headings without an `id` get one derived from their text, the way
/// Asciidoctor generates section ids.
pub fn extract_headings(html: &str) -> Vec<Heading> {
    HEADING
        .captures_iter(html)
        .filter_map(|caps| {
            let depth = caps[1].parse::<u8>().ok()?;
            let text = decode_entities(TAG.replace_all(&caps[3], "").trim());
            if text.is_empty() {
                return None;
            }

            let slug = caps
                .get(2)
                .and_then(|attrs| ID_ATTR.captures(attrs.as_str()))
                .map(|id| id[1].to_string())
                .unwrap_or_else(|| section_id(&text));

            Some(Heading { depth, slug, text })
        })
        .collect()
}

/// Asciidoctor-style auto id: `_` prefix, lowercase words joined by `_`.
fn section_id(text: &str) -> String {
    let mut id = String::from("_");
    let mut pending_separator = false;

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && id.len() > 1 {
                id.push('_');
            }
            pending_separator = false;
            id.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    id
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ => entity[1..].parse::<u32>().ok().and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}
