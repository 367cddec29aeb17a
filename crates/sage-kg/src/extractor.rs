//! Rule-based entity-id extraction - no LLM calls.
//!
//! Graph nodes are keyed by compact URIs (`PREFIX:local`), e.g.
//! `MONDO:0005148` or `HP:0001627`. Anything of that shape in free text is
//! treated as a seed entity.

use regex::Regex;
use std::sync::LazyLock;

static RE_CURIE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z][A-Za-z0-9_.\-]*:[A-Za-z0-9_][A-Za-z0-9_.\-]*)")
        .expect("RE_CURIE is a compile-time constant")
});

/// Extract entity ids from text, in order of first appearance, without repeats.
#[must_use]
pub fn extract_entity_ids(text: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for cap in RE_CURIE.captures_iter(text) {
        let Some(m) = cap.get(1) else { continue };
        if inside_url(text, m.start()) {
            continue;
        }
        let id = m.as_str().trim_end_matches(['.', '-']);
        if !id.is_empty() && !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// `http://host:8080/x` contains `host:8080`; skip matches inside URLs
fn inside_url(text: &str, start: usize) -> bool {
    let token_start = text[..start]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map_or(0, |(i, c)| i + c.len_utf8());
    let token_end = text[start..]
        .find(char::is_whitespace)
        .map_or(text.len(), |i| start + i);
    text[token_start..token_end].contains("://")
}
