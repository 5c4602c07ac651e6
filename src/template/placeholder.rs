//! Placeholder tokens and their resolution.
//!
//! A placeholder is `{{NAME}}` written anywhere inside paragraph text,
//! possibly split over several runs by the authoring tool. Resolution
//! works on the concatenated paragraph text and writes the result back
//! into the first run.

use super::marker::Extent;
use crate::model::{Block, Document, Paragraph};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("valid placeholder pattern"))
}

fn bare_placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\{\{[A-Za-z0-9_]+\}\}$").expect("valid bare placeholder pattern")
    })
}

/// Format a placeholder name as its token, e.g. `LOT_NAME` → `{{LOT_NAME}}`.
pub fn token(name: &str) -> String {
    format!("{{{{{}}}}}", name)
}

/// Names of every placeholder occurring in `text`, in order of appearance.
pub fn find_placeholders(text: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Check whether `text`, once trimmed, is exactly one placeholder token.
pub fn is_bare_placeholder(text: &str) -> bool {
    bare_placeholder_regex().is_match(text.trim())
}

/// Ordered token → value substitutions for one repetition.
///
/// Values are stored NFC-normalized so composed and decomposed accents in
/// the source data render the same.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValueMap {
    entries: Vec<(String, String)>,
}

impl ValueMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of placeholder `name` (without braces), replacing any
    /// previous value.
    pub fn insert(&mut self, name: &str, value: impl AsRef<str>) {
        let key = token(name);
        let value: String = value.as_ref().nfc().collect();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.insert(name, value);
        self
    }

    /// Value of placeholder `name` (without braces).
    pub fn get(&self, name: &str) -> Option<&str> {
        let key = token(name);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Number of placeholders in the map.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(token, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Add every entry of `other`, overriding existing values.
    pub fn extend(&mut self, other: &ValueMap) {
        for (key, value) in &other.entries {
            match self.entries.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value.clone(),
                None => self.entries.push((key.clone(), value.clone())),
            }
        }
    }

    /// Substitute every token of the map in `text`.
    ///
    /// Tokens not in the map are left as they are.
    pub fn apply(&self, text: &str) -> String {
        if !text.contains("{{") {
            return text.to_string();
        }
        let mut out = text.to_string();
        for (key, value) in &self.entries {
            if out.contains(key.as_str()) {
                out = out.replace(key.as_str(), value);
            }
        }
        out
    }
}

/// Resolve one paragraph. Returns `true` when its text changed.
pub fn resolve_paragraph(paragraph: &mut Paragraph, values: &ValueMap) -> bool {
    let text = paragraph.plain_text();
    if !text.contains("{{") {
        return false;
    }
    let resolved = values.apply(&text);
    if resolved == text {
        return false;
    }
    paragraph.set_text(resolved);
    true
}

/// Resolve every paragraph in `extent`, then every cell paragraph of the
/// tables positioned in `extent`. Returns the number of paragraphs changed.
pub fn resolve_range(doc: &mut Document, extent: Extent, values: &ValueMap) -> usize {
    if values.is_empty() || doc.is_empty() {
        return 0;
    }
    let last = extent.end.min(doc.len() - 1);
    if extent.start > last {
        return 0;
    }

    let mut changed = 0;
    for block in &mut doc.body[extent.start..=last] {
        if let Block::Paragraph(p) = block {
            if resolve_paragraph(p, values) {
                changed += 1;
            }
        }
    }

    for block in &mut doc.body[extent.start..=last] {
        if let Block::Table(t) = block {
            t.for_each_paragraph_mut(&mut |p| {
                if resolve_paragraph(p, values) {
                    changed += 1;
                }
            });
        }
    }
    changed
}

/// Resolve `values` across the whole document.
pub fn resolve_document(doc: &mut Document, values: &ValueMap) -> usize {
    match Extent::whole(doc) {
        Some(all) => resolve_range(doc, all, values),
        None => 0,
    }
}
