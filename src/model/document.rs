//! Document-level types.

use super::{Block, Paragraph, Resource, Table};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// An office document held in memory as an ordered sequence of body
/// elements.
///
/// Positions are transient: any insertion or removal shifts the index of
/// every later element, so callers re-derive positions after mutating.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Document metadata
    pub metadata: Metadata,

    /// Body elements in reading order
    pub body: Vec<Block>,

    /// Embedded resources added during expansion, keyed by resource ID
    pub resources: HashMap<String, Resource>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document from body elements.
    pub fn from_blocks(body: Vec<Block>) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    /// Number of body elements.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Check if the document has no body elements.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Get a body element by index.
    pub fn get(&self, index: usize) -> Option<&Block> {
        self.body.get(index)
    }

    /// Get a paragraph by body index.
    pub fn paragraph(&self, index: usize) -> Option<&Paragraph> {
        self.body.get(index).and_then(Block::as_paragraph)
    }

    /// Get a mutable paragraph by body index.
    pub fn paragraph_mut(&mut self, index: usize) -> Option<&mut Paragraph> {
        self.body.get_mut(index).and_then(Block::as_paragraph_mut)
    }

    /// Add a paragraph at the end of the body.
    pub fn add_paragraph(&mut self, paragraph: Paragraph) {
        self.body.push(Block::Paragraph(paragraph));
    }

    /// Add a table at the end of the body.
    pub fn add_table(&mut self, table: Table) {
        self.body.push(Block::Table(table));
    }

    /// Insert an element at `index`, shifting later elements.
    pub fn insert(&mut self, index: usize, block: Block) {
        let index = index.min(self.body.len());
        self.body.insert(index, block);
    }

    /// Insert `blocks` right after `index`, keeping their order.
    pub fn splice_after(&mut self, index: usize, blocks: Vec<Block>) {
        let at = (index + 1).min(self.body.len());
        self.body.splice(at..at, blocks);
    }

    /// Remove the element at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Block> {
        if index < self.body.len() {
            Some(self.body.remove(index))
        } else {
            None
        }
    }

    /// Remove an inclusive range of elements; out-of-range ends are clamped.
    pub fn remove_range(&mut self, range: RangeInclusive<usize>) -> usize {
        let (start, end) = range.into_inner();
        if start >= self.body.len() || start > end {
            return 0;
        }
        let end = end.min(self.body.len() - 1);
        self.body.drain(start..=end).count()
    }

    /// Register a resource under a fresh ID and return that ID.
    pub fn add_resource(&mut self, resource: Resource) -> String {
        let mut n = self.resources.len() + 1;
        let mut id = format!("img{}", n);
        while self.resources.contains_key(&id) {
            n += 1;
            id = format!("img{}", n);
        }
        self.resources.insert(id.clone(), resource);
        id
    }

    /// Get a resource by ID.
    pub fn get_resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Text of every paragraph in reading order, including paragraphs
    /// inside table cells.
    pub fn paragraph_texts(&self) -> Vec<String> {
        let mut out = Vec::new();
        for block in &self.body {
            match block {
                Block::Paragraph(p) => out.push(p.plain_text()),
                Block::Table(t) => out.extend(t.paragraphs().iter().map(|p| p.plain_text())),
                Block::Raw { .. } => {}
            }
        }
        out
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        self.body
            .iter()
            .filter(|b| !matches!(b, Block::Raw { .. }))
            .map(|b| b.plain_text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Document metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title
    pub title: Option<String>,

    /// Name of the template the document was expanded from
    pub template: Option<String>,

    /// When the report was generated
    pub generated: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::from_blocks(vec![
            Paragraph::with_text("a").into(),
            Paragraph::with_text("b").into(),
            Paragraph::with_text("c").into(),
        ])
    }

    #[test]
    fn test_splice_after() {
        let mut doc = sample();
        doc.splice_after(
            0,
            vec![
                Paragraph::with_text("x").into(),
                Paragraph::with_text("y").into(),
            ],
        );
        assert_eq!(doc.plain_text(), "a\nx\ny\nb\nc");

        doc.splice_after(4, vec![Paragraph::with_text("z").into()]);
        assert_eq!(doc.plain_text(), "a\nx\ny\nb\nc\nz");
    }

    #[test]
    fn test_remove_range_clamps() {
        let mut doc = sample();
        assert_eq!(doc.remove_range(1..=10), 2);
        assert_eq!(doc.plain_text(), "a");
        assert_eq!(doc.remove_range(5..=6), 0);
    }

    #[test]
    fn test_add_resource_ids_are_unique() {
        let mut doc = Document::new();
        let a = doc.add_resource(Resource::png(vec![1]));
        let b = doc.add_resource(Resource::png(vec![2]));
        assert_ne!(a, b);
        assert_eq!(doc.get_resource(&b).map(|r| r.data.clone()), Some(vec![2]));
    }

    #[test]
    fn test_paragraph_texts_include_cells() {
        let mut doc = sample();
        doc.add_table(Table::with_header(["h1", "h2"]));
        assert_eq!(doc.paragraph_texts(), vec!["a", "b", "c", "h1", "h2"]);
    }
}
