//! Body-level element types.

use super::{Paragraph, Table};
use serde::{Deserialize, Serialize};

/// A block-level element of the document body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// A paragraph of text
    Paragraph(Paragraph),

    /// A table
    Table(Table),

    /// Any other body element (section properties, content controls,
    /// bookmarks) carried through untouched
    Raw {
        /// Serialized XML of the element
        xml: String,
    },
}

impl Block {
    /// Check if this block is a paragraph.
    pub fn is_paragraph(&self) -> bool {
        matches!(self, Block::Paragraph(_))
    }

    /// Check if this block is a table.
    pub fn is_table(&self) -> bool {
        matches!(self, Block::Table(_))
    }

    /// Borrow the paragraph, if this block is one.
    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    /// Mutably borrow the paragraph, if this block is one.
    pub fn as_paragraph_mut(&mut self) -> Option<&mut Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    /// Borrow the table, if this block is one.
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Block::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Mutably borrow the table, if this block is one.
    pub fn as_table_mut(&mut self) -> Option<&mut Table> {
        match self {
            Block::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Get plain text content of the block.
    pub fn plain_text(&self) -> String {
        match self {
            Block::Paragraph(p) => p.plain_text(),
            Block::Table(t) => t.plain_text(),
            Block::Raw { .. } => String::new(),
        }
    }
}

impl From<Paragraph> for Block {
    fn from(p: Paragraph) -> Self {
        Block::Paragraph(p)
    }
}

impl From<Table> for Block {
    fn from(t: Table) -> Self {
        Block::Table(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_accessors() {
        let block: Block = Paragraph::with_text("hello").into();
        assert!(block.is_paragraph());
        assert!(block.as_table().is_none());
        assert_eq!(block.plain_text(), "hello");

        let raw = Block::Raw {
            xml: "<w:sectPr/>".to_string(),
        };
        assert_eq!(raw.plain_text(), "");
    }

    #[test]
    fn test_block_serde_tag() {
        let block: Block = Paragraph::with_text("x").into();
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.starts_with("{\"type\":\"paragraph\""));
    }
}
