//! Static view of a template: its marker blocks and placeholders.

use super::marker::{parse_marker, BlockKind, Extent, MarkerEdge};
use super::placeholder::find_placeholders;
use crate::model::{Block, Document};
use serde::Serialize;
use std::collections::BTreeMap;

/// One complete marker pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockOutline {
    pub kind: BlockKind,
    pub extent: Extent,
    /// Number of enclosing blocks
    pub depth: usize,
}

/// A marker paragraph that belongs to no complete pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrayMarker {
    pub index: usize,
    pub marker: String,
}

/// What a template offers to the expansion engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateOutline {
    /// Number of body elements
    pub body_len: usize,
    /// Complete blocks, by start index
    pub blocks: Vec<BlockOutline>,
    /// Markers the locator will never pair
    pub stray_markers: Vec<StrayMarker>,
    /// Placeholder name → number of occurrences, table cells included
    pub placeholders: BTreeMap<String, usize>,
}

impl TemplateOutline {
    /// Scan `doc`.
    pub fn scan(doc: &Document) -> Self {
        let mut outline = Self {
            body_len: doc.len(),
            ..Self::default()
        };
        let mut open: Vec<(BlockKind, usize)> = Vec::new();

        for (index, block) in doc.body.iter().enumerate() {
            let Block::Paragraph(p) = block else {
                continue;
            };
            let Some((kind, edge)) = parse_marker(&p.plain_text()) else {
                continue;
            };
            match edge {
                MarkerEdge::Start if open.iter().any(|(k, _)| *k == kind) => {
                    outline.stray(index, kind.start_marker());
                }
                MarkerEdge::Start => open.push((kind, index)),
                MarkerEdge::End => match open.iter().rposition(|(k, _)| *k == kind) {
                    Some(pos) => {
                        for (k, i) in open.drain(pos + 1..) {
                            outline.stray(i, k.start_marker());
                        }
                        if let Some((_, start)) = open.pop() {
                            outline.blocks.push(BlockOutline {
                                kind,
                                extent: Extent::new(start, index),
                                depth: pos,
                            });
                        }
                    }
                    None => outline.stray(index, kind.end_marker()),
                },
            }
        }
        for (kind, index) in open {
            outline.stray(index, kind.start_marker());
        }

        for text in doc.paragraph_texts() {
            for name in find_placeholders(&text) {
                *outline.placeholders.entry(name).or_insert(0) += 1;
            }
        }

        outline.blocks.sort_by_key(|b| b.extent.start);
        outline.stray_markers.sort_by_key(|m| m.index);
        outline
    }

    fn stray(&mut self, index: usize, marker: String) {
        self.stray_markers.push(StrayMarker { index, marker });
    }

    /// Blocks of one kind.
    pub fn blocks_of(&self, kind: BlockKind) -> impl Iterator<Item = &BlockOutline> {
        self.blocks.iter().filter(move |b| b.kind == kind)
    }

    /// Whether every marker is part of a complete pair.
    pub fn is_balanced(&self) -> bool {
        self.stray_markers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Paragraph, Table, TableRow};

    fn doc(lines: &[&str]) -> Document {
        Document::from_blocks(
            lines
                .iter()
                .map(|l| Block::Paragraph(Paragraph::with_text(*l)))
                .collect(),
        )
    }

    #[test]
    fn test_nested_blocks() {
        let doc = doc(&[
            "{{ORG_NAME}}",
            "[[START_LOT]]",
            "[[START_ACTIVITY]]",
            "{{ENTITY_NAME}} {{ENTITY_TOTAL}}",
            "[[END_ACTIVITY]]",
            "[[END_LOT]]",
        ]);
        let outline = TemplateOutline::scan(&doc);
        assert!(outline.is_balanced());
        assert_eq!(
            outline.blocks,
            vec![
                BlockOutline {
                    kind: BlockKind::Lot,
                    extent: Extent::new(1, 5),
                    depth: 0
                },
                BlockOutline {
                    kind: BlockKind::Activity,
                    extent: Extent::new(2, 4),
                    depth: 1
                },
            ]
        );
        assert_eq!(outline.placeholders.len(), 3);
    }

    #[test]
    fn test_stray_markers() {
        let doc = doc(&[
            "[[END_POST]]",
            "[[START_ACTIVITY]]",
            "[[START_POST]]",
            "[[END_ACTIVITY]]",
            "[[START_LOT]]",
        ]);
        let outline = TemplateOutline::scan(&doc);
        assert_eq!(outline.blocks_of(BlockKind::Activity).count(), 1);
        let strays: Vec<usize> = outline.stray_markers.iter().map(|m| m.index).collect();
        assert_eq!(strays, vec![0, 2, 4]);
    }

    #[test]
    fn test_placeholders_counted_in_cells() {
        let mut doc = doc(&["{{LOT_NAME}}"]);
        let mut table = Table::new();
        table.add_row(TableRow::from_strings(["{{LOT_NAME}}", "{{LOT_TOTAL}}"]));
        doc.add_table(table);

        let outline = TemplateOutline::scan(&doc);
        assert_eq!(outline.placeholders.get("LOT_NAME"), Some(&2));
        assert_eq!(outline.placeholders.get("LOT_TOTAL"), Some(&1));
    }
}
