//! Repeatable block markers and the locator that finds them.
//!
//! A block is delimited by two body paragraphs whose trimmed text is
//! exactly `[[START_<KIND>]]` and `[[END_<KIND>]]`. Blocks of different
//! kinds nest; blocks of the same kind never do.

use crate::model::{Block, Document, Paragraph};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// The four repeatable block kinds, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockKind {
    /// One instance per organisational lot
    Lot,
    /// One instance per activity of the enclosing lot (or of the organisation)
    Activity,
    /// One instance per ranked emission post of the enclosing activity
    Post,
    /// One instance per residual emission post of the enclosing activity
    OtherPost,
}

impl BlockKind {
    /// Every kind, outermost first.
    pub const ALL: [BlockKind; 4] = [
        BlockKind::Lot,
        BlockKind::Activity,
        BlockKind::Post,
        BlockKind::OtherPost,
    ];

    /// The `<KIND>` part of the marker text.
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Lot => "LOT",
            BlockKind::Activity => "ACTIVITY",
            BlockKind::Post => "POST",
            BlockKind::OtherPost => "OTHER_POST",
        }
    }

    /// Opening marker text, e.g. `[[START_LOT]]`.
    pub fn start_marker(&self) -> String {
        format!("[[START_{}]]", self.name())
    }

    /// Closing marker text, e.g. `[[END_LOT]]`.
    pub fn end_marker(&self) -> String {
        format!("[[END_{}]]", self.name())
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side of a block a marker paragraph opens or closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerEdge {
    /// `[[START_<KIND>]]`
    Start,
    /// `[[END_<KIND>]]`
    End,
}

/// Classify marker text. Surrounding whitespace is ignored.
pub fn parse_marker(text: &str) -> Option<(BlockKind, MarkerEdge)> {
    let inner = text.trim().strip_prefix("[[")?.strip_suffix("]]")?;
    let (edge, name) = if let Some(name) = inner.strip_prefix("START_") {
        (MarkerEdge::Start, name)
    } else if let Some(name) = inner.strip_prefix("END_") {
        (MarkerEdge::End, name)
    } else {
        return None;
    };

    BlockKind::ALL
        .iter()
        .find(|k| k.name() == name)
        .map(|k| (*k, edge))
}

/// Check whether a paragraph is a marker of any kind.
pub fn is_marker(paragraph: &Paragraph) -> bool {
    parse_marker(&paragraph.plain_text()).is_some()
}

fn marker_at(doc: &Document, index: usize) -> Option<(BlockKind, MarkerEdge)> {
    match doc.get(index)? {
        Block::Paragraph(p) => parse_marker(&p.plain_text()),
        _ => None,
    }
}

/// Inclusive body range `[start, end]` bounded by one marker pair.
///
/// Only valid until the next structural mutation of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    /// Index of the START marker paragraph
    pub start: usize,
    /// Index of the END marker paragraph
    pub end: usize,
}

impl Extent {
    /// Create an extent; `end` must not precede `start`.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Extent covering a whole document.
    ///
    /// `None` for an empty document.
    pub fn whole(doc: &Document) -> Option<Self> {
        doc.len().checked_sub(1).map(|end| Self::new(0, end))
    }

    /// Number of elements, markers included.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Check whether a body index lies inside the extent.
    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }

    /// The extent as an inclusive range.
    pub fn range(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Find the first complete block of `kind` within `within` (the whole
/// document when `None`).
///
/// The scan records the first START of `kind` and returns at the next END
/// of `kind`. An END seen before any START is ignored. Returns `None` when
/// the range holds no complete pair, which callers treat as "the template
/// does not offer this section".
pub fn find_block(doc: &Document, kind: BlockKind, within: Option<Extent>) -> Option<Extent> {
    let bounds = within.or_else(|| Extent::whole(doc))?;
    let last = bounds.end.min(doc.len().checked_sub(1)?);

    let mut start = None;
    for index in bounds.start..=last {
        match marker_at(doc, index) {
            Some((k, MarkerEdge::Start)) if k == kind && start.is_none() => {
                start = Some(index);
            }
            Some((k, MarkerEdge::End)) if k == kind => {
                if let Some(s) = start {
                    return Some(Extent::new(s, index));
                }
            }
            _ => {}
        }
    }

    if let Some(s) = start {
        log::warn!(
            "{} at index {} has no matching {}; block skipped",
            kind.start_marker(),
            s,
            kind.end_marker()
        );
    }
    None
}

/// Find consecutive complete blocks of `kind` within `within`, in document
/// order, by repeatedly applying [`find_block`] after the previous match.
pub fn find_all_blocks(doc: &Document, kind: BlockKind, within: Option<Extent>) -> Vec<Extent> {
    let Some(bounds) = within.or_else(|| Extent::whole(doc)) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    let mut from = bounds.start;
    while from <= bounds.end {
        match find_block(doc, kind, Some(Extent::new(from, bounds.end))) {
            Some(extent) => {
                from = extent.end + 1;
                found.push(extent);
            }
            None => break,
        }
    }
    found
}

/// Re-locate the block of `kind` whose START sits at `start`.
///
/// Used after nested work has grown or shrunk an instance: its start index
/// is stable as long as only later elements moved.
pub fn relocate(doc: &Document, kind: BlockKind, start: usize) -> Option<Extent> {
    let end = doc.len().checked_sub(1)?;
    if start > end {
        return None;
    }
    find_block(doc, kind, Some(Extent::new(start, end))).filter(|e| e.start == start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(lines: &[&str]) -> Document {
        Document::from_blocks(
            lines
                .iter()
                .map(|l| Block::Paragraph(Paragraph::with_text(*l)))
                .collect(),
        )
    }

    #[test]
    fn test_parse_marker() {
        assert_eq!(
            parse_marker("  [[START_LOT]] "),
            Some((BlockKind::Lot, MarkerEdge::Start))
        );
        assert_eq!(
            parse_marker("[[END_OTHER_POST]]"),
            Some((BlockKind::OtherPost, MarkerEdge::End))
        );
        assert_eq!(parse_marker("[[START_UNKNOWN]]"), None);
        assert_eq!(parse_marker("see [[START_LOT]] below"), None);
        assert_eq!(parse_marker("{{LOT_NAME}}"), None);
    }

    #[test]
    fn test_marker_split_across_runs() {
        let p = Paragraph::with_runs(["[[START_", "ACTIVITY]]"]);
        assert!(is_marker(&p));
    }

    #[test]
    fn test_find_block_whole_document() {
        let d = doc(&["intro", "[[START_LOT]]", "{{LOT_NAME}}", "[[END_LOT]]", "outro"]);
        assert_eq!(find_block(&d, BlockKind::Lot, None), Some(Extent::new(1, 3)));
        assert_eq!(find_block(&d, BlockKind::Activity, None), None);
    }

    #[test]
    fn test_find_block_respects_range() {
        let d = doc(&[
            "[[START_ACTIVITY]]",
            "a",
            "[[END_ACTIVITY]]",
            "[[START_LOT]]",
            "[[START_ACTIVITY]]",
            "b",
            "[[END_ACTIVITY]]",
            "[[END_LOT]]",
        ]);
        let lot = find_block(&d, BlockKind::Lot, None).unwrap();
        assert_eq!(lot, Extent::new(3, 7));
        assert_eq!(
            find_block(&d, BlockKind::Activity, Some(lot)),
            Some(Extent::new(4, 6))
        );
    }

    #[test]
    fn test_find_block_missing_end() {
        let d = doc(&["[[START_POST]]", "text"]);
        assert_eq!(find_block(&d, BlockKind::Post, None), None);
    }

    #[test]
    fn test_find_block_ignores_leading_end() {
        let d = doc(&["[[END_POST]]", "[[START_POST]]", "x", "[[END_POST]]"]);
        assert_eq!(find_block(&d, BlockKind::Post, None), Some(Extent::new(1, 3)));
    }

    #[test]
    fn test_find_all_blocks() {
        let d = doc(&[
            "[[START_POST]]",
            "1",
            "[[END_POST]]",
            "[[START_POST]]",
            "2",
            "[[END_POST]]",
        ]);
        let all = find_all_blocks(&d, BlockKind::Post, None);
        assert_eq!(all, vec![Extent::new(0, 2), Extent::new(3, 5)]);
    }

    #[test]
    fn test_relocate() {
        let d = doc(&["x", "[[START_POST]]", "1", "2", "[[END_POST]]"]);
        assert_eq!(relocate(&d, BlockKind::Post, 1), Some(Extent::new(1, 4)));
        assert_eq!(relocate(&d, BlockKind::Post, 0), None);
    }

    #[test]
    fn test_extent_len_and_contains() {
        assert_eq!(Extent::new(2, 5).len(), 4);
        assert!(!Extent::new(2, 5).contains(1));
        assert!(Extent::new(2, 5).contains(5));
    }
}
