//! Document-wide cleanup of marker paragraphs and orphan placeholders.

use super::marker::is_marker;
use super::placeholder::is_bare_placeholder;
use crate::model::{Block, Document, Paragraph};
use serde::{Deserialize, Serialize};

/// Which cleanup sub-passes run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupOptions {
    /// Delete leftover `[[START_*]]` / `[[END_*]]` paragraphs
    pub remove_markers: bool,

    /// Delete paragraphs holding nothing but one unresolved `{{NAME}}`
    pub remove_orphans: bool,
}

impl CleanupOptions {
    /// Both sub-passes.
    pub fn standard() -> Self {
        Self {
            remove_markers: true,
            remove_orphans: true,
        }
    }

    /// Leave the expanded document as is (template debugging).
    pub fn none() -> Self {
        Self {
            remove_markers: false,
            remove_orphans: false,
        }
    }
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self::standard()
    }
}

fn is_orphan(paragraph: &Paragraph) -> bool {
    !paragraph.has_images() && is_bare_placeholder(&paragraph.plain_text())
}

/// Remove body paragraphs matching `pred`; inside table cells the matching
/// paragraphs are blanked instead, since a cell must keep a paragraph.
fn sweep<F>(doc: &mut Document, pred: F) -> usize
where
    F: Fn(&Paragraph) -> bool,
{
    let before = doc.len();
    doc.body.retain(|block| match block {
        Block::Paragraph(p) => !pred(p),
        _ => true,
    });
    let mut count = before - doc.len();

    for block in &mut doc.body {
        if let Block::Table(table) = block {
            table.for_each_paragraph_mut(&mut |p| {
                if pred(p) {
                    p.clear();
                    count += 1;
                }
            });
        }
    }
    count
}

/// Delete every remaining marker paragraph. Returns how many were removed
/// or blanked.
pub fn remove_markers(doc: &mut Document) -> usize {
    let count = sweep(doc, is_marker);
    if count > 0 {
        log::debug!("removed {} marker paragraph(s)", count);
    }
    count
}

/// Delete every paragraph whose trimmed text is a single unresolved
/// placeholder. Returns how many were removed or blanked.
pub fn remove_orphans(doc: &mut Document) -> usize {
    let count = sweep(doc, is_orphan);
    if count > 0 {
        log::debug!("removed {} orphan placeholder paragraph(s)", count);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageRef, Table, TableCell, TableRow};

    fn text_doc(lines: &[&str]) -> Document {
        Document::from_blocks(
            lines
                .iter()
                .map(|l| Block::Paragraph(Paragraph::with_text(*l)))
                .collect(),
        )
    }

    #[test]
    fn test_remove_markers() {
        let mut doc = text_doc(&["[[START_LOT]]", "Lot A", " [[END_LOT]] ", "[[START_X]]"]);
        assert_eq!(remove_markers(&mut doc), 2);
        assert_eq!(doc.paragraph_texts(), vec!["Lot A", "[[START_X]]"]);
    }

    #[test]
    fn test_remove_orphans_keeps_inline_tokens() {
        let mut doc = text_doc(&["{{POST_CHART}}", "  {{LOGO}} ", "Total: {{TOTAL}}", "Fin"]);
        assert_eq!(remove_orphans(&mut doc), 2);
        assert_eq!(doc.paragraph_texts(), vec!["Total: {{TOTAL}}", "Fin"]);
    }

    #[test]
    fn test_cells_are_blanked() {
        let mut table = Table::new();
        table.add_row(TableRow::new(vec![
            TableCell::text("{{POST_TABLE}}"),
            TableCell::text("[[END_POST]]"),
            TableCell::text("ok"),
        ]));
        let mut doc = Document::new();
        doc.add_table(table);

        assert_eq!(remove_orphans(&mut doc), 1);
        assert_eq!(remove_markers(&mut doc), 1);

        let table = doc.get(0).and_then(Block::as_table).unwrap();
        assert_eq!(table.rows[0].cells.len(), 3);
        assert_eq!(table.rows[0].cells[0].content.len(), 1);
        assert_eq!(table.plain_text(), "\t\tok");
    }

    #[test]
    fn test_anchor_with_image_survives() {
        let mut p = Paragraph::new();
        p.add_image(ImageRef {
            resource_id: "img1".to_string(),
            width_emu: 1,
            height_emu: 1,
            alt_text: None,
        });
        p.add_text("{{LOGO}}");
        let mut doc = Document::from_blocks(vec![Block::Paragraph(p)]);
        assert_eq!(remove_orphans(&mut doc), 0);
    }
}
