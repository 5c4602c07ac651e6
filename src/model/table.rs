//! Table types.

use super::{Block, Paragraph, TextRun};
use serde::{Deserialize, Serialize};

/// A table structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Rows in the table
    pub rows: Vec<TableRow>,

    /// Number of header rows (0 = no header)
    pub header_rows: u8,

    /// Column widths in twentieths of a point, used when no grid is known
    pub column_widths: Option<Vec<u32>>,

    /// Table properties (`w:tblPr`) kept from the template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties_xml: Option<String>,

    /// Column grid (`w:tblGrid`) kept from the template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_xml: Option<String>,
}

impl Table {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            header_rows: 0,
            column_widths: None,
            properties_xml: None,
            grid_xml: None,
        }
    }

    /// Create a table whose first row is a bold header built from `headers`.
    pub fn with_header<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        let mut table = Self::new();
        table.add_row(TableRow::header_from_strings(headers));
        table.header_rows = 1;
        table
    }

    /// Set column widths (twips) and return self.
    pub fn with_column_widths(mut self, widths: Vec<u32>) -> Self {
        self.column_widths = Some(widths);
        self
    }

    /// Add a row to the table.
    pub fn add_row(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns (based on first row).
    pub fn column_count(&self) -> usize {
        self.rows.first().map(|r| r.cells.len()).unwrap_or(0)
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get header rows.
    pub fn header(&self) -> &[TableRow] {
        let n = (self.header_rows as usize).min(self.rows.len());
        &self.rows[..n]
    }

    /// Get body rows (non-header).
    pub fn body(&self) -> &[TableRow] {
        let n = (self.header_rows as usize).min(self.rows.len());
        &self.rows[n..]
    }

    /// Get plain text representation of the table.
    pub fn plain_text(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.plain_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Visit every paragraph of every cell, descending into nested tables.
    pub fn for_each_paragraph_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Paragraph),
    {
        for row in &mut self.rows {
            for cell in &mut row.cells {
                for block in &mut cell.content {
                    match block {
                        Block::Paragraph(p) => f(p),
                        Block::Table(t) => t.for_each_paragraph_mut(f),
                        Block::Raw { .. } => {}
                    }
                }
            }
        }
    }

    /// Collect every paragraph of every cell, descending into nested tables.
    pub fn paragraphs(&self) -> Vec<&Paragraph> {
        let mut out = Vec::new();
        for row in &self.rows {
            for cell in &row.cells {
                for block in &cell.content {
                    match block {
                        Block::Paragraph(p) => out.push(p),
                        Block::Table(t) => out.extend(t.paragraphs()),
                        Block::Raw { .. } => {}
                    }
                }
            }
        }
        out
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

/// A table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    /// Cells in the row
    pub cells: Vec<TableCell>,

    /// Whether this is a header row
    pub is_header: bool,

    /// Row properties (`w:trPr`) kept from the template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties_xml: Option<String>,
}

impl TableRow {
    /// Create a new row with cells.
    pub fn new(cells: Vec<TableCell>) -> Self {
        Self {
            cells,
            is_header: false,
            properties_xml: None,
        }
    }

    /// Create a row from text values.
    pub fn from_strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::new(values.into_iter().map(TableCell::text).collect())
    }

    /// Create a header row with bold text values.
    pub fn header_from_strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self {
            cells: values
                .into_iter()
                .map(|v| {
                    let mut p = Paragraph::new();
                    p.add_run(TextRun::bold(v));
                    TableCell::with_content(vec![Block::Paragraph(p)])
                })
                .collect(),
            is_header: true,
            properties_xml: None,
        }
    }

    /// Get plain text representation.
    pub fn plain_text(&self) -> String {
        self.cells
            .iter()
            .map(|c| c.plain_text())
            .collect::<Vec<_>>()
            .join("\t")
    }
}

/// A table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    /// Cell content (paragraphs and nested tables)
    pub content: Vec<Block>,

    /// Cell properties (`w:tcPr`) kept from the template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties_xml: Option<String>,
}

impl TableCell {
    /// Create a new cell with text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_content(vec![Block::Paragraph(Paragraph::with_text(text))])
    }

    /// Create an empty cell.
    ///
    /// Cells must hold at least one paragraph when serialized, so the
    /// "empty" cell carries one blank paragraph.
    pub fn empty() -> Self {
        Self::with_content(vec![Block::Paragraph(Paragraph::new())])
    }

    /// Create a cell with the given blocks.
    pub fn with_content(content: Vec<Block>) -> Self {
        Self {
            content,
            properties_xml: None,
        }
    }

    /// Get plain text content.
    pub fn plain_text(&self) -> String {
        self.content
            .iter()
            .map(|b| b.plain_text())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check if the cell is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() || self.plain_text().trim().is_empty()
    }
}
