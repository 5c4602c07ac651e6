//! Detail tables built from level-2 emission lines.

use crate::data::kpi::format_decimal;
use crate::data::DetailRow;
use crate::model::{Table, TableRow};

/// Indirect emissions detail.
pub const EM_INDIRECTES_TABLE: &str = "EM_INDIRECTES_TABLE";

/// Column headers of a detail table.
pub const DETAIL_HEADERS: [&str; 2] = ["Sous-catégorie", "tCO₂e"];

/// Column widths in twips, filling an A4 text width.
pub const DETAIL_COLUMN_WIDTHS: [u32; 2] = [6804, 2268];

/// Builds the two-column breakdown of a post.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailTableBuilder;

impl DetailTableBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Table bound to a content catalog key; `None` for unknown keys or
    /// when there is no row.
    pub fn build_for_key(&self, key: &str, rows: &[DetailRow]) -> Option<Table> {
        match key {
            EM_INDIRECTES_TABLE => self.build(rows),
            _ => None,
        }
    }

    /// One row per detail line; `None` when there is none.
    pub fn build(&self, rows: &[DetailRow]) -> Option<Table> {
        if rows.is_empty() {
            return None;
        }
        let mut table =
            Table::with_header(DETAIL_HEADERS).with_column_widths(DETAIL_COLUMN_WIDTHS.to_vec());
        for row in rows {
            table.add_row(TableRow::from_strings([
                row.label.clone(),
                format_decimal(row.tco2e, 2),
            ]));
        }
        Some(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_detail_table() {
        let rows = vec![
            DetailRow {
                label: "Achats".to_string(),
                tco2e: 1234.5,
            },
            DetailRow {
                label: "Fret".to_string(),
                tco2e: 0.126,
            },
        ];
        let table = DetailTableBuilder::new().build(&rows).unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_widths, Some(vec![6804, 2268]));
        assert_eq!(table.header()[0].plain_text(), "Sous-catégorie\ttCO₂e");
        assert_eq!(table.body()[0].plain_text(), "Achats\t1 234,50");
        assert_eq!(table.body()[1].plain_text(), "Fret\t0,13");
        assert!(DetailTableBuilder::new().build_for_key("OTHER", &rows).is_none());
    }

    #[test]
    fn test_empty_rows() {
        assert!(DetailTableBuilder::new().build(&[]).is_none());
        assert!(DetailTableBuilder::new()
            .build_for_key(EM_INDIRECTES_TABLE, &[])
            .is_none());
    }
}
