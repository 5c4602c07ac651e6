//! JSON dumps of expanded reports, for template debugging.

use crate::error::{Error, Result};
use crate::model::Document;
use crate::template::ExpandStats;
use serde::Serialize;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

#[derive(Serialize)]
struct ReportDump<'a> {
    stats: &'a ExpandStats,
    document: &'a Document,
}

fn write<T: Serialize>(value: &T, format: JsonFormat) -> Result<String> {
    match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(value),
        JsonFormat::Compact => serde_json::to_string(value),
    }
    .map_err(|e| Error::Render(format!("cannot dump report: {}", e)))
}

/// Dump the document model.
///
/// Image bytes are left out; resources show their MIME type and pixel size
/// only.
pub fn to_json(doc: &Document, format: JsonFormat) -> Result<String> {
    write(doc, format)
}

/// Dump an expanded report: what expansion did, then the resulting model.
pub fn report_to_json(doc: &Document, stats: &ExpandStats, format: JsonFormat) -> Result<String> {
    write(
        &ReportDump {
            stats,
            document: doc,
        },
        format,
    )
}
