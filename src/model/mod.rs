//! Document model types for office document content.
//!
//! The model is the in-memory form a template takes while it is being
//! expanded: an ordered body of paragraphs and tables. Anything the
//! expansion engine does not interpret is carried as raw XML so the
//! package writer can put it back untouched.

mod block;
mod document;
mod paragraph;
mod resource;
mod table;

pub use block::Block;
pub use document::{Document, Metadata};
pub use paragraph::{
    Alignment, ImageRef, InlineContent, Paragraph, ParagraphStyle, TextRun, TextStyle,
};
pub use resource::Resource;
pub use table::{Table, TableCell, TableRow};

/// English Metric Units per inch, the DrawingML length unit.
pub const EMU_PER_INCH: u64 = 914_400;

/// Convert inches to EMU.
pub fn inches_to_emu(inches: f64) -> u64 {
    (inches * EMU_PER_INCH as f64).round().max(0.0) as u64
}
