//! Template expansion engine.
//!
//! A template is a document whose paragraphs carry `{{NAME}}` placeholders
//! and whose repeatable sections are delimited by marker paragraphs such as
//! `[[START_LOT]]` / `[[END_LOT]]`. [`expand`] turns it into a finished
//! report in place.
//!
//! # Submodules
//!
//! - [`marker`]: marker syntax, block location and re-location
//! - [`duplicate`]: deep copies of a block
//! - [`placeholder`]: tokens, [`ValueMap`] and resolution
//! - [`values`]: typed per-rank values
//! - [`inject`]: charts, tables and images in place of anchors
//! - [`cleanup`]: marker and orphan removal
//! - [`outline`]: what a template offers, for inspection
//! - [`expand`](mod@expand): the recursion orchestrator

pub mod cleanup;
pub mod duplicate;
pub mod expand;
pub mod inject;
pub mod marker;
pub mod outline;
pub mod placeholder;
pub mod stats;
pub mod values;

pub use cleanup::{remove_markers, remove_orphans, CleanupOptions};
pub use duplicate::duplicate_block;
pub use expand::{expand, ExpandOptions};
pub use inject::{anchors, Injector, MediaSizes};
pub use marker::{find_all_blocks, find_block, is_marker, relocate, BlockKind, Extent};
pub use outline::{BlockOutline, StrayMarker, TemplateOutline};
pub use placeholder::{find_placeholders, resolve_document, resolve_range, token, ValueMap};
pub use stats::ExpandStats;
pub use values::{ActivityValues, DocumentValues, ItemValues, LotValues};
