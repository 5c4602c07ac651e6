//! Block duplication.

use super::marker::Extent;
use crate::model::{Block, Document};

/// Append `copies` deep clones of `extent` (markers included) right after it.
///
/// The result is the original followed by copy 1 … copy N, each an
/// independent value with every nested marker and placeholder left
/// unresolved. `copies == 0` leaves the document untouched. Returns the
/// number of elements inserted.
pub fn duplicate_block(doc: &mut Document, extent: Extent, copies: usize) -> usize {
    if copies == 0 || extent.end >= doc.len() {
        return 0;
    }

    let template: Vec<Block> = doc.body[extent.range()].to_vec();
    let mut clones = Vec::with_capacity(template.len() * copies);
    for _ in 0..copies {
        clones.extend(template.iter().cloned());
    }

    let inserted = clones.len();
    doc.splice_after(extent.end, clones);
    log::debug!(
        "duplicated elements {}..={} {} time(s), {} element(s) inserted",
        extent.start,
        extent.end,
        copies,
        inserted
    );
    inserted
}
