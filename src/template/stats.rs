//! Counters collected while expanding a template.

use super::marker::BlockKind;
use serde::{Deserialize, Serialize};

/// Statistics of one expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandStats {
    /// Lot instances produced
    pub lot_count: u32,

    /// Activity instances produced
    pub activity_count: u32,

    /// Ranked post instances produced
    pub post_count: u32,

    /// Residual post instances produced
    pub other_post_count: u32,

    /// Blocks deleted because their context was empty
    pub blocks_removed: u32,

    /// Paragraphs whose text changed during resolution
    pub paragraphs_resolved: u32,

    /// Charts embedded
    pub chart_count: u32,

    /// Detail tables inserted
    pub table_count: u32,

    /// Static images embedded
    pub image_count: u32,

    /// Injections abandoned (no data, unknown key, backend error)
    pub injections_skipped: u32,

    /// Marker paragraphs removed by cleanup
    pub markers_removed: u32,

    /// Orphan placeholder paragraphs removed by cleanup
    pub orphans_removed: u32,
}

impl ExpandStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` instances of `kind`.
    pub fn add_instances(&mut self, kind: BlockKind, count: usize) {
        let count = count as u32;
        match kind {
            BlockKind::Lot => self.lot_count += count,
            BlockKind::Activity => self.activity_count += count,
            BlockKind::Post => self.post_count += count,
            BlockKind::OtherPost => self.other_post_count += count,
        }
    }

    /// Instances produced over every rank.
    pub fn instance_count(&self) -> u32 {
        self.lot_count + self.activity_count + self.post_count + self.other_post_count
    }

    /// Media items embedded or inserted.
    pub fn media_count(&self) -> u32 {
        self.chart_count + self.table_count + self.image_count
    }

    /// Merge another stats instance into this one.
    pub fn merge(&mut self, other: &ExpandStats) {
        self.lot_count += other.lot_count;
        self.activity_count += other.activity_count;
        self.post_count += other.post_count;
        self.other_post_count += other.other_post_count;
        self.blocks_removed += other.blocks_removed;
        self.paragraphs_resolved += other.paragraphs_resolved;
        self.chart_count += other.chart_count;
        self.table_count += other.table_count;
        self.image_count += other.image_count;
        self.injections_skipped += other.injections_skipped;
        self.markers_removed += other.markers_removed;
        self.orphans_removed += other.orphans_removed;
    }
}
