//! The recursion orchestrator and the full expansion pipeline.
//!
//! Ranks nest as LOT → ACTIVITY → {POST, OTHER_POST}. Every rank runs the
//! same steps inside its parent's current extent:
//!
//! 1. compute the entities of the rank from the [`ReportContext`];
//! 2. locate the first block of the rank in the parent extent;
//! 3. with no entity, delete the block (markers included) and stop;
//! 4. otherwise duplicate it until there is one copy per entity;
//! 5. re-scan the copies and fill them **last to first**, so the growth or
//!    shrinkage caused by nested ranks never moves a copy not yet visited.
//!
//! Filling an instance resolves its placeholders, recurses into the child
//! ranks, re-locates the instance from its start index (which only later
//! work can move) and finally injects its media.
//!
//! In an organisation without lots the LOT rank has no entity, so any LOT
//! block is deleted and the ACTIVITY rank runs over the whole document for
//! the organisation itself.

use super::cleanup::{self, CleanupOptions};
use super::duplicate::duplicate_block;
use super::inject::{Injector, MediaSizes};
use super::marker::{find_all_blocks, find_block, relocate, BlockKind, Extent};
use super::placeholder::{resolve_document, resolve_range, ValueMap};
use super::stats::ExpandStats;
use super::values::{ActivityValues, DocumentValues, ItemValues, LotValues};
use crate::data::{EmissionResult, LotEntity, Perimeter, ReportContext};
use crate::model::Document;
use crate::render::Backends;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Options for [`expand`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpandOptions {
    /// Cleanup sub-passes
    pub cleanup: CleanupOptions,

    /// Embed charts, tables and images; when off, media anchors are left
    /// to the orphan cleanup
    pub inject_media: bool,

    /// Display sizes of injected media
    pub sizes: MediaSizes,
}

impl ExpandOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cleanup sub-passes.
    pub fn with_cleanup(mut self, cleanup: CleanupOptions) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Enable or disable media injection.
    pub fn with_media(mut self, inject: bool) -> Self {
        self.inject_media = inject;
        self
    }

    /// Set media display sizes.
    pub fn with_sizes(mut self, sizes: MediaSizes) -> Self {
        self.sizes = sizes;
        self
    }
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            cleanup: CleanupOptions::default(),
            inject_media: true,
            sizes: MediaSizes::default(),
        }
    }
}

/// Expand `doc` in place for the report described by `ctx`.
///
/// Pipeline: document-level values, rank recursion, marker cleanup,
/// document-level media, orphan cleanup. Never fails: sections without
/// data are removed and media that cannot be produced are skipped.
pub fn expand(
    doc: &mut Document,
    ctx: &ReportContext,
    backends: &Backends,
    options: &ExpandOptions,
) -> ExpandStats {
    let mut expander = Expander::new(ctx, backends, options);

    let globals = DocumentValues::from_context(ctx).to_values();
    expander.stats.paragraphs_resolved += resolve_document(doc, &globals) as u32;

    expander.run(doc);

    if options.cleanup.remove_markers {
        expander.stats.markers_removed += cleanup::remove_markers(doc) as u32;
    }
    if let Some(injector) = &expander.injector {
        injector.inject_document(doc, &mut expander.stats);
    }
    if options.cleanup.remove_orphans {
        expander.stats.orphans_removed += cleanup::remove_orphans(doc) as u32;
    }

    doc.metadata.generated = Some(Utc::now());

    let stats = expander.stats;
    log::info!(
        "expanded report for {} ({}): {} instance(s), {} media, {} block(s) removed",
        ctx.org_name(),
        ctx.year(),
        stats.instance_count(),
        stats.media_count(),
        stats.blocks_removed
    );
    stats
}

struct Expander<'a> {
    ctx: &'a ReportContext,
    injector: Option<Injector<'a>>,
    stats: ExpandStats,
}

impl<'a> Expander<'a> {
    fn new(ctx: &'a ReportContext, backends: &'a Backends, options: &ExpandOptions) -> Self {
        Self {
            ctx,
            injector: options
                .inject_media
                .then(|| Injector::new(ctx, backends, options.sizes)),
            stats: ExpandStats::new(),
        }
    }

    fn run(&mut self, doc: &mut Document) {
        let Some(all) = Extent::whole(doc) else {
            return;
        };

        if self.ctx.tree().has_lots() && find_block(doc, BlockKind::Lot, Some(all)).is_some() {
            let lots = self.ctx.lots();
            self.expand_rank(doc, all, BlockKind::Lot, lots.len(), |this, doc, i, ext| {
                this.fill_lot(doc, ext, &lots[i])
            });
        } else {
            self.expand_rank(doc, all, BlockKind::Lot, 0, |_, _, _, _| {});
            if let Some(all) = Extent::whole(doc) {
                self.expand_activities(doc, all, &Perimeter::Org);
            }
        }
    }

    /// Steps 2 to 5 of a rank. `fill` receives each instance with its
    /// position among the `count` entities, last first.
    fn expand_rank<F>(
        &mut self,
        doc: &mut Document,
        parent: Extent,
        kind: BlockKind,
        count: usize,
        mut fill: F,
    ) where
        F: FnMut(&mut Self, &mut Document, usize, Extent),
    {
        let Some(block) = find_block(doc, kind, Some(parent)) else {
            if count > 0 {
                log::debug!("no {} block for {} entit(ies)", kind, count);
            }
            return;
        };

        if count == 0 {
            let removed = doc.remove_range(block.range());
            self.stats.blocks_removed += 1;
            log::debug!(
                "{} block at {} removed ({} element(s)), no entity",
                kind,
                block.start,
                removed
            );
            return;
        }

        duplicate_block(doc, block, count - 1);
        let copies = Extent::new(block.start, block.start + count * block.len() - 1);
        let instances: Vec<Extent> = find_all_blocks(doc, kind, Some(copies))
            .into_iter()
            .take(count)
            .collect();
        if instances.len() != count {
            log::warn!(
                "{} block: expected {} instance(s), found {}",
                kind,
                count,
                instances.len()
            );
        }

        for (i, instance) in instances.iter().enumerate().rev() {
            fill(self, doc, i, *instance);
        }
        self.stats.add_instances(kind, instances.len());
    }

    fn resolve(&mut self, doc: &mut Document, extent: Extent, values: &ValueMap) {
        self.stats.paragraphs_resolved += resolve_range(doc, extent, values) as u32;
    }

    fn fill_lot(&mut self, doc: &mut Document, extent: Extent, lot: &LotEntity) {
        log::debug!("filling lot {} at {}", lot.node_id, extent.start);
        let values = LotValues::from_context(self.ctx, lot).to_values();
        self.resolve(doc, extent, &values);

        if let Some(extent) = relocate(doc, BlockKind::Lot, extent.start) {
            self.expand_activities(doc, extent, &Perimeter::Lot(lot.node_id.clone()));
        }
    }

    fn expand_activities(&mut self, doc: &mut Document, parent: Extent, perimeter: &Perimeter) {
        let ctx = self.ctx;
        let activities: Vec<(String, &EmissionResult)> = ctx
            .activities(perimeter)
            .into_iter()
            .filter_map(|a| ctx.result(perimeter, &a).map(|r| (a, r)))
            .collect();

        self.expand_rank(
            doc,
            parent,
            BlockKind::Activity,
            activities.len(),
            |this, doc, i, ext| {
                let (activity, result) = &activities[i];
                this.fill_activity(doc, ext, perimeter, activity, result)
            },
        );
    }

    fn fill_activity(
        &mut self,
        doc: &mut Document,
        extent: Extent,
        perimeter: &Perimeter,
        activity: &str,
        result: &EmissionResult,
    ) {
        log::debug!("filling activity {} at {}", activity, extent.start);
        let start = extent.start;
        let values = ActivityValues::from_context(self.ctx, perimeter, activity, result).to_values();
        self.resolve(doc, extent, &values);

        for (kind, postes) in [
            (BlockKind::Post, &result.top_postes),
            (BlockKind::OtherPost, &result.other_postes),
        ] {
            let Some(current) = relocate(doc, BlockKind::Activity, start) else {
                return;
            };
            self.expand_rank(doc, current, kind, postes.len(), |this, doc, i, ext| {
                this.fill_item(doc, ext, kind, i, perimeter, result)
            });
        }

        let Some(current) = relocate(doc, BlockKind::Activity, start) else {
            return;
        };
        if let Some(injector) = &self.injector {
            injector.inject_activity(doc, current, result, &mut self.stats);
        }
    }

    fn fill_item(
        &mut self,
        doc: &mut Document,
        extent: Extent,
        kind: BlockKind,
        index: usize,
        perimeter: &Perimeter,
        result: &EmissionResult,
    ) {
        let postes = match kind {
            BlockKind::OtherPost => &result.other_postes,
            _ => &result.top_postes,
        };
        let Some(poste) = postes.get(index) else {
            return;
        };

        let values = ItemValues::from_context(self.ctx, kind, index + 1, poste, result).to_values();
        self.resolve(doc, extent, &values);

        let Some(current) = relocate(doc, kind, extent.start) else {
            return;
        };
        let activity = result.activity.as_deref().unwrap_or_default();
        if let Some(injector) = &self.injector {
            injector.inject_item(doc, current, kind, perimeter, activity, poste, &mut self.stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ReportData;
    use crate::model::{Block, Paragraph};

    fn context(json: &str) -> ReportContext {
        ReportContext::build(ReportData::from_json_str(json).unwrap()).unwrap()
    }

    fn flat_context() -> ReportContext {
        context(
            r#"{
            "year": 2024,
            "top_n": 1,
            "org_tree": [
                {"node_id": "ORG", "node_type": "ORG", "node_name": "Régie"},
                {"node_id": "E1", "parent_id": "ORG", "node_type": "ENT", "node_name": "STEP", "activity": "EU"}
            ],
            "emissions": [
                {"node_id": "E1", "poste_l1_code": "ELEC", "scope": 2, "tco2e": 60.0},
                {"node_id": "E1", "poste_l1_code": "FUEL", "scope": 1, "tco2e": 40.0}
            ]
        }"#,
        )
    }

    fn template(lines: &[&str]) -> Document {
        Document::from_blocks(
            lines
                .iter()
                .map(|l| Block::Paragraph(Paragraph::with_text(*l)))
                .collect(),
        )
    }

    fn no_media() -> ExpandOptions {
        ExpandOptions::new().with_media(false)
    }

    #[test]
    fn test_flat_topology() {
        let ctx = flat_context();
        let mut doc = template(&[
            "{{ORG_NAME}} {{annee}}",
            "[[START_LOT]]",
            "{{LOT_NAME}}",
            "[[END_LOT]]",
            "[[START_ACTIVITY]]",
            "{{ENTITY_NAME}} – {{ENT_ACTIVITY}}",
            "[[START_POST]]",
            "{{POST_RANK}}. {{POST_CODE}}",
            "[[END_POST]]",
            "[[START_OTHER_POST]]",
            "- {{OTHER_POST_CODE}}",
            "[[END_OTHER_POST]]",
            "[[END_ACTIVITY]]",
        ]);

        let stats = expand(&mut doc, &ctx, &Backends::default(), &no_media());
        assert_eq!(
            doc.paragraph_texts(),
            vec!["Régie 2024", "Régie – Eaux usées", "1. ELEC", "- FUEL"]
        );
        assert_eq!(stats.lot_count, 0);
        assert_eq!(stats.blocks_removed, 1);
        assert_eq!(stats.activity_count, 1);
        assert_eq!(stats.post_count, 1);
        assert_eq!(stats.other_post_count, 1);
        assert!(doc.metadata.generated.is_some());
    }

    #[test]
    fn test_cleanup_can_be_disabled() {
        let ctx = flat_context();
        let mut doc = template(&["{{UNKNOWN}}", "[[START_X]]"]);
        let options = no_media().with_cleanup(CleanupOptions::none());
        let stats = expand(&mut doc, &ctx, &Backends::default(), &options);
        assert_eq!(doc.len(), 2);
        assert_eq!(stats.orphans_removed, 0);
    }

    #[test]
    fn test_activity_chart_injected() {
        let ctx = flat_context();
        let mut doc = template(&[
            "[[START_ACTIVITY]]",
            "{{chart_pie_scope_entity_activity}}",
            "[[END_ACTIVITY]]",
        ]);
        let stats = expand(&mut doc, &ctx, &Backends::default(), &ExpandOptions::default());
        assert_eq!(stats.chart_count, 1);
        assert_eq!(doc.len(), 1);
        assert!(doc.paragraph(0).unwrap().has_images());
        assert_eq!(doc.resources.len(), 1);
    }
}
