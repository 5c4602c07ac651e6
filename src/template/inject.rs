//! Media and table injection.
//!
//! Some placeholders stand for an artifact rather than text. The injector
//! finds the anchor paragraph holding such a token, asks a backend for the
//! artifact and puts it in place of the anchor. Nothing here is fatal: a
//! missing catalog entry, an empty series or a backend error leaves the
//! anchor untouched for the orphan cleanup to remove.

use super::marker::{BlockKind, Extent};
use super::placeholder::token;
use super::stats::ExpandStats;
use crate::data::{EmissionResult, Perimeter, PosteEmission, ReportContext};
use crate::model::{inches_to_emu, Block, Document, ImageRef, Paragraph, Resource, Table};
use crate::render::{Backends, ChartSpec};
use serde::{Deserialize, Serialize};

/// Anchor names (without braces).
pub mod anchors {
    /// Scope split of the current activity
    pub const ACTIVITY_SCOPE_PIE: &str = "chart_pie_scope_entity_activity";
    /// Post split of the current activity
    pub const ACTIVITY_POSTES_PIE: &str = "chart_pie_postes_entity_activity";

    /// Scope split of the organisation
    pub const ORG_SCOPE: &str = "chart_emissions_scope_org";
    /// Post split of the organisation
    pub const ORG_TOTAL: &str = "chart_emissions_total_org";
    /// Contribution of each lot
    pub const LOT_CONTRIBUTION: &str = "chart_contrib_lot";
    /// Electricity emissions per activity
    pub const ORG_ELECTRICITY: &str = "chart_emissions_elec_org";
    /// Largest posts of the organisation
    pub const TOP3_BARS: &str = "chart_batonnet_inter_lot_top3";
    /// Organisation logo
    pub const LOGO: &str = "LOGO";

    /// Chart anchor of a ranked or residual post, e.g. `POST_CHART`.
    pub fn item_chart(kind: super::BlockKind) -> String {
        format!("{}_CHART", kind.name())
    }

    /// Table anchor of a ranked or residual post, e.g. `POST_TABLE`.
    pub fn item_table(kind: super::BlockKind) -> String {
        format!("{}_TABLE", kind.name())
    }

    /// Image anchor of a ranked or residual post, e.g. `POST_IMAGE`.
    pub fn item_image(kind: super::BlockKind) -> String {
        format!("{}_IMAGE", kind.name())
    }
}

/// Asset key of the organisation logo.
pub const LOGO_ASSET: &str = "logo";

/// Posts shown in the organisation post split before grouping the rest.
const ORG_TOTAL_SLICES: usize = 5;

/// Display sizes of injected media, in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaSizes {
    /// Chart width
    pub chart_width: f64,
    /// Chart height
    pub chart_height: f64,
    /// Static image width
    pub image_width: f64,
    /// Static image height when the aspect ratio is unknown
    pub image_height: f64,
    /// Logo width
    pub logo_width: f64,
}

impl MediaSizes {
    /// Set the chart size.
    pub fn with_chart_size(mut self, width: f64, height: f64) -> Self {
        self.chart_width = width;
        self.chart_height = height;
        self
    }

    /// Set the static image width.
    pub fn with_image_width(mut self, width: f64) -> Self {
        self.image_width = width;
        self
    }

    /// Set the logo width.
    pub fn with_logo_width(mut self, width: f64) -> Self {
        self.logo_width = width;
        self
    }

    fn chart(&self) -> (u64, u64) {
        (
            inches_to_emu(self.chart_width),
            inches_to_emu(self.chart_height),
        )
    }

    /// Size of a static image drawn `width` inches wide.
    fn scaled(&self, resource: &Resource, width: f64) -> (u64, u64) {
        let fallback = self.image_height / self.image_width;
        let ratio = resource.aspect_ratio().unwrap_or(fallback);
        (inches_to_emu(width), inches_to_emu(width * ratio))
    }
}

impl Default for MediaSizes {
    fn default() -> Self {
        Self {
            chart_width: 6.0,
            chart_height: 4.5,
            image_width: 5.0,
            image_height: 3.75,
            logo_width: 2.0,
        }
    }
}

fn contains_token(paragraph: &Paragraph, tok: &str) -> bool {
    paragraph.plain_text().contains(tok)
}

fn body_bounds(doc: &Document, extent: Extent) -> Option<(usize, usize)> {
    let last = extent.end.min(doc.len().checked_sub(1)?);
    (extent.start <= last).then_some((extent.start, last))
}

/// Whether some paragraph of `extent` (body or table cell) holds `tok`.
pub fn has_anchor(doc: &Document, extent: Extent, tok: &str) -> bool {
    let Some((first, last)) = body_bounds(doc, extent) else {
        return false;
    };
    doc.body[first..=last].iter().any(|block| match block {
        Block::Paragraph(p) => contains_token(p, tok),
        Block::Table(t) => t.paragraphs().iter().any(|p| contains_token(p, tok)),
        Block::Raw { .. } => false,
    })
}

/// Location of an anchor paragraph: the block list holding it, its index
/// in that list and whether the list is a table cell.
struct AnchorSlot<'a> {
    blocks: &'a mut Vec<Block>,
    index: usize,
    in_cell: bool,
}

fn cell_slot<'a>(table: &'a mut Table, tok: &str) -> Option<AnchorSlot<'a>> {
    for row in &mut table.rows {
        for cell in &mut row.cells {
            let hit = cell
                .content
                .iter()
                .position(|b| matches!(b, Block::Paragraph(p) if contains_token(p, tok)));
            if let Some(index) = hit {
                return Some(AnchorSlot {
                    blocks: &mut cell.content,
                    index,
                    in_cell: true,
                });
            }
            for block in &mut cell.content {
                if let Block::Table(nested) = block {
                    if let Some(slot) = cell_slot(nested, tok) {
                        return Some(slot);
                    }
                }
            }
        }
    }
    None
}

/// First anchor holding `tok` in `extent`: body paragraphs first, then the
/// cells of the tables positioned in `extent`.
fn anchor_slot<'a>(doc: &'a mut Document, extent: Extent, tok: &str) -> Option<AnchorSlot<'a>> {
    let (first, last) = body_bounds(doc, extent)?;

    let body_hit = (first..=last)
        .find(|&i| matches!(&doc.body[i], Block::Paragraph(p) if contains_token(p, tok)));
    if let Some(index) = body_hit {
        return Some(AnchorSlot {
            blocks: &mut doc.body,
            index,
            in_cell: false,
        });
    }

    let table_index = (first..=last).find(|&i| {
        matches!(&doc.body[i], Block::Table(t)
            if t.paragraphs().iter().any(|p| contains_token(p, tok)))
    })?;
    match &mut doc.body[table_index] {
        Block::Table(table) => cell_slot(table, tok),
        _ => None,
    }
}

/// Replace the anchor holding `tok` by an inline image. Returns `false`
/// when there is no anchor.
pub fn insert_image(
    doc: &mut Document,
    extent: Extent,
    tok: &str,
    resource: Resource,
    size_emu: (u64, u64),
) -> bool {
    if !has_anchor(doc, extent, tok) {
        return false;
    }
    let resource_id = doc.add_resource(resource);
    let Some(slot) = anchor_slot(doc, extent, tok) else {
        return false;
    };
    if let Some(Block::Paragraph(p)) = slot.blocks.get_mut(slot.index) {
        p.clear();
        p.add_image(ImageRef {
            resource_id,
            width_emu: size_emu.0,
            height_emu: size_emu.1,
            alt_text: Some(tok.trim_matches(|c: char| c == '{' || c == '}').to_string()),
        });
    }
    true
}

/// Put `table` right after the anchor holding `tok` and drop the anchor.
///
/// Inside a table cell the anchor is blanked instead, since a cell must end
/// with a paragraph. Returns `false` when there is no anchor.
pub fn insert_table(doc: &mut Document, extent: Extent, tok: &str, table: Table) -> bool {
    let Some(slot) = anchor_slot(doc, extent, tok) else {
        return false;
    };
    if slot.in_cell {
        slot.blocks.insert(slot.index, Block::Table(table));
        if let Some(Block::Paragraph(p)) = slot.blocks.get_mut(slot.index + 1) {
            p.clear();
        }
    } else {
        slot.blocks.insert(slot.index + 1, Block::Table(table));
        slot.blocks.remove(slot.index);
    }
    true
}

/// Series of posts with their labels, in the given order.
fn poste_series(ctx: &ReportContext, postes: &[PosteEmission]) -> Vec<(String, f64)> {
    postes
        .iter()
        .map(|p| (ctx.poste_label(&p.code).to_string(), p.tco2e))
        .collect()
}

fn scope_series(result: &EmissionResult) -> Vec<(String, f64)> {
    vec![
        ("Scope 1".to_string(), result.scope1_tco2e),
        ("Scope 2".to_string(), result.scope2_tco2e),
        ("Scope 3".to_string(), result.scope3_tco2e),
    ]
}

fn is_electricity(code: &str, label: &str) -> bool {
    let label = label.to_uppercase();
    code.to_uppercase().contains("ELEC") || label.contains("ELEC") || label.contains("ÉLEC")
}

/// Injects charts, tables and images with the configured backends.
pub struct Injector<'a> {
    ctx: &'a ReportContext,
    backends: &'a Backends,
    sizes: MediaSizes,
}

impl<'a> Injector<'a> {
    /// Injector drawing on `backends`, placing media at `sizes`.
    pub fn new(ctx: &'a ReportContext, backends: &'a Backends, sizes: MediaSizes) -> Self {
        Self {
            ctx,
            backends,
            sizes,
        }
    }

    fn place_chart(
        &self,
        doc: &mut Document,
        extent: Extent,
        name: &str,
        spec: Option<ChartSpec>,
        stats: &mut ExpandStats,
    ) {
        let tok = token(name);
        if !has_anchor(doc, extent, &tok) {
            return;
        }
        let Some(spec) = spec else {
            stats.injections_skipped += 1;
            return;
        };
        match self.backends.charts.render(&spec) {
            Ok(Some(resource)) => {
                if insert_image(doc, extent, &tok, resource, self.sizes.chart()) {
                    stats.chart_count += 1;
                }
            }
            Ok(None) => {
                log::debug!("no data for chart {}", tok);
                stats.injections_skipped += 1;
            }
            Err(e) => {
                log::warn!("chart {} skipped: {}", tok, e);
                stats.injections_skipped += 1;
            }
        }
    }

    fn place_asset(
        &self,
        doc: &mut Document,
        extent: Extent,
        name: &str,
        key: &str,
        width: f64,
        stats: &mut ExpandStats,
    ) {
        let tok = token(name);
        if !has_anchor(doc, extent, &tok) {
            return;
        }
        match self.backends.assets.load(key) {
            Ok(Some(resource)) => {
                let size = self.sizes.scaled(&resource, width);
                if insert_image(doc, extent, &tok, resource, size) {
                    stats.image_count += 1;
                }
            }
            Ok(None) => {
                log::debug!("no image for asset key '{}'", key);
                stats.injections_skipped += 1;
            }
            Err(e) => {
                log::warn!("image '{}' skipped: {}", key, e);
                stats.injections_skipped += 1;
            }
        }
    }

    /// Chart, table and image of one ranked or residual post, as selected
    /// by its catalog entry.
    pub fn inject_item(
        &self,
        doc: &mut Document,
        extent: Extent,
        kind: BlockKind,
        perimeter: &Perimeter,
        activity: &str,
        poste: &PosteEmission,
        stats: &mut ExpandStats,
    ) {
        let Some(content) = self.ctx.content(&poste.code, activity) else {
            return;
        };

        if let Some(key) = content.chart_key.as_deref() {
            let rows = self.ctx.detail_rows(perimeter, activity, &poste.code);
            let spec = ChartSpec::from_catalog_key(key, &rows);
            if spec.is_none() {
                log::warn!("unknown chart key '{}' for {}", key, poste.code);
            }
            self.place_chart(doc, extent, &anchors::item_chart(kind), spec, stats);
        }

        if let Some(key) = content.table_key.as_deref() {
            let tok = token(&anchors::item_table(kind));
            if has_anchor(doc, extent, &tok) {
                let rows = self.ctx.detail_rows(perimeter, activity, &poste.code);
                match self.backends.tables.build_for_key(key, &rows) {
                    Some(table) => {
                        if insert_table(doc, extent, &tok, table) {
                            stats.table_count += 1;
                        }
                    }
                    None => {
                        log::debug!("no table for key '{}' and post {}", key, poste.code);
                        stats.injections_skipped += 1;
                    }
                }
            }
        }

        if let Some(key) = content.image_key.as_deref() {
            let name = anchors::item_image(kind);
            self.place_asset(doc, extent, &name, key, self.sizes.image_width, stats);
        }
    }

    /// Scope and post split charts of one activity instance.
    pub fn inject_activity(
        &self,
        doc: &mut Document,
        extent: Extent,
        result: &EmissionResult,
        stats: &mut ExpandStats,
    ) {
        let scopes = ChartSpec::pie("Répartition par scope", scope_series(result));
        self.place_chart(doc, extent, anchors::ACTIVITY_SCOPE_PIE, Some(scopes), stats);

        let mut listed = result.top_postes.clone();
        listed.extend(result.other_postes.iter().cloned());
        let postes = ChartSpec::pie("Répartition par poste", poste_series(self.ctx, &listed));
        self.place_chart(doc, extent, anchors::ACTIVITY_POSTES_PIE, Some(postes), stats);
    }

    /// Organisation-level charts and the logo, anywhere in the document.
    pub fn inject_document(&self, doc: &mut Document, stats: &mut ExpandStats) {
        let Some(all) = Extent::whole(doc) else {
            return;
        };
        let org = self.ctx.org_result();

        let scopes = ChartSpec::pie("Émissions par scope", scope_series(org));
        self.place_chart(doc, all, anchors::ORG_SCOPE, Some(scopes), stats);

        self.place_chart(doc, all, anchors::ORG_TOTAL, Some(self.org_total_chart()), stats);

        let contribution = self.lot_contribution_chart();
        self.place_chart(doc, all, anchors::LOT_CONTRIBUTION, contribution, stats);

        let electricity = self.electricity_chart();
        self.place_chart(doc, all, anchors::ORG_ELECTRICITY, Some(electricity), stats);

        let top = org.top_postes.iter().take(3).cloned().collect::<Vec<_>>();
        let top3 = ChartSpec::bar("Postes principaux", poste_series(self.ctx, &top));
        self.place_chart(doc, all, anchors::TOP3_BARS, Some(top3), stats);

        let logo_width = self.sizes.logo_width;
        self.place_asset(doc, all, anchors::LOGO, LOGO_ASSET, logo_width, stats);
    }

    /// Largest posts of the organisation, the rest grouped as "Autres".
    fn org_total_chart(&self) -> ChartSpec {
        let mut postes: Vec<PosteEmission> = self
            .ctx
            .org_result()
            .emissions_by_poste
            .iter()
            .filter(|(code, value)| **value > 0.0 && self.ctx.overrides().is_poste_shown(code))
            .map(|(code, value)| PosteEmission {
                code: code.clone(),
                tco2e: *value,
            })
            .collect();
        postes.sort_by(|a, b| {
            b.tco2e
                .partial_cmp(&a.tco2e)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.code.cmp(&b.code))
        });

        let rest: f64 = postes.iter().skip(ORG_TOTAL_SLICES).map(|p| p.tco2e).sum();
        postes.truncate(ORG_TOTAL_SLICES);
        let mut series = poste_series(self.ctx, &postes);
        if rest > 0.0 {
            series.push(("Autres".to_string(), rest));
        }
        ChartSpec::pie("Émissions par poste", series)
    }

    /// `None` in a flat organisation.
    fn lot_contribution_chart(&self) -> Option<ChartSpec> {
        if !self.ctx.tree().has_lots() {
            return None;
        }
        let series = self
            .ctx
            .lots()
            .into_iter()
            .map(|lot| {
                let total = self.ctx.perimeter_total(&Perimeter::Lot(lot.node_id));
                (lot.name, total)
            })
            .filter(|(_, total)| *total > 0.0)
            .collect();
        Some(ChartSpec::pie("Contribution des lots", series))
    }

    fn electricity_chart(&self) -> ChartSpec {
        let has_lots = self.ctx.tree().has_lots();
        let mut by_activity: Vec<(String, f64)> = Vec::new();
        for result in self.ctx.emissions().group_results(has_lots) {
            let Some(activity) = result.activity.as_deref() else {
                continue;
            };
            let elec: f64 = result
                .emissions_by_poste
                .iter()
                .filter(|(code, _)| is_electricity(code, self.ctx.poste_label(code)))
                .map(|(_, v)| *v)
                .sum();
            match by_activity.iter_mut().find(|(a, _)| a == activity) {
                Some(entry) => entry.1 += elec,
                None => by_activity.push((activity.to_string(), elec)),
            }
        }
        ChartSpec::pie("Électricité par activité", by_activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TableCell, TableRow};

    fn text_doc(lines: &[&str]) -> Document {
        Document::from_blocks(
            lines
                .iter()
                .map(|l| Block::Paragraph(Paragraph::with_text(*l)))
                .collect(),
        )
    }

    fn png() -> Resource {
        Resource::png(vec![0x89, b'P', b'N', b'G']).with_dimensions(4, 2)
    }

    #[test]
    fn test_insert_image_in_body() {
        let mut doc = text_doc(&["intro", "{{POST_CHART}}", "{{POST_CHART}}"]);
        let all = Extent::whole(&doc).unwrap();
        assert!(insert_image(&mut doc, all, "{{POST_CHART}}", png(), (10, 5)));

        let anchor = doc.paragraph(1).unwrap();
        assert!(anchor.has_images());
        assert_eq!(anchor.plain_text(), "");
        // Only the first anchor is used.
        assert_eq!(doc.paragraph(2).unwrap().plain_text(), "{{POST_CHART}}");
        assert_eq!(doc.resources.len(), 1);
    }

    #[test]
    fn test_insert_image_without_anchor() {
        let mut doc = text_doc(&["intro"]);
        let all = Extent::whole(&doc).unwrap();
        assert!(!insert_image(&mut doc, all, "{{LOGO}}", png(), (1, 1)));
        assert!(doc.resources.is_empty());
    }

    #[test]
    fn test_insert_image_respects_extent() {
        let mut doc = text_doc(&["{{LOGO}}", "other"]);
        assert!(!insert_image(
            &mut doc,
            Extent::new(1, 1),
            "{{LOGO}}",
            png(),
            (1, 1)
        ));
    }

    #[test]
    fn test_insert_table_replaces_anchor() {
        let mut doc = text_doc(&["a", "{{POST_TABLE}}", "b"]);
        let all = Extent::whole(&doc).unwrap();
        assert!(insert_table(
            &mut doc,
            all,
            "{{POST_TABLE}}",
            Table::with_header(["x"])
        ));
        assert_eq!(doc.len(), 3);
        assert!(doc.get(1).unwrap().is_table());
        assert_eq!(doc.paragraph(2).unwrap().plain_text(), "b");
    }

    #[test]
    fn test_insert_table_in_cell() {
        let mut outer = Table::new();
        outer.add_row(TableRow::new(vec![TableCell::text("{{POST_TABLE}}")]));
        let mut doc = Document::new();
        doc.add_table(outer);

        let all = Extent::whole(&doc).unwrap();
        assert!(insert_table(
            &mut doc,
            all,
            "{{POST_TABLE}}",
            Table::with_header(["x"])
        ));

        let cell = &doc.get(0).and_then(Block::as_table).unwrap().rows[0].cells[0];
        assert_eq!(cell.content.len(), 2);
        assert!(cell.content[0].is_table());
        assert!(cell.content[1].is_paragraph());
        assert_eq!(cell.content[1].plain_text(), "");
    }

    #[test]
    fn test_image_anchor_in_nested_cell() {
        let mut inner = Table::new();
        inner.add_row(TableRow::from_strings(["{{LOGO}}"]));
        let mut outer = Table::new();
        outer.add_row(TableRow::new(vec![TableCell::with_content(vec![
            Block::Table(inner),
        ])]));
        let mut doc = Document::new();
        doc.add_table(outer);

        let all = Extent::whole(&doc).unwrap();
        assert!(insert_image(&mut doc, all, "{{LOGO}}", png(), (1, 1)));
        let table = doc.get(0).and_then(Block::as_table).unwrap();
        assert!(table.paragraphs()[0].has_images());
    }

    #[test]
    fn test_media_sizes() {
        let sizes = MediaSizes::default();
        assert_eq!(sizes.chart(), (5_486_400, 4_114_800));
        // 4×2 px image at 5 in wide: 2.5 in high.
        assert_eq!(sizes.scaled(&png(), 5.0), (4_572_000, 2_286_000));
        // Unknown ratio falls back to 3.75 / 5.
        let no_size = Resource::png(vec![1]);
        assert_eq!(sizes.scaled(&no_size, 5.0), (4_572_000, 3_429_000));
    }

    #[test]
    fn test_electricity_matching() {
        assert!(is_electricity("ELEC", "Électricité"));
        assert!(is_electricity("E1", "Électricité"));
        assert!(is_electricity("CONSO_ELEC", ""));
        assert!(!is_electricity("FRET", "Fret"));
    }
}
