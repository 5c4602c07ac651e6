//! Typed value objects, one per rank, each producing the [`ValueMap`] of
//! one repetition.
//!
//! Placeholder names live here as constants so every name the engine can
//! substitute is visible in one place.

use super::marker::BlockKind;
use super::placeholder::ValueMap;
use crate::data::kpi::{
    activity_volume_comparison_text, excluded_postes_note, flight_equivalent, format_decimal,
    format_kg_per_m3, format_number, kg_per_m3, person_equivalent, top_postes_list_text,
    volume_indicator_code, ActivityVolume,
};
use crate::data::tree::{activity_label, ACTIVITY_AEP, ACTIVITY_EU};
use crate::data::{EmissionResult, LotEntity, Perimeter, PosteEmission, ReportContext};

/// Document-wide placeholder names.
pub mod names {
    pub const YEAR: &str = "annee";
    pub const ORG_NAME: &str = "ORG_NAME";
    pub const TOTAL_EMISSIONS: &str = "TOTAL_EMISSIONS";
    pub const TOTAL_EMISSIONS_S1: &str = "TOTAL_EMISSIONS_S1";
    pub const TOTAL_EMISSIONS_S2: &str = "TOTAL_EMISSIONS_S2";
    pub const TOTAL_EMISSIONS_S3: &str = "TOTAL_EMISSIONS_S3";
    pub const SCOPE3_SHARE: &str = "pourc_s3_org";
    pub const KPI_M3_EU: &str = "kpi_M3_EU";
    pub const KPI_M3_AEP: &str = "kpi_M3_AEP";
    pub const KPI_FLIGHTS: &str = "kpi_1";
    pub const KPI_PERSONS: &str = "kpi_2";
    pub const ACTIVITY_VOLUME_COMPARISON: &str = "ACTIVITY_VOLUME_COMPARISON_TEXT";
    pub const TOP_POSTES_LENGTH: &str = "TOP_POSTES_LONGUEUR";
    pub const EXCLUDED_POSTES_NOTE: &str = "EXCLUDED_POSTES_NOTE";

    pub const LOT_NAME: &str = "LOT_NAME";
    pub const LOT_TOTAL: &str = "LOT_TOTAL";
    pub const LOT_SHARE: &str = "LOT_SHARE";

    pub const ACTIVITY_LABEL: &str = "ENT_ACTIVITY";
    pub const ACTIVITY_CODE: &str = "ACTIVITY_CODE";
    pub const ENTITY_NAME: &str = "ENTITY_NAME";
    pub const ENTITY_TOTAL: &str = "ENTITY_TOTAL";
    pub const ENTITY_S1: &str = "ENTITY_S1";
    pub const ENTITY_S2: &str = "ENTITY_S2";
    pub const ENTITY_S3: &str = "ENTITY_S3";
    pub const ENTITY_KPI_M3: &str = "ENTITY_KPI_M3";
    pub const ENTITY_TOP_POSTES_LIST: &str = "ENTITY_TOP_POSTES_LIST";
    pub const ENTITY_NB_OTHER_POSTES: &str = "ENTITY_NB_OTHER_POSTES";

    /// `TOP_POSTE_<n>` for the n-th ranked post of the organisation.
    pub fn top_poste(rank: usize) -> String {
        format!("TOP_POSTE_{}", rank)
    }
}

/// Number of `TOP_POSTE_<n>` placeholders.
pub const DOCUMENT_TOP_POSTES: usize = 3;

fn activity_kpi(ctx: &ReportContext, perimeter: &Perimeter, result: &EmissionResult) -> Option<f64> {
    let activity = result.activity.as_deref()?;
    let code = volume_indicator_code(activity)?;
    let volume = ctx
        .indicators(perimeter, activity)
        .and_then(|i| i.get(code))
        .map(|v| v.value);
    kg_per_m3(result.total_tco2e, volume)
}

fn activity_volume<'a>(ctx: &'a ReportContext, activity: &str) -> Option<ActivityVolume<'a>> {
    let result = ctx.result(&Perimeter::Org, activity)?;
    let volume = ctx
        .indicators(&Perimeter::Org, activity)?
        .get(volume_indicator_code(activity)?)?;
    Some(ActivityVolume {
        total_tco2e: result.total_tco2e,
        volume,
    })
}

/// Values shared by the whole document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentValues {
    /// Reporting year
    pub year: i32,

    /// Organisation name, after overrides
    pub org_name: String,

    /// Organisation total, tCO₂e
    pub total: f64,

    /// Scope 1 total, tCO₂e
    pub scope1: f64,

    /// Scope 2 total, tCO₂e
    pub scope2: f64,

    /// Scope 3 total, tCO₂e
    pub scope3: f64,

    /// Scope 3 share of the total, percent
    pub scope3_share: f64,

    /// kgCO₂e per treated m³ of wastewater, when the volume is known
    pub kpi_m3_eu: Option<f64>,

    /// kgCO₂e per distributed m³ of drinking water, when the volume is known
    pub kpi_m3_aep: Option<f64>,

    /// Equivalent number of Paris – New York return flights
    pub flights: f64,

    /// Equivalent number of French residents' yearly footprints
    pub persons: f64,

    /// Labels of the organisation's first ranked posts
    pub top_postes: Vec<String>,

    /// Sentence comparing the two activities' volumes and intensities
    pub comparison_text: String,

    /// Ranked posts per activity
    pub top_n: usize,

    /// Note listing the posts left out of the totals; empty when none
    pub excluded_note: String,
}

impl DocumentValues {
    /// Gather the document-level figures from `ctx`.
    pub fn from_context(ctx: &ReportContext) -> Self {
        let org = ctx.org_result();
        let kpi = |activity: &str| {
            ctx.result(&Perimeter::Org, activity)
                .and_then(|r| activity_kpi(ctx, &Perimeter::Org, r))
        };

        Self {
            year: ctx.year(),
            org_name: ctx.org_name().to_string(),
            total: org.total_tco2e,
            scope1: org.scope1_tco2e,
            scope2: org.scope2_tco2e,
            scope3: org.scope3_tco2e,
            scope3_share: org.scope_percentage(3),
            kpi_m3_eu: kpi(ACTIVITY_EU),
            kpi_m3_aep: kpi(ACTIVITY_AEP),
            flights: flight_equivalent(org.total_tco2e),
            persons: person_equivalent(org.total_tco2e),
            top_postes: org
                .top_postes
                .iter()
                .take(DOCUMENT_TOP_POSTES)
                .map(|p| ctx.poste_label(&p.code).to_string())
                .collect(),
            comparison_text: activity_volume_comparison_text(
                activity_volume(ctx, ACTIVITY_EU),
                activity_volume(ctx, ACTIVITY_AEP),
            ),
            top_n: ctx.top_n(),
            excluded_note: excluded_postes_note(
                &ctx.overrides().excluded_postes(),
                ctx.poste_labels(),
            ),
        }
    }

    /// Formatted values keyed by placeholder name.
    pub fn to_values(&self) -> ValueMap {
        let mut values = ValueMap::new()
            .with(names::YEAR, self.year.to_string())
            .with(names::ORG_NAME, &self.org_name)
            .with(names::TOTAL_EMISSIONS, format_number(self.total))
            .with(names::TOTAL_EMISSIONS_S1, format_number(self.scope1))
            .with(names::TOTAL_EMISSIONS_S2, format_number(self.scope2))
            .with(names::TOTAL_EMISSIONS_S3, format_number(self.scope3))
            .with(names::SCOPE3_SHARE, format_number(self.scope3_share))
            .with(names::KPI_M3_EU, format_kg_per_m3(self.kpi_m3_eu))
            .with(names::KPI_M3_AEP, format_kg_per_m3(self.kpi_m3_aep))
            .with(names::KPI_FLIGHTS, format_number(self.flights))
            .with(names::KPI_PERSONS, format_number(self.persons))
            .with(names::ACTIVITY_VOLUME_COMPARISON, &self.comparison_text)
            .with(names::TOP_POSTES_LENGTH, self.top_n.to_string())
            .with(names::EXCLUDED_POSTES_NOTE, &self.excluded_note);

        for rank in 1..=DOCUMENT_TOP_POSTES {
            let label = self.top_postes.get(rank - 1).map(String::as_str).unwrap_or("");
            values.insert(&names::top_poste(rank), label);
        }
        values
    }
}

/// Values of one lot instance.
#[derive(Debug, Clone, PartialEq)]
pub struct LotValues {
    /// Lot name, after overrides
    pub name: String,
    /// Lot total, tCO₂e
    pub total: f64,
    /// Share of the organisation total, percent
    pub share: f64,
}

impl LotValues {
    /// Figures of `lot`, with its share of the organisation total.
    pub fn from_context(ctx: &ReportContext, lot: &LotEntity) -> Self {
        let total = ctx.perimeter_total(&Perimeter::Lot(lot.node_id.clone()));
        Self {
            name: lot.name.clone(),
            total,
            share: ctx.org_result().share_of(total),
        }
    }

    pub fn to_values(&self) -> ValueMap {
        ValueMap::new()
            .with(names::LOT_NAME, &self.name)
            .with(names::LOT_TOTAL, format_number(self.total))
            .with(names::LOT_SHARE, format_decimal(self.share, 1))
    }
}

/// Values of one activity instance within a lot (or the organisation).
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityValues {
    /// Activity code, `EU` or `AEP`
    pub code: String,
    /// Display label of the activity
    pub label: String,
    /// Name of the perimeter node: the lot, or the organisation
    pub entity_name: String,
    /// Activity total within the perimeter, tCO₂e
    pub total: f64,
    pub scope1: f64,
    pub scope2: f64,
    pub scope3: f64,
    /// kgCO₂e per m³, when the activity volume is known
    pub kpi_m3: Option<f64>,
    /// Numbered lines of the ranked posts
    pub top_postes_list: String,
    /// Number of residual posts
    pub other_postes_count: usize,
}

impl ActivityValues {
    /// Figures of `activity` within `perimeter`, from its emission `result`.
    pub fn from_context(
        ctx: &ReportContext,
        perimeter: &Perimeter,
        activity: &str,
        result: &EmissionResult,
    ) -> Self {
        Self {
            code: activity.to_string(),
            label: activity_label(activity).to_string(),
            entity_name: result.node_name.clone(),
            total: result.total_tco2e,
            scope1: result.scope1_tco2e,
            scope2: result.scope2_tco2e,
            scope3: result.scope3_tco2e,
            kpi_m3: activity_kpi(ctx, perimeter, result),
            top_postes_list: top_postes_list_text(&result.top_postes, ctx.poste_labels()),
            other_postes_count: result.other_postes.len(),
        }
    }

    pub fn to_values(&self) -> ValueMap {
        ValueMap::new()
            .with(names::ACTIVITY_LABEL, &self.label)
            .with(names::ACTIVITY_CODE, &self.code)
            .with(names::ENTITY_NAME, &self.entity_name)
            .with(names::ENTITY_TOTAL, format_number(self.total))
            .with(names::ENTITY_S1, format_number(self.scope1))
            .with(names::ENTITY_S2, format_number(self.scope2))
            .with(names::ENTITY_S3, format_number(self.scope3))
            .with(names::ENTITY_KPI_M3, format_kg_per_m3(self.kpi_m3))
            .with(names::ENTITY_TOP_POSTES_LIST, &self.top_postes_list)
            .with(names::ENTITY_NB_OTHER_POSTES, self.other_postes_count.to_string())
    }
}

/// Values of one ranked or residual post instance.
///
/// Placeholder names carry the block kind as prefix: `{{POST_NAME}}` for
/// ranked posts, `{{OTHER_POST_NAME}}` for residual ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemValues {
    pub kind: BlockKind,
    /// 1-based position in its list
    pub rank: usize,
    pub code: String,
    pub label: String,
    pub tco2e: f64,
    /// Share of the activity total, percent
    pub share: f64,
    pub text: String,
    pub icon: String,
}

impl ItemValues {
    pub fn from_context(
        ctx: &ReportContext,
        kind: BlockKind,
        rank: usize,
        poste: &PosteEmission,
        activity: &EmissionResult,
    ) -> Self {
        let content = activity
            .activity
            .as_deref()
            .and_then(|a| ctx.content(&poste.code, a));
        Self {
            kind,
            rank,
            code: poste.code.clone(),
            label: ctx.poste_label(&poste.code).to_string(),
            tco2e: poste.tco2e,
            share: activity.share_of(poste.tco2e),
            text: content.map(|c| c.text.clone()).unwrap_or_default(),
            icon: content.and_then(|c| c.icone.clone()).unwrap_or_default(),
        }
    }

    /// Placeholder name for `field` under this item's prefix.
    pub fn name(kind: BlockKind, field: &str) -> String {
        format!("{}_{}", kind.name(), field)
    }

    pub fn to_values(&self) -> ValueMap {
        let n = |field: &str| Self::name(self.kind, field);
        ValueMap::new()
            .with(&n("RANK"), self.rank.to_string())
            .with(&n("CODE"), &self.code)
            .with(&n("NAME"), &self.label)
            .with(&n("TCO2E"), format_decimal(self.tco2e, 1))
            .with(&n("PCT"), format_decimal(self.share, 1))
            .with(&n("TEXT"), &self.text)
            .with(&n("ICON"), &self.icon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ReportData;

    fn context() -> ReportContext {
        let data = ReportData::from_json_str(
            r#"{
            "year": 2024,
            "top_n": 2,
            "org_tree": [
                {"node_id": "ORG", "node_type": "ORG", "node_name": "Syndicat"},
                {"node_id": "L1", "parent_id": "ORG", "node_type": "LOT", "node_name": "Lot Nord"},
                {"node_id": "E1", "parent_id": "L1", "node_type": "ENT", "node_name": "STEP", "activity": "EU"}
            ],
            "emissions": [
                {"node_id": "E1", "poste_l1_code": "ELEC", "scope": 2, "tco2e": 60.0},
                {"node_id": "E1", "poste_l1_code": "TRAVAUX", "scope": 3, "tco2e": 30.0},
                {"node_id": "E1", "poste_l1_code": "FUEL", "scope": 1, "tco2e": 10.0}
            ],
            "postes_ref": [{"poste_l1_code": "ELEC", "poste_l1_label": "Électricité"}],
            "indicators": [
                {"node_id": "E1", "activity": "EU", "indicator_code": "VOL_EAU_EPUREE", "value": 40000.0, "unit": "m³"}
            ],
            "content": [
                {"poste_l1_code": "ELEC", "text": "Consommation des pompes", "icone": "bolt"}
            ]
        }"#,
        )
        .unwrap();
        ReportContext::build(data).unwrap()
    }

    #[test]
    fn test_document_values() {
        let values = DocumentValues::from_context(&context()).to_values();
        assert_eq!(values.get("annee"), Some("2024"));
        assert_eq!(values.get("TOTAL_EMISSIONS"), Some("100"));
        assert_eq!(values.get("pourc_s3_org"), Some("30"));
        assert_eq!(values.get("kpi_M3_EU"), Some("2,50 kgCO₂e/m³"));
        assert_eq!(values.get("kpi_M3_AEP"), Some("N/A"));
        assert_eq!(values.get("kpi_2"), Some("10"));
        assert_eq!(values.get("TOP_POSTE_1"), Some("Électricité"));
        assert_eq!(values.get("TOP_POSTE_3"), Some(""));
        assert_eq!(values.get("TOP_POSTES_LONGUEUR"), Some("2"));
    }

    #[test]
    fn test_lot_and_activity_values() {
        let ctx = context();
        let lot = &ctx.lots()[0];
        let lot_values = LotValues::from_context(&ctx, lot).to_values();
        assert_eq!(lot_values.get("LOT_NAME"), Some("Lot Nord"));
        assert_eq!(lot_values.get("LOT_SHARE"), Some("100,0"));

        let perimeter = Perimeter::Lot("L1".to_string());
        let result = ctx.result(&perimeter, "EU").unwrap();
        let values = ActivityValues::from_context(&ctx, &perimeter, "EU", result).to_values();
        assert_eq!(values.get("ENT_ACTIVITY"), Some("Eaux usées"));
        assert_eq!(values.get("ENTITY_KPI_M3"), Some("2,50 kgCO₂e/m³"));
        assert_eq!(values.get("ENTITY_NB_OTHER_POSTES"), Some("1"));
        assert_eq!(
            values.get("ENTITY_TOP_POSTES_LIST"),
            Some("1. Électricité : 60,0 tCO₂e\n2. TRAVAUX : 30,0 tCO₂e")
        );
    }

    #[test]
    fn test_item_values_prefix() {
        let ctx = context();
        let result = ctx.result(&Perimeter::Org, "EU").unwrap();
        let ranked =
            ItemValues::from_context(&ctx, BlockKind::Post, 1, &result.top_postes[0], result);
        let values = ranked.to_values();
        assert_eq!(values.get("POST_NAME"), Some("Électricité"));
        assert_eq!(values.get("POST_PCT"), Some("60,0"));
        assert_eq!(values.get("POST_TEXT"), Some("Consommation des pompes"));
        assert_eq!(values.get("POST_ICON"), Some("bolt"));

        let residual =
            ItemValues::from_context(&ctx, BlockKind::OtherPost, 1, &result.other_postes[0], result);
        let values = residual.to_values();
        assert_eq!(values.get("OTHER_POST_CODE"), Some("FUEL"));
        assert_eq!(values.get("OTHER_POST_TEXT"), Some(""));
        assert_eq!(values.get("POST_CODE"), None);
    }
}
