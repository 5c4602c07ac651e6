//! The report request: validated input data plus every aggregate derived
//! from it, computed once and read-only afterwards.

use super::catalog::{ContentCatalog, PosteContent};
use super::emissions::{
    detail_rows, DetailRow, EmissionCalculator, EmissionL2Record, EmissionOverrides,
    EmissionRecord, EmissionResult, EmissionResults, Perimeter, PosteRef, DEFAULT_TOP_N,
};
use super::indicators::{calculate_indicators, IndicatorRecord, IndicatorRef, IndicatorResult};
use super::tree::{OrganizationTree, TreeNode};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

/// Raw report input, as loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    /// Reporting year
    pub year: i32,
    /// Number of ranked posts per activity
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Organisation hierarchy
    pub org_tree: Vec<TreeNode>,
    /// Emission lines per leaf unit
    #[serde(default)]
    pub emissions: Vec<EmissionRecord>,
    /// Level-2 detail lines
    #[serde(default)]
    pub emissions_l2: Vec<EmissionL2Record>,
    /// Post labels
    #[serde(default)]
    pub postes_ref: Vec<PosteRef>,
    /// Indicator lines
    #[serde(default)]
    pub indicators: Vec<IndicatorRecord>,
    /// Indicator labels and units
    #[serde(default)]
    pub indicators_ref: Vec<IndicatorRef>,
    /// Editorial content per post
    #[serde(default)]
    pub content: Vec<PosteContent>,
    /// User adjustments
    #[serde(default)]
    pub overrides: EmissionOverrides,
}

impl ReportData {
    /// Parse report data from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read report data from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// One lot as the template sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct LotEntity {
    /// Node id
    pub node_id: String,
    /// Display name (after renames)
    pub name: String,
}

/// Immutable context of one report.
///
/// Built once from [`ReportData`]; every expansion step reads from it and
/// nothing writes to it, so one context can back several documents and be
/// shared across threads.
#[derive(Debug, Clone)]
pub struct ReportContext {
    year: i32,
    top_n: usize,
    tree: OrganizationTree,
    emissions: EmissionResults,
    emissions_l2: Vec<EmissionL2Record>,
    indicators: BTreeMap<(Perimeter, String), IndicatorResult>,
    poste_labels: HashMap<String, String>,
    catalog: ContentCatalog,
    overrides: EmissionOverrides,
    warnings: Vec<String>,
}

impl ReportContext {
    /// Validate and aggregate `data`.
    ///
    /// Fails only when the hierarchy cannot be built; softer problems are
    /// collected in [`warnings`](Self::warnings).
    pub fn build(data: ReportData) -> Result<Self> {
        if data.top_n == 0 {
            return Err(Error::InvalidData("top_n must be at least 1".to_string()));
        }

        let tree = OrganizationTree::from_nodes(data.org_tree)?;
        let mut warnings = tree.validate();

        for record in &data.emissions {
            if tree.node(&record.node_id).is_none() {
                warnings.push(format!(
                    "emission line for unknown node {} ignored",
                    record.node_id
                ));
            }
        }

        let emissions = EmissionCalculator::new(&tree, &data.emissions)
            .calculate(&data.overrides, data.top_n);
        let indicators = calculate_indicators(&tree, &data.indicators, &data.indicators_ref);
        let poste_labels = data
            .postes_ref
            .into_iter()
            .map(|p| (p.poste_l1_code, p.poste_l1_label))
            .collect();

        for warning in &warnings {
            log::warn!("{}", warning);
        }

        Ok(Self {
            year: data.year,
            top_n: data.top_n,
            tree,
            emissions,
            emissions_l2: data.emissions_l2,
            indicators,
            poste_labels,
            catalog: ContentCatalog::new(data.content),
            overrides: data.overrides,
            warnings,
        })
    }

    /// Reporting year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Number of ranked posts per activity.
    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Organisation hierarchy.
    pub fn tree(&self) -> &OrganizationTree {
        &self.tree
    }

    /// Organisation display name (after renames).
    pub fn org_name(&self) -> &str {
        &self.emissions.org.node_name
    }

    /// Aggregate of the whole organisation.
    pub fn org_result(&self) -> &EmissionResult {
        &self.emissions.org
    }

    /// Every aggregate.
    pub fn emissions(&self) -> &EmissionResults {
        &self.emissions
    }

    /// Lots in input order with their display names.
    pub fn lots(&self) -> Vec<LotEntity> {
        self.tree
            .lots()
            .into_iter()
            .map(|lot| LotEntity {
                node_id: lot.node_id.clone(),
                name: self.overrides.node_name(&lot.node_id, &lot.node_name),
            })
            .collect()
    }

    /// Activities performed within a perimeter, sorted by code.
    pub fn activities(&self, perimeter: &Perimeter) -> Vec<String> {
        self.tree
            .activities_under(perimeter.node_id(&self.tree))
            .into_iter()
            .collect()
    }

    /// Aggregate of a perimeter restricted to an activity.
    pub fn result(&self, perimeter: &Perimeter, activity: &str) -> Option<&EmissionResult> {
        self.emissions.get(perimeter, activity)
    }

    /// Total of a perimeter over all its activities.
    pub fn perimeter_total(&self, perimeter: &Perimeter) -> f64 {
        match perimeter {
            Perimeter::Org => self.emissions.org.total_tco2e,
            Perimeter::Lot(_) => self
                .activities(perimeter)
                .iter()
                .filter_map(|a| self.result(perimeter, a))
                .map(|r| r.total_tco2e)
                .sum(),
        }
    }

    /// Indicators of a perimeter and activity.
    pub fn indicators(&self, perimeter: &Perimeter, activity: &str) -> Option<&IndicatorResult> {
        self.indicators
            .get(&(perimeter.clone(), activity.to_string()))
    }

    /// Label of a post, falling back to its code.
    pub fn poste_label<'a>(&'a self, code: &'a str) -> &'a str {
        self.poste_labels
            .get(code)
            .map(String::as_str)
            .unwrap_or(code)
    }

    /// Every known post label.
    pub fn poste_labels(&self) -> &HashMap<String, String> {
        &self.poste_labels
    }

    /// Editorial content of a post for an activity.
    pub fn content(&self, code: &str, activity: &str) -> Option<&PosteContent> {
        self.catalog.get(code, activity)
    }

    /// Level-2 detail of a post within a perimeter and activity.
    pub fn detail_rows(&self, perimeter: &Perimeter, activity: &str, poste: &str) -> Vec<DetailRow> {
        let ents = self
            .tree
            .ent_ids_by_activity(perimeter.node_id(&self.tree), activity);
        detail_rows(&self.emissions_l2, &ents, poste)
    }

    /// Applied overrides.
    pub fn overrides(&self) -> &EmissionOverrides {
        &self.overrides
    }

    /// Problems found while building the context.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = r#"{
        "year": 2024,
        "org_tree": [
            {"node_id": "ORG", "node_type": "ORG", "node_name": "Syndicat"},
            {"node_id": "L1", "parent_id": "ORG", "node_type": "LOT", "node_name": "Lot Nord"},
            {"node_id": "E1", "parent_id": "L1", "node_type": "ENT", "node_name": "STEP", "activity": "EU"}
        ],
        "emissions": [
            {"node_id": "E1", "poste_l1_code": "ELEC", "scope": 2, "tco2e": 12.5},
            {"node_id": "E404", "poste_l1_code": "ELEC", "scope": 2, "tco2e": 1.0}
        ],
        "postes_ref": [{"poste_l1_code": "ELEC", "poste_l1_label": "Électricité"}],
        "overrides": {"node_renames": {"ORG": "Syndicat des eaux"}}
    }"#;

    #[test]
    fn test_build_context() {
        let ctx = ReportContext::build(ReportData::from_json_str(DATA).unwrap()).unwrap();
        assert_eq!(ctx.year(), 2024);
        assert_eq!(ctx.top_n(), DEFAULT_TOP_N);
        assert_eq!(ctx.org_name(), "Syndicat des eaux");
        assert_eq!(ctx.org_result().total_tco2e, 12.5);
        assert_eq!(ctx.poste_label("ELEC"), "Électricité");
        assert_eq!(ctx.poste_label("FRET"), "FRET");
        assert_eq!(ctx.lots()[0].name, "Lot Nord");

        let lot = Perimeter::Lot("L1".to_string());
        assert_eq!(ctx.activities(&lot), vec!["EU"]);
        assert_eq!(ctx.perimeter_total(&lot), 12.5);
        assert_eq!(ctx.warnings().len(), 1);
    }

    #[test]
    fn test_rejects_zero_top_n() {
        let mut data = ReportData::from_json_str(DATA).unwrap();
        data.top_n = 0;
        assert!(matches!(
            ReportContext::build(data),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ReportData::from_json_str("{\"year\": "),
            Err(Error::Json(_))
        ));
    }
}
