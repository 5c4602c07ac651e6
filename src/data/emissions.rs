//! Emission aggregation: scope totals, per-post sums and the ranked /
//! residual split consumed by the report template.

use super::tree::OrganizationTree;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Default number of ranked posts per activity.
pub const DEFAULT_TOP_N: usize = 4;

/// Node an aggregate is computed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Perimeter {
    /// The whole organisation
    Org,
    /// One lot, by node id
    Lot(String),
}

impl Perimeter {
    /// Node id of the perimeter within `tree`.
    pub fn node_id<'a>(&'a self, tree: &'a OrganizationTree) -> &'a str {
        match self {
            Perimeter::Org => tree.org().node_id.as_str(),
            Perimeter::Lot(id) => id.as_str(),
        }
    }
}

/// One emission line of a leaf unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionRecord {
    /// ENT node id
    pub node_id: String,
    /// Level-1 post code
    pub poste_l1_code: String,
    /// GHG protocol scope (1, 2 or 3)
    pub scope: u8,
    /// Emissions in tonnes CO₂e
    pub tco2e: f64,
}

/// One level-2 detail line, used for detail tables and breakdown charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionL2Record {
    /// ENT node id
    pub node_id: String,
    /// Parent level-1 post code
    pub poste_l1_code: String,
    /// Level-2 sub-category label
    pub poste_l2: String,
    /// Emissions in tonnes CO₂e
    pub tco2e: f64,
}

/// Label of a level-1 post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteRef {
    /// Level-1 post code
    pub poste_l1_code: String,
    /// Display label
    pub poste_l1_label: String,
}

fn default_true() -> bool {
    true
}

/// Per-post report settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteConfig {
    /// Listed in ranked and residual posts
    #[serde(default = "default_true")]
    pub show_in_report: bool,
    /// Counted in every total
    #[serde(default = "default_true")]
    pub include_in_totals: bool,
}

impl Default for PosteConfig {
    fn default() -> Self {
        Self {
            show_in_report: true,
            include_in_totals: true,
        }
    }
}

/// User adjustments applied on top of the raw data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmissionOverrides {
    /// Display name per node id
    #[serde(default)]
    pub node_renames: HashMap<String, String>,
    /// Settings per post code
    #[serde(default)]
    pub poste_config: HashMap<String, PosteConfig>,
}

impl EmissionOverrides {
    /// Display name of a node, after renames.
    pub fn node_name(&self, node_id: &str, default: &str) -> String {
        self.node_renames
            .get(node_id)
            .filter(|n| !n.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Whether a post counts in totals.
    pub fn is_poste_included(&self, code: &str) -> bool {
        self.poste_config
            .get(code)
            .map_or(true, |c| c.include_in_totals)
    }

    /// Whether a post is listed in the report.
    pub fn is_poste_shown(&self, code: &str) -> bool {
        self.poste_config.get(code).map_or(true, |c| c.show_in_report)
    }

    /// Codes of posts excluded from totals, sorted.
    pub fn excluded_postes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self
            .poste_config
            .iter()
            .filter(|(_, c)| !c.include_in_totals)
            .map(|(code, _)| code.clone())
            .collect();
        codes.sort();
        codes
    }
}

/// Emissions of one post within an aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteEmission {
    /// Level-1 post code
    pub code: String,
    /// Emissions in tonnes CO₂e
    pub tco2e: f64,
}

/// Aggregated emissions of a perimeter, optionally restricted to one activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmissionResult {
    /// Perimeter node id
    pub node_id: String,
    /// Perimeter display name (after renames)
    pub node_name: String,
    /// Activity code; `None` for all activities
    pub activity: Option<String>,
    /// Total over the three scopes
    pub total_tco2e: f64,
    /// Scope 1 subtotal
    pub scope1_tco2e: f64,
    /// Scope 2 subtotal
    pub scope2_tco2e: f64,
    /// Scope 3 subtotal
    pub scope3_tco2e: f64,
    /// Sum per post code
    pub emissions_by_poste: BTreeMap<String, f64>,
    /// The `top_n` largest listed posts, largest first
    pub top_postes: Vec<PosteEmission>,
    /// Remaining listed posts, largest first
    pub other_postes: Vec<PosteEmission>,
}

impl EmissionResult {
    /// Share of a scope in the total, in percent.
    pub fn scope_percentage(&self, scope: u8) -> f64 {
        let value = match scope {
            1 => self.scope1_tco2e,
            2 => self.scope2_tco2e,
            3 => self.scope3_tco2e,
            _ => 0.0,
        };
        self.share_of(value)
    }

    /// Share of `value` in the total, in percent.
    pub fn share_of(&self, value: f64) -> f64 {
        if self.total_tco2e == 0.0 {
            0.0
        } else {
            value / self.total_tco2e * 100.0
        }
    }
}

/// Every aggregate needed to fill a report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmissionResults {
    /// Whole organisation, all activities
    pub org: EmissionResult,
    by_activity: BTreeMap<(Perimeter, String), EmissionResult>,
}

impl EmissionResults {
    /// Aggregate of `perimeter` restricted to `activity`.
    pub fn get(&self, perimeter: &Perimeter, activity: &str) -> Option<&EmissionResult> {
        self.by_activity
            .get(&(perimeter.clone(), activity.to_string()))
    }

    /// Lot-level aggregates (or organisation-level ones in a flat tree),
    /// one per perimeter and activity.
    pub fn group_results(&self, has_lots: bool) -> impl Iterator<Item = &EmissionResult> {
        self.by_activity
            .iter()
            .filter(move |((p, _), _)| matches!(p, Perimeter::Lot(_)) == has_lots)
            .map(|(_, r)| r)
    }

    /// Number of per-activity aggregates.
    pub fn len(&self) -> usize {
        self.by_activity.len()
    }

    /// Whether no per-activity aggregate exists.
    pub fn is_empty(&self) -> bool {
        self.by_activity.is_empty()
    }
}

/// Computes [`EmissionResults`] from leaf records.
pub struct EmissionCalculator<'a> {
    tree: &'a OrganizationTree,
    records: &'a [EmissionRecord],
}

impl<'a> EmissionCalculator<'a> {
    /// Create a calculator over a tree and its emission lines.
    pub fn new(tree: &'a OrganizationTree, records: &'a [EmissionRecord]) -> Self {
        Self { tree, records }
    }

    /// Aggregate the organisation, every (organisation, activity) and every
    /// (lot, activity) pair.
    pub fn calculate(&self, overrides: &EmissionOverrides, top_n: usize) -> EmissionResults {
        let org = self.tree.org();
        let org_name = overrides.node_name(&org.node_id, &org.node_name);
        let all_ents: Vec<String> = self
            .tree
            .ents()
            .iter()
            .map(|n| n.node_id.clone())
            .collect();

        let mut results = EmissionResults {
            org: self.aggregate(&org.node_id, &org_name, &all_ents, None, overrides, top_n),
            by_activity: BTreeMap::new(),
        };

        for activity in self.tree.activities_under(&org.node_id) {
            let ents = self.tree.ent_ids_by_activity(&org.node_id, &activity);
            let result =
                self.aggregate(&org.node_id, &org_name, &ents, Some(&activity), overrides, top_n);
            results
                .by_activity
                .insert((Perimeter::Org, activity), result);
        }

        for lot in self.tree.lots() {
            let name = overrides.node_name(&lot.node_id, &lot.node_name);
            for activity in self.tree.activities_under(&lot.node_id) {
                let ents = self.tree.ent_ids_by_activity(&lot.node_id, &activity);
                let result =
                    self.aggregate(&lot.node_id, &name, &ents, Some(&activity), overrides, top_n);
                results
                    .by_activity
                    .insert((Perimeter::Lot(lot.node_id.clone()), activity), result);
            }
        }

        log::debug!(
            "aggregated {} emission line(s) into {} result(s)",
            self.records.len(),
            results.len() + 1
        );
        results
    }

    fn aggregate(
        &self,
        node_id: &str,
        node_name: &str,
        ent_ids: &[String],
        activity: Option<&str>,
        overrides: &EmissionOverrides,
        top_n: usize,
    ) -> EmissionResult {
        let mut result = EmissionResult {
            node_id: node_id.to_string(),
            node_name: node_name.to_string(),
            activity: activity.map(str::to_string),
            ..Default::default()
        };

        let ents: HashSet<&str> = ent_ids.iter().map(String::as_str).collect();
        for record in self.records.iter().filter(|r| ents.contains(r.node_id.as_str())) {
            if !overrides.is_poste_included(&record.poste_l1_code) {
                continue;
            }
            match record.scope {
                1 => result.scope1_tco2e += record.tco2e,
                2 => result.scope2_tco2e += record.tco2e,
                3 => result.scope3_tco2e += record.tco2e,
                other => {
                    log::warn!(
                        "ignoring emission line of {} with scope {}",
                        record.node_id,
                        other
                    );
                    continue;
                }
            }
            *result
                .emissions_by_poste
                .entry(record.poste_l1_code.clone())
                .or_insert(0.0) += record.tco2e;
        }
        result.total_tco2e = result.scope1_tco2e + result.scope2_tco2e + result.scope3_tco2e;

        let mut listed: Vec<PosteEmission> = result
            .emissions_by_poste
            .iter()
            .filter(|(code, value)| **value != 0.0 && overrides.is_poste_shown(code))
            .map(|(code, value)| PosteEmission {
                code: code.clone(),
                tco2e: *value,
            })
            .collect();
        listed.sort_by(|a, b| {
            b.tco2e
                .partial_cmp(&a.tco2e)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.code.cmp(&b.code))
        });

        let split = top_n.min(listed.len());
        result.other_postes = listed.split_off(split);
        result.top_postes = listed;
        result
    }
}

/// One aggregated level-2 line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    /// Level-2 sub-category label
    pub label: String,
    /// Emissions in tonnes CO₂e
    pub tco2e: f64,
}

/// Sum level-2 lines of `poste` over `ent_ids`, largest first.
pub fn detail_rows(records: &[EmissionL2Record], ent_ids: &[String], poste: &str) -> Vec<DetailRow> {
    let ents: HashSet<&str> = ent_ids.iter().map(String::as_str).collect();
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for record in records
        .iter()
        .filter(|r| r.poste_l1_code == poste && ents.contains(r.node_id.as_str()))
    {
        *sums.entry(record.poste_l2.as_str()).or_insert(0.0) += record.tco2e;
    }

    let mut rows: Vec<DetailRow> = sums
        .into_iter()
        .map(|(label, tco2e)| DetailRow {
            label: label.to_string(),
            tco2e,
        })
        .collect();
    rows.sort_by(|a, b| b.tco2e.partial_cmp(&a.tco2e).unwrap_or(Ordering::Equal));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tree::{NodeType, TreeNode};

    fn tree() -> OrganizationTree {
        OrganizationTree::from_nodes(vec![
            TreeNode::new("ORG", None, NodeType::Org, "Syndicat", None),
            TreeNode::new("L1", Some("ORG"), NodeType::Lot, "Lot Nord", None),
            TreeNode::new("E1", Some("L1"), NodeType::Ent, "STEP", Some("EU")),
            TreeNode::new("E2", Some("L1"), NodeType::Ent, "Usine", Some("AEP")),
        ])
        .unwrap()
    }

    fn record(node: &str, poste: &str, scope: u8, tco2e: f64) -> EmissionRecord {
        EmissionRecord {
            node_id: node.to_string(),
            poste_l1_code: poste.to_string(),
            scope,
            tco2e,
        }
    }

    fn records() -> Vec<EmissionRecord> {
        vec![
            record("E1", "ELEC", 2, 40.0),
            record("E1", "TRAVAUX", 3, 100.0),
            record("E1", "REACTIFS", 3, 30.0),
            record("E1", "FUEL", 1, 10.0),
            record("E1", "DECHETS", 3, 5.0),
            record("E1", "FRET", 3, 2.0),
            record("E2", "ELEC", 2, 20.0),
        ]
    }

    #[test]
    fn test_scope_totals() {
        let tree = tree();
        let records = records();
        let results =
            EmissionCalculator::new(&tree, &records).calculate(&EmissionOverrides::default(), 4);

        assert_eq!(results.org.total_tco2e, 207.0);
        assert_eq!(results.org.scope2_tco2e, 60.0);
        assert_eq!(results.org.scope3_tco2e, 137.0);

        let eu = results
            .get(&Perimeter::Lot("L1".to_string()), "EU")
            .unwrap();
        assert_eq!(eu.total_tco2e, 187.0);
        assert_eq!(eu.node_name, "Lot Nord");
        assert!(results.get(&Perimeter::Org, "AEP").is_some());
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_top_and_residual_split() {
        let tree = tree();
        let records = records();
        let results =
            EmissionCalculator::new(&tree, &records).calculate(&EmissionOverrides::default(), 4);
        let eu = results.get(&Perimeter::Org, "EU").unwrap();

        let top: Vec<&str> = eu.top_postes.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(top, vec!["TRAVAUX", "ELEC", "REACTIFS", "FUEL"]);
        let other: Vec<&str> = eu.other_postes.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(other, vec!["DECHETS", "FRET"]);
    }

    #[test]
    fn test_overrides() {
        let tree = tree();
        let records = records();
        let mut overrides = EmissionOverrides::default();
        overrides
            .node_renames
            .insert("L1".to_string(), "Secteur Nord".to_string());
        overrides.poste_config.insert(
            "TRAVAUX".to_string(),
            PosteConfig {
                show_in_report: true,
                include_in_totals: false,
            },
        );
        overrides.poste_config.insert(
            "ELEC".to_string(),
            PosteConfig {
                show_in_report: false,
                include_in_totals: true,
            },
        );

        let results = EmissionCalculator::new(&tree, &records).calculate(&overrides, 2);
        let eu = results
            .get(&Perimeter::Lot("L1".to_string()), "EU")
            .unwrap();
        assert_eq!(eu.node_name, "Secteur Nord");
        assert_eq!(eu.total_tco2e, 87.0);
        let top: Vec<&str> = eu.top_postes.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(top, vec!["REACTIFS", "FUEL"]);
        assert_eq!(overrides.excluded_postes(), vec!["TRAVAUX"]);
    }

    #[test]
    fn test_scope_percentage_of_empty_result() {
        let result = EmissionResult::default();
        assert_eq!(result.scope_percentage(3), 0.0);
    }

    #[test]
    fn test_detail_rows() {
        let l2 = vec![
            EmissionL2Record {
                node_id: "E1".to_string(),
                poste_l1_code: "EM_IND".to_string(),
                poste_l2: "Achats".to_string(),
                tco2e: 3.0,
            },
            EmissionL2Record {
                node_id: "E1".to_string(),
                poste_l1_code: "EM_IND".to_string(),
                poste_l2: "Services".to_string(),
                tco2e: 5.0,
            },
            EmissionL2Record {
                node_id: "E9".to_string(),
                poste_l1_code: "EM_IND".to_string(),
                poste_l2: "Achats".to_string(),
                tco2e: 50.0,
            },
            EmissionL2Record {
                node_id: "E1".to_string(),
                poste_l1_code: "EM_IND".to_string(),
                poste_l2: "Achats".to_string(),
                tco2e: 4.0,
            },
        ];
        let rows = detail_rows(&l2, &["E1".to_string()], "EM_IND");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "Achats");
        assert_eq!(rows[0].tco2e, 7.0);
        assert_eq!(rows[1].label, "Services");
    }
}
