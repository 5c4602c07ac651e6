//! Activity indicators (treated volumes, network length, …) summed per
//! perimeter and activity.

use super::emissions::Perimeter;
use super::tree::OrganizationTree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Volume of treated wastewater, m³.
pub const VOL_EAU_EPUREE: &str = "VOL_EAU_EPUREE";
/// Volume of distributed drinking water, m³.
pub const VOL_EAU_DISTRIBUEE: &str = "VOL_EAU_DISTRIBUEE";

/// One raw indicator line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRecord {
    /// ENT node id, or a LOT/ORG id for values only known at that level
    pub node_id: String,
    /// Activity code
    pub activity: String,
    /// Indicator code
    pub indicator_code: String,
    /// Value
    pub value: f64,
    /// Unit, when given on the line
    #[serde(default)]
    pub unit: Option<String>,
    /// Free comment
    #[serde(default)]
    pub comment: Option<String>,
}

/// Reference entry for an indicator code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRef {
    /// Indicator code
    pub indicator_code: String,
    /// Display label
    pub indicator_label: String,
    /// Unit used when a line carries none
    #[serde(default)]
    pub default_unit: String,
}

/// Aggregated value of one indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorValue {
    /// Indicator code
    pub code: String,
    /// Display label
    pub label: String,
    /// Summed value
    pub value: f64,
    /// Unit
    pub unit: String,
}

/// Indicators of one perimeter and activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    /// Indicators by code
    pub indicators: BTreeMap<String, IndicatorValue>,
}

impl IndicatorResult {
    /// Look up an indicator.
    pub fn get(&self, code: &str) -> Option<&IndicatorValue> {
        self.indicators.get(code)
    }
}

/// Sum indicator lines for every (organisation, activity) and
/// (lot, activity) pair that has at least one line.
pub fn calculate_indicators(
    tree: &OrganizationTree,
    records: &[IndicatorRecord],
    references: &[IndicatorRef],
) -> BTreeMap<(Perimeter, String), IndicatorResult> {
    let refs: HashMap<&str, &IndicatorRef> = references
        .iter()
        .map(|r| (r.indicator_code.as_str(), r))
        .collect();

    let mut results = BTreeMap::new();
    let org = tree.org();

    let mut perimeters = vec![(Perimeter::Org, org.node_id.clone())];
    perimeters.extend(
        tree.lots()
            .into_iter()
            .map(|l| (Perimeter::Lot(l.node_id.clone()), l.node_id.clone())),
    );

    for (perimeter, node_id) in perimeters {
        for activity in tree.activities_under(&node_id) {
            let mut nodes: HashSet<String> = tree
                .ent_ids_by_activity(&node_id, &activity)
                .into_iter()
                .collect();
            nodes.insert(node_id.clone());

            let result = aggregate(records, &refs, &nodes, &activity);
            if !result.indicators.is_empty() {
                results.insert((perimeter.clone(), activity), result);
            }
        }
    }
    results
}

fn aggregate(
    records: &[IndicatorRecord],
    refs: &HashMap<&str, &IndicatorRef>,
    nodes: &HashSet<String>,
    activity: &str,
) -> IndicatorResult {
    let mut result = IndicatorResult::default();
    for record in records
        .iter()
        .filter(|r| r.activity == activity && nodes.contains(&r.node_id))
    {
        let reference = refs.get(record.indicator_code.as_str());
        let entry = result
            .indicators
            .entry(record.indicator_code.clone())
            .or_insert_with(|| IndicatorValue {
                code: record.indicator_code.clone(),
                label: reference
                    .map(|r| r.indicator_label.clone())
                    .unwrap_or_else(|| record.indicator_code.clone()),
                value: 0.0,
                unit: record
                    .unit
                    .clone()
                    .filter(|u| !u.is_empty())
                    .or_else(|| reference.map(|r| r.default_unit.clone()))
                    .unwrap_or_default(),
            });
        entry.value += record.value;
    }
    result
}
