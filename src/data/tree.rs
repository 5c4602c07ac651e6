//! Organisation hierarchy: one ORG root, optional LOT groups, ENT leaves.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;

/// Kind of node in the organisation tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeType {
    /// The reporting organisation (root)
    Org,
    /// An intermediate grouping (lot, division)
    Lot,
    /// A leaf unit performing one activity
    Ent,
}

/// Wastewater treatment.
pub const ACTIVITY_EU: &str = "EU";
/// Drinking water supply.
pub const ACTIVITY_AEP: &str = "AEP";

/// Display label of an activity code; unknown codes are shown as-is.
pub fn activity_label(code: &str) -> &str {
    match code {
        ACTIVITY_EU => "Eaux usées",
        ACTIVITY_AEP => "Eau potable",
        other => other,
    }
}

/// One row of the organisation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Unique node identifier
    pub node_id: String,
    /// Parent identifier; `None` for the root
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Node kind
    pub node_type: NodeType,
    /// Display name
    pub node_name: String,
    /// Activity code, for ENT nodes
    #[serde(default)]
    pub activity: Option<String>,
}

impl TreeNode {
    /// Convenience constructor.
    pub fn new(
        node_id: impl Into<String>,
        parent_id: Option<&str>,
        node_type: NodeType,
        node_name: impl Into<String>,
        activity: Option<&str>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            parent_id: parent_id.map(str::to_string),
            node_type,
            node_name: node_name.into(),
            activity: activity.map(str::to_string),
        }
    }
}

/// Validated organisation tree.
#[derive(Debug, Clone)]
pub struct OrganizationTree {
    nodes: Vec<TreeNode>,
    index: HashMap<String, usize>,
    children: HashMap<String, Vec<usize>>,
    root: usize,
}

impl OrganizationTree {
    /// Build the tree, rejecting structures that cannot be reported on:
    /// duplicate ids, zero or several roots, a non-ORG root, or a parent
    /// reference to an unknown node.
    pub fn from_nodes(nodes: Vec<TreeNode>) -> Result<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.node_id.clone(), i).is_some() {
                return Err(Error::InvalidData(format!(
                    "duplicate node id {}",
                    node.node_id
                )));
            }
        }

        let mut root = None;
        let mut children: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            match node.parent_id.as_deref().filter(|p| !p.is_empty()) {
                None => {
                    if let Some(r) = root {
                        let first: &TreeNode = &nodes[r];
                        return Err(Error::InvalidData(format!(
                            "several roots: {} and {}",
                            first.node_id, node.node_id
                        )));
                    }
                    root = Some(i);
                }
                Some(parent) => {
                    if !index.contains_key(parent) {
                        return Err(Error::InvalidData(format!(
                            "parent {} of node {} not found",
                            parent, node.node_id
                        )));
                    }
                    children.entry(parent.to_string()).or_default().push(i);
                }
            }
        }

        let root = root.ok_or_else(|| Error::InvalidData("no root node".to_string()))?;
        if nodes[root].node_type != NodeType::Org {
            return Err(Error::InvalidData(format!(
                "root {} must be an ORG node",
                nodes[root].node_id
            )));
        }

        Ok(Self {
            nodes,
            index,
            children,
            root,
        })
    }

    /// The ORG root.
    pub fn org(&self) -> &TreeNode {
        &self.nodes[self.root]
    }

    /// Look up a node.
    pub fn node(&self, node_id: &str) -> Option<&TreeNode> {
        self.index.get(node_id).map(|&i| &self.nodes[i])
    }

    /// All LOT nodes in input order.
    pub fn lots(&self) -> Vec<&TreeNode> {
        self.of_type(NodeType::Lot)
    }

    /// All ENT nodes in input order.
    pub fn ents(&self) -> Vec<&TreeNode> {
        self.of_type(NodeType::Ent)
    }

    fn of_type(&self, node_type: NodeType) -> Vec<&TreeNode> {
        self.nodes
            .iter()
            .filter(|n| n.node_type == node_type)
            .collect()
    }

    /// Whether the organisation is grouped into lots.
    pub fn has_lots(&self) -> bool {
        self.nodes.iter().any(|n| n.node_type == NodeType::Lot)
    }

    /// Direct children of a node.
    pub fn children(&self, node_id: &str) -> Vec<&TreeNode> {
        self.children
            .get(node_id)
            .map(|ids| ids.iter().map(|&i| &self.nodes[i]).collect())
            .unwrap_or_default()
    }

    /// Every ENT below `node_id` (or `node_id` itself if it is an ENT).
    pub fn descendant_ents(&self, node_id: &str) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        let mut stack = vec![node_id];
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.node(id) {
                if node.node_type == NodeType::Ent {
                    out.push(node);
                }
            }
            for child in self.children(id).into_iter().rev() {
                stack.push(child.node_id.as_str());
            }
        }
        out
    }

    /// ENT ids below `node_id` performing `activity`.
    pub fn ent_ids_by_activity(&self, node_id: &str, activity: &str) -> Vec<String> {
        self.descendant_ents(node_id)
            .into_iter()
            .filter(|n| n.activity.as_deref() == Some(activity))
            .map(|n| n.node_id.clone())
            .collect()
    }

    /// Distinct activities performed below `node_id`, sorted by code.
    pub fn activities_under(&self, node_id: &str) -> BTreeSet<String> {
        self.descendant_ents(node_id)
            .into_iter()
            .filter_map(|n| n.activity.clone())
            .collect()
    }

    /// Structural problems that do not prevent reporting.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let org_id = self.org().node_id.as_str();

        for ent in self.ents() {
            match ent.activity.as_deref() {
                Some(ACTIVITY_EU) | Some(ACTIVITY_AEP) => {}
                _ => warnings.push(format!(
                    "ENT {} ({}) has no EU or AEP activity",
                    ent.node_id, ent.node_name
                )),
            }
        }

        for lot in self.lots() {
            if lot.parent_id.as_deref() != Some(org_id) {
                warnings.push(format!(
                    "LOT {} ({}) is not attached to the ORG",
                    lot.node_id, lot.node_name
                ));
            }
            if self.descendant_ents(&lot.node_id).is_empty() {
                warnings.push(format!(
                    "LOT {} ({}) has no ENT child",
                    lot.node_id, lot.node_name
                ));
            }
        }

        let reachable = self.reachable_count();
        if reachable < self.nodes.len() {
            warnings.push(format!(
                "{} node(s) are not reachable from the root (cycle)",
                self.nodes.len() - reachable
            ));
        }

        warnings
    }

    fn reachable_count(&self) -> usize {
        let mut seen = BTreeSet::new();
        let mut stack = vec![self.org().node_id.as_str()];
        while let Some(id) = stack.pop() {
            if seen.insert(id) {
                stack.extend(self.children(id).into_iter().map(|c| c.node_id.as_str()));
            }
        }
        seen.len()
    }

    /// Indented text rendering of the hierarchy.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(self.org(), 0usize)];
        let mut seen = BTreeSet::new();
        while let Some((node, depth)) = stack.pop() {
            if !seen.insert(node.node_id.as_str()) {
                continue;
            }
            let activity = node
                .activity
                .as_deref()
                .map(|a| format!(" [{}]", a))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "{}{:?} {} ({}){}",
                "  ".repeat(depth),
                node.node_type,
                node.node_name,
                node.node_id,
                activity
            );
            for child in self.children(&node.node_id).into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OrganizationTree {
        OrganizationTree::from_nodes(vec![
            TreeNode::new("ORG", None, NodeType::Org, "Syndicat", None),
            TreeNode::new("L1", Some("ORG"), NodeType::Lot, "Lot Nord", None),
            TreeNode::new("L2", Some("ORG"), NodeType::Lot, "Lot Sud", None),
            TreeNode::new("E1", Some("L1"), NodeType::Ent, "STEP 1", Some("EU")),
            TreeNode::new("E2", Some("L1"), NodeType::Ent, "Usine 1", Some("AEP")),
            TreeNode::new("E3", Some("L2"), NodeType::Ent, "STEP 2", Some("EU")),
        ])
        .unwrap()
    }

    #[test]
    fn test_tree_queries() {
        let tree = sample();
        assert_eq!(tree.org().node_name, "Syndicat");
        assert!(tree.has_lots());
        assert_eq!(tree.lots().len(), 2);
        assert_eq!(tree.children("L1").len(), 2);
        assert_eq!(tree.descendant_ents("ORG").len(), 3);
        assert_eq!(tree.ent_ids_by_activity("ORG", "EU"), vec!["E1", "E3"]);

        let acts: Vec<String> = tree.activities_under("L1").into_iter().collect();
        assert_eq!(acts, vec!["AEP", "EU"]);
        assert!(tree.validate().is_empty());
    }

    #[test]
    fn test_render_tree() {
        let text = sample().render_tree();
        assert!(text.starts_with("Org Syndicat (ORG)"));
        assert!(text.contains("    Ent STEP 1 (E1) [EU]"));
    }

    #[test]
    fn test_rejects_several_roots() {
        let err = OrganizationTree::from_nodes(vec![
            TreeNode::new("A", None, NodeType::Org, "A", None),
            TreeNode::new("B", None, NodeType::Org, "B", None),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("several roots"));
    }

    #[test]
    fn test_rejects_missing_parent() {
        let err = OrganizationTree::from_nodes(vec![
            TreeNode::new("ORG", None, NodeType::Org, "O", None),
            TreeNode::new("E", Some("X"), NodeType::Ent, "E", Some("EU")),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn test_rejects_non_org_root() {
        assert!(OrganizationTree::from_nodes(vec![TreeNode::new(
            "L",
            None,
            NodeType::Lot,
            "L",
            None
        )])
        .is_err());
    }

    #[test]
    fn test_validate_warns_on_missing_activity_and_empty_lot() {
        let tree = OrganizationTree::from_nodes(vec![
            TreeNode::new("ORG", None, NodeType::Org, "O", None),
            TreeNode::new("L", Some("ORG"), NodeType::Lot, "Vide", None),
            TreeNode::new("E", Some("ORG"), NodeType::Ent, "E", None),
        ])
        .unwrap();
        let warnings = tree.validate();
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_activity_label() {
        assert_eq!(activity_label("EU"), "Eaux usées");
        assert_eq!(activity_label("AEP"), "Eau potable");
        assert_eq!(activity_label("GEMAPI"), "GEMAPI");
    }
}
