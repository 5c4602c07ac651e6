//! Data collaborators of the expansion engine.
//!
//! These types turn the validated input tables into the aggregates the
//! template consumes: the organisation tree, emission totals with the
//! ranked/residual post split, indicators, the editorial catalog and the
//! derived KPIs. Everything is gathered in an immutable [`ReportContext`].

pub mod catalog;
pub mod emissions;
pub mod indicators;
pub mod kpi;
pub mod report;
pub mod tree;

pub use catalog::{ContentCatalog, PosteContent};
pub use emissions::{
    DetailRow, EmissionL2Record, EmissionOverrides, EmissionRecord, EmissionResult,
    EmissionResults, Perimeter, PosteConfig, PosteEmission, PosteRef,
};
pub use indicators::{IndicatorRecord, IndicatorRef, IndicatorResult, IndicatorValue};
pub use report::{LotEntity, ReportContext, ReportData};
pub use tree::{activity_label, NodeType, OrganizationTree, TreeNode};
