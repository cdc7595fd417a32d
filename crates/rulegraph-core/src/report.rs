use crate::types::{
    ArchitecturalViolation, BusinessRule, DomainEntity, DomainRelation, ImpactSimulationResult,
};
use serde::{Deserialize, Serialize};

/// Aggregated output of a full pipeline run. A pure projection of the
/// per-stage results; persistence and UI layers consume this as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalReport {
    pub entities: Vec<DomainEntity>,
    pub relations: Vec<DomainRelation>,
    pub rules: Vec<BusinessRule>,
    /// Impact of the first extracted rule, when any rule exists.
    pub impact: Option<ImpactSimulationResult>,
    pub architectural_violations: Vec<ArchitecturalViolation>,
}
