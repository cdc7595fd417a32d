//! Report assembly: a pure projection of the per-stage outputs.

use rulegraph_core::{
    ArchitecturalViolation, BusinessRule, DomainEntity, DomainRelation, ImpactSimulationResult,
    TechnicalReport,
};

pub fn assemble(
    entities: Vec<DomainEntity>,
    relations: Vec<DomainRelation>,
    rules: Vec<BusinessRule>,
    impact: Option<ImpactSimulationResult>,
    architectural_violations: Vec<ArchitecturalViolation>,
) -> TechnicalReport {
    TechnicalReport {
        entities,
        relations,
        rules,
        impact,
        architectural_violations,
    }
}
