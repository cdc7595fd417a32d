//! The seven-stage pipeline behind the two-function public surface. Each
//! stage completes before the next begins and consumes only the previous
//! stage's output; AST handles never outlive one invocation.

use crate::architecture::detect_violations;
use crate::domain::build_domain_model;
use crate::impact::ImpactEngine;
use crate::report;
use crate::rules::extract_rules;
use rulegraph_core::{ImpactSimulationResult, Result, TechnicalReport};
use rulegraph_parser::semantic::enrich;
use rulegraph_parser::{ParserConfig, SourceParser};
use std::path::Path;
use tracing::debug;

pub struct AnalysisPipeline {
    parser: SourceParser,
}

impl AnalysisPipeline {
    pub fn new() -> Self {
        Self {
            parser: SourceParser::new(),
        }
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            parser: SourceParser::with_config(config),
        }
    }

    /// Run all stages and return the full report.
    pub fn analyze(&self, project_path: &Path) -> Result<TechnicalReport> {
        let project = self.parser.parse_project(project_path)?;
        let model = enrich(&project);
        let domain = build_domain_model(&model);
        let rules = extract_rules(&model, &domain);

        let engine = ImpactEngine::new(&domain.entities, &rules, &domain.relations);
        let impact = match rules.first() {
            Some(first) => Some(engine.simulate(&first.id)?),
            None => None,
        };
        let violations = detect_violations(&domain, &rules);

        debug!(
            "analysis of {:?}: {} entities, {} rules, {} violations",
            project_path,
            domain.entities.len(),
            rules.len(),
            violations.len()
        );
        Ok(report::assemble(
            domain.entities,
            domain.relations,
            rules,
            impact,
            violations,
        ))
    }

    /// Rerun stages 1-4 and simulate the impact of one rule.
    pub fn simulate_rule_impact(
        &self,
        project_path: &Path,
        rule_id: &str,
    ) -> Result<ImpactSimulationResult> {
        let project = self.parser.parse_project(project_path)?;
        let model = enrich(&project);
        let domain = build_domain_model(&model);
        let rules = extract_rules(&model, &domain);

        ImpactEngine::new(&domain.entities, &rules, &domain.relations).simulate(rule_id)
    }
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyze the project under `project_path` with default configuration.
pub fn analyze(project_path: impl AsRef<Path>) -> Result<TechnicalReport> {
    AnalysisPipeline::new().analyze(project_path.as_ref())
}

/// Analyze with a caller-supplied parser configuration (custom exclusion
/// set).
pub fn analyze_with_config(
    project_path: impl AsRef<Path>,
    config: ParserConfig,
) -> Result<TechnicalReport> {
    AnalysisPipeline::with_config(config).analyze(project_path.as_ref())
}

/// Simulate the impact of changing `rule_id` in the project under
/// `project_path`.
pub fn simulate_rule_impact(
    project_path: impl AsRef<Path>,
    rule_id: &str,
) -> Result<ImpactSimulationResult> {
    AnalysisPipeline::new().simulate_rule_impact(project_path.as_ref(), rule_id)
}
