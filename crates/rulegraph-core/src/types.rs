use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of syntax shapes tracked by the semantic enricher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticKind {
    Class,
    Method,
    Property,
    Import,
    Binary,
    If,
    Throw,
    Return,
    New,
    Call,
}

/// Directed edge recorded while walking call expressions.
///
/// `from` is the enclosing callable identifier (`<Class>.<method>` when a
/// method encloses the call, `<filePath>#<function>` otherwise); `to` is the
/// verbatim callee expression text. Deduplicated by `(from, to)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallGraphEdge {
    pub from: String,
    pub to: String,
}

impl CallGraphEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// A non-technical class carrying mutable state mutated by its own methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEntity {
    pub name: String,
    pub properties: Vec<String>,
    pub methods: Vec<String>,
    /// Mutable properties that at least one method actually assigns.
    pub state_fields: Vec<String>,
    pub file_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Calls,
    DependsOn,
    Modifies,
    Uses,
}

impl RelationType {
    /// Edge types the impact traversal follows. USES is serialized alongside
    /// CALLS but carries no impact of its own.
    pub fn is_impact_bearing(&self) -> bool {
        matches!(
            self,
            RelationType::Calls | RelationType::DependsOn | RelationType::Modifies
        )
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationType::Calls => "CALLS",
            RelationType::DependsOn => "DEPENDS_ON",
            RelationType::Modifies => "MODIFIES",
            RelationType::Uses => "USES",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CALLS" => Ok(RelationType::Calls),
            "DEPENDS_ON" => Ok(RelationType::DependsOn),
            "MODIFIES" => Ok(RelationType::Modifies),
            "USES" => Ok(RelationType::Uses),
            other => Err(format!("unknown relation type: {}", other)),
        }
    }
}

/// Directed, typed edge in the derived graph. Deduplicated by
/// `(type, from, to)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainRelation {
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    pub from: String,
    pub to: String,
}

impl DomainRelation {
    pub fn new(relation_type: RelationType, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            relation_type,
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    Invariant,
    Policy,
    Calculation,
    StateTransition,
    ContextRestriction,
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleType::Invariant => "INVARIANT",
            RuleType::Policy => "POLICY",
            RuleType::Calculation => "CALCULATION",
            RuleType::StateTransition => "STATE_TRANSITION",
            RuleType::ContextRestriction => "CONTEXT_RESTRICTION",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "INVARIANT" => Ok(RuleType::Invariant),
            "POLICY" => Ok(RuleType::Policy),
            "CALCULATION" => Ok(RuleType::Calculation),
            "STATE_TRANSITION" => Ok(RuleType::StateTransition),
            "CONTEXT_RESTRICTION" => Ok(RuleType::ContextRestriction),
            other => Err(format!("unknown rule type: {}", other)),
        }
    }
}

/// Byte span of an AST region within its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstSpan {
    pub start: usize,
    pub end: usize,
}

/// A classified AST region encoding domain logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessRule {
    /// Stable identifier `<TYPE>:<filePath>:<astStart>`.
    pub id: String,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub entity: Option<String>,
    pub method: Option<String>,
    pub file_path: String,
    pub condition: String,
    pub consequence: String,
    pub ast_location: AstSpan,
    /// In `[0, 1]`, rounded to two decimals.
    pub confidence: f64,
}

impl BusinessRule {
    pub fn make_id(rule_type: RuleType, file_path: &str, start: usize) -> String {
        format!("{}:{}:{}", rule_type, file_path, start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactNodeKind {
    Rule,
    Entity,
    File,
    Method,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactNode {
    pub id: String,
    pub kind: ImpactNodeKind,
    pub risk_score: f64,
}

/// Measured inputs behind an impact score, reported for explainability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactExplanation {
    pub fan_out: usize,
    pub call_depth: usize,
    pub affected_files: usize,
    pub affected_entities: usize,
    pub cross_layer_violations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSimulationResult {
    pub rule: BusinessRule,
    /// Root node first, remainder sorted ascending by identifier. Every node
    /// carries the same global risk score.
    pub nodes: Vec<ImpactNode>,
    pub risk_score: f64,
    pub explanation: ImpactExplanation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationType {
    DomainCallingInfra,
    RuleInController,
    AnemicEntity,
    FatService,
    ScatteredRule,
    LayerViolation,
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationType::DomainCallingInfra => "DOMAIN_CALLING_INFRA",
            ViolationType::RuleInController => "RULE_IN_CONTROLLER",
            ViolationType::AnemicEntity => "ANEMIC_ENTITY",
            ViolationType::FatService => "FAT_SERVICE",
            ViolationType::ScatteredRule => "SCATTERED_RULE",
            ViolationType::LayerViolation => "LAYER_VIOLATION",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitecturalViolation {
    /// Deterministic `<TYPE>:<subject>` identifier, stable across runs.
    pub id: String,
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub message: String,
    pub file_path: Option<String>,
    pub related: Vec<String>,
}

/// Round a score to two decimals; confidence and risk values are reported
/// at this precision.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Clamp to `[0, 1]` then round to two decimals.
pub fn clamp_score(value: f64) -> f64 {
    round2(value.clamp(0.0, 1.0))
}
