//! Business-rule extraction and confidence scoring.
//!
//! Conditionals inside callables classify (in priority order) as INVARIANT,
//! CONTEXT_RESTRICTION or POLICY; assignments and arithmetic expressions as
//! STATE_TRANSITION or CALCULATION. Classification inspects node structure;
//! string matching is reserved for the deliberately stringy signals (layer
//! paths, `status`/`flag` identifier conventions, date and env access).

use crate::domain::DomainModel;
use rulegraph_core::{clamp_score, AstSpan, BusinessRule, RuleType, SemanticKind};
use rulegraph_parser::ast;
use rulegraph_parser::semantic::{SemanticModel, SemanticNode};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;
use tree_sitter::Node;

/// Everything the confidence function may look at. Built by the extractor;
/// kept a plain value so expected scores can be pinned in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleContext {
    /// The rule sits inside a qualified domain entity.
    pub in_entity: bool,
    /// The owning method assigns at least one state field.
    pub mutates_state: bool,
    /// The rule region contains an explicit throw.
    pub has_throw: bool,
    /// The owning method is public, or the owning callable is unscoped.
    pub is_public: bool,
    /// The rule region references an enum symbol.
    pub uses_enum: bool,
    /// The file is not under a controller/infrastructure/adapter directory.
    pub neutral_layer: bool,
    /// The file path looks like a controller.
    pub controller_path: bool,
    /// The per-kind strong structural pattern holds.
    pub strong_pattern: bool,
    /// The rule region sits under a conditional branch.
    pub in_conditional: bool,
}

/// Confidence as a pure function of rule kind and context: additive signals
/// first, then caps and penalties, clamped to `[0, 1]` and rounded to two
/// decimals.
pub fn confidence_for(rule_type: RuleType, ctx: &RuleContext) -> f64 {
    let mut score: f64 = 0.0;
    if ctx.in_entity {
        score += 0.25;
    }
    if ctx.mutates_state {
        score += 0.25;
    }
    if ctx.has_throw {
        score += 0.15;
    }
    if ctx.is_public {
        score += 0.10;
    }
    if ctx.uses_enum {
        score += 0.10;
    }
    if ctx.neutral_layer {
        score += 0.10;
    }
    if ctx.strong_pattern {
        score += 0.05;
    }

    if !ctx.in_entity {
        score = score.min(0.60);
    }
    if ctx.controller_path {
        score -= 0.20;
    }
    if rule_type == RuleType::Calculation && !ctx.mutates_state && !ctx.in_conditional {
        score = score.min(0.70);
    }
    clamp_score(score)
}

pub fn extract_rules(model: &SemanticModel, domain: &DomainModel) -> Vec<BusinessRule> {
    let mut rules = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for node in &model.nodes {
        let rule = match node.kind {
            SemanticKind::If => classify_conditional(node, domain, &model.enums),
            SemanticKind::Binary => classify_binary(node, domain, &model.enums),
            _ => None,
        };
        if let Some(rule) = rule {
            if seen_ids.insert(rule.id.clone()) {
                rules.push(rule);
            }
        }
    }

    debug!("extracted {} rules", rules.len());
    rules
}

/// Ownership of a rule site: the qualifying entity (if the enclosing class
/// is one) and the enclosing callable.
struct Owner<'t> {
    entity: Option<String>,
    method: Option<String>,
    method_node: Option<Node<'t>>,
    is_public: bool,
    state_fields: Vec<String>,
    properties: Vec<String>,
}

fn resolve_owner<'t>(node: &SemanticNode<'t>, domain: &DomainModel) -> Option<Owner<'t>> {
    let source = node.source;

    if let Some(method) = ast::enclosing_method(node.node) {
        let method_name = ast::method_name(method, source);
        let entity = ast::enclosing_class(method)
            .and_then(|c| ast::class_name(c, source))
            .and_then(|name| domain.entity_of(node.file_path, &name));
        return Some(Owner {
            entity: entity.map(|e| e.name.clone()),
            method: method_name,
            method_node: Some(method),
            is_public: ast::is_public_member(method, source),
            state_fields: entity.map(|e| e.state_fields.clone()).unwrap_or_default(),
            properties: entity.map(|e| e.properties.clone()).unwrap_or_default(),
        });
    }

    // Plain functions host rules too; they are unscoped, hence public.
    let mut current = ast::enclosing_function(node.node);
    while let Some(func) = current {
        if let Some(name) = ast::function_name(func, source) {
            return Some(Owner {
                entity: None,
                method: Some(name),
                method_node: Some(func),
                is_public: true,
                state_fields: Vec::new(),
                properties: Vec::new(),
            });
        }
        current = ast::enclosing_function(func);
    }
    None
}

fn classify_conditional(
    node: &SemanticNode,
    domain: &DomainModel,
    enums: &BTreeSet<String>,
) -> Option<BusinessRule> {
    let owner = resolve_owner(node, domain)?;
    let source = node.source;
    let if_node = node.node;

    let condition = ast::if_condition(if_node)?;
    let consequence = if_node.child_by_field_name("consequence")?;
    let alternative = ast::if_alternative(if_node);

    let then_exits = branch_exits(consequence);
    let mutates_after = owner
        .method_node
        .is_some_and(|m| assigns_state_after(m, if_node.end_byte(), source, &owner.state_fields));

    let rule_type = if (then_exits && alternative.is_none())
        || (owner.entity.is_some() && mutates_after)
    {
        RuleType::Invariant
    } else if restricts_context(condition, source, &owner) {
        RuleType::ContextRestriction
    } else if is_policy_shape(alternative) {
        RuleType::Policy
    } else {
        return None;
    };

    let strong_pattern = match rule_type {
        RuleType::Invariant => then_exits,
        RuleType::Policy => alternative.is_some(),
        RuleType::ContextRestriction => true,
        _ => unreachable!(),
    };

    let ctx = RuleContext {
        in_entity: owner.entity.is_some(),
        mutates_state: owner
            .method_node
            .is_some_and(|m| assigns_state(m, source, &owner.state_fields)),
        has_throw: ast::subtree_has(if_node, &|n| n.kind() == "throw_statement"),
        is_public: owner.is_public,
        uses_enum: mentions_enum(if_node, source, enums),
        neutral_layer: neutral_layer(node.file_path),
        controller_path: controller_path(node.file_path),
        strong_pattern,
        in_conditional: ast::inside_conditional(if_node),
    };

    Some(make_rule(
        rule_type,
        node,
        &owner,
        ast::node_text(condition, source).to_string(),
        ast::node_text(consequence, source).to_string(),
        &ctx,
    ))
}

fn classify_binary(
    node: &SemanticNode,
    domain: &DomainModel,
    enums: &BTreeSet<String>,
) -> Option<BusinessRule> {
    let owner = resolve_owner(node, domain)?;
    let source = node.source;
    let expr = node.node;

    if ast::is_assignment(expr, source) {
        let field = ast::this_assignment_field(expr, source)?;
        if !owner.state_fields.contains(&field) {
            return None;
        }
        let ctx = RuleContext {
            in_entity: true,
            mutates_state: true,
            has_throw: false,
            is_public: owner.is_public,
            uses_enum: mentions_enum(expr, source, enums),
            neutral_layer: neutral_layer(node.file_path),
            controller_path: controller_path(node.file_path),
            strong_pattern: true,
            in_conditional: ast::inside_conditional(expr),
        };
        return Some(make_rule(
            RuleType::StateTransition,
            node,
            &owner,
            format!("{} assignment", field),
            ast::node_text(expr, source).to_string(),
            &ctx,
        ));
    }

    if expr.kind() != "binary_expression" {
        return None;
    }
    let operator = ast::binary_operator(expr, source)?;
    if !ast::ARITHMETIC_OPS.contains(&operator) {
        return None;
    }
    if !ast::contains_number_literal(expr) && !ast::reads_own_property(expr, source, &owner.properties)
    {
        return None;
    }

    let ctx = RuleContext {
        in_entity: owner.entity.is_some(),
        mutates_state: owner
            .method_node
            .is_some_and(|m| assigns_state(m, source, &owner.state_fields)),
        has_throw: false,
        is_public: owner.is_public,
        uses_enum: mentions_enum(expr, source, enums),
        neutral_layer: neutral_layer(node.file_path),
        controller_path: controller_path(node.file_path),
        strong_pattern: true,
        in_conditional: ast::inside_conditional(expr),
    };
    let text = ast::node_text(expr, source).to_string();
    Some(make_rule(
        RuleType::Calculation,
        node,
        &owner,
        text.clone(),
        text,
        &ctx,
    ))
}

fn make_rule(
    rule_type: RuleType,
    node: &SemanticNode,
    owner: &Owner,
    condition: String,
    consequence: String,
    ctx: &RuleContext,
) -> BusinessRule {
    let start = node.node.start_byte();
    BusinessRule {
        id: BusinessRule::make_id(rule_type, node.file_path, start),
        rule_type,
        entity: owner.entity.clone(),
        method: owner.method.clone(),
        file_path: node.file_path.to_string(),
        condition,
        consequence,
        ast_location: AstSpan {
            start,
            end: node.node.end_byte(),
        },
        confidence: confidence_for(rule_type, ctx),
    }
}

/// A guard branch: the then-branch throws or returns at its own level.
fn branch_exits(branch: Node) -> bool {
    matches!(branch.kind(), "throw_statement" | "return_statement")
        || ast::subtree_has(branch, &|n| {
            matches!(n.kind(), "throw_statement" | "return_statement")
        })
}

/// Branching on an explicit alternative is the policy shape; the
/// both-branches-return and both-branches-assign variants only arise when
/// an alternative exists, so they collapse into this test.
fn is_policy_shape(alternative: Option<Node>) -> bool {
    alternative.is_some()
}

/// Condition mentions context outside the entity's own state: date/time,
/// status-like accessors, feature flags and environment, or (for entities)
/// method parameters and process-wide globals.
fn restricts_context(condition: Node, source: &str, owner: &Owner) -> bool {
    if mentions_datetime(condition, source) {
        return true;
    }
    if mentions_status(condition, source) {
        return true;
    }
    if mentions_flag_or_env(condition, source) {
        return true;
    }
    if owner.entity.is_some() {
        let params = owner
            .method_node
            .map(|m| ast::parameter_names(m, source))
            .unwrap_or_default();
        if mentions_external_input(condition, source, &params) {
            return true;
        }
    }
    false
}

fn mentions_datetime(node: Node, source: &str) -> bool {
    let is_date = |n: Node| {
        (n.kind() == "new_expression"
            && n.child_by_field_name("constructor")
                .is_some_and(|c| ast::node_text(c, source) == "Date"))
            || (n.kind() == "member_expression" && ast::node_text(n, source) == "Date.now")
    };
    is_date(node) || ast::subtree_has(node, &is_date)
}

fn mentions_status(node: Node, source: &str) -> bool {
    let is_status = |n: Node| {
        matches!(n.kind(), "identifier" | "property_identifier")
            && ast::node_text(n, source).to_lowercase().contains("status")
    };
    is_status(node) || ast::subtree_has(node, &is_status)
}

fn mentions_flag_or_env(node: Node, source: &str) -> bool {
    let is_flaggy = |n: Node| {
        if matches!(n.kind(), "identifier" | "property_identifier") {
            let text = ast::node_text(n, source).to_lowercase();
            return text.contains("flag") || text.contains("feature");
        }
        n.kind() == "member_expression" && ast::node_text(n, source).starts_with("process.env")
    };
    is_flaggy(node) || ast::subtree_has(node, &is_flaggy)
}

/// A bare identifier matching a method parameter, or access through a
/// process-wide global object.
fn mentions_external_input(node: Node, source: &str, params: &[String]) -> bool {
    const GLOBALS: &[&str] = &["process", "globalThis", "window", "global"];
    let is_external = |n: Node| match n.kind() {
        "identifier" => {
            let text = ast::node_text(n, source);
            params.iter().any(|p| p == text) || GLOBALS.contains(&text)
        }
        _ => false,
    };
    is_external(node) || ast::subtree_has(node, &is_external)
}

fn mentions_enum(node: Node, source: &str, enums: &BTreeSet<String>) -> bool {
    if enums.is_empty() {
        return false;
    }
    let uses = |n: Node| {
        n.kind() == "identifier" && enums.contains(ast::node_text(n, source))
    };
    uses(node) || ast::subtree_has(node, &uses)
}

/// Does the callable body assign any of the entity's state fields?
fn assigns_state(callable: Node, source: &str, state_fields: &[String]) -> bool {
    if state_fields.is_empty() {
        return false;
    }
    let Some(body) = callable.child_by_field_name("body") else {
        return false;
    };
    let mut found = false;
    ast::for_each_descendant(body, &mut |n| {
        if found {
            return false;
        }
        if ast::is_assignment(n, source) {
            if let Some(field) = ast::this_assignment_field(n, source) {
                if state_fields.contains(&field) {
                    found = true;
                    return false;
                }
            }
        }
        true
    });
    found
}

/// Does the callable assign a state field past `after_byte`? Used for the
/// guard-then-mutate invariant shape.
fn assigns_state_after(
    callable: Node,
    after_byte: usize,
    source: &str,
    state_fields: &[String],
) -> bool {
    if state_fields.is_empty() {
        return false;
    }
    let Some(body) = callable.child_by_field_name("body") else {
        return false;
    };
    let mut found = false;
    ast::for_each_descendant(body, &mut |n| {
        if found {
            return false;
        }
        if n.start_byte() >= after_byte && ast::is_assignment(n, source) {
            if let Some(field) = ast::this_assignment_field(n, source) {
                if state_fields.contains(&field) {
                    found = true;
                    return false;
                }
            }
        }
        true
    });
    found
}

/// Not under a controller/infrastructure/adapter directory.
fn neutral_layer(file_path: &str) -> bool {
    let lower = file_path.to_lowercase();
    !(lower.contains("controller") || lower.contains("infra") || lower.contains("adapter"))
}

fn controller_path(file_path: &str) -> bool {
    file_path.to_lowercase().contains("controller")
}
