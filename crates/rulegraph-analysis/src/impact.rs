//! Impact simulation: breadth-first blast radius over the derived relation
//! graph plus a weighted global risk score.

use rulegraph_core::{
    clamp_score, BusinessRule, DomainEntity, DomainRelation, ImpactExplanation, ImpactNode,
    ImpactNodeKind, ImpactSimulationResult, Result, RuleGraphError, RuleType,
};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

/// Traversal never explores beyond this depth.
pub const MAX_TRAVERSAL_DEPTH: usize = 5;

struct Traversal {
    visited: BTreeSet<String>,
    direct: usize,
    indirect: usize,
    depth: usize,
}

/// Prebuilt adjacency and normalization denominators for one graph. Cheap
/// to construct once per pipeline run and query per rule.
pub struct ImpactEngine<'a> {
    entities: &'a [DomainEntity],
    rules: &'a [BusinessRule],
    adjacency: HashMap<&'a str, Vec<&'a str>>,
    max_fan_out: usize,
    max_depth: usize,
    max_rules_per_entity: usize,
    max_fan_in: usize,
    fan_in: HashMap<&'a str, usize>,
}

impl<'a> ImpactEngine<'a> {
    pub fn new(
        entities: &'a [DomainEntity],
        rules: &'a [BusinessRule],
        relations: &'a [DomainRelation],
    ) -> Self {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        for relation in relations.iter().filter(|r| r.relation_type.is_impact_bearing()) {
            if seen.insert((relation.from.as_str(), relation.to.as_str())) {
                adjacency
                    .entry(relation.from.as_str())
                    .or_default()
                    .push(relation.to.as_str());
            }
        }

        // Node universe: every identifier appearing at either end of any
        // relation, USES included.
        let universe: BTreeSet<&str> = relations
            .iter()
            .flat_map(|r| [r.from.as_str(), r.to.as_str()])
            .collect();

        let max_fan_out = universe
            .iter()
            .map(|n| adjacency.get(n).map_or(0, |targets| targets.len()))
            .max()
            .unwrap_or(0);

        let max_depth = universe
            .iter()
            .map(|n| bfs(&adjacency, n).depth)
            .max()
            .unwrap_or(0);

        let mut rules_per_entity: HashMap<&str, usize> = HashMap::new();
        for rule in rules {
            if let Some(entity) = rule.entity.as_deref() {
                *rules_per_entity.entry(entity).or_default() += 1;
            }
        }
        let max_rules_per_entity = rules_per_entity.values().copied().max().unwrap_or(0);

        let mut fan_in: HashMap<&str, usize> = HashMap::new();
        for entity in entities {
            let prefix = format!("{}.", entity.name);
            let sources: HashSet<&str> = relations
                .iter()
                .filter(|r| r.relation_type.is_impact_bearing())
                .filter(|r| r.to == entity.name || r.to.starts_with(&prefix))
                .map(|r| r.from.as_str())
                .collect();
            fan_in.insert(entity.name.as_str(), sources.len());
        }
        let max_fan_in = fan_in.values().copied().max().unwrap_or(0);

        Self {
            entities,
            rules,
            adjacency,
            max_fan_out,
            max_depth,
            max_rules_per_entity,
            max_fan_in,
            fan_in,
        }
    }

    /// Simulate changing the rule identified by `rule_id`. Unknown
    /// identifiers are fatal.
    pub fn simulate(&self, rule_id: &str) -> Result<ImpactSimulationResult> {
        let rule = self
            .rules
            .iter()
            .find(|r| r.id == rule_id)
            .ok_or_else(|| RuleGraphError::UnknownRule(rule_id.to_string()))?;

        let root = self.root_identifier(rule);
        let traversal = bfs(&self.adjacency, &root);

        let mut impacted = traversal.visited;
        if let Some(entity) = rule.entity.as_deref() {
            impacted.insert(entity.to_string());
            if let Some(method) = rule.method.as_deref() {
                impacted.insert(format!("{}.{}", entity, method));
            }
        }

        let fan_out = traversal.direct + traversal.indirect;
        let score = self.risk_score(rule, fan_out, traversal.depth);

        let entity_names: HashSet<&str> = self.entities.iter().map(|e| e.name.as_str()).collect();
        let explanation = ImpactExplanation {
            fan_out,
            call_depth: traversal.depth,
            affected_files: impacted.iter().filter(|id| looks_like_file(id)).count(),
            affected_entities: impacted
                .iter()
                .filter(|id| entity_names.contains(id.as_str()))
                .count(),
            cross_layer_violations: impacted
                .iter()
                .filter(|id| {
                    let lower = id.to_lowercase();
                    lower.contains("controller") || lower.contains("infra")
                })
                .count(),
        };

        let mut nodes = Vec::with_capacity(impacted.len());
        nodes.push(ImpactNode {
            id: root.clone(),
            kind: self.classify(&root, rule),
            risk_score: score,
        });
        for id in &impacted {
            if *id != root {
                nodes.push(ImpactNode {
                    id: id.clone(),
                    kind: self.classify(id, rule),
                    risk_score: score,
                });
            }
        }

        debug!(
            "impact of {}: {} nodes, depth {}, score {}",
            rule_id,
            nodes.len(),
            traversal.depth,
            score
        );
        Ok(ImpactSimulationResult {
            rule: rule.clone(),
            nodes,
            risk_score: score,
            explanation,
        })
    }

    /// Where traversal starts for a rule: the most specific identifier the
    /// rule resolves to.
    fn root_identifier(&self, rule: &BusinessRule) -> String {
        match (rule.entity.as_deref(), rule.method.as_deref()) {
            (Some(entity), Some(method)) => format!("{}.{}", entity, method),
            (None, Some(method)) => format!("{}#{}", rule.file_path, method),
            (Some(entity), None) => entity.to_string(),
            (None, None) => rule.id.clone(),
        }
    }

    fn risk_score(&self, rule: &BusinessRule, fan_out: usize, depth: usize) -> f64 {
        let fan_out_weight = normalize(fan_out, self.max_fan_out) * 0.25;
        let call_depth_weight = normalize(depth, self.max_depth) * 0.15;
        let mutation_weight = mutation_factor(rule.rule_type) * 0.20;
        let layer_weight = layer_factor(rule) * 0.20;
        let criticality_weight = self.criticality_factor(rule) * 0.20;

        let mut score =
            fan_out_weight + call_depth_weight + mutation_weight + layer_weight + criticality_weight;
        if rule.entity.is_none() {
            // A rule with no owning entity is unanchored logic; treat it as
            // high risk regardless of measured spread.
            score = score.max(0.85);
        }
        clamp_score(score)
    }

    fn criticality_factor(&self, rule: &BusinessRule) -> f64 {
        let Some(entity) = rule.entity.as_deref() else {
            return 1.0;
        };
        let rule_count = self
            .rules
            .iter()
            .filter(|r| r.entity.as_deref() == Some(entity))
            .count();
        let fan_in = self.fan_in.get(entity).copied().unwrap_or(0);
        (normalize(rule_count, self.max_rules_per_entity) + normalize(fan_in, self.max_fan_in)) / 2.0
    }

    fn classify(&self, id: &str, rule: &BusinessRule) -> ImpactNodeKind {
        if id == rule.id {
            return ImpactNodeKind::Rule;
        }
        if looks_like_file(id) {
            return ImpactNodeKind::File;
        }
        if self.entities.iter().any(|e| e.name == id) {
            return ImpactNodeKind::Entity;
        }
        ImpactNodeKind::Method
    }
}

fn bfs(adjacency: &HashMap<&str, Vec<&str>>, root: &str) -> Traversal {
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    let mut direct = 0;
    let mut indirect = 0;
    let mut depth = 0;

    visited.insert(root.to_string());
    queue.push_back((root.to_string(), 0));

    while let Some((current, current_depth)) = queue.pop_front() {
        if current_depth >= MAX_TRAVERSAL_DEPTH {
            continue;
        }
        let Some(targets) = adjacency.get(current.as_str()) else {
            continue;
        };
        for target in targets {
            if visited.insert(target.to_string()) {
                let next_depth = current_depth + 1;
                if next_depth == 1 {
                    direct += 1;
                } else {
                    indirect += 1;
                }
                depth = depth.max(next_depth);
                queue.push_back((target.to_string(), next_depth));
            }
        }
    }

    Traversal {
        visited,
        direct,
        indirect,
        depth,
    }
}

fn normalize(value: usize, max: usize) -> f64 {
    if max == 0 {
        0.0
    } else {
        (value as f64 / max as f64).min(1.0)
    }
}

fn mutation_factor(rule_type: RuleType) -> f64 {
    match rule_type {
        RuleType::StateTransition => 1.0,
        RuleType::Invariant => 0.9,
        RuleType::Policy => 0.7,
        RuleType::Calculation => 0.6,
        RuleType::ContextRestriction => 0.5,
    }
}

fn layer_factor(rule: &BusinessRule) -> f64 {
    let path = rule.file_path.to_lowercase();
    if path.contains("controller") {
        1.0
    } else if path.contains("service") {
        0.7
    } else if rule.entity.is_some() {
        0.2
    } else {
        1.0
    }
}

fn looks_like_file(id: &str) -> bool {
    id.contains('/') || id.ends_with(".ts") || id.ends_with(".tsx")
}
