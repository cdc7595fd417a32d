//! Architectural-violation detection over the already-built model. Every
//! detector is a pure sweep; no source text is re-read.

use crate::domain::DomainModel;
use rulegraph_core::{ArchitecturalViolation, BusinessRule, RelationType, ViolationType};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Services with at least this many methods are considered fat.
pub const FAT_SERVICE_METHOD_COUNT: usize = 8;

/// Rule groups spread over at least this many files are scattered.
pub const SCATTERED_RULE_FILE_COUNT: usize = 3;

pub fn detect_violations(
    domain: &DomainModel,
    rules: &[BusinessRule],
) -> Vec<ArchitecturalViolation> {
    let mut violations = Vec::new();

    domain_calling_infra(domain, &mut violations);
    rule_in_controller(rules, &mut violations);
    anemic_entities(domain, &mut violations);
    fat_services(domain, &mut violations);
    layer_violations(domain, &mut violations);
    scattered_rules(rules, &mut violations);

    debug!("detected {} architectural violations", violations.len());
    violations
}

fn domain_calling_infra(domain: &DomainModel, out: &mut Vec<ArchitecturalViolation>) {
    for relation in &domain.relations {
        if relation.relation_type != RelationType::Calls {
            continue;
        }
        let from = relation.from.to_lowercase();
        let to = relation.to.to_lowercase();
        if from.contains("domain") && to.contains("infra") {
            out.push(ArchitecturalViolation {
                id: format!("DOMAIN_CALLING_INFRA:{}->{}", relation.from, relation.to),
                violation_type: ViolationType::DomainCallingInfra,
                message: format!(
                    "domain code {} calls into infrastructure {}",
                    relation.from, relation.to
                ),
                file_path: None,
                related: vec![relation.from.clone(), relation.to.clone()],
            });
        }
    }
}

fn rule_in_controller(rules: &[BusinessRule], out: &mut Vec<ArchitecturalViolation>) {
    for rule in rules {
        let method_flag = rule
            .method
            .as_deref()
            .is_some_and(|m| m.ends_with("Controller"));
        let path_flag = rule.file_path.to_lowercase().contains("controller");
        if method_flag || path_flag {
            out.push(ArchitecturalViolation {
                id: format!("RULE_IN_CONTROLLER:{}", rule.id),
                violation_type: ViolationType::RuleInController,
                message: format!(
                    "business rule {} lives in a controller; move it behind the domain boundary",
                    rule.id
                ),
                file_path: Some(rule.file_path.clone()),
                related: vec![rule.id.clone()],
            });
        }
    }
}

fn anemic_entities(domain: &DomainModel, out: &mut Vec<ArchitecturalViolation>) {
    for entity in &domain.entities {
        if entity.state_fields.is_empty() {
            continue;
        }
        let prefix = format!("{}.", entity.name);
        let modifies = domain.relations.iter().any(|r| {
            r.relation_type == RelationType::Modifies && r.from.starts_with(&prefix)
        });
        if !modifies {
            out.push(ArchitecturalViolation {
                id: format!("ANEMIC_ENTITY:{}", entity.name),
                violation_type: ViolationType::AnemicEntity,
                message: format!(
                    "entity {} declares state but no method modifies it",
                    entity.name
                ),
                file_path: Some(entity.file_path.clone()),
                related: vec![entity.name.clone()],
            });
        }
    }
}

fn fat_services(domain: &DomainModel, out: &mut Vec<ArchitecturalViolation>) {
    for class in &domain.classes {
        if class.name.ends_with("Service") && class.method_count >= FAT_SERVICE_METHOD_COUNT {
            out.push(ArchitecturalViolation {
                id: format!("FAT_SERVICE:{}", class.name),
                violation_type: ViolationType::FatService,
                message: format!(
                    "{} declares {} methods; split responsibilities",
                    class.name, class.method_count
                ),
                file_path: Some(class.file_path.clone()),
                related: vec![class.name.clone()],
            });
        }
    }
}

fn layer_violations(domain: &DomainModel, out: &mut Vec<ArchitecturalViolation>) {
    for import in &domain.imports {
        let in_domain_layer = import
            .file_path
            .split('/')
            .any(|segment| segment.eq_ignore_ascii_case("domain"));
        if in_domain_layer && import.specifier.to_lowercase().contains("infra") {
            out.push(ArchitecturalViolation {
                id: format!("LAYER_VIOLATION:{}:{}", import.file_path, import.specifier),
                violation_type: ViolationType::LayerViolation,
                message: format!(
                    "domain file {} imports infrastructure module {}",
                    import.file_path, import.specifier
                ),
                file_path: Some(import.file_path.clone()),
                related: vec![import.specifier.clone()],
            });
        }
    }
}

fn scattered_rules(rules: &[BusinessRule], out: &mut Vec<ArchitecturalViolation>) {
    let mut groups: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
    for rule in rules {
        let Some(entity) = rule.entity.clone() else {
            continue;
        };
        groups
            .entry((entity, rule.rule_type.to_string()))
            .or_default()
            .insert(rule.file_path.clone());
    }
    for ((entity, rule_type), files) in groups {
        if files.len() >= SCATTERED_RULE_FILE_COUNT {
            out.push(ArchitecturalViolation {
                id: format!("SCATTERED_RULE:{}:{}", entity, rule_type),
                violation_type: ViolationType::ScatteredRule,
                message: format!(
                    "{} rules for {} are spread across {} files",
                    rule_type,
                    entity,
                    files.len()
                ),
                file_path: None,
                related: files.into_iter().collect(),
            });
        }
    }
}
