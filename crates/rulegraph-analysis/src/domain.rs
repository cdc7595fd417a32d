//! Domain-entity inference over the enriched semantic model.
//!
//! A class qualifies as a domain entity when it is non-technical by naming
//! convention, declares mutable state, mutates that state from its own
//! methods, and shows at least one conditional signal.

use rulegraph_core::{DomainEntity, DomainRelation, RelationType, SemanticKind};
use rulegraph_parser::ast;
use rulegraph_parser::semantic::SemanticModel;
use std::collections::HashSet;
use tracing::debug;
use tree_sitter::Node;

/// Class-name suffixes that mark technical components, never entities.
pub const TECHNICAL_SUFFIXES: &[&str] =
    &["Controller", "Service", "Repository", "Adapter", "Gateway"];

/// Every class seen in the project, entity or not. The architectural
/// analyzer sizes services from this.
#[derive(Debug, Clone)]
pub struct ClassSummary {
    pub name: String,
    pub file_path: String,
    pub method_count: usize,
}

/// One import declaration, for layering checks.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub file_path: String,
    pub specifier: String,
}

/// Output of the domain stage: entities, the typed relation graph, and the
/// class/import byproducts later stages inspect.
#[derive(Debug, Clone)]
pub struct DomainModel {
    pub entities: Vec<DomainEntity>,
    pub relations: Vec<DomainRelation>,
    pub classes: Vec<ClassSummary>,
    pub imports: Vec<ImportRecord>,
}

impl DomainModel {
    /// The entity owning `class_name` declared in `file_path`, if any.
    pub fn entity_of(&self, file_path: &str, class_name: &str) -> Option<&DomainEntity> {
        self.entities
            .iter()
            .find(|e| e.name == class_name && e.file_path == file_path)
    }
}

/// An assignment of the form `this.<field> = …` (or compound counterpart)
/// found in a method body.
struct FieldAssignment {
    field: String,
    method: String,
    in_conditional: bool,
}

pub fn build_domain_model(model: &SemanticModel) -> DomainModel {
    let mut entities = Vec::new();
    let mut relations = Vec::new();
    let mut seen_relations: HashSet<(RelationType, String, String)> = HashSet::new();
    let mut classes = Vec::new();
    let mut imports = Vec::new();

    for node in &model.nodes {
        match node.kind {
            SemanticKind::Class => {
                let Some(name) = node.name.clone() else {
                    continue;
                };
                let shape = inspect_class(node.node, node.source, &name);
                classes.push(ClassSummary {
                    name: name.clone(),
                    file_path: node.file_path.to_string(),
                    method_count: shape.methods.len(),
                });

                if let Some(entity) =
                    qualify_entity(&shape, node.file_path, &model.enums)
                {
                    for assignment in &shape.assignments {
                        if entity.state_fields.contains(&assignment.field) {
                            push_relation(
                                &mut relations,
                                &mut seen_relations,
                                RelationType::Modifies,
                                format!("{}.{}", entity.name, assignment.method),
                                format!("{}.{}", entity.name, assignment.field),
                            );
                        }
                    }
                    entities.push(entity);
                }
            }
            SemanticKind::Import => {
                if let Some(specifier) = node.name.clone() {
                    imports.push(ImportRecord {
                        file_path: node.file_path.to_string(),
                        specifier,
                    });
                }
            }
            _ => {}
        }
    }

    // Every call is both a CALLS and a USES edge; the labels stay distinct
    // in the serialized graph.
    for edge in &model.call_edges {
        push_relation(
            &mut relations,
            &mut seen_relations,
            RelationType::Calls,
            edge.from.clone(),
            edge.to.clone(),
        );
        push_relation(
            &mut relations,
            &mut seen_relations,
            RelationType::Uses,
            edge.from.clone(),
            edge.to.clone(),
        );
    }

    debug!(
        "domain model: {} entities, {} relations, {} classes",
        entities.len(),
        relations.len(),
        classes.len()
    );
    DomainModel {
        entities,
        relations,
        classes,
        imports,
    }
}

fn push_relation(
    relations: &mut Vec<DomainRelation>,
    seen: &mut HashSet<(RelationType, String, String)>,
    relation_type: RelationType,
    from: String,
    to: String,
) {
    if seen.insert((relation_type, from.clone(), to.clone())) {
        relations.push(DomainRelation::new(relation_type, from, to));
    }
}

struct PropertyShape {
    name: String,
    readonly: bool,
    type_text: Option<String>,
}

struct ClassShape {
    name: String,
    properties: Vec<PropertyShape>,
    methods: Vec<String>,
    assignments: Vec<FieldAssignment>,
    has_conditional_method: bool,
}

fn inspect_class(class_node: Node, source: &str, name: &str) -> ClassShape {
    let mut shape = ClassShape {
        name: name.to_string(),
        properties: Vec::new(),
        methods: Vec::new(),
        assignments: Vec::new(),
        has_conditional_method: false,
    };

    let Some(body) = class_node.child_by_field_name("body") else {
        return shape;
    };

    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        match member.kind() {
            "public_field_definition" => {
                if let Some(prop_name) = member
                    .child_by_field_name("name")
                    .map(|n| ast::node_text(n, source).to_string())
                {
                    shape.properties.push(PropertyShape {
                        name: prop_name,
                        readonly: ast::is_readonly(member),
                        type_text: member
                            .child_by_field_name("type")
                            .and_then(|a| a.named_child(0))
                            .map(|t| ast::node_text(t, source).to_string()),
                    });
                }
            }
            "method_definition" => {
                let Some(method_name) = ast::method_name(member, source) else {
                    continue;
                };
                shape.methods.push(method_name.clone());

                if let Some(method_body) = member.child_by_field_name("body") {
                    collect_method_facts(method_body, source, &method_name, &mut shape);
                }
            }
            _ => {}
        }
    }
    shape
}

/// Gather `this.<field>` assignments and conditional presence from one
/// method body. Nested closures are included; `this` still refers to the
/// instance in the common arrow-callback case.
fn collect_method_facts(body: Node, source: &str, method: &str, shape: &mut ClassShape) {
    ast::for_each_descendant(body, &mut |n| {
        if n.kind() == "if_statement" {
            shape.has_conditional_method = true;
        }
        if ast::is_assignment(n, source) {
            if let Some(field) = ast::this_assignment_field(n, source) {
                shape.assignments.push(FieldAssignment {
                    field,
                    method: method.to_string(),
                    in_conditional: ast::inside_conditional(n),
                });
            }
        }
        true
    });
}

fn qualify_entity(
    shape: &ClassShape,
    file_path: &str,
    enums: &std::collections::BTreeSet<String>,
) -> Option<DomainEntity> {
    if shape.name.is_empty() || has_technical_suffix(&shape.name) {
        return None;
    }

    let mutable: Vec<&PropertyShape> = shape.properties.iter().filter(|p| !p.readonly).collect();
    if mutable.is_empty() {
        return None;
    }

    let mutable_names: HashSet<&str> = mutable.iter().map(|p| p.name.as_str()).collect();
    let mutating: Vec<&FieldAssignment> = shape
        .assignments
        .iter()
        .filter(|a| mutable_names.contains(a.field.as_str()))
        .collect();
    if mutating.is_empty() {
        return None;
    }

    let has_enum_property = shape
        .properties
        .iter()
        .any(|p| p.type_text.as_deref().is_some_and(|t| enums.contains(t)));
    let has_conditional_mutation = mutating.iter().any(|a| a.in_conditional);
    if !has_enum_property && !shape.has_conditional_method && !has_conditional_mutation {
        return None;
    }

    let assigned: HashSet<&str> = mutating.iter().map(|a| a.field.as_str()).collect();
    let state_fields: Vec<String> = mutable
        .iter()
        .filter(|p| assigned.contains(p.name.as_str()))
        .map(|p| p.name.clone())
        .collect();

    Some(DomainEntity {
        name: shape.name.clone(),
        properties: shape.properties.iter().map(|p| p.name.clone()).collect(),
        methods: shape.methods.clone(),
        state_fields,
        file_path: file_path.to_string(),
    })
}

pub fn has_technical_suffix(name: &str) -> bool {
    TECHNICAL_SUFFIXES.iter().any(|s| name.ends_with(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rulegraph_parser::semantic::enrich;
    use rulegraph_parser::{ParsedFile, ParsedProject};

    fn project_for(source: &str) -> ParsedProject {
        let tree = rulegraph_parser::make_parser()
            .unwrap()
            .parse(source, None)
            .unwrap();
        ParsedProject {
            files: vec![ParsedFile {
                path: "src/fixture.ts".to_string(),
                source: source.to_string(),
                tree,
            }],
            skipped: Vec::new(),
        }
    }

    fn build(source: &str) -> DomainModel {
        let project = project_for(source);
        let model = enrich(&project);
        build_domain_model(&model)
    }

    #[test]
    fn read_only_class_is_not_an_entity() {
        // No mutator: `describe` only reads.
        let domain = build(
            "class Cart { items: string[]; describe(): string { return this.items.join(); } }",
        );
        assert!(domain.entities.is_empty());
        assert_eq!(domain.classes.len(), 1);
    }

    #[test]
    fn mutating_class_with_conditional_qualifies() {
        let domain = build(
            r#"class Order {
                status: string;
                ship() { if (this.status === "OPEN") { this.status = "SHIPPED"; } }
            }"#,
        );
        assert_eq!(domain.entities.len(), 1);
        let order = &domain.entities[0];
        assert_eq!(order.name, "Order");
        assert_eq!(order.state_fields, vec!["status"]);
        assert!(domain.relations.iter().any(|r| {
            r.relation_type == RelationType::Modifies
                && r.from == "Order.ship"
                && r.to == "Order.status"
        }));
    }

    #[test]
    fn unconditional_mutator_without_signals_is_rejected() {
        // Mutation exists but no enum property, no conditional anywhere.
        let domain = build("class Counter { n: number; bump() { this.n += 1; } }");
        assert!(domain.entities.is_empty());
    }

    #[test]
    fn enum_typed_property_is_a_conditional_signal() {
        let domain = build(
            r#"enum Status { Open, Closed }
               class Ticket { status: Status; close() { this.status = Status.Closed; } }"#,
        );
        assert_eq!(domain.entities.len(), 1);
        assert_eq!(domain.entities[0].state_fields, vec!["status"]);
    }

    #[test]
    fn technical_suffixes_are_excluded() {
        let domain = build(
            r#"class OrderService {
                cache: string;
                refresh() { if (true) { this.cache = "x"; } }
            }"#,
        );
        assert!(domain.entities.is_empty());
        assert_eq!(domain.classes[0].name, "OrderService");
    }

    #[test]
    fn readonly_properties_are_not_state() {
        let domain = build(
            r#"class Invoice {
                readonly id: string;
                total: number;
                applyDiscount(d: number) { if (d > 0) { this.total -= d; } }
            }"#,
        );
        let invoice = &domain.entities[0];
        assert_eq!(invoice.properties, vec!["id", "total"]);
        assert_eq!(invoice.state_fields, vec!["total"]);
    }

    #[test]
    fn calls_and_uses_are_mirrored_and_deduplicated() {
        let domain = build(
            r#"class Order {
                status: string;
                ship() { if (this.status === "OPEN") { this.audit(); this.audit(); this.status = "SHIPPED"; } }
                audit() {}
            }"#,
        );
        let calls: Vec<_> = domain
            .relations
            .iter()
            .filter(|r| r.relation_type == RelationType::Calls)
            .collect();
        let uses: Vec<_> = domain
            .relations
            .iter()
            .filter(|r| r.relation_type == RelationType::Uses)
            .collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(uses.len(), 1);
        assert_eq!(calls[0].from, "Order.ship");
        assert_eq!(calls[0].to, "this.audit");
    }
}
