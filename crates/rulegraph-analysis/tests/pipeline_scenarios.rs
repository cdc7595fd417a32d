//! End-to-end scenarios over real temporary project trees.

use rulegraph_analysis::{analyze, analyze_with_config, simulate_rule_impact};
use rulegraph_core::{RuleGraphError, RuleType, ViolationType};
use rulegraph_parser::ParserConfig;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, source: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, source).unwrap();
}

#[test]
fn read_only_class_yields_no_entity_and_no_anemic_violation() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "src/cart.ts",
        r#"class Cart {
    items: string[];

    describe(): string {
        return this.items.join(", ");
    }
}
"#,
    );

    let report = analyze(tmp.path()).unwrap();
    assert!(report.entities.is_empty());
    assert!(report.rules.is_empty());
    assert!(!report
        .architectural_violations
        .iter()
        .any(|v| v.violation_type == ViolationType::AnemicEntity));
}

#[test]
fn state_transition_is_extracted_with_entity_and_confidence() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "src/order.ts",
        r#"class Order {
    status: string;

    ship(): void {
        if (this.status === "OPEN") {
            this.status = "SHIPPED";
        }
    }
}
"#,
    );

    let report = analyze(tmp.path()).unwrap();
    assert_eq!(report.entities.len(), 1);
    let order = &report.entities[0];
    assert_eq!(order.name, "Order");
    assert_eq!(order.state_fields, vec!["status"]);
    assert_eq!(order.file_path, "src/order.ts");

    let transitions: Vec<_> = report
        .rules
        .iter()
        .filter(|r| r.rule_type == RuleType::StateTransition)
        .collect();
    assert_eq!(transitions.len(), 1);
    let rule = transitions[0];
    assert_eq!(rule.entity.as_deref(), Some("Order"));
    assert_eq!(rule.method.as_deref(), Some("ship"));
    assert!(rule.confidence >= 0.65, "confidence {}", rule.confidence);
}

#[test]
fn guard_then_mutate_yields_invariant_and_transition() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "src/order.ts",
        r#"class Order {
    status: string;

    cancel(): void {
        if (this.status === "SHIPPED") {
            throw new Error("cannot cancel a shipped order");
        }
        this.status = "CANCELLED";
    }
}
"#,
    );

    let report = analyze(tmp.path()).unwrap();
    let invariant = report
        .rules
        .iter()
        .find(|r| r.rule_type == RuleType::Invariant)
        .expect("invariant rule");
    let transition = report
        .rules
        .iter()
        .find(|r| r.rule_type == RuleType::StateTransition)
        .expect("state transition rule");

    assert_eq!(invariant.entity.as_deref(), Some("Order"));
    assert_eq!(invariant.method.as_deref(), Some("cancel"));
    // entity + mutating method + throw bonus + public + neutral layer + strong pattern
    assert_eq!(invariant.confidence, 0.9);
    assert_eq!(transition.condition, "status assignment");
}

#[test]
fn policy_outside_an_entity_is_capped() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "src/pricing.ts",
        r#"class Pricing {
    quote(customer: Customer, base: number): number {
        if (customer.tier === "premium") {
            return base * 0.9;
        } else {
            return base;
        }
    }
}
"#,
    );

    let report = analyze(tmp.path()).unwrap();
    assert!(report.entities.is_empty());

    let policies: Vec<_> = report
        .rules
        .iter()
        .filter(|r| r.rule_type == RuleType::Policy)
        .collect();
    assert_eq!(policies.len(), 1);
    let policy = policies[0];
    assert!(policy.entity.is_none());
    assert!(policy.confidence <= 0.60, "confidence {}", policy.confidence);
}

#[test]
fn entity_less_calculation_gets_the_risk_floor() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "src/tax.ts",
        "function vat(amount: number): number {\n    return amount * 0.21;\n}\n",
    );

    let report = analyze(tmp.path()).unwrap();
    let calc = report
        .rules
        .iter()
        .find(|r| r.rule_type == RuleType::Calculation)
        .expect("calculation rule");

    let impact = simulate_rule_impact(tmp.path(), &calc.id).unwrap();
    assert!(impact.risk_score >= 0.85, "risk {}", impact.risk_score);
    assert_eq!(impact.nodes[0].id, "src/tax.ts#vat");
}

#[test]
fn scattered_policy_rules_are_reported_with_all_files() {
    let tmp = TempDir::new().unwrap();
    let invoice = r#"class Invoice {
    total: number;
    level: string;

    reprice(): void {
        if (this.total > 100) {
            this.level = "gold";
        } else {
            this.level = "basic";
        }
    }
}
"#;
    write(tmp.path(), "src/billing/invoice.ts", invoice);
    write(tmp.path(), "src/reporting/invoice.ts", invoice);
    write(tmp.path(), "src/sync/invoice.ts", invoice);

    let report = analyze(tmp.path()).unwrap();
    let scattered = report
        .architectural_violations
        .iter()
        .find(|v| v.id == "SCATTERED_RULE:Invoice:POLICY")
        .expect("scattered rule violation");
    assert_eq!(scattered.violation_type, ViolationType::ScatteredRule);
    assert_eq!(
        scattered.related,
        vec![
            "src/billing/invoice.ts",
            "src/reporting/invoice.ts",
            "src/sync/invoice.ts"
        ]
    );
}

#[test]
fn custom_exclusions_drop_whole_directories_from_analysis() {
    let tmp = TempDir::new().unwrap();
    let order = r#"class Order {
    status: string;

    ship(): void {
        if (this.status === "OPEN") {
            this.status = "SHIPPED";
        }
    }
}
"#;
    write(tmp.path(), "src/order.ts", order);
    write(tmp.path(), "legacy/order.ts", order);

    let config = ParserConfig {
        excluded_dirs: vec!["legacy".to_string()],
    };
    let report = analyze_with_config(tmp.path(), config).unwrap();
    assert_eq!(report.entities.len(), 1);
    assert_eq!(report.entities[0].file_path, "src/order.ts");
    assert!(report.rules.iter().all(|r| r.file_path == "src/order.ts"));
}

#[test]
fn unknown_rule_id_is_fatal() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "src/empty.ts", "export {};\n");

    let err = simulate_rule_impact(tmp.path(), "POLICY:src/empty.ts:0").unwrap_err();
    assert!(matches!(err, RuleGraphError::UnknownRule(_)));
}

#[test]
fn missing_project_root_is_fatal() {
    let err = analyze("/no/such/project/root").unwrap_err();
    assert!(matches!(err, RuleGraphError::ProjectRoot(_)));
}

#[test]
fn rule_in_controller_is_flagged() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "src/controllers/checkout.ts",
        r#"function applyDiscount(total: number): number {
    if (total > 500) {
        return total - 50;
    } else {
        return total;
    }
}
"#,
    );

    let report = analyze(tmp.path()).unwrap();
    assert!(report
        .architectural_violations
        .iter()
        .any(|v| v.violation_type == ViolationType::RuleInController));
}

#[test]
fn report_seeds_impact_for_the_first_rule() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "src/order.ts",
        r#"class Order {
    status: string;

    ship(): void {
        if (this.status === "OPEN") {
            this.status = "SHIPPED";
        }
    }
}
"#,
    );

    let report = analyze(tmp.path()).unwrap();
    assert!(!report.rules.is_empty());
    let impact = report.impact.expect("seeded impact");
    assert_eq!(impact.rule.id, report.rules[0].id);
    // Root appears exactly once in the impacted set.
    let root_id = &impact.nodes[0].id;
    assert_eq!(impact.nodes.iter().filter(|n| &n.id == root_id).count(), 1);
}
