//! Shared read-only helpers over tree-sitter nodes of the analyzed language.
//!
//! All lookups are structural; nothing here mutates or re-parses. Symbol and
//! type resolution may fail, in which case helpers return `None`.

use tree_sitter::Node;

/// Node kinds that introduce a callable scope.
pub const CALLABLE_KINDS: &[&str] = &[
    "method_definition",
    "function_declaration",
    "function_expression",
    "arrow_function",
    "generator_function",
    "generator_function_declaration",
];

/// Node kinds that declare a class.
pub const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration"];

/// Compound assignment operators that count as mutations.
pub const COMPOUND_ASSIGN_OPS: &[&str] = &["+=", "-=", "*=", "/=", "%="];

/// Arithmetic operators that evidence a calculation.
pub const ARITHMETIC_OPS: &[&str] = &["+", "-", "*", "/", "%"];

pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

pub fn find_child_by_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).find(|c| c.kind() == kind);
    result
}

/// Visit every descendant depth-first. The callback returns whether to
/// descend into the node's children, so callers can prune nested scopes.
pub fn for_each_descendant<'t, F>(node: Node<'t>, f: &mut F)
where
    F: FnMut(Node<'t>) -> bool,
{
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if f(child) {
            for_each_descendant(child, f);
        }
    }
}

/// True if any descendant matches `pred`, without crossing into nested
/// callable scopes.
pub fn subtree_has<'t>(node: Node<'t>, pred: &impl Fn(Node<'t>) -> bool) -> bool {
    let mut found = false;
    for_each_descendant(node, &mut |n| {
        if found || CALLABLE_KINDS.contains(&n.kind()) {
            return false;
        }
        if pred(n) {
            found = true;
            return false;
        }
        true
    });
    found
}

/// Nearest enclosing class declaration.
pub fn enclosing_class(node: Node) -> Option<Node> {
    let mut current = node.parent();
    while let Some(n) = current {
        if CLASS_KINDS.contains(&n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Any enclosing method, however deep. When a plain function nests inside a
/// method the method still owns the node.
pub fn enclosing_method(node: Node) -> Option<Node> {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == "method_definition" {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Nearest enclosing function-like scope of any kind.
pub fn enclosing_function(node: Node) -> Option<Node> {
    let mut current = node.parent();
    while let Some(n) = current {
        if CALLABLE_KINDS.contains(&n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

pub fn class_name(class_node: Node, source: &str) -> Option<String> {
    class_node
        .child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
}

pub fn method_name(method_node: Node, source: &str) -> Option<String> {
    method_node
        .child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
}

/// Name of a function-like node: the declaration name when present, else the
/// variable a function expression or arrow is bound to.
pub fn function_name(func_node: Node, source: &str) -> Option<String> {
    if let Some(name) = func_node.child_by_field_name("name") {
        return Some(node_text(name, source).to_string());
    }
    let parent = func_node.parent()?;
    if parent.kind() == "variable_declarator" {
        return parent
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string());
    }
    None
}

/// Members without an accessibility modifier are public in the analyzed
/// language.
pub fn is_public_member(member: Node, source: &str) -> bool {
    match find_child_by_kind(member, "accessibility_modifier") {
        Some(m) => node_text(m, source) == "public",
        None => true,
    }
}

pub fn is_readonly(member: Node) -> bool {
    find_child_by_kind(member, "readonly").is_some()
}

/// Declared parameter names of a callable, pattern parameters skipped.
pub fn parameter_names(callable: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let Some(params) = callable.child_by_field_name("parameters") else {
        // Single-identifier arrows carry the parameter directly.
        if let Some(single) = callable.child_by_field_name("parameter") {
            if single.kind() == "identifier" {
                names.push(node_text(single, source).to_string());
            }
        }
        return names;
    };
    let mut cursor = params.walk();
    for param in params.children(&mut cursor) {
        if param.kind() == "required_parameter" || param.kind() == "optional_parameter" {
            if let Some(pattern) = param.child_by_field_name("pattern") {
                if pattern.kind() == "identifier" {
                    names.push(node_text(pattern, source).to_string());
                }
            }
        }
    }
    names
}

/// True for `a = b` and the mutation-counting compound forms.
pub fn is_assignment(node: Node, source: &str) -> bool {
    match node.kind() {
        "assignment_expression" => true,
        "augmented_assignment_expression" => binary_operator(node, source)
            .is_some_and(|op| COMPOUND_ASSIGN_OPS.contains(&op)),
        _ => false,
    }
}

pub fn binary_operator<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    node.child_by_field_name("operator")
        .map(|op| node_text(op, source))
}

/// For an assignment whose target is `this.<field>`, the field name.
pub fn this_assignment_field(node: Node, source: &str) -> Option<String> {
    let left = node.child_by_field_name("left")?;
    if left.kind() != "member_expression" {
        return None;
    }
    let object = left.child_by_field_name("object")?;
    if object.kind() != "this" {
        return None;
    }
    let property = left.child_by_field_name("property")?;
    Some(node_text(property, source).to_string())
}

/// Condition expression of an `if`, parentheses stripped.
pub fn if_condition(if_node: Node) -> Option<Node> {
    let cond = if_node.child_by_field_name("condition")?;
    if cond.kind() == "parenthesized_expression" {
        cond.named_child(0)
    } else {
        Some(cond)
    }
}

/// The statement under an `else`, unwrapping the clause node.
pub fn if_alternative(if_node: Node) -> Option<Node> {
    let alt = if_node.child_by_field_name("alternative")?;
    if alt.kind() == "else_clause" {
        alt.named_child(0)
    } else {
        Some(alt)
    }
}

/// True when `node` sits under an `if` without leaving the enclosing
/// callable scope.
pub fn inside_conditional(node: Node) -> bool {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == "if_statement" {
            return true;
        }
        if CALLABLE_KINDS.contains(&n.kind()) {
            return false;
        }
        current = n.parent();
    }
    false
}

/// True if the subtree reads `this.<property>` for any property in `props`.
pub fn reads_own_property(node: Node, source: &str, props: &[String]) -> bool {
    subtree_has(node, &|n| {
        n.kind() == "member_expression"
            && n.child_by_field_name("object")
                .is_some_and(|o| o.kind() == "this")
            && n.child_by_field_name("property")
                .is_some_and(|p| props.iter().any(|f| f == node_text(p, source)))
    })
}

pub fn contains_number_literal(node: Node) -> bool {
    subtree_has(node, &|n| n.kind() == "number")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::make_parser;

    fn parse(source: &str) -> tree_sitter::Tree {
        make_parser().unwrap().parse(source, None).unwrap()
    }

    fn first_of_kind<'t>(root: Node<'t>, kind: &str) -> Node<'t> {
        let mut found = None;
        for_each_descendant(root, &mut |n| {
            if found.is_none() && n.kind() == kind {
                found = Some(n);
                return false;
            }
            found.is_none()
        });
        found.unwrap_or_else(|| panic!("no {} in fixture", kind))
    }

    #[test]
    fn finds_this_assignment_field() {
        let src = "class Order { status: string; ship() { this.status = \"SHIPPED\"; } }";
        let tree = parse(src);
        let assign = first_of_kind(tree.root_node(), "assignment_expression");
        assert_eq!(this_assignment_field(assign, src).as_deref(), Some("status"));
    }

    #[test]
    fn compound_assignments_count_as_mutations() {
        let src = "class Account { balance: number; credit(n: number) { this.balance += n; } }";
        let tree = parse(src);
        let assign = first_of_kind(tree.root_node(), "augmented_assignment_expression");
        assert!(is_assignment(assign, src));
        assert_eq!(this_assignment_field(assign, src).as_deref(), Some("balance"));
    }

    #[test]
    fn logical_compound_assignment_is_not_a_mutation() {
        let src = "class Flags { seen: boolean; mark() { this.seen ||= true; } }";
        let tree = parse(src);
        let assign = first_of_kind(tree.root_node(), "augmented_assignment_expression");
        assert!(!is_assignment(assign, src));
    }

    #[test]
    fn method_wins_over_nested_function() {
        let src = "class Cart { total() { const f = () => { sum(); }; return f(); } }";
        let tree = parse(src);
        let call = first_of_kind(tree.root_node(), "call_expression");
        let method = enclosing_method(call).expect("method ancestor");
        assert_eq!(method_name(method, src).as_deref(), Some("total"));
    }

    #[test]
    fn condition_parens_are_stripped() {
        let src = "function f(x: number) { if (x > 1) { return; } }";
        let tree = parse(src);
        let if_node = first_of_kind(tree.root_node(), "if_statement");
        let cond = if_condition(if_node).unwrap();
        assert_eq!(node_text(cond, src), "x > 1");
    }

    #[test]
    fn detects_conditional_ancestry_within_callable() {
        let src = "class A { x: number; f() { if (this.x > 0) { this.x = 0; } } }";
        let tree = parse(src);
        let assign = first_of_kind(tree.root_node(), "assignment_expression");
        assert!(inside_conditional(assign));
    }

    #[test]
    fn readonly_and_visibility_modifiers() {
        let src = "class A { readonly id: string; private secret: string; name: string; }";
        let tree = parse(src);
        let mut fields = Vec::new();
        for_each_descendant(tree.root_node(), &mut |n| {
            if n.kind() == "public_field_definition" {
                fields.push(n);
            }
            true
        });
        assert_eq!(fields.len(), 3);
        assert!(is_readonly(fields[0]));
        assert!(!is_public_member(fields[1], src));
        assert!(is_public_member(fields[2], src));
    }
}
