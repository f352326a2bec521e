// ABOUTME: General fallback capability bundle used by languages the spec does not
// ABOUTME: give a bespoke relationship policy: a call site from Function scope is
// ABOUTME: CALLS, any import-shaped site is IMPORTS.
use super::{CapabilityBundle, EnclosingScope, RelationshipMatch};
use crate::languages::extractor_utils::node_text;
use codegraph_core::{EdgeKind, NodeKind};
use std::sync::Arc;
use tree_sitter::Node;

/// Reads an `extends`/`superclass` field off a class definition node, when the
/// grammar exposes one under that field name. Used as-is by languages whose
/// heritage clause tree-sitter names that way (Java, C#, PHP); others pass `None`
/// for `inheritance_locator` and simply never emit INHERITS.
pub fn superclass_field_locator(node: &Node, content: &str) -> Option<RelationshipMatch> {
    let field = node
        .child_by_field_name("superclass")
        .or_else(|| node.child_by_field_name("interfaces"))?;
    Some(RelationshipMatch {
        edge_kind: EdgeKind::Inherits,
        target_name: node_text(&field, content).to_string(),
        scope_text: scope_text(&field, content),
    })
}

pub fn call_target(node: &Node, content: &str) -> Option<String> {
    if let Some(func) = node.child_by_field_name("function") {
        return Some(node_text(&func, content).to_string());
    }
    node.child_by_field_name("method")
        .map(|m| node_text(&m, content).to_string())
}

pub fn import_target(node: &Node, content: &str) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(node_text(&name, content).to_string());
    }
    if let Some(path) = node.child_by_field_name("path") {
        return Some(node_text(&path, content).trim_matches('"').to_string());
    }
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .find(|c| {
            matches!(
                c.kind(),
                "dotted_name" | "string" | "identifier" | "scoped_identifier" | "import_spec"
            )
        })
        .map(|c| node_text(&c, content).to_string())
}

fn scope_text(node: &Node, content: &str) -> String {
    node_text(node, content).trim().chars().take(120).collect()
}

pub fn general_relationship_policy(
    site: &Node,
    enclosing: EnclosingScope,
    content: &str,
) -> Option<RelationshipMatch> {
    let kind = site.kind();

    if kind.starts_with("import") {
        let target = import_target(site, content)?;
        return Some(RelationshipMatch {
            edge_kind: EdgeKind::Imports,
            target_name: target,
            scope_text: scope_text(site, content),
        });
    }

    if matches!(kind, "call" | "call_expression") && enclosing == EnclosingScope::Function {
        let target = call_target(site, content)?;
        return Some(RelationshipMatch {
            edge_kind: EdgeKind::Calls,
            target_name: target,
            scope_text: scope_text(site, content),
        });
    }

    None
}

pub const GENERAL_REFERENCE_SITE_KINDS: &[&str] = &[
    "call",
    "call_expression",
    "import_statement",
    "import_declaration",
    "import_spec",
    "use_declaration",
];

/// Builds a bundle for a language the spec does not single out: `class_kinds` and
/// `function_kinds` are the grammar's node kinds for type and callable definitions,
/// and `identifier_field` is the field holding the definition's name (almost always
/// `"name"` across the Tree-sitter grammars in this registry).
pub fn bundle(
    class_kinds: &'static [&'static str],
    function_kinds: &'static [&'static str],
    identifier_field: &'static str,
) -> CapabilityBundle {
    let is_definition_node: super::IsDefinitionNodeFn = Arc::new(move |kind: &str| {
        if class_kinds.contains(&kind) {
            Some(NodeKind::Class)
        } else if function_kinds.contains(&kind) {
            Some(NodeKind::Function)
        } else {
            None
        }
    });

    let identifier_locator: super::IdentifierLocatorFn = Arc::new(move |node, content| {
        node.child_by_field_name(identifier_field)
            .map(|n| node_text(&n, content).to_string())
    });

    let body_locator: super::BodyLocatorFn =
        Arc::new(|node| node.child_by_field_name("body"));

    CapabilityBundle {
        is_definition_node,
        identifier_locator,
        body_locator,
        reference_site_kinds: Arc::from(GENERAL_REFERENCE_SITE_KINDS),
        relationship_policy: Arc::new(general_relationship_policy),
        inheritance_locator: Some(Arc::new(superclass_field_locator)),
    }
}
