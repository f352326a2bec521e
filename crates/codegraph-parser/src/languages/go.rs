// ABOUTME: Go capability bundle. Relationship policy adds two bespoke tie-breaks on
// ABOUTME: top of the general fallback: composite_literal from Class scope is
// ABOUTME: INSTANTIATES, and field_declaration is TYPES.
use super::extractor_utils::node_text;
use super::general::{general_relationship_policy, import_target};
use super::{CapabilityBundle, EnclosingScope, RelationshipMatch};
use codegraph_core::{EdgeKind, NodeKind};
use std::sync::Arc;
use tree_sitter::Node;

fn is_definition_node(kind: &str) -> Option<NodeKind> {
    match kind {
        "type_declaration" | "type_spec" => Some(NodeKind::Class),
        "function_declaration" | "method_declaration" => Some(NodeKind::Function),
        _ => None,
    }
}

fn identifier_locator(node: &Node, content: &str) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(node_text(&name, content).to_string());
    }
    // type_declaration wraps a type_spec that actually carries the name field.
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .find(|c| c.kind() == "type_spec")
        .and_then(|spec| spec.child_by_field_name("name"))
        .map(|n| node_text(&n, content).to_string())
}

fn body_locator<'a>(node: &Node<'a>) -> Option<Node<'a>> {
    node.child_by_field_name("body")
}

const REFERENCE_SITE_KINDS: &[&str] = &[
    "call_expression",
    "import_declaration",
    "import_spec",
    "composite_literal",
    "field_declaration",
];

/// Mirrors the hierarchy builder this bundle is grounded on: a `composite_literal`
/// nested in a Class body instantiates the named type; a `field_declaration`
/// expresses a TYPES relationship to its declared type; otherwise falls back to
/// imports/calls via the general policy.
fn go_relationship_policy(site: &Node, enclosing: EnclosingScope, content: &str) -> Option<RelationshipMatch> {
    match site.kind() {
        "composite_literal" if enclosing == EnclosingScope::Class => {
            let target = site
                .child_by_field_name("type")
                .map(|t| node_text(&t, content).to_string())?;
            Some(RelationshipMatch {
                edge_kind: EdgeKind::Instantiates,
                target_name: target,
                scope_text: node_text(site, content).to_string(),
            })
        }
        "field_declaration" => {
            let target = site
                .child_by_field_name("type")
                .map(|t| node_text(&t, content).to_string())?;
            Some(RelationshipMatch {
                edge_kind: EdgeKind::Types,
                target_name: target,
                scope_text: node_text(site, content).to_string(),
            })
        }
        "import_declaration" | "import_spec" => {
            let target = import_target(site, content)?;
            Some(RelationshipMatch {
                edge_kind: EdgeKind::Imports,
                target_name: target,
                scope_text: node_text(site, content).trim().chars().take(120).collect(),
            })
        }
        _ => general_relationship_policy(site, enclosing, content),
    }
}

pub fn bundle() -> CapabilityBundle {
    CapabilityBundle {
        is_definition_node: Arc::new(is_definition_node),
        identifier_locator: Arc::new(identifier_locator),
        body_locator: Arc::new(body_locator),
        reference_site_kinds: Arc::from(REFERENCE_SITE_KINDS),
        relationship_policy: Arc::new(go_relationship_policy),
        inheritance_locator: None,
    }
}
