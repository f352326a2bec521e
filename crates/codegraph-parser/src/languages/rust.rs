// ABOUTME: Rust capability bundle. Uses the general fallback relationship policy;
// ABOUTME: the spec names no bespoke Rust tie-breaks.
use super::extractor_utils::node_text;
use super::general::general_relationship_policy;
use super::CapabilityBundle;
use codegraph_core::NodeKind;
use std::sync::Arc;
use tree_sitter::Node;

fn is_definition_node(kind: &str) -> Option<NodeKind> {
    match kind {
        "struct_item" | "enum_item" | "trait_item" => Some(NodeKind::Class),
        "function_item" => Some(NodeKind::Function),
        _ => None,
    }
}

fn identifier_locator(node: &Node, content: &str) -> Option<String> {
    node.child_by_field_name("name")
        .map(|n| node_text(&n, content).to_string())
}

fn body_locator<'a>(node: &Node<'a>) -> Option<Node<'a>> {
    node.child_by_field_name("body")
}

const REFERENCE_SITE_KINDS: &[&str] = &["call_expression", "use_declaration"];

pub fn bundle() -> CapabilityBundle {
    CapabilityBundle {
        is_definition_node: Arc::new(is_definition_node),
        identifier_locator: Arc::new(identifier_locator),
        body_locator: Arc::new(body_locator),
        reference_site_kinds: Arc::from(REFERENCE_SITE_KINDS),
        relationship_policy: Arc::new(general_relationship_policy),
        inheritance_locator: None,
    }
}
