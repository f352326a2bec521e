// ABOUTME: JavaScript/TypeScript capability bundle. Shares one grammar-agnostic
// ABOUTME: bundle across both languages since their definition and call/import node
// ABOUTME: kinds coincide in tree-sitter-javascript and tree-sitter-typescript.
use super::extractor_utils::node_text;
use super::general::general_relationship_policy;
use super::CapabilityBundle;
use codegraph_core::{Language, NodeKind};
use std::sync::Arc;
use tree_sitter::Node;

fn is_definition_node(kind: &str) -> Option<NodeKind> {
    match kind {
        "class_declaration" => Some(NodeKind::Class),
        "function_declaration" | "method_definition" => Some(NodeKind::Function),
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

const REFERENCE_SITE_KINDS: &[&str] = &["call_expression", "import_statement"];

pub fn bundle(_language: Language) -> CapabilityBundle {
    CapabilityBundle {
        is_definition_node: Arc::new(is_definition_node),
        identifier_locator: Arc::new(identifier_locator),
        body_locator: Arc::new(body_locator),
        reference_site_kinds: Arc::from(REFERENCE_SITE_KINDS),
        relationship_policy: Arc::new(general_relationship_policy),
        inheritance_locator: Some(Arc::new(super::general::superclass_field_locator)),
    }
}
