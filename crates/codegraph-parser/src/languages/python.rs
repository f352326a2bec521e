// ABOUTME: Python capability bundle. Relationship policy is the general fallback:
// ABOUTME: the spec gives Python no bespoke tie-breaks beyond call/import.
use super::extractor_utils::node_text;
use super::general::general_relationship_policy;
use super::{CapabilityBundle, RelationshipMatch};
use codegraph_core::{EdgeKind, NodeKind};
use std::sync::Arc;
use tree_sitter::Node;

fn is_definition_node(kind: &str) -> Option<NodeKind> {
    match kind {
        "function_definition" => Some(NodeKind::Function),
        "class_definition" => Some(NodeKind::Class),
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

const REFERENCE_SITE_KINDS: &[&str] = &["call", "import_statement", "import_from_statement"];

/// `class Child(Base):` exposes its base classes under the `superclasses` field as
/// an argument list; the first identifier in it is the primary base class.
fn superclasses_locator(node: &Node, content: &str) -> Option<RelationshipMatch> {
    let bases = node.child_by_field_name("superclasses")?;
    let mut cursor = bases.walk();
    let base = bases
        .children(&mut cursor)
        .find(|c| matches!(c.kind(), "identifier" | "attribute"))?;
    Some(RelationshipMatch {
        edge_kind: EdgeKind::Inherits,
        target_name: node_text(&base, content).to_string(),
        scope_text: node_text(&bases, content).to_string(),
    })
}

pub fn bundle() -> CapabilityBundle {
    CapabilityBundle {
        is_definition_node: Arc::new(is_definition_node),
        identifier_locator: Arc::new(identifier_locator),
        body_locator: Arc::new(body_locator),
        reference_site_kinds: Arc::from(REFERENCE_SITE_KINDS),
        relationship_policy: Arc::new(general_relationship_policy),
        inheritance_locator: Some(Arc::new(superclasses_locator)),
    }
}
