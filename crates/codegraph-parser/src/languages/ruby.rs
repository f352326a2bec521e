// ABOUTME: Ruby capability bundle. Relationship policy follows the exact tie-break
// ABOUTME: order the spec calls out: `X.new` from Class scope is INSTANTIATES,
// ABOUTME: any assignment is ASSIGNS unconditionally, otherwise call is CALLS.
use super::extractor_utils::{enclosing_definition, node_text};
use super::{CapabilityBundle, EnclosingScope, RelationshipMatch};
use codegraph_core::{EdgeKind, NodeKind};
use std::sync::Arc;
use tree_sitter::Node;

fn is_definition_node(kind: &str) -> Option<NodeKind> {
    match kind {
        "class" => Some(NodeKind::Class),
        "method" | "singleton_method" => Some(NodeKind::Function),
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

fn inheritance_locator(node: &Node, content: &str) -> Option<RelationshipMatch> {
    let superclass = node.child_by_field_name("superclass")?;
    Some(RelationshipMatch {
        edge_kind: EdgeKind::Inherits,
        target_name: node_text(&superclass, content).to_string(),
        scope_text: node_text(&superclass, content).to_string(),
    })
}

const REFERENCE_SITE_KINDS: &[&str] = &["call", "assignment"];

/// Mirrors `_find_relationship_type` from the hierarchy builder this bundle is
/// grounded on: a bare method `call` whose `method` field is literally `new`,
/// with a Class anywhere among its ancestors (not just the nearest enclosing
/// definition, which is usually the method body it's called from), instantiates;
/// any `assignment` is ASSIGNS regardless of scope; everything else falls back to:
/// call from Function scope is CALLS.
fn relationship_policy(site: &Node, enclosing: EnclosingScope, content: &str) -> Option<RelationshipMatch> {
    match site.kind() {
        "call" => {
            let method = site.child_by_field_name("method")?;
            let method_name = node_text(&method, content);
            let scope = node_text(site, content).to_string();

            // `enclosing` is only the *nearest* definition, which is the method
            // itself once the walk descends past `def`; `new` from inside a method
            // body still instantiates if a Class is an ancestor further up.
            let nested_in_class = enclosing_definition(site, |kind| kind == "class").is_some();
            if method_name == "new" && nested_in_class {
                let target = site
                    .child_by_field_name("receiver")
                    .map(|r| node_text(&r, content).to_string())
                    .unwrap_or_else(|| method_name.to_string());
                return Some(RelationshipMatch {
                    edge_kind: EdgeKind::Instantiates,
                    target_name: target,
                    scope_text: scope,
                });
            }

            if enclosing == EnclosingScope::Function {
                return Some(RelationshipMatch {
                    edge_kind: EdgeKind::Calls,
                    target_name: method_name.to_string(),
                    scope_text: scope,
                });
            }

            None
        }
        "assignment" => {
            let scope = node_text(site, content).to_string();
            let target = site
                .child_by_field_name("left")
                .map(|n| node_text(&n, content).to_string())
                .unwrap_or_else(|| scope.clone());
            Some(RelationshipMatch {
                edge_kind: EdgeKind::Assigns,
                target_name: target,
                scope_text: scope,
            })
        }
        _ => None,
    }
}

pub fn bundle() -> CapabilityBundle {
    CapabilityBundle {
        is_definition_node: Arc::new(is_definition_node),
        identifier_locator: Arc::new(identifier_locator),
        body_locator: Arc::new(body_locator),
        reference_site_kinds: Arc::from(REFERENCE_SITE_KINDS),
        relationship_policy: Arc::new(relationship_policy),
        inheritance_locator: Some(Arc::new(inheritance_locator)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn parse(source: &str) -> tree_sitter::Tree {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_ruby::LANGUAGE.into()).unwrap();
        parser.parse(source, None).unwrap()
    }

    fn find<'a>(node: tree_sitter::Node<'a>, kind: &str, text: &str, content: &str) -> Option<tree_sitter::Node<'a>> {
        if node.kind() == kind && node_text(&node, content) == text {
            return Some(node);
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if let Some(found) = find(child, kind, text, content) {
                return Some(found);
            }
        }
        None
    }

    /// `class Foo < Bar; def m; Baz.new; other_m; end; end` — `Baz.new` is nested
    /// inside method `m`, whose nearest enclosing definition is the method itself,
    /// not the class. The resolver still passes `EnclosingScope::Function` for this
    /// site, so the Class ancestor must be found by walking past it.
    #[test]
    fn new_call_nested_inside_a_method_still_instantiates() {
        let source = "class Foo < Bar\n  def m\n    Baz.new\n    other_m\n  end\nend\n";
        let tree = parse(source);
        let call = find(tree.root_node(), "call", "Baz.new", source).expect("Baz.new call site");

        let result = relationship_policy(&call, EnclosingScope::Function, source).expect("should match");
        assert_eq!(result.edge_kind, EdgeKind::Instantiates);
        assert_eq!(result.target_name, "Baz");
    }

    #[test]
    fn bare_call_nested_inside_a_method_is_a_call() {
        let source = "class Foo < Bar\n  def m\n    Baz.new\n    other_m\n  end\nend\n";
        let tree = parse(source);
        let call = find(tree.root_node(), "call", "other_m", source).expect("other_m call site");

        let result = relationship_policy(&call, EnclosingScope::Function, source).expect("should match");
        assert_eq!(result.edge_kind, EdgeKind::Calls);
        assert_eq!(result.target_name, "other_m");
    }

    #[test]
    fn new_call_outside_any_class_does_not_instantiate() {
        let source = "def m\n  Baz.new\nend\n";
        let tree = parse(source);
        let call = find(tree.root_node(), "call", "Baz.new", source).expect("Baz.new call site");

        let result = relationship_policy(&call, EnclosingScope::Function, source).expect("falls back to a call");
        assert_eq!(result.edge_kind, EdgeKind::Calls);
    }
}
