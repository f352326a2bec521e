// ABOUTME: Shared helpers for language capability bundles.
// ABOUTME: Small wrappers over Tree-sitter node accessors used by every language.
use codegraph_core::Span;
use tree_sitter::Node;

/// Create a Span from a tree-sitter Node (1-based lines and columns).
#[inline]
pub fn span_for(node: &Node) -> Span {
    Span {
        start_line: (node.start_position().row + 1) as u32,
        start_column: (node.start_position().column + 1) as u32,
        end_line: (node.end_position().row + 1) as u32,
        end_column: (node.end_position().column + 1) as u32,
    }
}

/// Extract text from a tree-sitter Node.
#[inline]
pub fn node_text<'a>(node: &Node, content: &'a str) -> &'a str {
    node.utf8_text(content.as_bytes()).unwrap_or("")
}

/// Find first child of a specific kind.
pub fn child_by_kind<'a>(node: &Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

/// Get text of a child by field name.
pub fn child_text_by_field<'a>(node: &Node, field_name: &str, content: &'a str) -> Option<String> {
    node.child_by_field_name(field_name)
        .map(|child| node_text(&child, content).to_string())
}

/// Walk upward from `node` until a definition node kind (as judged by `is_def`) is
/// found, returning it. Used by relationship policies that need to know their
/// enclosing scope (Ruby's `new`/assignment tie-breaks, Go's composite literal
/// check).
pub fn enclosing_definition<'a>(
    node: &Node<'a>,
    is_def: impl Fn(&str) -> bool,
) -> Option<Node<'a>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if is_def(n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}
