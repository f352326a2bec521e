// ABOUTME: Per-language capability bundles: definition detection, identifier/body
// ABOUTME: location, and the relationship policy the reference resolver walks.
pub mod extractor_utils;
pub mod general;
pub mod go;
pub mod javascript;
pub mod python;
pub mod ruby;
pub mod rust;

use codegraph_core::{EdgeKind, NodeKind};
use std::sync::Arc;
use tree_sitter::Node;

/// The kind of definition a reference site is nested inside, as seen by the
/// relationship policy. Module-level sites (not inside any Class or Function) use
/// `Module`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnclosingScope {
    Class,
    Function,
    Module,
}

impl EnclosingScope {
    pub fn from_node_kind(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Class => EnclosingScope::Class,
            NodeKind::Function => EnclosingScope::Function,
            _ => EnclosingScope::Module,
        }
    }
}

/// What a relationship policy function decided about one candidate reference site:
/// which edge kind to emit, the raw target name text to resolve, and the scope text
/// stored on the edge for display.
#[derive(Debug, Clone)]
pub struct RelationshipMatch {
    pub edge_kind: EdgeKind,
    pub target_name: String,
    pub scope_text: String,
}

pub type IsDefinitionNodeFn = Arc<dyn Fn(&str) -> Option<NodeKind> + Send + Sync>;
pub type IdentifierLocatorFn = Arc<dyn for<'a> Fn(&Node<'a>, &str) -> Option<String> + Send + Sync>;
pub type BodyLocatorFn = Arc<dyn for<'a> Fn(&Node<'a>) -> Option<Node<'a>> + Send + Sync>;
pub type RelationshipPolicyFn =
    Arc<dyn for<'a> Fn(&Node<'a>, EnclosingScope, &str) -> Option<RelationshipMatch> + Send + Sync>;
pub type InheritanceLocatorFn = Arc<dyn for<'a> Fn(&Node<'a>, &str) -> Option<RelationshipMatch> + Send + Sync>;

/// Struct-of-functions capability bundle. One instance per language, built once at
/// language registry construction and cheaply cloned (every field is an `Arc`) into
/// the hierarchy builder and reference resolver workers that need it.
#[derive(Clone)]
pub struct CapabilityBundle {
    /// Maps a Tree-sitter node kind string to the graph node kind it defines, or
    /// `None` if the node kind is not a definition at all.
    pub is_definition_node: IsDefinitionNodeFn,
    /// Locates the identifier naming a definition node. Returns `None` when the
    /// definition has no discoverable name, which the hierarchy builder treats as
    /// `IdentifierNotFound` and skips just that definition.
    pub identifier_locator: IdentifierLocatorFn,
    /// Locates the body span of a definition node, used for content extraction and
    /// as the subtree the reference resolver walks for reference sites. Returns
    /// `None` when the language's grammar has no separate body field and the whole
    /// definition node should be treated as its own body.
    pub body_locator: BodyLocatorFn,
    /// Tree-sitter node kinds worth inspecting as a potential reference site
    /// (call expressions, imports, assignments, composite literals, and so on).
    pub reference_site_kinds: Arc<[&'static str]>,
    /// Classifies one reference site given the kind of definition it is nested
    /// inside. Returning `None` means the site produces no edge.
    pub relationship_policy: RelationshipPolicyFn,
    /// Reads an INHERITS relationship directly off a Class definition node's own
    /// superclass/heritage field, bypassing the reference-site walk. `None` for
    /// languages whose grammar does not expose inheritance syntax this directly.
    pub inheritance_locator: Option<InheritanceLocatorFn>,
}
