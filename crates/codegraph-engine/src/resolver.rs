// ABOUTME: Reference Resolver. Re-walks each parsed file's tree alongside its language's
// ABOUTME: capability bundle, collects candidate reference sites, then resolves each one
// ABOUTME: through the LSP coordinator and turns the result into cross-reference edges.
use codegraph_core::{compute_node_id, Edge, GraphEnvironment, Language, NodeKind};
use codegraph_lsp::LspCoordinator;
use codegraph_parser::languages::{CapabilityBundle, EnclosingScope};
use codegraph_parser::{IngestGraph, LanguageRegistry, SourceFile};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tree_sitter::Node as TsNode;

/// One reference occurrence found by the tree walk, awaiting LSP resolution.
struct Candidate {
    source_id: String,
    path: String,
    language: Language,
    content: Arc<str>,
    edge_kind: codegraph_core::EdgeKind,
    scope_text: String,
    line: u32,
    column: u32,
}

pub struct ReferenceResolver {
    registry: Arc<LanguageRegistry>,
    coordinator: Arc<LspCoordinator>,
    concurrency: usize,
}

impl ReferenceResolver {
    pub fn new(registry: Arc<LanguageRegistry>, coordinator: Arc<LspCoordinator>, concurrency: usize) -> Self {
        Self { registry, coordinator, concurrency: concurrency.max(1) }
    }

    /// Resolves cross-reference edges for every file in `graph`. Files the registry
    /// has no grammar for contribute no candidates and are silently skipped, matching
    /// the Hierarchy Builder's "no language config" fallback.
    pub async fn resolve(&self, env: &GraphEnvironment, graph: &IngestGraph) -> Vec<Edge> {
        let mut candidates = Vec::new();
        for source in &graph.sources {
            let Some(config) = self.registry.get_config(&source.language) else { continue };
            let Some(mut parser) = self.registry.create_parser(&source.language) else { continue };
            let Some(tree) = parser.parse(source.content.as_ref(), None) else { continue };
            collect_candidates(env, source, &config.bundle, tree.root_node(), &mut candidates);
        }

        let root_path = env.root_path.clone();
        let coordinator = self.coordinator.clone();
        let resolved: Vec<(Candidate, Vec<codegraph_core::Location>)> = stream::iter(candidates)
            .map(|candidate| {
                let coordinator = coordinator.clone();
                let root_path = root_path.clone();
                async move {
                    let file_uri = to_file_uri(&root_path, &candidate.path);
                    let locations = coordinator
                        .definition(candidate.language, &file_uri, &candidate.content, candidate.line, candidate.column)
                        .await;
                    (candidate, locations)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut edges = Vec::new();
        for (candidate, locations) in resolved {
            // Multiple definitions (e.g. interface dispatch) each become their own
            // edge rather than picking one arbitrarily; duplicate (source, kind,
            // target) triples collapse naturally since the edge id hashes them.
            for location in locations {
                let Some(rel_path) = relative_path(&root_path, &location.file_uri) else { continue };
                let Some(target_id) = graph.index.resolve(&rel_path, location.line) else { continue };
                edges.push(Edge::cross_reference(
                    candidate.edge_kind,
                    candidate.source_id.clone(),
                    target_id.to_string(),
                    candidate.scope_text.clone(),
                    candidate.line,
                    candidate.column,
                ));
            }
        }
        edges
    }
}

fn collect_candidates(
    env: &GraphEnvironment,
    source: &SourceFile,
    bundle: &CapabilityBundle,
    root: TsNode,
    out: &mut Vec<Candidate>,
) {
    let file_name = source
        .path
        .rsplit('/')
        .next()
        .unwrap_or(&source.path)
        .to_string();
    let file_id = compute_node_id(env, &source.path, NodeKind::File, &file_name);
    walk(env, source, bundle, root, (file_id, NodeKind::File), out);
}

fn walk(
    env: &GraphEnvironment,
    source: &SourceFile,
    bundle: &CapabilityBundle,
    ts_node: TsNode,
    enclosing: (String, NodeKind),
    out: &mut Vec<Candidate>,
) {
    let mut next_enclosing = enclosing.clone();

    if let Some(kind) = (bundle.is_definition_node)(ts_node.kind()) {
        if let Some(name) = (bundle.identifier_locator)(&ts_node, &source.content) {
            let id = compute_node_id(env, &source.path, kind, &name);
            next_enclosing = (id.clone(), kind);

            if kind == NodeKind::Class {
                if let Some(locator) = &bundle.inheritance_locator {
                    if let Some(rel) = locator(&ts_node, &source.content) {
                        push_candidate(source, &id, ts_node, rel, out);
                    }
                }
            }
        }
    }

    if bundle.reference_site_kinds.iter().any(|kind| *kind == ts_node.kind()) {
        let scope = EnclosingScope::from_node_kind(next_enclosing.1);
        if let Some(rel) = (bundle.relationship_policy)(&ts_node, scope, &source.content) {
            push_candidate(source, &next_enclosing.0, ts_node, rel, out);
        }
    }

    let mut cursor = ts_node.walk();
    for child in ts_node.children(&mut cursor) {
        walk(env, source, bundle, child, next_enclosing.clone(), out);
    }
}

fn push_candidate(
    source: &SourceFile,
    source_id: &str,
    ts_node: TsNode,
    rel: codegraph_parser::languages::RelationshipMatch,
    out: &mut Vec<Candidate>,
) {
    let pos = ts_node.start_position();
    out.push(Candidate {
        source_id: source_id.to_string(),
        path: source.path.clone(),
        language: source.language,
        content: source.content.clone(),
        edge_kind: rel.edge_kind,
        scope_text: rel.scope_text,
        line: pos.row as u32 + 1,
        column: pos.column as u32 + 1,
    });
}

fn to_file_uri(root_path: &str, relative_path: &str) -> String {
    let joined = format!("{}/{}", root_path.trim_end_matches('/'), relative_path);
    match url::Url::from_file_path(&joined) {
        Ok(url) => url.to_string(),
        Err(_) => format!("file://{joined}"),
    }
}

fn relative_path(root_path: &str, file_uri_or_path: &str) -> Option<String> {
    let path = file_uri_or_path.strip_prefix("file://").unwrap_or(file_uri_or_path);
    let root = root_path.trim_end_matches('/');
    path.strip_prefix(root)
        .map(|p| p.trim_start_matches('/').to_string())
        .or_else(|| Some(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_strips_root_prefix() {
        assert_eq!(relative_path("/repo", "/repo/src/a.py"), Some("src/a.py".to_string()));
        assert_eq!(relative_path("/repo", "file:///repo/src/a.py"), Some("src/a.py".to_string()));
    }

    #[test]
    fn to_file_uri_builds_absolute_uri() {
        let uri = to_file_uri("/repo", "src/a.py");
        assert!(uri.starts_with("file://"));
        assert!(uri.ends_with("/repo/src/a.py"));
    }
}
