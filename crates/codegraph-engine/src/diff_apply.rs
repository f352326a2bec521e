// ABOUTME: Diff application. Runs the Diff Engine's three phases end to end: classify
// ABOUTME: the change set, build the affected files' hierarchy and cross-references
// ABOUTME: inside a PR-tagged GraphEnvironment, then tag the result with DIFF_* markers.
use crate::resolver::ReferenceResolver;
use codegraph_core::{GraphEnvironment, GraphStore, Node, NodeKind, Result};
use codegraph_parser::{
    classify_files, tag_deleted, tag_file_level, tag_with_snapshots, FileDiff, FileRecord,
    HierarchyBuilder, LanguageRegistry, SourceSnapshot,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
pub struct DiffApplyOutcome {
    pub files_reparsed: usize,
    pub files_deleted: usize,
    pub nodes_upserted: usize,
    pub edges_upserted: usize,
    pub diff_markers: usize,
}

/// Drives the Diff Engine's Phase A/B/C pipeline and leaves its result sitting in
/// a PR-overlay `GraphEnvironment`, coexisting with (but never mutating) the main
/// environment's graph.
pub struct DiffApplier {
    store: Arc<dyn GraphStore>,
    registry: Arc<LanguageRegistry>,
    resolver: Arc<ReferenceResolver>,
    root_path: PathBuf,
}

impl DiffApplier {
    pub fn new(
        store: Arc<dyn GraphStore>,
        registry: Arc<LanguageRegistry>,
        resolver: Arc<ReferenceResolver>,
        root_path: impl Into<PathBuf>,
    ) -> Self {
        Self { store, registry, resolver, root_path: root_path.into() }
    }

    /// `main_env` supplies the entity/repo/root the PR overlay is scoped to;
    /// `pr_tag` distinguishes this PR's overlay from MAIN and from any other PR.
    /// `snapshots` enables Phase B's definition-granularity tagging; pass an empty
    /// slice to fall back to file-level tagging against the diff hunks alone.
    pub async fn apply(
        &self,
        main_env: &GraphEnvironment,
        pr_tag: &str,
        diffs: &[FileDiff],
        snapshots: &[SourceSnapshot],
    ) -> Result<DiffApplyOutcome> {
        let pr_env = GraphEnvironment::pr_overlay(
            main_env.entity_id.clone(),
            main_env.repo_id.clone(),
            main_env.root_path.clone(),
            pr_tag,
        );

        let classified = classify_files(diffs);
        let mut diff_markers = Vec::new();

        // Phase C (run ahead of Phase B's tagging so the new definitions it tags exist).
        let records: Vec<FileRecord> = classified
            .to_reparse
            .iter()
            .filter_map(|diff| {
                self.registry
                    .detect_language(&diff.file_uri)
                    .map(|language| FileRecord { path: self.root_path.join(&diff.file_uri), language })
            })
            .collect();

        let builder = HierarchyBuilder::new(self.registry.clone());
        let (graph, _stats) = builder.build(&pr_env, records)?;
        self.store.upsert_nodes(&pr_env, graph.nodes.clone()).await?;
        self.store.upsert_edges(&pr_env, graph.edges.clone()).await?;
        let cross_reference_edges = self.resolver.resolve(&pr_env, &graph).await;
        let cross_reference_count = cross_reference_edges.len();
        self.store.upsert_edges(&pr_env, cross_reference_edges).await?;

        // Phase B: tag the freshly-built overlay nodes with DIFF_ADDED/DIFF_MODIFIED.
        for file_diff in classified.to_reparse.iter().copied() {
            let Some(file_node) = graph
                .nodes
                .iter()
                .find(|n| n.kind == NodeKind::File && n.file_uri.as_deref() == Some(file_diff.file_uri.as_str()))
            else {
                continue;
            };
            let definitions: Vec<Node> = graph
                .nodes
                .iter()
                .filter(|n| {
                    matches!(n.kind, NodeKind::Class | NodeKind::Function)
                        && n.file_uri.as_deref() == Some(file_diff.file_uri.as_str())
                })
                .cloned()
                .collect();

            let matching_snapshots: Vec<SourceSnapshot> = snapshots
                .iter()
                .filter(|s| s.node_path.starts_with(&format!("{}::", file_diff.file_uri)))
                .cloned()
                .collect();

            let edges = if matching_snapshots.is_empty() {
                let hunks = codegraph_parser::parse_hunks(&file_diff.unified_diff)?;
                tag_file_level(&pr_env, file_diff, &hunks, file_node, &definitions)
            } else {
                tag_with_snapshots(&matching_snapshots, &definitions)
            };
            diff_markers.extend(edges);
        }

        // Phase A/B's DELETED side: tag every node that still exists for the
        // deleted path in the main environment, without touching that environment.
        for file_diff in &classified.deleted {
            let mut existing_ids = Vec::new();
            if let Some(file_node) = self
                .store
                .find_node_by_path(main_env, &file_diff.file_uri, NodeKind::File)
                .await?
            {
                existing_ids.push(file_node.id.clone());
                let mut stack = vec![file_node.id];
                while let Some(id) = stack.pop() {
                    for child in self.store.children(main_env, &id).await? {
                        existing_ids.push(child.id.clone());
                        stack.push(child.id);
                    }
                }
            }
            diff_markers.extend(tag_deleted(&existing_ids));
        }

        let marker_count = diff_markers.len();
        self.store.upsert_edges(&pr_env, diff_markers).await?;

        info!(
            "diff applied to PR overlay {}: {} file(s) reparsed, {} deleted, {} diff marker(s)",
            pr_tag,
            classified.to_reparse.len(),
            classified.deleted.len(),
            marker_count
        );

        Ok(DiffApplyOutcome {
            files_reparsed: classified.to_reparse.len(),
            files_deleted: classified.deleted.len(),
            nodes_upserted: graph.nodes.len(),
            edges_upserted: graph.edges.len() + cross_reference_count,
            diff_markers: marker_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_parser::ChangeType;
    use codegraph_graph::InMemoryGraphStore;
    use codegraph_lsp::LspCoordinator;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    fn applier(store: Arc<dyn GraphStore>, root: &std::path::Path) -> DiffApplier {
        let registry = Arc::new(LanguageRegistry::new());
        let coordinator = Arc::new(LspCoordinator::new(root, HashMap::new()));
        let resolver = Arc::new(ReferenceResolver::new(registry.clone(), coordinator, 1));
        DiffApplier::new(store, registry, resolver, root)
    }

    #[tokio::test]
    async fn added_file_lands_in_the_pr_overlay_not_main() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("new_file.py"), "def greet():\n    return 1\n").unwrap();

        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let main_env = GraphEnvironment::main("entity", "repo", dir.path().to_string_lossy().to_string());
        let applier = applier(store.clone(), dir.path());

        let diff = FileDiff {
            file_uri: "new_file.py".to_string(),
            change_type: ChangeType::Added,
            unified_diff: String::new(),
        };
        let outcome = applier.apply(&main_env, "PR-1", &[diff], &[]).await.unwrap();

        assert_eq!(outcome.files_reparsed, 1);
        assert_eq!(outcome.diff_markers, 1, "new file gets one DIFF_ADDED marker on its File node");

        assert!(store
            .find_node_by_path(&main_env, "new_file.py", NodeKind::File)
            .await
            .unwrap()
            .is_none());

        let pr_env = GraphEnvironment::pr_overlay("entity", "repo", dir.path().to_string_lossy().to_string(), "PR-1");
        assert!(store.find_node_by_path(&pr_env, "new_file.py", NodeKind::File).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn modified_file_is_tagged_only_where_hunks_land() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("a.py"),
            "def untouched():\n    return 1\n\n\ndef changed():\n    return 2\n",
        )
        .unwrap();

        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let main_env = GraphEnvironment::main("entity", "repo", dir.path().to_string_lossy().to_string());
        let applier = applier(store.clone(), dir.path());

        // Hunk only covers the `changed` function's new line range (lines 5-6).
        let diff = FileDiff {
            file_uri: "a.py".to_string(),
            change_type: ChangeType::Modified,
            unified_diff: "@@ -5,2 +5,2 @@\n-def changed():\n-    return 1\n+def changed():\n+    return 2\n".to_string(),
        };
        let outcome = applier.apply(&main_env, "PR-2", &[diff], &[]).await.unwrap();

        assert_eq!(outcome.diff_markers, 1, "only the function whose span intersects the hunk is tagged");
    }

    #[tokio::test]
    async fn deleted_file_tags_existing_main_nodes_without_removing_them() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("gone.py"), "def f():\n    return 1\n").unwrap();

        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let main_env = GraphEnvironment::main("entity", "repo", dir.path().to_string_lossy().to_string());

        let registry = Arc::new(LanguageRegistry::new());
        let builder = HierarchyBuilder::new(registry.clone());
        let (graph, _) = builder
            .build(&main_env, vec![FileRecord { path: dir.path().join("gone.py"), language: codegraph_core::Language::Python }])
            .unwrap();
        store.upsert_nodes(&main_env, graph.nodes).await.unwrap();

        let applier = applier(store.clone(), dir.path());
        let diff = FileDiff { file_uri: "gone.py".to_string(), change_type: ChangeType::Deleted, unified_diff: String::new() };
        let outcome = applier.apply(&main_env, "PR-3", &[diff], &[]).await.unwrap();

        assert_eq!(outcome.files_deleted, 1);
        assert!(outcome.diff_markers >= 1);
        assert!(store.find_node_by_path(&main_env, "gone.py", NodeKind::File).await.unwrap().is_some());
    }
}
