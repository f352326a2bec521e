// ABOUTME: Updater. DETACH_DELETE_BY_PATH on each touched file, rebuild it,
// ABOUTME: re-resolve references across the touched files plus their direct callers,
// ABOUTME: then invalidate stale documentation/workflow overlays on the rebuilt nodes
// ABOUTME: and re-run the overlay tasks scoped to just those nodes and their callers.
use crate::batch::BottomUpBatchProcessor;
use crate::resolver::ReferenceResolver;
use crate::BatchTask;
use codegraph_core::{BatchProcessorConfig, EdgeKind, GraphEnvironment, GraphStore, NodeKind, Result};
use codegraph_parser::{FileRecord, HierarchyBuilder, LanguageRegistry};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Edges invalidated on a rebuilt node before it re-enters the batch processor:
/// stale documentation describing code that no longer exists in that shape, and
/// stale workflow membership computed against the old call graph.
const OVERLAY_EDGE_KINDS: [EdgeKind; 2] = [EdgeKind::Describes, EdgeKind::BelongsToWorkflow];

#[derive(Debug, Default)]
pub struct UpdateOutcome {
    pub files_rebuilt: usize,
    pub caller_files_reresolved: usize,
    pub nodes_upserted: usize,
    pub edges_upserted: usize,
    pub overlay_edges_invalidated: usize,
    pub nodes_requeued: usize,
}

/// Treats every path it is given as `ADDED` (the Updater's simplification of the
/// Diff Engine's three-way classification): it always deletes-then-rebuilds, so
/// the same call handles a brand new file and a rewritten one identically.
pub struct Updater {
    store: Arc<dyn GraphStore>,
    registry: Arc<LanguageRegistry>,
    resolver: Arc<ReferenceResolver>,
    root_path: PathBuf,
    batch_config: BatchProcessorConfig,
    overlay_tasks: Vec<Arc<dyn BatchTask>>,
}

impl Updater {
    pub fn new(
        store: Arc<dyn GraphStore>,
        registry: Arc<LanguageRegistry>,
        resolver: Arc<ReferenceResolver>,
        root_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            registry,
            resolver,
            root_path: root_path.into(),
            batch_config: BatchProcessorConfig::default(),
            overlay_tasks: Vec::new(),
        }
    }

    /// Enables step 4: after a rebuild, stale `DESCRIBES`/`BELONGS_TO_WORKFLOW`
    /// edges on the rebuilt nodes are dropped and each task here re-runs scoped to
    /// just the rebuilt nodes plus their direct callers. Leave empty to skip it
    /// entirely, matching the spec's "if documentation/workflow overlays are
    /// enabled" condition.
    pub fn with_overlay_tasks(
        mut self,
        batch_config: BatchProcessorConfig,
        tasks: Vec<Arc<dyn BatchTask>>,
    ) -> Self {
        self.batch_config = batch_config;
        self.overlay_tasks = tasks;
        self
    }

    pub async fn apply(&self, env: &GraphEnvironment, updated_paths: &[String]) -> Result<UpdateOutcome> {
        let mut caller_paths: HashSet<String> = HashSet::new();
        for path in updated_paths {
            self.collect_caller_paths(env, path, &mut caller_paths).await?;
        }
        for path in updated_paths {
            caller_paths.remove(path);
        }

        for path in updated_paths {
            self.store.detach_delete_by_path(env, path).await?;
        }

        // Caller files are parsed here purely so the resolver has their source text
        // and definition index entries to re-walk; their own definitions come back
        // out identical (deterministic ids) and are not re-upserted below.
        let mut records = Vec::with_capacity(updated_paths.len() + caller_paths.len());
        for path in updated_paths.iter().chain(caller_paths.iter()) {
            if let Some(language) = self.registry.detect_language(path) {
                records.push(FileRecord { path: self.root_path.join(path), language });
            }
        }

        let builder = HierarchyBuilder::new(self.registry.clone());
        let (graph, _stats) = builder.build(env, records)?;

        let rebuilt: Vec<_> = graph
            .nodes
            .iter()
            .filter(|n| n.file_uri.as_deref().map(|f| updated_paths.iter().any(|p| p == f)).unwrap_or(true))
            .cloned()
            .collect();
        self.store.upsert_nodes(env, rebuilt.clone()).await?;

        let edges = self.resolver.resolve(env, &graph).await;
        let edge_count = edges.len();
        self.store.upsert_edges(env, edges).await?;

        info!(
            "incremental update: {} file(s) rebuilt, {} caller file(s) re-resolved, {} edges",
            updated_paths.len(),
            caller_paths.len(),
            edge_count
        );

        let (overlay_edges_invalidated, nodes_requeued) = self.refresh_overlays(env, &rebuilt).await?;

        Ok(UpdateOutcome {
            files_rebuilt: updated_paths.len(),
            caller_files_reresolved: caller_paths.len(),
            nodes_upserted: rebuilt.len(),
            edges_upserted: edge_count,
            overlay_edges_invalidated,
            nodes_requeued,
        })
    }

    /// Step 4 of the Updater protocol. A no-op when no overlay tasks were
    /// registered via [`with_overlay_tasks`](Self::with_overlay_tasks).
    async fn refresh_overlays(&self, env: &GraphEnvironment, rebuilt: &[codegraph_core::Node]) -> Result<(usize, usize)> {
        if self.overlay_tasks.is_empty() {
            return Ok((0, 0));
        }

        let rebuilt_ids: Vec<_> = rebuilt
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Class | NodeKind::Function))
            .map(|n| n.id.clone())
            .collect();
        if rebuilt_ids.is_empty() {
            return Ok((0, 0));
        }

        let invalidated = self.store.invalidate_edges_to(env, &rebuilt_ids, &OVERLAY_EDGE_KINDS).await?;

        let mut scope: HashSet<_> = rebuilt_ids.iter().cloned().collect();
        for id in &rebuilt_ids {
            for caller in self.store.direct_callers(env, id).await? {
                scope.insert(caller.id);
            }
        }
        let scope: Vec<_> = scope.into_iter().collect();

        let processor = BottomUpBatchProcessor::new(self.store.clone(), self.batch_config.clone());
        for task in &self.overlay_tasks {
            processor.run_scoped(env, task.clone(), &scope).await?;
        }

        Ok((invalidated, scope.len()))
    }

    /// Walks the file's existing Class/Function nodes (before they are deleted) and
    /// records the file of every node with an incoming `CALLS` edge into them.
    async fn collect_caller_paths(&self, env: &GraphEnvironment, path: &str, out: &mut HashSet<String>) -> Result<()> {
        let Some(file_node) = self.store.find_node_by_path(env, path, NodeKind::File).await? else {
            return Ok(());
        };

        let mut stack = vec![file_node.id];
        while let Some(id) = stack.pop() {
            for child in self.store.children(env, &id).await? {
                if matches!(child.kind, NodeKind::Class | NodeKind::Function) {
                    for caller in self.store.direct_callers(env, &child.id).await? {
                        if let Some(caller_path) = caller.file_uri {
                            out.insert(caller_path);
                        }
                    }
                    stack.push(child.id);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::EchoLlmClient;
    use crate::DocumentationTask;
    use codegraph_core::{Edge, GraphStore, Layer, Node};
    use codegraph_graph::InMemoryGraphStore;
    use codegraph_lsp::LspCoordinator;
    use std::collections::HashMap;

    fn updater_with_store(store: Arc<dyn GraphStore>) -> Updater {
        let registry = Arc::new(LanguageRegistry::new());
        let coordinator = Arc::new(LspCoordinator::new("/repo", HashMap::new()));
        let resolver = Arc::new(ReferenceResolver::new(registry.clone(), coordinator, 1));
        Updater::new(store, registry, resolver, "/repo")
            .with_overlay_tasks(BatchProcessorConfig::default(), vec![Arc::new(DocumentationTask::new(Arc::new(EchoLlmClient)))])
    }

    fn doc_id_for(code_id: &str) -> String {
        format!("{code_id}::doc")
    }

    /// x calls a, a calls b, b calls c. b is rewritten: its own Documentation is
    /// replaced, a's (the direct caller) is refreshed too, but x (two hops away)
    /// and c (b's callee, not a caller) keep their previous Documentation text.
    #[tokio::test]
    async fn overlay_refresh_is_scoped_to_rebuilt_node_and_direct_caller() {
        let env = GraphEnvironment::main("entity", "repo", "/repo");
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());

        let x = Node::new(&env, "x.py", NodeKind::Function, "x", Layer::Code).with_file_uri("x.py");
        let a = Node::new(&env, "a.py", NodeKind::Function, "a", Layer::Code).with_file_uri("a.py");
        let b = Node::new(&env, "b.py", NodeKind::Function, "b", Layer::Code).with_file_uri("b.py");
        let c = Node::new(&env, "c.py", NodeKind::Function, "c", Layer::Code).with_file_uri("c.py");
        let (x_id, a_id, b_id, c_id) = (x.id.clone(), a.id.clone(), b.id.clone(), c.id.clone());
        store.upsert_nodes(&env, vec![x, a, b, c]).await.unwrap();

        let calls = vec![
            Edge::cross_reference(EdgeKind::Calls, x_id.clone(), a_id.clone(), "a()", 1, 0),
            Edge::cross_reference(EdgeKind::Calls, a_id.clone(), b_id.clone(), "b()", 1, 0),
            Edge::cross_reference(EdgeKind::Calls, b_id.clone(), c_id.clone(), "c()", 1, 0),
        ];
        store.upsert_edges(&env, calls).await.unwrap();

        // Seed one Documentation node per function, as if a prior full batch run
        // had already described all four.
        let task = DocumentationTask::new(Arc::new(EchoLlmClient));
        for id in [&x_id, &a_id, &b_id, &c_id] {
            let node = store.get_node(&env, id).await.unwrap().unwrap();
            let delta = task.run(&env, &node, &HashMap::new()).await.unwrap();
            store.upsert_nodes(&env, delta.nodes).await.unwrap();
            store.upsert_edges(&env, delta.edges).await.unwrap();
        }

        let original_docs: HashMap<_, _> = [&x_id, &a_id, &b_id, &c_id]
            .into_iter()
            .map(|id| (id.clone(), store.get_node(&env, &doc_id_for(id)).await.unwrap().unwrap().content))
            .collect();

        let updater = updater_with_store(store.clone());
        let rebuilt = vec![store.get_node(&env, &b_id).await.unwrap().unwrap()];
        let (invalidated, requeued) = updater.refresh_overlays(&env, &rebuilt).await.unwrap();

        assert_eq!(invalidated, 1, "only b's own DESCRIBES edge is invalidated");
        assert_eq!(requeued, 2, "b plus its one direct caller, a");

        let new_b_doc = store.get_node(&env, &doc_id_for(&b_id)).await.unwrap().unwrap();
        let new_a_doc = store.get_node(&env, &doc_id_for(&a_id)).await.unwrap().unwrap();
        let untouched_c_doc = store.get_node(&env, &doc_id_for(&c_id)).await.unwrap().unwrap();
        let untouched_x_doc = store.get_node(&env, &doc_id_for(&x_id)).await.unwrap().unwrap();

        assert_ne!(new_b_doc.content, original_docs[&b_id], "b's documentation was replaced");
        assert_ne!(new_a_doc.content, original_docs[&a_id], "a's documentation was refreshed too");
        assert_eq!(untouched_c_doc.content, original_docs[&c_id], "c is b's callee, not its caller");
        assert_eq!(untouched_x_doc.content, original_docs[&x_id], "x is two hops away from b");
    }
}
