// ABOUTME: Entry points that thread the parser, graph store and LSP coordinator
// ABOUTME: together: a full build, an incremental update, and a batch processor run.
pub mod batch;
pub mod diff_apply;
pub mod llm;
pub mod resolver;
pub mod retry;
pub mod updater;

pub use batch::{BatchRunStats, BatchTask, BottomUpBatchProcessor, DocumentationTask, TaskDelta, WorkflowDiscoveryTask};
pub use diff_apply::{DiffApplier, DiffApplyOutcome};
pub use llm::EchoLlmClient;
pub use resolver::ReferenceResolver;
pub use retry::with_retry;
pub use updater::{UpdateOutcome, Updater};

use codegraph_core::{GraphEnvironment, GraphStore, IngestConfig, Result};
use codegraph_lsp::LspCoordinator;
use codegraph_parser::{FileDiff, FileIterator, FileRecord, HierarchyBuilder, LanguageRegistry, SourceSnapshot};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub stats: codegraph_parser::BuildStats,
    pub cross_reference_edges: usize,
}

/// Threads the Language Registry, Hierarchy Builder, LSP Coordinator, Reference
/// Resolver and a `GraphStore` together behind the three public operations: a full
/// build, an incremental update, and a batch processor run.
pub struct Engine {
    store: Arc<dyn GraphStore>,
    registry: Arc<LanguageRegistry>,
    coordinator: Arc<LspCoordinator>,
    resolver: Arc<ReferenceResolver>,
    config: IngestConfig,
    overlay_tasks: Vec<Arc<dyn BatchTask>>,
}

impl Engine {
    pub fn new(store: Arc<dyn GraphStore>, config: IngestConfig) -> Self {
        let registry = Arc::new(LanguageRegistry::new());
        let coordinator = Arc::new(LspCoordinator::new(config.root_path.clone(), config.lsp_servers.clone()));
        let resolver = Arc::new(ReferenceResolver::new(
            registry.clone(),
            coordinator.clone(),
            config.batch_processor.workers.max(1),
        ));
        Self { store, registry, coordinator, resolver, config, overlay_tasks: Vec::new() }
    }

    /// Registers the documentation/workflow tasks that `incremental_update` should
    /// re-run, scoped to just the rebuilt nodes and their direct callers, after
    /// every incremental update. Leave unset to skip that step entirely.
    pub fn with_overlay_tasks(mut self, tasks: Vec<Arc<dyn BatchTask>>) -> Self {
        self.overlay_tasks = tasks;
        self
    }

    pub fn environment(&self) -> GraphEnvironment {
        GraphEnvironment::main(
            self.config.entity_id.clone(),
            self.config.repo_id.clone(),
            self.config.root_path.to_string_lossy().to_string(),
        )
    }

    /// Walks the whole tree, builds the Folder/File/Class/Function hierarchy, then
    /// resolves cross-references against it. The two upserts happen in this order
    /// because a cross-reference edge's target must already exist in the store.
    pub async fn build(&self, env: &GraphEnvironment) -> Result<BuildOutcome> {
        let root = Path::new(&env.root_path);
        let iter = FileIterator::new(root, &self.registry, self.config.ignore_file_name())?;
        let files: Vec<FileRecord> = iter.collect();

        let builder = HierarchyBuilder::new(self.registry.clone());
        let (graph, stats) = builder.build(env, files)?;

        with_retry(&self.config.store_retry, || self.store.upsert_nodes(env, graph.nodes.clone())).await?;
        with_retry(&self.config.store_retry, || self.store.upsert_edges(env, graph.edges.clone())).await?;

        let cross_reference_edges = self.resolver.resolve(env, &graph).await;
        let cross_reference_count = cross_reference_edges.len();
        with_retry(&self.config.store_retry, || self.store.upsert_edges(env, cross_reference_edges.clone())).await?;

        Ok(BuildOutcome { stats, cross_reference_edges: cross_reference_count })
    }

    pub async fn incremental_update(&self, env: &GraphEnvironment, updated_paths: &[String]) -> Result<UpdateOutcome> {
        let updater = Updater::new(
            self.store.clone(),
            self.registry.clone(),
            self.resolver.clone(),
            Path::new(&env.root_path).to_path_buf(),
        )
        .with_overlay_tasks(self.config.batch_processor.clone(), self.overlay_tasks.clone());
        updater.apply(env, updated_paths).await
    }

    pub async fn run_batch_processor(&self, env: &GraphEnvironment, task: Arc<dyn BatchTask>) -> Result<BatchRunStats> {
        let processor = BottomUpBatchProcessor::new(self.store.clone(), self.config.batch_processor.clone());
        processor.run(env, task).await
    }

    /// Runs the Diff Engine's three phases against `main_env` and leaves the
    /// result in the `pr_tag` overlay, never touching the main environment itself.
    pub async fn apply_diff(
        &self,
        main_env: &GraphEnvironment,
        pr_tag: &str,
        diffs: &[FileDiff],
        snapshots: &[SourceSnapshot],
    ) -> Result<DiffApplyOutcome> {
        let applier = DiffApplier::new(
            self.store.clone(),
            self.registry.clone(),
            self.resolver.clone(),
            Path::new(&main_env.root_path).to_path_buf(),
        );
        applier.apply(main_env, pr_tag, diffs, snapshots).await
    }

    pub async fn shutdown(&self) {
        self.coordinator.shutdown_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::NodeKind;
    use codegraph_graph::InMemoryGraphStore;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn config(root: &std::path::Path) -> IngestConfig {
        IngestConfig {
            entity_id: "entity".to_string(),
            repo_id: "repo".to_string(),
            root_path: root.to_path_buf(),
            logging: Default::default(),
            batch_processor: Default::default(),
            store_retry: Default::default(),
            lsp_servers: Default::default(),
            ignore_file_name: None,
        }
    }

    #[tokio::test]
    async fn build_ingests_files_without_a_configured_lsp_server() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def greet():\n    return 1\n").unwrap();

        let store = Arc::new(InMemoryGraphStore::new());
        let engine = Engine::new(store.clone(), config(dir.path()));
        let env = engine.environment();

        let outcome = engine.build(&env).await.unwrap();
        assert_eq!(outcome.stats.parsed_files, 1);
        assert_eq!(outcome.cross_reference_edges, 0);

        let found = store.find_node_by_path(&env, "a.py", NodeKind::File).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn incremental_update_replaces_a_rewritten_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def greet():\n    return 1\n").unwrap();

        let store = Arc::new(InMemoryGraphStore::new());
        let engine = Engine::new(store.clone(), config(dir.path()));
        let env = engine.environment();
        engine.build(&env).await.unwrap();

        fs::write(dir.path().join("a.py"), "def greet():\n    return 2\n\ndef farewell():\n    return 0\n").unwrap();
        let outcome = engine.incremental_update(&env, &["a.py".to_string()]).await.unwrap();
        assert_eq!(outcome.files_rebuilt, 1);

        let functions = store.find_nodes_by_name("entity", Some("repo"), "farewell").await.unwrap();
        assert_eq!(functions.len(), 1);
    }
}
