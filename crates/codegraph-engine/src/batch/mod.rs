// ABOUTME: Bottom-up batch processor main loop. Marks nodes pending, fetches
// ABOUTME: processable batches, runs the injected per-node task with bounded
// ABOUTME: concurrency, and escalates to cycle detection when the fetch stalls.
pub mod documentation;
pub mod workflow;

pub use documentation::DocumentationTask;
pub use workflow::WorkflowDiscoveryTask;

use async_trait::async_trait;
use codegraph_core::{
    BatchProcessorConfig, Edge, EdgeKind, GraphEnvironment, GraphStore, Node, NodeId,
    ProcessingStatus, Result,
};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const DEPENDENCY_EDGE_KINDS: [EdgeKind; 4] =
    [EdgeKind::Contains, EdgeKind::FunctionDefinition, EdgeKind::ClassDefinition, EdgeKind::Calls];

#[derive(Debug, Default)]
pub struct TaskDelta {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub description: Option<String>,
}

/// One pluggable per-node computation. `dependency_descriptions` carries the
/// already-computed description for every outgoing dependency target that has
/// completed so far in this run; a target outside that map is either not yet
/// completed (impossible for a processable node) or never produced a description.
#[async_trait]
pub trait BatchTask: Send + Sync {
    async fn run(
        &self,
        env: &GraphEnvironment,
        node: &Node,
        dependency_descriptions: &HashMap<NodeId, String>,
    ) -> Result<TaskDelta>;
}

#[derive(Debug, Default, Clone)]
pub struct BatchRunStats {
    pub completed: usize,
    pub errored: usize,
    pub cycle_rounds: usize,
}

pub struct BottomUpBatchProcessor {
    store: Arc<dyn GraphStore>,
    config: BatchProcessorConfig,
}

impl BottomUpBatchProcessor {
    pub fn new(store: Arc<dyn GraphStore>, config: BatchProcessorConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(&self, env: &GraphEnvironment, task: Arc<dyn BatchTask>) -> Result<BatchRunStats> {
        self.store.initialize_processing(env).await?;
        self.run_inner(env, task).await
    }

    /// Same loop, but only `node_ids` (and whatever their dependency chain pulls
    /// in as already-completed) start `Pending` — the rest of the environment's
    /// nodes are left exactly as they are. Used after an incremental update so a
    /// documentation refresh touches only the rebuilt function and its callers.
    pub async fn run_scoped(
        &self,
        env: &GraphEnvironment,
        task: Arc<dyn BatchTask>,
        node_ids: &[NodeId],
    ) -> Result<BatchRunStats> {
        self.store.initialize_processing_for(env, node_ids).await?;
        self.run_inner(env, task).await
    }

    async fn run_inner(&self, env: &GraphEnvironment, task: Arc<dyn BatchTask>) -> Result<BatchRunStats> {
        let descriptions: Arc<DashMap<NodeId, String>> = Arc::new(DashMap::new());
        let mut stats = BatchRunStats::default();

        loop {
            let batch = self.store.get_processable_nodes(env, self.config.fetch_batch_size).await?;
            if batch.is_empty() {
                let cycles = self.store.detect_function_cycles(env).await?;
                if cycles.is_empty() {
                    break;
                }
                stats.cycle_rounds += 1;
                for cycle in &cycles {
                    warn!("cycle of {} node(s) marked cycle_member to unblock processing", cycle.len());
                    self.store.mark_cycle_members(env, cycle).await?;
                }
                continue;
            }

            let outcomes = stream::iter(batch)
                .map(|node| {
                    let store = self.store.clone();
                    let task = task.clone();
                    let descriptions = descriptions.clone();
                    let env = env.clone();
                    async move { process_one(store, env, task, node, descriptions).await }
                })
                .buffer_unordered(self.config.workers.max(1))
                .collect::<Vec<_>>()
                .await;

            for outcome in outcomes {
                match outcome {
                    Ok(true) => stats.completed += 1,
                    Ok(false) => stats.errored += 1,
                    Err(err) => {
                        warn!("batch worker error: {err}");
                        stats.errored += 1;
                    }
                }
            }
        }

        self.store.cleanup_processing(env).await?;
        info!(
            "batch run complete: {} completed, {} errored, {} cycle round(s)",
            stats.completed, stats.errored, stats.cycle_rounds
        );
        Ok(stats)
    }
}

async fn process_one(
    store: Arc<dyn GraphStore>,
    env: GraphEnvironment,
    task: Arc<dyn BatchTask>,
    node: Node,
    descriptions: Arc<DashMap<NodeId, String>>,
) -> Result<bool> {
    store.mark_processing_status(&env, &node.id, ProcessingStatus::InProgress).await?;
    let deps = dependency_descriptions(&store, &env, &node, &descriptions).await?;

    match task.run(&env, &node, &deps).await {
        Ok(delta) => {
            if !delta.nodes.is_empty() {
                store.upsert_nodes(&env, delta.nodes).await?;
            }
            if !delta.edges.is_empty() {
                store.upsert_edges(&env, delta.edges).await?;
            }
            if let Some(desc) = delta.description {
                descriptions.insert(node.id.clone(), desc);
            }
            store.mark_processing_status(&env, &node.id, ProcessingStatus::Completed).await?;
            Ok(true)
        }
        Err(err) => {
            warn!("batch task failed for {}: {err}", node.id);
            if let Some(mut current) = store.get_node(&env, &node.id).await? {
                current.error_flag = true;
                store.upsert_nodes(&env, vec![current]).await?;
            }
            store.mark_processing_status(&env, &node.id, ProcessingStatus::Completed).await?;
            Ok(false)
        }
    }
}

async fn dependency_descriptions(
    store: &Arc<dyn GraphStore>,
    env: &GraphEnvironment,
    node: &Node,
    descriptions: &DashMap<NodeId, String>,
) -> Result<HashMap<NodeId, String>> {
    let mut out = HashMap::new();
    for kind in DEPENDENCY_EDGE_KINDS {
        for edge in store.outgoing(env, &node.id, kind).await? {
            if let Some(desc) = descriptions.get(&edge.target) {
                out.insert(edge.target.clone(), desc.clone());
            }
        }
    }
    Ok(out)
}
