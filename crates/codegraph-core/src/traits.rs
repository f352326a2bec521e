use crate::{Edge, GraphEnvironment, Node, NodeId, NodeKind, ProcessingStatus, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// Implemented once per language by the language registry's parser factory.
#[async_trait]
pub trait CodeParser: Send + Sync {
    async fn parse_file(&self, file_path: &str) -> Result<Vec<Node>>;
    fn supported_languages(&self) -> Vec<crate::Language>;
}

/// The external graph store contract. One concrete in-tree implementation lives in
/// `codegraph-graph`; downstream deployments are expected to swap it for a real
/// graph database behind the same trait.
///
/// All mutating methods take a `GraphEnvironment`, whose `repo_id: String` is
/// mandatory by construction. The spec's "repo_id = None writes must fail with
/// InvalidScope" rule is therefore enforced at the type level for everything that
/// flows through node/edge ingestion. The one read that is genuinely entity-wide,
/// `find_nodes_by_name`, accepts an optional repo_id directly.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert_nodes(&self, env: &GraphEnvironment, nodes: Vec<Node>) -> Result<()>;
    async fn upsert_edges(&self, env: &GraphEnvironment, edges: Vec<Edge>) -> Result<()>;
    async fn detach_delete_by_path(&self, env: &GraphEnvironment, path: &str) -> Result<()>;

    async fn get_node(&self, env: &GraphEnvironment, id: &NodeId) -> Result<Option<Node>>;
    async fn find_node_by_path(
        &self,
        env: &GraphEnvironment,
        path: &str,
        kind: NodeKind,
    ) -> Result<Option<Node>>;
    async fn children(&self, env: &GraphEnvironment, parent_id: &NodeId) -> Result<Vec<Node>>;
    async fn direct_callers(&self, env: &GraphEnvironment, id: &NodeId) -> Result<Vec<Node>>;
    async fn outgoing(&self, env: &GraphEnvironment, id: &NodeId, kind: crate::EdgeKind) -> Result<Vec<Edge>>;

    /// Entity-wide when `repo_id` is `None`; this is the one read path in the
    /// contract that is genuinely allowed to span repos within an entity.
    async fn find_nodes_by_name(
        &self,
        entity_id: &str,
        repo_id: Option<&str>,
        name: &str,
    ) -> Result<Vec<Node>>;

    async fn initialize_processing(&self, env: &GraphEnvironment) -> Result<usize>;

    /// Scoped variant of [`initialize_processing`](Self::initialize_processing):
    /// only the listed nodes are reset to `Pending`, so a batch run afterwards
    /// touches exactly that subset instead of the whole environment.
    async fn initialize_processing_for(&self, env: &GraphEnvironment, node_ids: &[NodeId]) -> Result<usize>;
    async fn get_processable_nodes(&self, env: &GraphEnvironment, limit: usize) -> Result<Vec<Node>>;
    async fn mark_processing_status(
        &self,
        env: &GraphEnvironment,
        id: &NodeId,
        status: ProcessingStatus,
    ) -> Result<()>;
    async fn cleanup_processing(&self, env: &GraphEnvironment) -> Result<()>;
    async fn mark_cycle_members(&self, env: &GraphEnvironment, ids: &[NodeId]) -> Result<()>;

    /// Removes every edge of one of `kinds` whose target is in `node_ids`. Used to
    /// invalidate stale `DESCRIBES` / `BELONGS_TO_WORKFLOW` edges before a rebuilt
    /// node is re-queued into the batch processor. Returns the number removed.
    async fn invalidate_edges_to(
        &self,
        env: &GraphEnvironment,
        node_ids: &[NodeId],
        kinds: &[crate::EdgeKind],
    ) -> Result<usize>;
    async fn detect_function_cycles(&self, env: &GraphEnvironment) -> Result<Vec<Vec<NodeId>>>;

    async fn vector_similarity_search(
        &self,
        _env: &GraphEnvironment,
        _embedding: &[f32],
        _limit: usize,
    ) -> Result<Vec<NodeId>> {
        Ok(Vec::new())
    }
}

/// The one external collaborator the spec names without specifying: an LLM provider.
/// `generate` returns raw text; callers that need structured output pass a schema
/// hint and parse the result themselves, matching the contract's
/// `generate(system_prompt, input_map, [schema]) -> string|structured_object` shape.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        input: &HashMap<String, String>,
        schema_hint: Option<&str>,
    ) -> Result<String>;
}
