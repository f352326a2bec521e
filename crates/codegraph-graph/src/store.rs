// ABOUTME: Reference GraphStore. Concurrent maps keyed by node/edge id, with
// ABOUTME: secondary indices for path lookup, name lookup and adjacency traversal.
// ABOUTME: Processing-status bookkeeping for the bottom-up batch processor lives
// ABOUTME: directly on each Node rather than in a side table.
use crate::cycles::detect_cycles;
use async_trait::async_trait;
use codegraph_core::{
    CodeGraphError, Edge, EdgeKind, GraphEnvironment, GraphStore, Node, NodeId, NodeKind,
    ProcessingStatus, Result,
};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};

/// Edge kinds the bottom-up batch processor treats as dependencies: a node is only
/// processable once every node it reaches via one of these is `completed` (or a
/// declared cycle member).
const DEPENDENCY_EDGE_KINDS: [EdgeKind; 4] = [
    EdgeKind::Contains,
    EdgeKind::FunctionDefinition,
    EdgeKind::ClassDefinition,
    EdgeKind::Calls,
];

fn env_key(entity_id: &str, repo_id: &str, environment_tag: &str) -> String {
    format!("{entity_id}\0{repo_id}\0{environment_tag}")
}

fn node_env_key(node: &Node) -> String {
    env_key(&node.entity_id, &node.repo_id, &node.environment_tag)
}

fn matches_env(node: &Node, env: &GraphEnvironment) -> bool {
    node.entity_id == env.entity_id
        && node.repo_id == env.repo_id
        && node.environment_tag == env.environment_tag
}

/// Default in-process GraphStore, the one concrete implementation the rest of the
/// pipeline runs against. A production deployment swaps this for a real graph
/// database behind the same trait.
#[derive(Default)]
pub struct InMemoryGraphStore {
    nodes: DashMap<NodeId, Node>,
    edges: DashMap<String, Edge>,
    outgoing: DashMap<NodeId, Vec<String>>,
    incoming: DashMap<NodeId, Vec<String>>,
    path_index: DashMap<(String, String, NodeKind), NodeId>,
    name_index: DashMap<String, Vec<NodeId>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_node(&self, node: &Node) {
        if let Some(file_uri) = &node.file_uri {
            self.path_index
                .insert((node_env_key(node), file_uri.clone(), node.kind), node.id.clone());
        }
        let mut entry = self.name_index.entry(node.name.as_str().to_string()).or_default();
        if !entry.contains(&node.id) {
            entry.push(node.id.clone());
        }
    }

    fn deindex_node(&self, node: &Node) {
        if let Some(file_uri) = &node.file_uri {
            self.path_index
                .remove(&(node_env_key(node), file_uri.clone(), node.kind));
        }
        if let Some(mut entry) = self.name_index.get_mut(node.name.as_str()) {
            entry.retain(|id| id != &node.id);
        }
    }

    fn link_edge(&self, edge: &Edge) {
        {
            let mut out = self.outgoing.entry(edge.source.clone()).or_default();
            if !out.contains(&edge.id) {
                out.push(edge.id.clone());
            }
        }
        let mut inc = self.incoming.entry(edge.target.clone()).or_default();
        if !inc.contains(&edge.id) {
            inc.push(edge.id.clone());
        }
    }

    fn unlink_node(&self, id: &NodeId) {
        if let Some((_, edge_ids)) = self.outgoing.remove(id) {
            for edge_id in edge_ids {
                if let Some((_, edge)) = self.edges.remove(&edge_id) {
                    if let Some(mut inc) = self.incoming.get_mut(&edge.target) {
                        inc.retain(|e| e != &edge_id);
                    }
                }
            }
        }
        if let Some((_, edge_ids)) = self.incoming.remove(id) {
            for edge_id in edge_ids {
                if let Some((_, edge)) = self.edges.remove(&edge_id) {
                    if let Some(mut out) = self.outgoing.get_mut(&edge.source) {
                        out.retain(|e| e != &edge_id);
                    }
                }
            }
        }
    }

    /// A dependency only blocks its dependent while it is itself queued in the
    /// current run (`Pending`/`InProgress`). `Completed` and `cycle_member` clear
    /// it as before; `Unset` also clears it, since that means the target sits
    /// outside this run's scope and its prior result still stands.
    fn dependencies_satisfied(&self, node: &Node) -> bool {
        let Some(edge_ids) = self.outgoing.get(&node.id) else {
            return true;
        };
        edge_ids.value().iter().all(|edge_id| {
            let Some(edge) = self.edges.get(edge_id) else {
                return true;
            };
            if !DEPENDENCY_EDGE_KINDS.contains(&edge.kind) {
                return true;
            }
            match self.nodes.get(&edge.target) {
                Some(target) => {
                    target.cycle_member
                        || !matches!(
                            target.processing_status,
                            ProcessingStatus::Pending | ProcessingStatus::InProgress
                        )
                }
                None => true,
            }
        })
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_nodes(&self, _env: &GraphEnvironment, nodes: Vec<Node>) -> Result<()> {
        for node in nodes {
            self.index_node(&node);
            self.nodes.insert(node.id.clone(), node);
        }
        Ok(())
    }

    async fn upsert_edges(&self, _env: &GraphEnvironment, edges: Vec<Edge>) -> Result<()> {
        for edge in edges {
            self.link_edge(&edge);
            self.edges.insert(edge.id.clone(), edge);
        }
        Ok(())
    }

    async fn detach_delete_by_path(&self, env: &GraphEnvironment, path: &str) -> Result<()> {
        let key = env_key(&env.entity_id, &env.repo_id, &env.environment_tag);
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let victims: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|entry| {
                let node = entry.value();
                node_env_key(node) == key
                    && node
                        .file_uri
                        .as_deref()
                        .map(|uri| uri == path || uri.starts_with(&prefix))
                        .unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();

        for id in victims {
            if let Some((_, node)) = self.nodes.remove(&id) {
                self.deindex_node(&node);
            }
            self.unlink_node(&id);
        }
        Ok(())
    }

    async fn get_node(&self, env: &GraphEnvironment, id: &NodeId) -> Result<Option<Node>> {
        Ok(self
            .nodes
            .get(id)
            .filter(|n| matches_env(n.value(), env))
            .map(|n| n.value().clone()))
    }

    async fn find_node_by_path(
        &self,
        env: &GraphEnvironment,
        path: &str,
        kind: NodeKind,
    ) -> Result<Option<Node>> {
        let key = (
            env_key(&env.entity_id, &env.repo_id, &env.environment_tag),
            path.to_string(),
            kind,
        );
        match self.path_index.get(&key) {
            Some(id) => self.get_node(env, id.value()).await,
            None => Ok(None),
        }
    }

    async fn children(&self, env: &GraphEnvironment, parent_id: &NodeId) -> Result<Vec<Node>> {
        let Some(edge_ids) = self.outgoing.get(parent_id) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for edge_id in edge_ids.value() {
            let Some(edge) = self.edges.get(edge_id) else { continue };
            if !edge.kind.is_structural() {
                continue;
            }
            if let Some(node) = self.nodes.get(&edge.target) {
                if matches_env(node.value(), env) {
                    out.push(node.value().clone());
                }
            }
        }
        Ok(out)
    }

    async fn direct_callers(&self, env: &GraphEnvironment, id: &NodeId) -> Result<Vec<Node>> {
        let Some(edge_ids) = self.incoming.get(id) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for edge_id in edge_ids.value() {
            let Some(edge) = self.edges.get(edge_id) else { continue };
            if edge.kind != EdgeKind::Calls {
                continue;
            }
            if let Some(node) = self.nodes.get(&edge.source) {
                if matches_env(node.value(), env) {
                    out.push(node.value().clone());
                }
            }
        }
        Ok(out)
    }

    async fn outgoing(&self, _env: &GraphEnvironment, id: &NodeId, kind: EdgeKind) -> Result<Vec<Edge>> {
        let Some(edge_ids) = self.outgoing.get(id) else {
            return Ok(Vec::new());
        };
        Ok(edge_ids
            .value()
            .iter()
            .filter_map(|edge_id| self.edges.get(edge_id))
            .filter(|edge| edge.kind == kind)
            .map(|edge| edge.value().clone())
            .collect())
    }

    async fn find_nodes_by_name(
        &self,
        entity_id: &str,
        repo_id: Option<&str>,
        name: &str,
    ) -> Result<Vec<Node>> {
        let Some(ids) = self.name_index.get(name) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .value()
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| {
                node.entity_id == entity_id && repo_id.map(|r| r == node.repo_id).unwrap_or(true)
            })
            .map(|node| node.value().clone())
            .collect())
    }

    async fn initialize_processing(&self, env: &GraphEnvironment) -> Result<usize> {
        let mut count = 0;
        for mut entry in self.nodes.iter_mut() {
            let node = entry.value_mut();
            if matches_env(node, env) && node.is_code_layer() {
                node.processing_status = ProcessingStatus::Pending;
                node.cycle_member = false;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn initialize_processing_for(&self, env: &GraphEnvironment, node_ids: &[NodeId]) -> Result<usize> {
        let mut count = 0;
        for id in node_ids {
            if let Some(mut node) = self.nodes.get_mut(id) {
                if matches_env(node.value(), env) && node.is_code_layer() {
                    node.processing_status = ProcessingStatus::Pending;
                    node.cycle_member = false;
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    async fn get_processable_nodes(&self, env: &GraphEnvironment, limit: usize) -> Result<Vec<Node>> {
        let mut out = Vec::new();
        for entry in self.nodes.iter() {
            if out.len() >= limit {
                break;
            }
            let node = entry.value();
            if !matches_env(node, env) || node.processing_status != ProcessingStatus::Pending {
                continue;
            }
            if self.dependencies_satisfied(node) {
                out.push(node.clone());
            }
        }
        Ok(out)
    }

    async fn mark_processing_status(
        &self,
        _env: &GraphEnvironment,
        id: &NodeId,
        status: ProcessingStatus,
    ) -> Result<()> {
        match self.nodes.get_mut(id) {
            Some(mut node) => {
                node.processing_status = status;
                Ok(())
            }
            None => Err(CodeGraphError::NodeNotFound(id.clone())),
        }
    }

    async fn cleanup_processing(&self, env: &GraphEnvironment) -> Result<()> {
        for mut entry in self.nodes.iter_mut() {
            let node = entry.value_mut();
            if matches_env(node, env) {
                node.processing_status = ProcessingStatus::Unset;
                node.cycle_member = false;
            }
        }
        Ok(())
    }

    async fn mark_cycle_members(&self, _env: &GraphEnvironment, ids: &[NodeId]) -> Result<()> {
        for id in ids {
            if let Some(mut node) = self.nodes.get_mut(id) {
                node.cycle_member = true;
            }
        }
        Ok(())
    }

    async fn invalidate_edges_to(
        &self,
        env: &GraphEnvironment,
        node_ids: &[NodeId],
        kinds: &[EdgeKind],
    ) -> Result<usize> {
        let targets: HashSet<&NodeId> = node_ids.iter().collect();
        let victims: Vec<String> = self
            .edges
            .iter()
            .filter(|entry| {
                let edge = entry.value();
                kinds.contains(&edge.kind) && targets.contains(&edge.target)
            })
            .filter(|entry| {
                self.nodes
                    .get(&entry.value().target)
                    .map(|n| matches_env(n.value(), env))
                    .unwrap_or(true)
            })
            .map(|entry| entry.key().clone())
            .collect();

        let count = victims.len();
        for edge_id in victims {
            if let Some((_, edge)) = self.edges.remove(&edge_id) {
                if let Some(mut out) = self.outgoing.get_mut(&edge.source) {
                    out.retain(|e| e != &edge_id);
                }
                if let Some(mut inc) = self.incoming.get_mut(&edge.target) {
                    inc.retain(|e| e != &edge_id);
                }
            }
        }
        Ok(count)
    }

    async fn detect_function_cycles(&self, env: &GraphEnvironment) -> Result<Vec<Vec<NodeId>>> {
        let pending: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|e| matches_env(e.value(), env) && e.value().processing_status == ProcessingStatus::Pending)
            .map(|e| e.key().clone())
            .collect();
        let pending_set: HashSet<&NodeId> = pending.iter().collect();

        let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for id in &pending {
            let Some(edge_ids) = self.outgoing.get(id) else { continue };
            let targets = edge_ids
                .value()
                .iter()
                .filter_map(|edge_id| self.edges.get(edge_id))
                .filter(|edge| DEPENDENCY_EDGE_KINDS.contains(&edge.kind))
                .map(|edge| edge.target.clone())
                .filter(|target| pending_set.contains(target))
                .collect();
            adjacency.insert(id.clone(), targets);
        }

        Ok(detect_cycles(&pending, &adjacency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::Layer;

    fn env() -> GraphEnvironment {
        GraphEnvironment::main("entity-1", "repo-1", "/repo")
    }

    #[tokio::test]
    async fn upsert_and_get_round_trip() {
        let store = InMemoryGraphStore::new();
        let env = env();
        let node = Node::new(&env, "a.py", NodeKind::File, "a.py", Layer::Code).with_file_uri("a.py");
        let id = node.id.clone();
        store.upsert_nodes(&env, vec![node]).await.unwrap();
        let fetched = store.get_node(&env, &id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn get_node_is_scoped_to_environment() {
        let store = InMemoryGraphStore::new();
        let env = env();
        let other = GraphEnvironment::pr_overlay("entity-1", "repo-1", "/repo", "PR-7");
        let node = Node::new(&env, "a.py", NodeKind::File, "a.py", Layer::Code);
        let id = node.id.clone();
        store.upsert_nodes(&env, vec![node]).await.unwrap();
        assert!(store.get_node(&other, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn detach_delete_by_path_removes_node_and_edges() {
        let store = InMemoryGraphStore::new();
        let env = env();
        let file = Node::new(&env, "a.py", NodeKind::File, "a.py", Layer::Code).with_file_uri("a.py");
        let func = Node::new(&env, "a.py", NodeKind::Function, "f", Layer::Code).with_file_uri("a.py");
        let file_id = file.id.clone();
        let func_id = func.id.clone();
        let edge = Edge::structural(EdgeKind::FunctionDefinition, file_id.clone(), func_id.clone());
        store.upsert_nodes(&env, vec![file, func]).await.unwrap();
        store.upsert_edges(&env, vec![edge]).await.unwrap();

        store.detach_delete_by_path(&env, "a.py").await.unwrap();

        assert!(store.get_node(&env, &file_id).await.unwrap().is_none());
        assert!(store.get_node(&env, &func_id).await.unwrap().is_none());
        assert!(store.children(&env, &file_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn processable_nodes_wait_for_completed_dependencies() {
        let store = InMemoryGraphStore::new();
        let env = env();
        let caller = Node::new(&env, "a.py", NodeKind::Function, "caller", Layer::Code);
        let callee = Node::new(&env, "a.py", NodeKind::Function, "callee", Layer::Code);
        let caller_id = caller.id.clone();
        let callee_id = callee.id.clone();
        let edge = Edge::cross_reference(EdgeKind::Calls, caller_id.clone(), callee_id.clone(), "callee()", 1, 0);
        store.upsert_nodes(&env, vec![caller, callee]).await.unwrap();
        store.upsert_edges(&env, vec![edge]).await.unwrap();
        store.initialize_processing(&env).await.unwrap();

        let processable = store.get_processable_nodes(&env, 10).await.unwrap();
        let ids: Vec<_> = processable.iter().map(|n| n.id.clone()).collect();
        assert!(ids.contains(&callee_id));
        assert!(!ids.contains(&caller_id));

        store.mark_processing_status(&env, &callee_id, ProcessingStatus::Completed).await.unwrap();
        let processable = store.get_processable_nodes(&env, 10).await.unwrap();
        let ids: Vec<_> = processable.iter().map(|n| n.id.clone()).collect();
        assert!(ids.contains(&caller_id));
    }

    #[tokio::test]
    async fn detect_function_cycles_finds_mutual_recursion() {
        let store = InMemoryGraphStore::new();
        let env = env();
        let a = Node::new(&env, "a.py", NodeKind::Function, "a", Layer::Code);
        let b = Node::new(&env, "a.py", NodeKind::Function, "b", Layer::Code);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        let e1 = Edge::cross_reference(EdgeKind::Calls, a_id.clone(), b_id.clone(), "b()", 1, 0);
        let e2 = Edge::cross_reference(EdgeKind::Calls, b_id.clone(), a_id.clone(), "a()", 2, 0);
        store.upsert_nodes(&env, vec![a, b]).await.unwrap();
        store.upsert_edges(&env, vec![e1, e2]).await.unwrap();
        store.initialize_processing(&env).await.unwrap();

        assert!(store.get_processable_nodes(&env, 10).await.unwrap().is_empty());
        let cycles = store.detect_function_cycles(&env).await.unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);
    }
}
