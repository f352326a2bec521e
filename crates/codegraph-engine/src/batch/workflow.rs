// ABOUTME: Workflow-discovery task. From an entry-point function (no direct
// ABOUTME: caller), walks outgoing CALLS edges up to a depth bound and emits one
// ABOUTME: Workflow node, a WORKFLOW_STEP edge per call, and a BELONGS_TO_WORKFLOW
// ABOUTME: edge from every participant, visiting each node at most once.
use crate::batch::{BatchTask, TaskDelta};
use async_trait::async_trait;
use codegraph_core::{Edge, EdgeKind, GraphEnvironment, GraphStore, Layer, Node, NodeId, NodeKind, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct WorkflowDiscoveryTask {
    store: Arc<dyn GraphStore>,
    max_depth: u32,
}

impl WorkflowDiscoveryTask {
    pub fn new(store: Arc<dyn GraphStore>, max_depth: u32) -> Self {
        Self { store, max_depth }
    }

    /// Only a function with no direct caller is treated as an entry point; a
    /// workflow rooted at an interior call site would just be a suffix of a
    /// longer one already discovered from its own entry point.
    async fn is_entry_point(&self, env: &GraphEnvironment, node: &Node) -> Result<bool> {
        if node.kind != NodeKind::Function {
            return Ok(false);
        }
        Ok(self.store.direct_callers(env, &node.id).await?.is_empty())
    }
}

#[async_trait]
impl BatchTask for WorkflowDiscoveryTask {
    async fn run(
        &self,
        env: &GraphEnvironment,
        node: &Node,
        _dependency_descriptions: &HashMap<NodeId, String>,
    ) -> Result<TaskDelta> {
        if !self.is_entry_point(env, node).await? {
            return Ok(TaskDelta::default());
        }

        let workflow_name = format!("{}::workflow", node.id);
        let workflow_node = Node::new(env, &workflow_name, NodeKind::Workflow, format!("{} workflow", node.name), Layer::Workflows)
            .with_file_uri(node.file_uri.clone().unwrap_or_else(|| node.id.clone()));

        let mut edges = vec![Edge::overlay(EdgeKind::BelongsToWorkflow, node.id.clone(), workflow_node.id.clone())];
        let mut visited: HashSet<NodeId> = HashSet::new();
        visited.insert(node.id.clone());
        let mut step_order = 0u32;
        let mut frontier = vec![(node.clone(), 0u32)];

        while let Some((current, depth)) = frontier.pop() {
            if depth >= self.max_depth {
                continue;
            }
            for edge in self.store.outgoing(env, &current.id, EdgeKind::Calls).await? {
                if visited.contains(&edge.target) {
                    continue;
                }
                visited.insert(edge.target.clone());
                step_order += 1;
                edges.push(Edge::workflow_step(current.id.clone(), edge.target.clone(), step_order, depth + 1));
                edges.push(Edge::overlay(EdgeKind::BelongsToWorkflow, edge.target.clone(), workflow_node.id.clone()));
                if let Some(target_node) = self.store.get_node(env, &edge.target).await? {
                    frontier.push((target_node, depth + 1));
                }
            }
        }

        let description = format!("workflow starting at {} with {} participant(s)", node.name, visited.len());

        Ok(TaskDelta { nodes: vec![workflow_node], edges, description: Some(description) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::GraphStore;
    use std::sync::Arc;

    struct FakeStore {
        callers: HashMap<NodeId, Vec<Node>>,
        calls: HashMap<NodeId, Vec<Edge>>,
        nodes: HashMap<NodeId, Node>,
    }

    #[async_trait]
    impl GraphStore for FakeStore {
        async fn upsert_nodes(&self, _env: &GraphEnvironment, _nodes: Vec<Node>) -> Result<()> {
            Ok(())
        }
        async fn upsert_edges(&self, _env: &GraphEnvironment, _edges: Vec<Edge>) -> Result<()> {
            Ok(())
        }
        async fn get_node(&self, _env: &GraphEnvironment, id: &NodeId) -> Result<Option<Node>> {
            Ok(self.nodes.get(id).cloned())
        }
        async fn find_node_by_path(&self, _env: &GraphEnvironment, _path: &str, _kind: NodeKind) -> Result<Option<Node>> {
            Ok(None)
        }
        async fn find_nodes_by_name(&self, _entity_id: &str, _repo_id: Option<&str>, _name: &str) -> Result<Vec<Node>> {
            Ok(vec![])
        }
        async fn children(&self, _env: &GraphEnvironment, _id: &NodeId) -> Result<Vec<Node>> {
            Ok(vec![])
        }
        async fn outgoing(&self, _env: &GraphEnvironment, id: &NodeId, kind: EdgeKind) -> Result<Vec<Edge>> {
            Ok(self.calls.get(id).cloned().unwrap_or_default().into_iter().filter(|e| e.kind == kind).collect())
        }
        async fn direct_callers(&self, _env: &GraphEnvironment, id: &NodeId) -> Result<Vec<Node>> {
            Ok(self.callers.get(id).cloned().unwrap_or_default())
        }
        async fn detach_delete_by_path(&self, _env: &GraphEnvironment, _path: &str) -> Result<()> {
            Ok(())
        }
        async fn initialize_processing(&self, _env: &GraphEnvironment) -> Result<usize> {
            Ok(0)
        }
        async fn initialize_processing_for(&self, _env: &GraphEnvironment, _node_ids: &[NodeId]) -> Result<usize> {
            Ok(0)
        }
        async fn get_processable_nodes(&self, _env: &GraphEnvironment, _limit: usize) -> Result<Vec<Node>> {
            Ok(vec![])
        }
        async fn mark_processing_status(&self, _env: &GraphEnvironment, _id: &NodeId, _status: codegraph_core::ProcessingStatus) -> Result<()> {
            Ok(())
        }
        async fn mark_cycle_members(&self, _env: &GraphEnvironment, _ids: &[NodeId]) -> Result<()> {
            Ok(())
        }
        async fn invalidate_edges_to(&self, _env: &GraphEnvironment, _node_ids: &[NodeId], _kinds: &[EdgeKind]) -> Result<usize> {
            Ok(0)
        }
        async fn detect_function_cycles(&self, _env: &GraphEnvironment) -> Result<Vec<Vec<NodeId>>> {
            Ok(vec![])
        }
        async fn cleanup_processing(&self, _env: &GraphEnvironment) -> Result<()> {
            Ok(())
        }
    }

    fn env() -> GraphEnvironment {
        GraphEnvironment::main("entity", "repo", "/repo")
    }

    #[tokio::test]
    async fn skips_nodes_with_a_direct_caller() {
        let env = env();
        let callee = Node::new(&env, "src/a.py", NodeKind::Function, "callee", Layer::Code);
        let caller = Node::new(&env, "src/a.py", NodeKind::Function, "caller", Layer::Code);
        let store = Arc::new(FakeStore {
            callers: HashMap::from([(callee.id.clone(), vec![caller])]),
            calls: HashMap::new(),
            nodes: HashMap::new(),
        });
        let task = WorkflowDiscoveryTask::new(store, 5);

        let delta = task.run(&env, &callee, &HashMap::new()).await.unwrap();

        assert!(delta.nodes.is_empty());
    }

    #[tokio::test]
    async fn builds_a_workflow_for_an_entry_point() {
        let env = env();
        let entry = Node::new(&env, "src/a.py", NodeKind::Function, "main", Layer::Code).with_file_uri("src/a.py");
        let step = Node::new(&env, "src/a.py", NodeKind::Function, "helper", Layer::Code);
        let call_edge = Edge::cross_reference(EdgeKind::Calls, entry.id.clone(), step.id.clone(), "main", 1, 1);

        let store = Arc::new(FakeStore {
            callers: HashMap::new(),
            calls: HashMap::from([(entry.id.clone(), vec![call_edge])]),
            nodes: HashMap::from([(step.id.clone(), step.clone())]),
        });
        let task = WorkflowDiscoveryTask::new(store, 5);

        let delta = task.run(&env, &entry, &HashMap::new()).await.unwrap();

        assert_eq!(delta.nodes.len(), 1);
        assert_eq!(delta.nodes[0].kind, NodeKind::Workflow);
        assert!(delta.edges.iter().any(|e| e.kind == EdgeKind::WorkflowStep));
        assert_eq!(delta.edges.iter().filter(|e| e.kind == EdgeKind::BelongsToWorkflow).count(), 2);
    }
}
