// ABOUTME: Documentation task. Builds a prompt from the node's body plus the
// ABOUTME: already-computed descriptions of its dependencies, calls the LLM, and
// ABOUTME: emits one Documentation node with a DESCRIBES edge back to the code node.
use crate::batch::{BatchTask, TaskDelta};
use async_trait::async_trait;
use codegraph_core::{Edge, EdgeKind, GraphEnvironment, Layer, LlmClient, Node, NodeId, NodeKind, Result};
use std::collections::HashMap;
use std::sync::Arc;

const SYSTEM_PROMPT: &str =
    "Summarize the given code definition in one or two sentences, using the provided \
     descriptions of its dependencies where they help.";

pub struct DocumentationTask {
    llm: Arc<dyn LlmClient>,
}

impl DocumentationTask {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl BatchTask for DocumentationTask {
    async fn run(
        &self,
        env: &GraphEnvironment,
        node: &Node,
        dependency_descriptions: &HashMap<NodeId, String>,
    ) -> Result<TaskDelta> {
        let mut input = HashMap::new();
        input.insert("name".to_string(), node.name.to_string());
        input.insert("body".to_string(), node.content.as_deref().unwrap_or("").to_string());
        let children_descriptions =
            dependency_descriptions.values().cloned().collect::<Vec<_>>().join("; ");
        input.insert("children_descriptions".to_string(), children_descriptions);

        let description = self.llm.generate(SYSTEM_PROMPT, &input, None).await?;

        // Keyed on the code node's own id, not just its name, so two definitions
        // that share a name in the same file never collide on one doc node; and
        // given the same file_uri as the code node so DETACH_DELETE_BY_PATH sweeps
        // up stale documentation in the same call that removes stale code nodes.
        let path = node.file_uri.clone().unwrap_or_else(|| node.id.clone());
        let doc_name = format!("{}::doc", node.id);
        let doc_node = Node::new(env, &path, NodeKind::Documentation, doc_name, Layer::Documentation)
            .with_file_uri(path.clone())
            .with_content(description.clone());
        let describes = Edge::overlay(EdgeKind::Describes, doc_node.id.clone(), node.id.clone());

        Ok(TaskDelta {
            nodes: vec![doc_node],
            edges: vec![describes],
            description: Some(description),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::EchoLlmClient;
    use codegraph_core::GraphEnvironment;

    #[tokio::test]
    async fn produces_one_documentation_node_and_describes_edge() {
        let env = GraphEnvironment::main("entity", "repo", "/repo");
        let node = Node::new(&env, "src/a.py", NodeKind::Function, "parse", Layer::Code)
            .with_file_uri("src/a.py")
            .with_content("def parse(): ...");
        let task = DocumentationTask::new(Arc::new(EchoLlmClient));

        let delta = task.run(&env, &node, &HashMap::new()).await.unwrap();

        assert_eq!(delta.nodes.len(), 1);
        assert_eq!(delta.edges.len(), 1);
        assert_eq!(delta.nodes[0].kind, NodeKind::Documentation);
        assert_eq!(delta.nodes[0].file_uri.as_deref(), Some("src/a.py"));
        assert_eq!(delta.edges[0].kind, EdgeKind::Describes);
        assert_eq!(delta.edges[0].target, node.id);
        assert!(delta.description.unwrap().contains("parse"));
    }

    #[tokio::test]
    async fn doc_node_id_is_stable_across_reruns() {
        let env = GraphEnvironment::main("entity", "repo", "/repo");
        let node = Node::new(&env, "src/a.py", NodeKind::Function, "parse", Layer::Code)
            .with_file_uri("src/a.py");
        let task = DocumentationTask::new(Arc::new(EchoLlmClient));

        let first = task.run(&env, &node, &HashMap::new()).await.unwrap();
        let second = task.run(&env, &node, &HashMap::new()).await.unwrap();

        assert_eq!(first.nodes[0].id, second.nodes[0].id);
    }
}
