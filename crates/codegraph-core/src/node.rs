use crate::{
    compute_edge_id, compute_node_id, EdgeId, EdgeKind, GraphEnvironment, Language, Layer,
    NodeId, NodeKind, ProcessingStatus, SharedStr,
};
use serde::{Deserialize, Serialize};

/// A single node in the property graph. One struct covers all seven node kinds;
/// fields that only apply to a subset (language, span, processing state) are `None`
/// or left at their default for kinds that do not use them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: SharedStr,
    pub file_uri: Option<String>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub layer: Layer,
    pub parent_id: Option<NodeId>,
    pub entity_id: String,
    pub repo_id: String,
    pub environment_tag: String,
    pub language: Option<Language>,
    pub content: Option<SharedStr>,
    pub processing_status: ProcessingStatus,
    pub cycle_member: bool,
    pub error_flag: bool,
}

impl Node {
    pub fn new(
        env: &GraphEnvironment,
        path: &str,
        kind: NodeKind,
        name: impl Into<SharedStr>,
        layer: Layer,
    ) -> Self {
        let name = name.into();
        Self {
            id: compute_node_id(env, path, kind, name.as_str()),
            kind,
            name,
            file_uri: None,
            start_line: None,
            end_line: None,
            layer,
            parent_id: None,
            entity_id: env.entity_id.clone(),
            repo_id: env.repo_id.clone(),
            environment_tag: env.environment_tag.clone(),
            language: None,
            content: None,
            processing_status: ProcessingStatus::Unset,
            cycle_member: false,
            error_flag: false,
        }
    }

    pub fn with_file_uri(mut self, file_uri: impl Into<String>) -> Self {
        self.file_uri = Some(file_uri.into());
        self
    }

    pub fn with_span(mut self, start_line: u32, end_line: u32) -> Self {
        self.start_line = Some(start_line);
        self.end_line = Some(end_line);
        self
    }

    pub fn with_parent(mut self, parent_id: NodeId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_content(mut self, content: impl Into<SharedStr>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Definition kinds (Class, Function) and Documentation/Workflow/Integration nodes
    /// are processable by the bottom-up batch processor; Folder and File are not.
    pub fn is_code_layer(&self) -> bool {
        matches!(self.kind, NodeKind::Class | NodeKind::Function) && self.layer == Layer::Code
    }
}

/// A directed edge between two nodes. Structural, cross-reference and overlay edges
/// all share this shape; unused fields (scope_text, step_order, depth) stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub kind: EdgeKind,
    pub source: NodeId,
    pub target: NodeId,
    pub scope_text: Option<String>,
    pub source_line: Option<u32>,
    pub source_column: Option<u32>,
    pub step_order: Option<u32>,
    pub depth: Option<u32>,
}

impl Edge {
    pub fn structural(kind: EdgeKind, source: NodeId, target: NodeId) -> Self {
        debug_assert!(kind.is_structural());
        let id = compute_edge_id(&source, kind, &target, "");
        Self {
            id,
            kind,
            source,
            target,
            scope_text: None,
            source_line: None,
            source_column: None,
            step_order: None,
            depth: None,
        }
    }

    pub fn cross_reference(
        kind: EdgeKind,
        source: NodeId,
        target: NodeId,
        scope_text: impl Into<String>,
        source_line: u32,
        source_column: u32,
    ) -> Self {
        debug_assert!(kind.is_cross_reference());
        let scope_text = scope_text.into();
        let disambiguator = format!("{}:{}", source_line, source_column);
        let id = compute_edge_id(&source, kind, &target, &disambiguator);
        Self {
            id,
            kind,
            source,
            target,
            scope_text: Some(scope_text),
            source_line: Some(source_line),
            source_column: Some(source_column),
            step_order: None,
            depth: None,
        }
    }

    pub fn overlay(kind: EdgeKind, source: NodeId, target: NodeId) -> Self {
        let id = compute_edge_id(&source, kind, &target, "");
        Self {
            id,
            kind,
            source,
            target,
            scope_text: None,
            source_line: None,
            source_column: None,
            step_order: None,
            depth: None,
        }
    }

    pub fn workflow_step(source: NodeId, target: NodeId, step_order: u32, depth: u32) -> Self {
        let disambiguator = format!("{}:{}", step_order, depth);
        let id = compute_edge_id(&source, EdgeKind::WorkflowStep, &target, &disambiguator);
        Self {
            id,
            kind: EdgeKind::WorkflowStep,
            source,
            target,
            scope_text: None,
            source_line: None,
            source_column: None,
            step_order: Some(step_order),
            depth: Some(depth),
        }
    }

    pub fn diff_overlay(kind: EdgeKind, source: NodeId, target: NodeId) -> Self {
        debug_assert!(kind.is_diff_overlay());
        let id = compute_edge_id(&source, kind, &target, "");
        Self {
            id,
            kind,
            source,
            target,
            scope_text: None,
            source_line: None,
            source_column: None,
            step_order: None,
            depth: None,
        }
    }
}
