// ABOUTME: Hierarchy Builder. Parses each file with its language's grammar, walks the
// ABOUTME: tree via the capability bundle, and emits File/Class/Function nodes plus
// ABOUTME: CONTAINS/FUNCTION_DEFINITION/CLASS_DEFINITION structural edges.
use crate::file_collect::FileRecord;
use crate::language::LanguageRegistry;
use codegraph_core::{Edge, EdgeKind, GraphEnvironment, Language, Node, NodeKind, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tree_sitter::Node as TsNode;

/// One parsed file's source, retained so the Reference Resolver can re-walk its
/// body without re-reading from disk.
#[derive(Clone)]
pub struct SourceFile {
    pub path: String,
    pub language: Language,
    pub content: Arc<str>,
}

/// Maps a (file path, 1-based line) to the innermost enclosing definition node id,
/// built while walking each file. Used by the Reference Resolver to turn an LSP
/// location back into a graph node id.
#[derive(Default)]
pub struct DefinitionIndex {
    by_path: HashMap<String, Vec<(u32, u32, String)>>,
    file_nodes: HashMap<String, String>,
}

impl DefinitionIndex {
    fn record(&mut self, path: &str, start_line: u32, end_line: u32, node_id: String) {
        self.by_path
            .entry(path.to_string())
            .or_default()
            .push((start_line, end_line, node_id));
    }

    fn record_file(&mut self, path: &str, node_id: String) {
        self.file_nodes.insert(path.to_string(), node_id);
    }

    /// Innermost enclosing definition whose span contains `line`, falling back to
    /// the File node id when no definition matches.
    pub fn resolve(&self, path: &str, line: u32) -> Option<&str> {
        let best = self
            .by_path
            .get(path)
            .into_iter()
            .flatten()
            .filter(|(start, end, _)| *start <= line && line <= *end)
            .min_by_key(|(start, end, _)| end - start);

        match best {
            Some((_, _, id)) => Some(id.as_str()),
            None => self.file_nodes.get(path).map(|s| s.as_str()),
        }
    }

    fn merge(&mut self, other: DefinitionIndex) {
        for (path, mut entries) in other.by_path {
            self.by_path.entry(path).or_default().append(&mut entries);
        }
        self.file_nodes.extend(other.file_nodes);
    }
}

pub struct IngestGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub sources: Vec<SourceFile>,
    pub index: DefinitionIndex,
}

#[derive(Debug, Default)]
pub struct BuildStats {
    pub total_files: usize,
    pub parsed_files: usize,
    pub failed_files: usize,
    pub definitions: usize,
    pub duration: Duration,
}

pub struct HierarchyBuilder {
    registry: Arc<LanguageRegistry>,
}

impl HierarchyBuilder {
    pub fn new(registry: Arc<LanguageRegistry>) -> Self {
        Self { registry }
    }

    /// Builds the folder/file/definition graph for a pre-collected set of files.
    /// Runs the CPU-bound parse+walk work across a Rayon pool; nothing here
    /// suspends, per the concurrency model's rule that parsing must not yield.
    pub fn build(&self, env: &GraphEnvironment, files: Vec<FileRecord>) -> Result<(IngestGraph, BuildStats)> {
        let start = Instant::now();
        let total_files = files.len();

        let per_file: Vec<Option<FileOutcome>> = files
            .into_par_iter()
            .map(|record| self.build_file(env, &record))
            .collect();

        let mut graph = IngestGraph {
            nodes: Vec::new(),
            edges: Vec::new(),
            sources: Vec::new(),
            index: DefinitionIndex::default(),
        };
        let mut stats = BuildStats {
            total_files,
            ..Default::default()
        };

        let mut file_paths = Vec::with_capacity(total_files);
        for outcome in per_file.into_iter().flatten() {
            stats.parsed_files += 1;
            stats.definitions += outcome.definition_count;
            graph.nodes.extend(outcome.nodes);
            graph.edges.extend(outcome.edges);
            graph.sources.push(outcome.source);
            graph.index.merge(outcome.index);
            file_paths.push(outcome.path);
        }
        stats.failed_files = total_files - stats.parsed_files;
        stats.duration = start.elapsed();

        synthesize_folders(env, &file_paths, &mut graph.nodes, &mut graph.edges);

        Ok((graph, stats))
    }

    fn build_file(&self, env: &GraphEnvironment, record: &FileRecord) -> Option<FileOutcome> {
        let path = record
            .path
            .strip_prefix(&env.root_path)
            .unwrap_or(&record.path)
            .to_string_lossy()
            .to_string();
        let content = match std::fs::read_to_string(&record.path) {
            Ok(c) => c,
            Err(err) => {
                warn!("failed to read {}: {}", path, err);
                return None;
            }
        };

        let file_node = Node::new(env, &path, NodeKind::File, file_name(&record.path), codegraph_core::Layer::Code)
            .with_file_uri(path.clone())
            .with_language(record.language)
            .with_content(content.clone());

        let mut nodes = vec![file_node.clone()];
        let mut edges = Vec::new();
        let mut index = DefinitionIndex::default();
        index.record_file(&path, file_node.id.clone());
        let mut definition_count = 0;

        let config = self.registry.get_config(&record.language);
        if let (Some(config), Some(mut parser)) = (config, self.registry.create_parser(&record.language)) {
            match parser.parse(&content, None) {
                Some(tree) => {
                    let mut walker = DefinitionWalker {
                        env,
                        path: &path,
                        content: &content,
                        bundle: &config.bundle,
                        nodes: &mut nodes,
                        edges: &mut edges,
                        index: &mut index,
                        definition_count: &mut definition_count,
                    };
                    walker.walk(tree.root_node(), file_node.id.clone(), NodeKind::File);
                }
                None => {
                    warn!("parse error in {}: tree-sitter returned no tree", path);
                }
            }
        } else {
            debug!("no language config for {} ({:?})", path, record.language);
        }

        Some(FileOutcome {
            path: path.clone(),
            nodes,
            edges,
            index,
            definition_count,
            source: SourceFile {
                path,
                language: record.language,
                content: Arc::from(content),
            },
        })
    }
}

struct FileOutcome {
    path: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: DefinitionIndex,
    definition_count: usize,
    source: SourceFile,
}

struct DefinitionWalker<'a> {
    env: &'a GraphEnvironment,
    path: &'a str,
    content: &'a str,
    bundle: &'a crate::languages::CapabilityBundle,
    nodes: &'a mut Vec<Node>,
    edges: &'a mut Vec<Edge>,
    index: &'a mut DefinitionIndex,
    definition_count: &'a mut usize,
}

impl<'a> DefinitionWalker<'a> {
    fn walk(&mut self, ts_node: TsNode, parent_id: String, parent_kind: NodeKind) {
        if let Some(kind) = (self.bundle.is_definition_node)(ts_node.kind()) {
            if let Some((node_id, child_kind)) = self.emit_definition(&ts_node, kind, &parent_id) {
                self.walk_children(ts_node, node_id, child_kind);
                return;
            }
        }
        self.walk_children(ts_node, parent_id, parent_kind);
    }

    fn walk_children(&mut self, ts_node: TsNode, parent_id: String, parent_kind: NodeKind) {
        let mut cursor = ts_node.walk();
        for child in ts_node.children(&mut cursor) {
            self.walk(child, parent_id.clone(), parent_kind);
        }
    }

    fn emit_definition(
        &mut self,
        ts_node: &TsNode,
        kind: NodeKind,
        parent_id: &str,
    ) -> Option<(String, NodeKind)> {
        let Some(name) = (self.bundle.identifier_locator)(ts_node, self.content) else {
            warn!(
                "identifier not found for {:?} at {}:{}",
                kind,
                self.path,
                ts_node.start_position().row + 1
            );
            return None;
        };

        let Some(body) = (self.bundle.body_locator)(ts_node).or(Some(*ts_node)) else {
            warn!(
                "body not found for {:?} {} at {}:{}",
                kind,
                name,
                self.path,
                ts_node.start_position().row + 1
            );
            return None;
        };

        let start_line = (ts_node.start_position().row + 1) as u32;
        let end_line = (ts_node.end_position().row + 1) as u32;
        let body_text = body.utf8_text(self.content.as_bytes()).unwrap_or("").to_string();

        let node = Node::new(self.env, self.path, kind, &name, codegraph_core::Layer::Code)
            .with_file_uri(self.path.to_string())
            .with_span(start_line, end_line)
            .with_parent(parent_id.to_string())
            .with_content(body_text);

        let node_id = node.id.clone();
        self.index.record(self.path, start_line, end_line, node_id.clone());
        *self.definition_count += 1;

        let edge_kind = match kind {
            NodeKind::Class => EdgeKind::ClassDefinition,
            NodeKind::Function => EdgeKind::FunctionDefinition,
            _ => EdgeKind::Contains,
        };
        self.edges
            .push(Edge::structural(edge_kind, parent_id.to_string(), node_id.clone()));

        if kind == NodeKind::Class {
            if let Some(locator) = &self.bundle.inheritance_locator {
                if let Some(rel) = locator(ts_node, self.content) {
                    debug!(
                        "{} {} inherits from {} (resolved by reference resolver)",
                        self.path, name, rel.target_name
                    );
                }
            }
        }

        self.nodes.push(node);
        Some((node_id, kind))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Groups file paths by every unique directory prefix and emits one Folder node per
/// prefix plus `CONTAINS` edges, with a single root Folder per ingest.
fn synthesize_folders(env: &GraphEnvironment, file_paths: &[String], nodes: &mut Vec<Node>, edges: &mut Vec<Edge>) {
    let root_node = Node::new(env, ".", NodeKind::Folder, ".", codegraph_core::Layer::Code).with_file_uri(".");
    let root_id = root_node.id.clone();
    nodes.push(root_node);

    let mut folder_ids: HashMap<PathBuf, String> = HashMap::new();
    let mut ordered_prefixes: Vec<PathBuf> = Vec::new();

    for path in file_paths {
        let mut current = PathBuf::from(path);
        let mut prefixes = Vec::new();
        while let Some(parent) = current.parent() {
            if parent.as_os_str().is_empty() {
                break;
            }
            prefixes.push(parent.to_path_buf());
            current = parent.to_path_buf();
        }
        prefixes.reverse();
        for prefix in prefixes {
            if !folder_ids.contains_key(&prefix) {
                ordered_prefixes.push(prefix.clone());
                folder_ids.insert(prefix, String::new());
            }
        }
    }

    for prefix in &ordered_prefixes {
        let prefix_str = prefix.to_string_lossy().to_string();
        let name = prefix
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| prefix_str.clone());
        let node = Node::new(env, &prefix_str, NodeKind::Folder, &name, codegraph_core::Layer::Code)
            .with_file_uri(prefix_str.clone());
        folder_ids.insert(prefix.clone(), node.id.clone());
        nodes.push(node);
    }

    for prefix in &ordered_prefixes {
        let parent_id = match prefix.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => folder_ids.get(parent).cloned(),
            None => Some(root_id.clone()),
        };
        if let (Some(parent_id), Some(child_id)) = (parent_id, folder_ids.get(prefix)) {
            edges.push(Edge::structural(EdgeKind::Contains, parent_id, child_id.clone()));
        }
    }

    for path in file_paths {
        let parent_id = match Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => folder_ids.get(parent).cloned(),
            None => Some(root_id.clone()),
        };
        let Some(parent_id) = parent_id else {
            continue;
        };
        let fname = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.clone());
        let file_id = codegraph_core::compute_node_id(env, path, NodeKind::File, &fname);
        edges.push(Edge::structural(EdgeKind::Contains, parent_id, file_id));
    }
}
