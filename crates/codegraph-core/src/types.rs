use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Node and edge identifiers are deterministic: the same (environment, path, kind, name)
/// always hashes to the same id, so re-ingesting unchanged source never churns the graph.
pub type NodeId = String;
pub type EdgeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Python,
    Ruby,
    Go,
    JavaScript,
    TypeScript,
    Rust,
    Java,
    Cpp,
    CSharp,
    Php,
    Swift,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "py" | "pyi" => Language::Python,
            "rb" => Language::Ruby,
            "go" => Language::Go,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "rs" => Language::Rust,
            "java" => Language::Java,
            "cc" | "cpp" | "cxx" | "hpp" | "h" | "hh" => Language::Cpp,
            "cs" => Language::CSharp,
            "php" => Language::Php,
            "swift" => Language::Swift,
            _ => Language::Unknown,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::Python => "python",
            Language::Ruby => "ruby",
            Language::Go => "go",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl FromStr for Language {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "python" => Language::Python,
            "ruby" => Language::Ruby,
            "go" => Language::Go,
            "javascript" => Language::JavaScript,
            "typescript" => Language::TypeScript,
            "rust" => Language::Rust,
            "java" => Language::Java,
            "cpp" | "c++" => Language::Cpp,
            "csharp" | "c#" => Language::CSharp,
            "php" => Language::Php,
            "swift" => Language::Swift,
            _ => Language::Unknown,
        })
    }
}

/// Node kinds from the data model. `Folder` is the only kind with no parent edge
/// at the root of a repo; every other kind has exactly one incoming structural edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Folder,
    File,
    Class,
    Function,
    Documentation,
    Workflow,
    Integration,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Folder => "FOLDER",
            NodeKind::File => "FILE",
            NodeKind::Class => "CLASS",
            NodeKind::Function => "FUNCTION",
            NodeKind::Documentation => "DOCUMENTATION",
            NodeKind::Workflow => "WORKFLOW",
            NodeKind::Integration => "INTEGRATION",
        };
        f.write_str(s)
    }
}

/// Layer tag distinguishing code structure from the overlay layers built on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Code,
    Documentation,
    Workflows,
    Integrations,
}

/// Structural, cross-reference, overlay and diff-overlay edge kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    Contains,
    FunctionDefinition,
    ClassDefinition,

    Calls,
    Imports,
    Inherits,
    Instantiates,
    Types,
    Uses,
    Assigns,

    Describes,
    BelongsToWorkflow,
    WorkflowStep,
    ModifiedBy,
    IntegrationSequence,

    DiffModified,
    DiffAdded,
    DiffDeleted,
}

impl EdgeKind {
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EdgeKind::Contains | EdgeKind::FunctionDefinition | EdgeKind::ClassDefinition
        )
    }

    pub fn is_cross_reference(&self) -> bool {
        matches!(
            self,
            EdgeKind::Calls
                | EdgeKind::Imports
                | EdgeKind::Inherits
                | EdgeKind::Instantiates
                | EdgeKind::Types
                | EdgeKind::Uses
                | EdgeKind::Assigns
        )
    }

    pub fn is_diff_overlay(&self) -> bool {
        matches!(
            self,
            EdgeKind::DiffModified | EdgeKind::DiffAdded | EdgeKind::DiffDeleted
        )
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeKind::Contains => "CONTAINS",
            EdgeKind::FunctionDefinition => "FUNCTION_DEFINITION",
            EdgeKind::ClassDefinition => "CLASS_DEFINITION",
            EdgeKind::Calls => "CALLS",
            EdgeKind::Imports => "IMPORTS",
            EdgeKind::Inherits => "INHERITS",
            EdgeKind::Instantiates => "INSTANTIATES",
            EdgeKind::Types => "TYPES",
            EdgeKind::Uses => "USES",
            EdgeKind::Assigns => "ASSIGNS",
            EdgeKind::Describes => "DESCRIBES",
            EdgeKind::BelongsToWorkflow => "BELONGS_TO_WORKFLOW",
            EdgeKind::WorkflowStep => "WORKFLOW_STEP",
            EdgeKind::ModifiedBy => "MODIFIED_BY",
            EdgeKind::IntegrationSequence => "INTEGRATION_SEQUENCE",
            EdgeKind::DiffModified => "DIFF_MODIFIED",
            EdgeKind::DiffAdded => "DIFF_ADDED",
            EdgeKind::DiffDeleted => "DIFF_DELETED",
        };
        f.write_str(s)
    }
}

/// A 1-based line/column span within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Span {
    pub fn contains(&self, other: &Span) -> bool {
        (self.start_line, self.start_column) <= (other.start_line, other.start_column)
            && (other.end_line, other.end_column) <= (self.end_line, self.end_column)
    }
}

/// A file-URI scoped source location, used for both node spans and edge source sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file_uri: String,
    pub line: u32,
    pub column: u32,
}

/// (entity_id, repo_id, root_path, environment_tag) namespaces one ingest's nodes and
/// edges. `MAIN` is the long-lived ingest; a PR overlay is a second environment with a
/// distinct tag that coexists with `MAIN` rather than replacing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEnvironment {
    pub entity_id: String,
    pub repo_id: String,
    pub root_path: String,
    pub environment_tag: String,
}

impl GraphEnvironment {
    pub const MAIN_TAG: &'static str = "MAIN";

    pub fn main(
        entity_id: impl Into<String>,
        repo_id: impl Into<String>,
        root_path: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            repo_id: repo_id.into(),
            root_path: root_path.into(),
            environment_tag: Self::MAIN_TAG.to_string(),
        }
    }

    pub fn pr_overlay(
        entity_id: impl Into<String>,
        repo_id: impl Into<String>,
        root_path: impl Into<String>,
        pr_tag: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            repo_id: repo_id.into(),
            root_path: root_path.into(),
            environment_tag: pr_tag.into(),
        }
    }

    pub fn is_main(&self) -> bool {
        self.environment_tag == Self::MAIN_TAG
    }
}

/// Deterministic node id: sha256((entity_id, repo_id, environment_tag, path, kind, name)),
/// truncated to the first 32 hex characters. Re-hashing identical inputs always yields
/// the same id.
pub fn compute_node_id(env: &GraphEnvironment, path: &str, kind: NodeKind, name: &str) -> NodeId {
    let mut hasher = Sha256::new();
    hasher.update(env.entity_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(env.repo_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(env.environment_tag.as_bytes());
    hasher.update(b"\0");
    hasher.update(path.as_bytes());
    hasher.update(b"\0");
    hasher.update(kind.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 32)
}

/// Deterministic edge id: sha256((source, edge kind, target, disambiguator)), truncated
/// to 32 hex characters, so re-emitting the same edge never creates a duplicate.
pub fn compute_edge_id(
    source: &NodeId,
    kind: EdgeKind,
    target: &NodeId,
    disambiguator: &str,
) -> EdgeId {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b"\0");
    hasher.update(kind.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(target.as_bytes());
    hasher.update(b"\0");
    hasher.update(disambiguator.as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 32)
}

fn hex_prefix(digest: &[u8], len: usize) -> String {
    let mut s = String::with_capacity(len);
    for byte in digest {
        if s.len() >= len {
            break;
        }
        s.push_str(&format!("{:02x}", byte));
    }
    s.truncate(len);
    s
}

/// Bottom-up batch processor state machine: unset -> pending -> in_progress -> completed.
/// `cycle_member` is tracked separately on the node, not as a fifth status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Unset,
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessingStatus::Unset => "unset",
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::InProgress => "in_progress",
            ProcessingStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}
