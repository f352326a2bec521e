// ABOUTME: Diff Engine. Classifies file-level changes, parses unified-diff hunk
// ABOUTME: headers into line intervals, and tags definition nodes with DIFF_* markers
// ABOUTME: for the PR overlay environment.
use codegraph_core::{CodeGraphError, Edge, EdgeKind, GraphEnvironment, Node, Result};
use regex::Regex;
use similar::TextDiff;
use std::ops::RangeInclusive;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

/// One file entry in a PR's change set, carrying its raw unified diff text.
#[derive(Debug, Clone)]
pub struct FileDiff {
    pub file_uri: String,
    pub change_type: ChangeType,
    pub unified_diff: String,
}

/// A prior node snapshot used for definition-granularity tagging: the node it
/// describes (keyed by `{file_uri}::{name}`) and the source text it had before.
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    pub node_path: String,
    pub source_text: String,
}

pub fn snapshot_key(file_uri: &str, name: &str) -> String {
    format!("{}::{}", file_uri, name)
}

/// A `@@ -old_start,old_len +new_start,new_len @@` hunk header, 1-based inclusive.
#[derive(Debug, Clone, Copy)]
pub struct Hunk {
    pub old_start: u32,
    pub old_len: u32,
    pub new_start: u32,
    pub new_len: u32,
}

impl Hunk {
    pub fn new_range(&self) -> RangeInclusive<u32> {
        let len = self.new_len.max(1);
        self.new_start..=(self.new_start + len - 1)
    }

    pub fn old_range(&self) -> RangeInclusive<u32> {
        let len = self.old_len.max(1);
        self.old_start..=(self.old_start + len - 1)
    }
}

/// Parses every `@@ ... @@` header in a unified diff into its line intervals.
/// `old_len`/`new_len` default to 1 when the diff omits the comma form.
pub fn parse_hunks(diff_text: &str) -> Result<Vec<Hunk>> {
    let header = Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@")
        .map_err(|err| CodeGraphError::InvalidDiff(err.to_string()))?;

    let mut hunks = Vec::new();
    for line in diff_text.lines() {
        let Some(caps) = header.captures(line) else {
            continue;
        };
        let old_start: u32 = caps[1].parse().unwrap_or(0);
        let old_len: u32 = caps.get(2).map(|m| m.as_str().parse().unwrap_or(1)).unwrap_or(1);
        let new_start: u32 = caps[3].parse().unwrap_or(0);
        let new_len: u32 = caps.get(4).map(|m| m.as_str().parse().unwrap_or(1)).unwrap_or(1);
        hunks.push(Hunk {
            old_start,
            old_len,
            new_start,
            new_len,
        });
    }
    Ok(hunks)
}

/// Phase A: ADDED/MODIFIED files are scheduled for re-parse; DELETED files produce
/// no re-parse work, only `DIFF_DELETED` markers on the nodes that already exist.
pub struct ClassifiedFiles<'a> {
    pub to_reparse: Vec<&'a FileDiff>,
    pub deleted: Vec<&'a FileDiff>,
}

pub fn classify_files(diffs: &[FileDiff]) -> ClassifiedFiles<'_> {
    let mut to_reparse = Vec::new();
    let mut deleted = Vec::new();
    for diff in diffs {
        match diff.change_type {
            ChangeType::Added | ChangeType::Modified => to_reparse.push(diff),
            ChangeType::Deleted => deleted.push(diff),
        }
    }
    ClassifiedFiles { to_reparse, deleted }
}

/// Phase B without prior snapshots: every definition node in `file_diff`'s file whose
/// new-span intersects a hunk's add interval gets `DIFF_MODIFIED`; a wholly new file's
/// File node gets `DIFF_ADDED` instead of per-definition tagging.
pub fn tag_file_level(env: &GraphEnvironment, file_diff: &FileDiff, hunks: &[Hunk], file_node: &Node, definitions: &[Node]) -> Vec<Edge> {
    if file_diff.change_type == ChangeType::Added {
        debug!("tagging {} DIFF_ADDED (new file)", file_diff.file_uri);
        return vec![Edge::diff_overlay(EdgeKind::DiffAdded, file_node.id.clone(), file_node.id.clone())];
    }

    let mut edges = Vec::new();
    for def in definitions {
        let (Some(start), Some(end)) = (def.start_line, def.end_line) else {
            continue;
        };
        let intersects = hunks.iter().any(|hunk| {
            let range = hunk.new_range();
            *range.start() <= end && start <= *range.end()
        });
        if intersects {
            edges.push(Edge::diff_overlay(EdgeKind::DiffModified, def.id.clone(), def.id.clone()));
        }
    }
    edges
}

/// Phase B with prior snapshots: diffs each snapshot's old body text against the
/// matching new definition's current content; only definitions whose text actually
/// changed are tagged, leaving unchanged siblings untouched.
pub fn tag_with_snapshots(snapshots: &[SourceSnapshot], new_definitions: &[Node]) -> Vec<Edge> {
    let mut edges = Vec::new();
    for def in new_definitions {
        let Some(file_uri) = &def.file_uri else { continue };
        let key = snapshot_key(file_uri, def.name.as_str());
        let Some(snapshot) = snapshots.iter().find(|s| s.node_path == key) else {
            continue;
        };
        let new_text = def.content.as_deref().unwrap_or("");
        let diff = TextDiff::from_lines(&snapshot.source_text, new_text);
        if diff.ratio() < 1.0 {
            edges.push(Edge::diff_overlay(EdgeKind::DiffModified, def.id.clone(), def.id.clone()));
        }
    }
    edges
}

/// Tags every node that already exists for a deleted file's path with `DIFF_DELETED`.
/// These nodes participate only as edge targets from old-graph references; they are
/// not removed from the PR environment, only marked.
pub fn tag_deleted(existing_node_ids: &[String]) -> Vec<Edge> {
    existing_node_ids
        .iter()
        .map(|id| Edge::diff_overlay(EdgeKind::DiffDeleted, id.clone(), id.clone()))
        .collect()
}
