// ABOUTME: Depth-first file iterator. Applies name/extension skip lists plus an
// ABOUTME: optional `.blarignore` glob file and yields (path, language) records.
use crate::language::LanguageRegistry;
use codegraph_core::{Language, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{Walk, WalkBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DEFAULT_NAME_SKIPS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "coverage",
    "__pycache__",
    ".pytest_cache",
    ".codegraph",
];

/// One file the iterator has decided is worth parsing, with its detected language.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: PathBuf,
    pub language: Language,
}

/// Lazily walks a root path depth-first, filtering by name-skip list, the
/// registry's known extensions, and an optional `.blarignore` globset. Not
/// restartable: once consumed, build a new one to walk again.
pub struct FileIterator<'a> {
    walker: Walk,
    registry: &'a LanguageRegistry,
    ignore_globs: Option<GlobSet>,
    root: PathBuf,
}

impl<'a> FileIterator<'a> {
    pub fn new(root: &Path, registry: &'a LanguageRegistry, ignore_file_name: &str) -> Result<Self> {
        let ignore_globs = load_ignore_globs(root, ignore_file_name)?;

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .ignore(true)
            .filter_entry(|entry| {
                !DEFAULT_NAME_SKIPS
                    .iter()
                    .any(|skip| entry.file_name() == std::ffi::OsStr::new(skip))
            });

        Ok(Self {
            walker: builder.build(),
            registry,
            ignore_globs,
            root: root.to_path_buf(),
        })
    }
}

impl<'a> Iterator for FileIterator<'a> {
    type Item = FileRecord;

    fn next(&mut self) -> Option<FileRecord> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("file walk error: {}", err);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            if let Some(ref globs) = self.ignore_globs {
                let relative = path.strip_prefix(&self.root).unwrap_or(path);
                if globs.is_match(relative) || globs.is_match(path) {
                    continue;
                }
            }

            let Some(language) = self.registry.detect_language(&path.to_string_lossy()) else {
                continue;
            };

            return Some(FileRecord {
                path: path.to_path_buf(),
                language,
            });
        }
    }
}

fn load_ignore_globs(root: &Path, ignore_file_name: &str) -> Result<Option<GlobSet>> {
    let ignore_path = root.join(ignore_file_name);
    if !ignore_path.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&ignore_path)?;
    let mut builder = GlobSetBuilder::new();
    let mut added = false;

    for line in content.lines() {
        let pattern = line.trim();
        if pattern.is_empty() || pattern.starts_with('#') {
            continue;
        }
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
                added = true;
            }
            Err(err) => warn!("invalid glob '{}' in {}: {}", pattern, ignore_file_name, err),
        }
    }

    debug!("loaded {} ignore pattern(s) from {}", content.lines().count(), ignore_file_name);

    if added {
        let set = builder
            .build()
            .map_err(|err| codegraph_core::CodeGraphError::Configuration(err.to_string()))?;
        Ok(Some(set))
    } else {
        Ok(None)
    }
}
