pub mod diff;
pub mod file_collect;
pub mod language;
pub mod languages;
pub mod parser;

pub use diff::*;
pub use file_collect::*;
pub use language::*;
pub use parser::{BuildStats, DefinitionIndex, HierarchyBuilder, IngestGraph, SourceFile};
