use thiserror::Error;

/// Error kinds and their recovery policy. Most variants are recoverable: the
/// component that raised them logs and continues (the policy for each is documented
/// at its call site). `InvalidScope` and `StoreError` exhaustion are the only
/// variants that propagate out of `build()` / `incremental_update()` / a batch run.
#[derive(Error, Debug)]
pub enum CodeGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("identifier not found for {kind} at {path}")]
    IdentifierNotFound { path: String, kind: String },

    #[error("body not found for {kind} at {path}")]
    BodyNotFound { path: String, kind: String },

    #[error("LSP request timed out: {0}")]
    LspTimeout(String),

    #[error("LSP error: {0}")]
    LspError(String),

    #[error("LLM call failed: {0}")]
    LlmError(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("cycle detected among {0} nodes")]
    CycleDetected(usize),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid diff: {0}")]
    InvalidDiff(String),
}

pub type Result<T> = std::result::Result<T, CodeGraphError>;
