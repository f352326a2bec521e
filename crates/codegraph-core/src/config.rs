use crate::{CodeGraphError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Logging configuration. `filter` is an `EnvFilter` directive string
/// (e.g. `"codegraph=debug,info"`); `json` switches the subscriber to the
/// structured JSON formatter for shipping logs to an aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: Self::default_filter(),
            json: false,
        }
    }
}

/// Installs the global `tracing` subscriber. Call once per process, before the
/// language registry or LSP coordinator pool is constructed.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if config.json {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

/// Where to find a per-language LSP server binary and how to launch it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LspServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "LspServerConfig::default_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl LspServerConfig {
    fn default_timeout_ms() -> u64 {
        5_000
    }
}

/// Bottom-up batch processor tuning: worker count and the bounds used by cycle
/// detection and workflow-discovery traversal.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchProcessorConfig {
    #[serde(default = "BatchProcessorConfig::default_workers")]
    pub workers: usize,
    #[serde(default = "BatchProcessorConfig::default_fetch_batch_size")]
    pub fetch_batch_size: usize,
    #[serde(default = "BatchProcessorConfig::default_workflow_depth")]
    pub workflow_discovery_max_depth: u32,
}

impl BatchProcessorConfig {
    fn default_workers() -> usize {
        num_cpus::get().max(1)
    }

    fn default_fetch_batch_size() -> usize {
        16
    }

    fn default_workflow_depth() -> u32 {
        6
    }
}

impl Default for BatchProcessorConfig {
    fn default() -> Self {
        Self {
            workers: Self::default_workers(),
            fetch_batch_size: Self::default_fetch_batch_size(),
            workflow_discovery_max_depth: Self::default_workflow_depth(),
        }
    }
}

/// Store retry policy for recoverable `StoreError`s: exponential backoff up to a cap,
/// then the ingest aborts and returns a structured result naming the failing batch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreRetryConfig {
    #[serde(default = "StoreRetryConfig::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "StoreRetryConfig::default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "StoreRetryConfig::default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl StoreRetryConfig {
    fn default_max_attempts() -> u32 {
        5
    }
    fn default_base_delay_ms() -> u64 {
        100
    }
    fn default_max_delay_ms() -> u64 {
        5_000
    }
}

impl Default for StoreRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            base_delay_ms: Self::default_base_delay_ms(),
            max_delay_ms: Self::default_max_delay_ms(),
        }
    }
}

/// Root configuration for one ingest process. Threaded explicitly through
/// constructors rather than read from a process-wide singleton, except for the
/// language registry and LSP coordinator pool which the spec's design notes
/// single out as having their own explicit process lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IngestConfig {
    pub entity_id: String,
    pub repo_id: String,
    pub root_path: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub batch_processor: BatchProcessorConfig,
    #[serde(default)]
    pub store_retry: StoreRetryConfig,
    #[serde(default)]
    pub lsp_servers: HashMap<String, LspServerConfig>,
    #[serde(default)]
    pub ignore_file_name: Option<String>,
}

impl IngestConfig {
    pub const DEFAULT_IGNORE_FILE: &'static str = ".blarignore";

    /// Loads configuration via the `config` crate: defaults, then an optional
    /// `codegraph.toml`/`.yaml`/`.json` in the current directory, then
    /// `CODEGRAPH_`-prefixed environment variables, in that precedence order.
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("codegraph").required(false))
            .add_source(config::Environment::with_prefix("CODEGRAPH").separator("__"));

        let settled = builder
            .build()
            .map_err(|e| CodeGraphError::Configuration(e.to_string()))?;

        settled
            .try_deserialize()
            .map_err(|e| CodeGraphError::Configuration(e.to_string()))
    }

    pub fn ignore_file_name(&self) -> &str {
        self.ignore_file_name
            .as_deref()
            .unwrap_or(Self::DEFAULT_IGNORE_FILE)
    }
}
