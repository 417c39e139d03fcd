//! Error types for every pipeline stage.
//!
//! `StrategyError` is the only recoverable kind: the fetcher logs it and
//! moves on to the next strategy. Everything else is terminal for the
//! invocation and ends up in a failure response.

/// A single fetch strategy failed. Recoverable: the next strategy runs.
#[derive(thiserror::Error, Debug)]
pub enum StrategyError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("page has no populated table rows")]
    Unrendered,

    #[error("renderer error: {0}")]
    Render(String),

    #[error("empty response body")]
    EmptyBody,

    #[error("response is not JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("JSON payload is not a sequence")]
    NotASequence,
}

/// All fetch strategies were exhausted.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("no fetch strategies configured")]
    NoStrategies,

    #[error("all {attempts} fetch strategies failed; last ({strategy}): {source}")]
    Exhausted {
        strategy: &'static str,
        attempts: usize,
        #[source]
        source: StrategyError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid {name} header value {value:?}")]
    InvalidHeader { name: &'static str, value: String },
}

/// The expected table structure is missing or empty.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no table")]
    NoTable,

    #[error("no body")]
    NoBody,

    #[error("no rows")]
    NoRows,
}

/// A key-value store call failed.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid table name: {0:?}")]
    InvalidTable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A batch write was abandoned part way.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("failed to scan stored records: {0}")]
    Scan(#[source] StoreError),

    #[error("failed to delete record {id}: {source}")]
    Delete {
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to write record {id}: {source}")]
    Put {
        id: String,
        #[source]
        source: StoreError,
    },
}

impl SinkError {
    /// Identifier of the record whose write or delete failed, if any.
    pub fn failed_id(&self) -> Option<&str> {
        match self {
            SinkError::Scan(_) => None,
            SinkError::Delete { id, .. } | SinkError::Put { id, .. } => Some(id),
        }
    }
}

/// Terminal failure of one pipeline run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl PipelineError {
    /// Stable name of the error class, used in failure responses.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Fetch(_) => "FetchError",
            PipelineError::Extract(_) => "ExtractError",
            PipelineError::Sink(_) => "SinkError",
        }
    }
}

/// Configuration could not be loaded or is inconsistent.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
