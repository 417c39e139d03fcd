//! Resilient scraper for the IGP seismic report table.
//!
//! A [`Pipeline`] fetches the table through an ordered list of strategies
//! (static HTTP, headless Chromium, JSON API), extracts the ten most recent
//! reports, and persists them into a key-value store.

pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod renderer;
pub mod sink;
pub mod store;
pub mod types;

pub use config::ScraperConfig;
pub use error::{
    ConfigError, ExtractError, FetchError, PipelineError, SinkError, StoreError, StrategyError,
};
pub use extract::{extract, extract_with_diagnostics, Extraction, SkippedRow};
pub use fetch::{FetchStrategy, Fetcher, StrategyKind};
pub use pipeline::{open_store, DynStore, Pipeline, PipelineSetupError, RunOutcome};
pub use renderer::{ChromiumRenderer, PageLoad, RenderContext, Renderer};
pub use sink::{parse_report_id, PersistMode, ReportSink};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
pub use types::*;
