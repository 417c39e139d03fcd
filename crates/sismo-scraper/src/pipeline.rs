//! Fetch → extract → persist.

use crate::config::ScraperConfig;
use crate::error::{ExtractError, FetchError, PipelineError, StoreError};
use crate::extract::extract_with_diagnostics;
use crate::fetch::Fetcher;
use crate::renderer::Renderer;
use crate::sink::{PersistMode, ReportSink};
use crate::store::{KeyValueStore, MemoryStore, SqliteStore};
use crate::types::{RawContent, SeismicReport, StoredReport, MAX_REPORTS};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Boxed store so the pipeline can run against SQLite or memory.
pub type DynStore = Box<dyn KeyValueStore>;

/// What one successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Strategy that supplied the data.
    pub strategy: &'static str,
    pub reports: Vec<SeismicReport>,
    /// Records written to the store; empty when persistence is off.
    pub stored: Vec<StoredReport>,
    /// Malformed rows skipped during extraction.
    pub skipped: usize,
}

/// The whole scrape, wired from configuration.
pub struct Pipeline {
    fetcher: Fetcher,
    sink: ReportSink<DynStore>,
    persist: PersistMode,
}

impl Pipeline {
    pub fn new(fetcher: Fetcher, store: DynStore, persist: PersistMode) -> Self {
        Self {
            fetcher,
            sink: ReportSink::new(store),
            persist,
        }
    }

    /// Build fetcher and store from `config`.
    pub fn from_config(
        config: &ScraperConfig,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, PipelineSetupError> {
        let fetcher = Fetcher::from_config(config, renderer)?;
        let store = open_store(config)?;
        Ok(Self::new(fetcher, store, config.persist))
    }

    pub fn persist_mode(&self) -> PersistMode {
        self.persist
    }

    pub fn store(&self) -> &DynStore {
        self.sink.store()
    }

    /// Strategy names in the order they will be tried.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.fetcher.strategy_names()
    }

    /// Run one scrape.
    pub async fn run(&mut self) -> Result<RunOutcome, PipelineError> {
        let fetched = self.fetcher.fetch().await?;

        let (reports, skipped) = match fetched.content {
            RawContent::Markup(markup) => {
                let extraction = extract_with_diagnostics(&markup)?;
                (extraction.reports, extraction.skipped.len())
            }
            RawContent::Records(mut records) => {
                records.truncate(MAX_REPORTS);
                if records.is_empty() {
                    return Err(ExtractError::NoRows.into());
                }
                (records, 0)
            }
        };

        let stored = self.sink.persist(self.persist, &reports)?;

        info!(
            strategy = fetched.strategy,
            reports = reports.len(),
            skipped,
            stored = stored.len(),
            persist = ?self.persist,
            "run complete"
        );

        Ok(RunOutcome {
            strategy: fetched.strategy,
            reports,
            stored,
            skipped,
        })
    }
}

/// Opens the configured store: SQLite when a path is set, memory otherwise.
pub fn open_store(config: &ScraperConfig) -> Result<DynStore, StoreError> {
    match &config.store_path {
        Some(path) => Ok(Box::new(SqliteStore::open(path, &config.table_name)?)),
        None => Ok(Box::new(MemoryStore::new())),
    }
}

/// The pipeline could not be assembled.
#[derive(thiserror::Error, Debug)]
pub enum PipelineSetupError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("cannot open store: {0}")]
    Store(#[from] StoreError),
}

impl PipelineSetupError {
    /// Error class reported in failure responses. An unusable store is a
    /// sink failure, just as a failed write is.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineSetupError::Fetch(_) => "FetchError",
            PipelineSetupError::Store(_) => "SinkError",
        }
    }
}
