//! Persistence policies on top of a [`KeyValueStore`].
//!
//! Two write patterns are offered:
//!
//! - **replace-all**: wipe whatever is stored, then insert the new batch under
//!   fresh UUIDs. Not atomic; a crash in between can leave the table empty or
//!   half filled.
//! - **upsert**: key each record by the code parsed out of `report_code`
//!   (`2025-0111` for `IGP/CENSIS/RS 2025-0111`) and overwrite in place.
//!   Re-running with the same input leaves the same stored state.
//!
//! The first failing call aborts the rest of the batch.

use crate::error::SinkError;
use crate::store::KeyValueStore;
use crate::types::{SeismicReport, StoredReport};
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info};

static REPORT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*-\s*(\d{1,6})").expect("report code regex"));

/// How a pipeline run persists its reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistMode {
    /// Overwrite by report code; older reports stay in the store.
    #[default]
    Upsert,
    /// Delete everything, then insert the new batch.
    Replace,
    /// Do not touch the store.
    Off,
}

impl std::str::FromStr for PersistMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upsert" => Ok(PersistMode::Upsert),
            "replace" | "replace_all" | "replace-all" => Ok(PersistMode::Replace),
            "off" | "none" => Ok(PersistMode::Off),
            other => Err(format!(
                "unknown persist mode '{other}' (expected upsert, replace, or off)"
            )),
        }
    }
}

/// Stable identifier for a report: the `YYYY-NNNN` code when present.
pub fn parse_report_id(report_code: &str) -> Option<String> {
    REPORT_CODE
        .captures(report_code)
        .map(|caps| format!("{}-{}", &caps[1], &caps[2]))
}

/// Time-based token for reports whose code cannot be parsed.
fn fallback_id(index: usize) -> String {
    format!("t{}-{index:02}", Utc::now().format("%Y%m%d%H%M%S%6f"))
}

/// Writes report batches into a key-value store.
pub struct ReportSink<S> {
    store: S,
}

impl<S: KeyValueStore> ReportSink<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist `reports` according to `mode`. `Off` writes nothing and returns an empty list.
    pub fn persist(
        &mut self,
        mode: PersistMode,
        reports: &[SeismicReport],
    ) -> Result<Vec<StoredReport>, SinkError> {
        match mode {
            PersistMode::Upsert => self.upsert(reports),
            PersistMode::Replace => self.replace_all(reports),
            PersistMode::Off => Ok(Vec::new()),
        }
    }

    /// Delete every stored record, then insert `reports` under fresh UUIDs.
    pub fn replace_all(
        &mut self,
        reports: &[SeismicReport],
    ) -> Result<Vec<StoredReport>, SinkError> {
        let existing = self.store.scan().map_err(SinkError::Scan)?;
        for item in &existing {
            self.store
                .delete(&item.id)
                .map_err(|source| SinkError::Delete {
                    id: item.id.clone(),
                    source,
                })?;
        }
        debug!(deleted = existing.len(), "cleared stored reports");

        let items: Vec<StoredReport> = reports
            .iter()
            .enumerate()
            .map(|(i, r)| {
                StoredReport::new(uuid::Uuid::new_v4().to_string(), i as u32 + 1, r.clone())
            })
            .collect();
        self.write_all(&items)?;

        info!(
            deleted = existing.len(),
            inserted = items.len(),
            "replaced stored reports"
        );
        Ok(items)
    }

    /// Write each report under its parsed code, overwriting prior records with that id.
    pub fn upsert(&mut self, reports: &[SeismicReport]) -> Result<Vec<StoredReport>, SinkError> {
        let items: Vec<StoredReport> = reports
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let id = parse_report_id(&r.report_code).unwrap_or_else(|| fallback_id(i));
                StoredReport::new(id, i as u32 + 1, r.clone())
            })
            .collect();
        self.write_all(&items)?;

        info!(upserted = items.len(), "upserted reports");
        Ok(items)
    }

    fn write_all(&mut self, items: &[StoredReport]) -> Result<(), SinkError> {
        for item in items {
            self.store.put(item).map_err(|source| SinkError::Put {
                id: item.id.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
