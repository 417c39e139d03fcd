//! Structured invocation results.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sismo_scraper::{
    Pipeline, PipelineError, PipelineSetupError, Renderer, RunOutcome, ScraperConfig,
};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const STATUS_OK: u16 = 200;
pub const STATUS_ERROR: u16 = 500;

const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// Response returned to whoever triggered the scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// JSON-encoded document.
    pub body: String,
}

impl InvocationResponse {
    fn json(status_code: u16, body: &Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string());
        Self {
            status_code,
            headers,
            body: body.to_string(),
        }
    }

    /// 200 with the stored items, or the extracted reports when nothing was stored.
    pub fn success(outcome: &RunOutcome) -> Self {
        let body = if outcome.stored.is_empty() {
            json!(outcome.reports)
        } else {
            json!(outcome.stored)
        };
        Self::json(STATUS_OK, &body)
    }

    /// 500 with `{error, type, message}`.
    pub fn failure(err: &PipelineError) -> Self {
        Self::error(err.kind(), err)
    }

    /// 500 for a pipeline that could not be assembled, e.g. an unusable store.
    pub fn setup_failure(err: &PipelineSetupError) -> Self {
        Self::error(err.kind(), err)
    }

    fn error(kind: &str, err: &dyn std::fmt::Display) -> Self {
        Self::json(
            STATUS_ERROR,
            &json!({
                "error": "scrape failed",
                "type": kind,
                "message": err.to_string(),
            }),
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Body parsed back into JSON.
    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}

/// Run the pipeline for one invocation.
///
/// `event` and `context` describe the trigger; they are logged but do not
/// influence the scrape.
pub async fn handle(
    event: &Value,
    context: &Value,
    pipeline: &mut Pipeline,
) -> InvocationResponse {
    tracing::debug!(%event, %context, "invocation received");

    match pipeline.run().await {
        Ok(outcome) => {
            tracing::info!(
                strategy = outcome.strategy,
                reports = outcome.reports.len(),
                "invocation succeeded"
            );
            InvocationResponse::success(&outcome)
        }
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "invocation failed");
            InvocationResponse::failure(&e)
        }
    }
}

/// Build the pipeline from `config` and run one invocation.
///
/// Setup failures (HTTP client, store) come back as a 500 response like any
/// other failed scrape.
pub async fn invoke(
    event: &Value,
    context: &Value,
    config: &ScraperConfig,
    renderer: Arc<dyn Renderer>,
) -> InvocationResponse {
    let mut pipeline = match Pipeline::from_config(config, renderer) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "pipeline setup failed");
            return InvocationResponse::setup_failure(&e);
        }
    };

    tracing::info!(
        strategies = ?pipeline.strategy_names(),
        persist = ?pipeline.persist_mode(),
        store = ?config.store_path,
        "starting run"
    );
    handle(event, context, &mut pipeline).await
}
