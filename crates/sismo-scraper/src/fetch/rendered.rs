//! Strategy B: render the page in a headless browser.
//!
//! The table on the live page is filled in by script, so the strategy polls
//! for body rows before capturing the markup. The browser context is closed
//! before `fetch` returns, whatever the outcome.

use super::FetchStrategy;
use crate::config::RenderSettings;
use crate::error::StrategyError;
use crate::renderer::{RenderContext, Renderer};
use crate::types::RawContent;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Body cells in the fifth column; a placeholder row spanning the table has none.
const ROW_SELECTOR: &str = "table tbody tr > td:nth-child(5)";

/// Renders the report page and returns the populated markup.
pub struct RenderedPage {
    renderer: Arc<dyn Renderer>,
    url: String,
    navigation_timeout_ms: u64,
    wait_timeout_ms: u64,
    poll_interval: Duration,
    settle: Duration,
}

impl RenderedPage {
    pub fn new(renderer: Arc<dyn Renderer>, url: &str, settings: &RenderSettings) -> Self {
        Self {
            renderer,
            url: url.to_string(),
            navigation_timeout_ms: settings.navigation_timeout_ms,
            wait_timeout_ms: settings.wait_timeout_ms,
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(10)),
            settle: Duration::from_millis(settings.settle_ms),
        }
    }

    async fn capture(&self, ctx: &mut dyn RenderContext) -> Result<String, StrategyError> {
        let loaded = ctx
            .load(&self.url, self.navigation_timeout_ms)
            .await
            .map_err(render_error)?;
        debug!(url = %loaded.final_url, load_ms = loaded.elapsed_ms, "page loaded");

        self.wait_for_rows(ctx).await?;

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        ctx.markup().await.map_err(render_error)
    }

    async fn wait_for_rows(&self, ctx: &dyn RenderContext) -> Result<(), StrategyError> {
        let deadline = Instant::now() + Duration::from_millis(self.wait_timeout_ms);

        loop {
            let rows = ctx.count(ROW_SELECTOR).await.map_err(render_error)?;
            if rows > 0 {
                debug!(rows, "table rows present");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(StrategyError::Timeout(self.wait_timeout_ms));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn render_error(e: anyhow::Error) -> StrategyError {
    StrategyError::Render(format!("{e:#}"))
}

#[async_trait]
impl FetchStrategy for RenderedPage {
    fn name(&self) -> &'static str {
        "rendered"
    }

    async fn fetch(&self) -> Result<RawContent, StrategyError> {
        let mut ctx = self.renderer.open_page().await.map_err(render_error)?;

        let result = self.capture(ctx.as_mut()).await;

        if let Err(e) = ctx.close().await {
            warn!(error = %e, "failed to close render context");
        }

        result.map(RawContent::Markup)
    }
}
