//! Layered acquisition of the seismic table.
//!
//! Each way of getting the data is a [`FetchStrategy`]. The [`Fetcher`] runs
//! them in a fixed priority order: a recoverable failure is logged and the
//! next strategy runs; when all have failed the last cause is returned in a
//! terminal [`FetchError`].

pub mod api;
pub mod http_client;
pub mod rendered;
pub mod static_page;

pub use api::ApiFeed;
pub use http_client::{HttpResponse, PageClient};
pub use rendered::RenderedPage;
pub use static_page::StaticPage;

use crate::config::ScraperConfig;
use crate::error::{FetchError, StrategyError};
use crate::renderer::Renderer;
use crate::types::{Fetched, RawContent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// One concrete way of obtaining the report table.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Short name used in logs and run outcomes.
    fn name(&self) -> &'static str;
    /// Fetch once. Every error is treated as recoverable by the [`Fetcher`].
    async fn fetch(&self) -> Result<RawContent, StrategyError>;
}

/// The strategies that can be named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Plain GET of the report page.
    Static,
    /// Headless browser, waiting for the table rows.
    Rendered,
    /// Dated JSON endpoint.
    Api,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Static => "static",
            StrategyKind::Rendered => "rendered",
            StrategyKind::Api => "api",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" | "http" => Ok(StrategyKind::Static),
            "rendered" | "render" | "browser" => Ok(StrategyKind::Rendered),
            "api" | "json" => Ok(StrategyKind::Api),
            other => Err(format!(
                "unknown fetch strategy '{other}' (expected static, rendered, or api)"
            )),
        }
    }
}

/// Runs fetch strategies in priority order until one succeeds.
pub struct Fetcher {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl Fetcher {
    pub fn new(strategies: Vec<Box<dyn FetchStrategy>>) -> Self {
        Self { strategies }
    }

    /// Build the configured strategies. `renderer` backs the rendering strategy.
    pub fn from_config(
        config: &ScraperConfig,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, FetchError> {
        let client = PageClient::new(&config.http)?;

        let strategies = config
            .strategies
            .iter()
            .map(|kind| -> Box<dyn FetchStrategy> {
                match kind {
                    StrategyKind::Static => Box::new(StaticPage::new(
                        client.clone(),
                        &config.source_url,
                        config.http.require_rendered_rows,
                    )),
                    StrategyKind::Rendered => Box::new(RenderedPage::new(
                        Arc::clone(&renderer),
                        &config.source_url,
                        &config.render,
                    )),
                    StrategyKind::Api => Box::new(ApiFeed::new(client.clone(), &config.api_url)),
                }
            })
            .collect();

        Ok(Self::new(strategies))
    }

    /// Names of the strategies, in the order they will be tried.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each strategy in turn; the first success wins.
    pub async fn fetch(&self) -> Result<Fetched, FetchError> {
        let mut last: Option<(&'static str, StrategyError)> = None;

        for strategy in &self.strategies {
            let name = strategy.name();
            let start = Instant::now();
            info!(strategy = name, "fetching");

            match strategy.fetch().await {
                Ok(content) => {
                    info!(
                        strategy = name,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "fetch succeeded"
                    );
                    return Ok(Fetched {
                        strategy: name,
                        content,
                    });
                }
                Err(e) => {
                    warn!(strategy = name, error = %e, "fetch strategy failed, falling back");
                    last = Some((name, e));
                }
            }
        }

        match last {
            Some((strategy, source)) => Err(FetchError::Exhausted {
                strategy,
                attempts: self.strategies.len(),
                source,
            }),
            None => Err(FetchError::NoStrategies),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Scripted;
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_first_success_wins() {
        let (a, a_calls) = Scripted::boxed("static", || Ok(RawContent::Markup("<table>".into())));
        let (b, b_calls) = Scripted::boxed("rendered", || Err(StrategyError::Unrendered));

        let fetched = Fetcher::new(vec![a, b]).fetch().await.unwrap();
        assert_eq!(fetched.strategy, "static");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_back_after_timeout() {
        let (a, _) = Scripted::boxed("static", || Err(StrategyError::Timeout(15_000)));
        let (b, _) = Scripted::boxed("rendered", || Ok(RawContent::Markup("rendered".into())));
        let (c, c_calls) = Scripted::boxed("api", || Ok(RawContent::Records(Vec::new())));

        let fetched = Fetcher::new(vec![a, b, c]).fetch().await.unwrap();
        assert_eq!(fetched.strategy, "rendered");
        assert_eq!(fetched.content, RawContent::Markup("rendered".into()));
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_carries_last_cause() {
        let (a, _) = Scripted::boxed("static", || Err(StrategyError::Status(503)));
        let (b, _) = Scripted::boxed("rendered", || Err(StrategyError::Timeout(10_000)));
        let (c, _) = Scripted::boxed("api", || Err(StrategyError::EmptyBody));

        let err = Fetcher::new(vec![a, b, c]).fetch().await.unwrap_err();
        match err {
            FetchError::Exhausted {
                strategy,
                attempts,
                source,
            } => {
                assert_eq!(strategy, "api");
                assert_eq!(attempts, 3);
                assert!(matches!(source, StrategyError::EmptyBody));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_no_strategies() {
        let err = Fetcher::new(Vec::new()).fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::NoStrategies));
    }

    #[test]
    fn test_strategy_kind_parsing() {
        assert_eq!("Static".parse::<StrategyKind>().unwrap(), StrategyKind::Static);
        assert_eq!("browser".parse::<StrategyKind>().unwrap(), StrategyKind::Rendered);
        assert_eq!("json".parse::<StrategyKind>().unwrap(), StrategyKind::Api);
        assert!("ftp".parse::<StrategyKind>().is_err());
        assert_eq!(StrategyKind::Rendered.to_string(), "rendered");
    }
}
