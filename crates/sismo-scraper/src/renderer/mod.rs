//! Headless rendering for pages whose table is filled in by script.
//!
//! The rendering fetch strategy only needs to load a page, watch for rows to
//! appear and read the final markup. [`Renderer`] hands out one
//! [`RenderContext`] per attempt; production uses Chromium, tests a fake.

pub mod chromium;

pub use chromium::ChromiumRenderer;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Outcome of loading a page.
#[derive(Debug, Clone, Serialize)]
pub struct PageLoad {
    /// URL after redirects.
    pub final_url: String,
    pub elapsed_ms: u64,
}

/// A browser engine.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a blank page (tab).
    async fn open_page(&self) -> Result<Box<dyn RenderContext>>;
    /// Stop the engine. Safe to call when nothing was started.
    async fn shutdown(&self) -> Result<()>;
    /// Pages opened and not yet closed.
    fn open_pages(&self) -> usize;
}

/// One open page.
#[async_trait]
pub trait RenderContext: Send + Sync {
    async fn load(&mut self, url: &str, timeout_ms: u64) -> Result<PageLoad>;
    /// Number of elements currently matching a CSS selector.
    async fn count(&self, selector: &str) -> Result<usize>;
    /// Serialized DOM of the current document.
    async fn markup(&self) -> Result<String>;
    async fn close(self: Box<Self>) -> Result<()>;
}
