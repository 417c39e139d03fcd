//! Chromium-based renderer using chromiumoxide.
//!
//! The browser process is launched on the first `open_page` call, so a run
//! that never reaches the rendering strategy never starts Chromium.

use super::{PageLoad, RenderContext, Renderer};
use crate::config::RenderSettings;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. configured path
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }

    // 2. SISMO_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("SISMO_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 3. System PATH
    for name in [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

struct LaunchedBrowser {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    settings: RenderSettings,
    browser: Mutex<Option<LaunchedBrowser>>,
    open: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Create a renderer. Chromium itself starts on first use.
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            browser: Mutex::new(None),
            open: Arc::new(AtomicUsize::new(0)),
        }
    }

    async fn launch(&self) -> Result<LaunchedBrowser> {
        let chrome_path = find_chromium(self.settings.chromium_path.as_deref()).context(
            "Chromium not found. Set SISMO_CHROMIUM_PATH or render.chromium_path.",
        )?;

        let (width, height) = (self.settings.viewport_width, self.settings.viewport_height);
        let config = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", self.settings.user_agent))
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                ..Viewport::default()
            })
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        info!(path = %chrome_path.display(), "launched headless Chromium");
        Ok(LaunchedBrowser {
            browser,
            handler_task,
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn open_page(&self) -> Result<Box<dyn RenderContext>> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let Some(launched) = guard.as_ref() else {
            bail!("browser not available");
        };

        let page = launched
            .browser
            .new_page("about:blank")
            .await
            .context("failed to open page")?;

        self.open.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(ChromiumPage {
            page,
            open: Arc::clone(&self.open),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let Some(mut launched) = self.browser.lock().await.take() else {
            return Ok(());
        };

        let closed = launched.browser.close().await;
        let _ = launched.browser.wait().await;
        launched.handler_task.abort();
        closed.context("failed to close Chromium")?;

        debug!("Chromium shut down");
        Ok(())
    }

    fn open_pages(&self) -> usize {
        self.open.load(Ordering::Relaxed)
    }
}

/// A Chromium tab.
pub struct ChromiumPage {
    page: Page,
    open: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumPage {
    async fn load(&mut self, url: &str, timeout_ms: u64) -> Result<PageLoad> {
        let start = Instant::now();

        match tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }

        let final_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        Ok(PageLoad {
            final_url,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let found = self
            .page
            .find_elements(selector)
            .await
            .with_context(|| format!("querying {selector:?} failed"))?;
        Ok(found.len())
    }

    async fn markup(&self) -> Result<String> {
        self.page.content().await.context("failed to read page content")
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.open.fetch_sub(1, Ordering::Relaxed);
        self.page.close().await.context("failed to close page")?;
        Ok(())
    }
}
