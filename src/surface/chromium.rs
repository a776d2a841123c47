//! Chromium-backed rendering surface using chromiumoxide.

use super::RenderSurface;
use crate::events::{self, CrawlEvent, EventSender};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::EventFrameStoppedLoading;
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use tracing::debug;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. FORAGER_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("FORAGER_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common install locations
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }
    if let Some(home) = dirs::home_dir() {
        let local = home.join(".local/share/chromium/chrome");
        if local.exists() {
            return Some(local);
        }
    }

    None
}

/// Headless Chromium surface.
///
/// Owns the browser and its single live page. CDP notifications are
/// forwarded into the crawl event channel by background tasks; the page's
/// own console logging is never suppressed.
pub struct ChromiumSurface {
    browser: Browser,
    page: Page,
}

impl ChromiumSurface {
    /// Launch headless Chromium and attach its notifications to `events`.
    pub async fn launch(chromium_path: Option<PathBuf>, events: EventSender) -> Result<Self> {
        let chrome_path = chromium_path.or_else(find_chromium).context(
            "Chromium not found. Set FORAGER_CHROMIUM_PATH or install google-chrome.",
        )?;
        debug!("launching {}", chrome_path.display());

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .window_size(1280, 800)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Drain the CDP handler for the life of the browser.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to create page")?;

        forward_navigation(&page, events.clone()).await?;
        forward_console(&page, events).await?;

        Ok(Self { browser, page })
    }

    /// Tear the browser down. Waiting for the child to exit prevents an
    /// orphaned renderer process.
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.browser.close().await;
        let _ = self.browser.wait().await;
        Ok(())
    }
}

/// Forward frame-load completions, discriminating the top-level document
/// from subframes. Subframe completions are still forwarded; the state
/// machine drops them by the `main_frame` flag.
async fn forward_navigation(page: &Page, tx: EventSender) -> Result<()> {
    let mut frames = page
        .event_listener::<EventFrameStoppedLoading>()
        .await
        .context("failed to subscribe to frame events")?;
    let page = page.clone();
    tokio::spawn(async move {
        while let Some(ev) = frames.next().await {
            let main_frame = match page.mainframe().await {
                Ok(Some(id)) => id == ev.frame_id,
                _ => false,
            };
            let url = page.url().await.ok().flatten().unwrap_or_default();
            // The blank page every surface starts on is not a navigation the
            // machine asked for.
            if url.is_empty() || url == "about:blank" {
                continue;
            }
            // chromiumoxide doesn't cheaply expose the document status; the
            // state machine never branches on it.
            events::emit(
                &tx,
                CrawlEvent::NavigationFinished {
                    main_frame,
                    url,
                    status: 200,
                },
            );
        }
    });
    Ok(())
}

/// Forward console API calls whose first argument is a string.
async fn forward_console(page: &Page, tx: EventSender) -> Result<()> {
    let mut calls = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .context("failed to subscribe to console events")?;
    tokio::spawn(async move {
        while let Some(ev) = calls.next().await {
            if let Some(text) = first_string_arg(&ev) {
                debug!("console: {text}");
                events::emit(&tx, CrawlEvent::ConsoleMessage { text });
            }
        }
    });
    Ok(())
}

fn first_string_arg(ev: &EventConsoleApiCalled) -> Option<String> {
    ev.args
        .first()
        .and_then(|arg| arg.value.as_ref())
        .and_then(|v| v.as_str())
        .map(String::from)
}

#[async_trait]
impl RenderSurface for ChromiumSurface {
    async fn load_url(&self, url: &str) -> Result<()> {
        self.page.goto(url).await.context("navigation failed")?;
        Ok(())
    }

    async fn execute_script(&self, source: &str) -> Result<()> {
        self.page
            .evaluate(source)
            .await
            .context("script injection failed")?;
        Ok(())
    }

    async fn rendered_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get rendered HTML")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))
    }
}
