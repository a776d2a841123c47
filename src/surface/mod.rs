//! Rendering-surface seam.
//!
//! Abstracts the browser engine behind three commands; completion
//! notifications arrive as [`crate::events::CrawlEvent`]s on the channel the
//! surface was attached with at construction. The orchestrator issues one
//! outstanding command at a time and waits for the matching notification.

pub mod chromium;
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;

/// A script-capable page-rendering surface.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Begin navigating the live page to `url`. Completion is reported as a
    /// `NavigationFinished` event.
    async fn load_url(&self, url: &str) -> Result<()>;

    /// Run script in the current top document. Fire-and-forget; results are
    /// delivered over the console channel only.
    async fn execute_script(&self, source: &str) -> Result<()>;

    /// Fully rendered document source of the current page.
    async fn rendered_html(&self) -> Result<String>;
}
