//! Scripted in-memory surface for state-machine tests.
//!
//! Plays the role of a search site: `load_url` completes immediately with a
//! main-frame navigation event, the harvest script yields the next configured
//! link batch over the console channel, and the pagination script either
//! "navigates" (another batch remains) or reports no next page. Every command
//! is recorded for assertions.

use super::RenderSurface;
use crate::events::{self, CrawlEvent, EventSender};
use crate::scripts::RESULT_MARKER;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A command the crawler issued against the surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceCommand {
    LoadUrl(String),
    ExecuteScript(String),
    RenderedHtml,
}

impl SurfaceCommand {
    pub fn is_pagination(&self) -> bool {
        matches!(self, Self::ExecuteScript(src) if src.contains("pnnext"))
    }

    pub fn is_harvest(&self) -> bool {
        matches!(self, Self::ExecuteScript(src) if !src.contains("pnnext"))
    }
}

struct Inner {
    commands: Vec<SurfaceCommand>,
    /// One batch of links per results page, served in harvest order.
    batches: Vec<Vec<String>>,
    next_batch: usize,
    html: String,
}

enum Reply {
    Navigated(String),
    Message(String),
    None,
}

/// Command-recording mock surface. Clones share state, so a test can hand
/// one clone to the crawler and keep another for assertions.
#[derive(Clone)]
pub struct MockSurface {
    inner: Arc<Mutex<Inner>>,
    events: Option<EventSender>,
}

impl MockSurface {
    /// A surface scripted with one link batch per results page.
    pub fn new(events: EventSender, batches: Vec<Vec<String>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                commands: Vec::new(),
                batches,
                next_batch: 0,
                html: "<html><body>rendered</body></html>".to_string(),
            })),
            events: Some(events),
        }
    }

    /// A surface that acknowledges commands but never delivers any event —
    /// for exercising the stall watchdog.
    pub fn silent() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                commands: Vec::new(),
                batches: Vec::new(),
                next_batch: 0,
                html: String::new(),
            })),
            events: None,
        }
    }

    pub fn set_html(&self, html: impl Into<String>) {
        self.inner.lock().unwrap().html = html.into();
    }

    /// Everything the crawler asked the surface to do, in order.
    pub fn commands(&self) -> Vec<SurfaceCommand> {
        self.inner.lock().unwrap().commands.clone()
    }

    /// URLs passed to `load_url`, in order.
    pub fn loaded_urls(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                SurfaceCommand::LoadUrl(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn pagination_count(&self) -> usize {
        self.commands().iter().filter(|c| c.is_pagination()).count()
    }

    pub fn harvest_count(&self) -> usize {
        self.commands().iter().filter(|c| c.is_harvest()).count()
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(tx) = &self.events {
            events::emit(tx, event);
        }
    }
}

#[async_trait]
impl RenderSurface for MockSurface {
    async fn load_url(&self, url: &str) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .commands
            .push(SurfaceCommand::LoadUrl(url.to_string()));
        self.emit(CrawlEvent::NavigationFinished {
            main_frame: true,
            url: url.to_string(),
            status: 200,
        });
        Ok(())
    }

    async fn execute_script(&self, source: &str) -> Result<()> {
        let reply = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .commands
                .push(SurfaceCommand::ExecuteScript(source.to_string()));

            if self.events.is_none() {
                Reply::None
            } else if source.contains("pnnext") {
                if inner.next_batch < inner.batches.len() {
                    Reply::Navigated(format!("mock://results/{}", inner.next_batch + 1))
                } else {
                    // No next-page control left: the script reports an empty
                    // batch instead of navigating.
                    Reply::Message(format!("{RESULT_MARKER}[]"))
                }
            } else {
                let batch = inner.batches.get(inner.next_batch).cloned().unwrap_or_default();
                inner.next_batch += 1;
                let payload =
                    serde_json::to_string(&batch).unwrap_or_else(|_| "[]".to_string());
                Reply::Message(format!("{RESULT_MARKER}{payload}"))
            }
        };

        match reply {
            Reply::Navigated(url) => self.emit(CrawlEvent::NavigationFinished {
                main_frame: true,
                url,
                status: 200,
            }),
            Reply::Message(text) => self.emit(CrawlEvent::ConsoleMessage { text }),
            Reply::None => {}
        }
        Ok(())
    }

    async fn rendered_html(&self) -> Result<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.commands.push(SurfaceCommand::RenderedHtml);
        Ok(inner.html.clone())
    }
}
