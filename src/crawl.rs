// Copyright 2026 Forager Contributors
// SPDX-License-Identifier: Apache-2.0

//! Crawl state machine.
//!
//! Drives the two-phase harvest: collect organic result links across a
//! bounded number of search pages, then visit each link and persist its
//! rendered HTML. The machine issues one outstanding surface command at a
//! time and performs no further action until the corresponding event arrives
//! on the channel, so there is never a concurrent navigation or injection.

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::events::{self, CrawlEvent, EventReceiver, EventSender};
use crate::extract;
use crate::scripts;
use crate::store::PageStore;
use crate::surface::RenderSurface;

/// Which half of the harvest the machine is in. Transitions are monotonic:
/// once link visiting starts, the machine never returns to collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrawlPhase {
    SearchCollection,
    ContentExtraction,
}

/// End-of-run summary.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CrawlReport {
    /// Result pages whose extraction message was processed.
    pub pages_scanned: u32,
    /// Links in the queue when collection ended (duplicates included).
    pub links_collected: usize,
    /// Visits that produced a written output file.
    pub pages_saved: usize,
    /// Visits whose write failed (still counted as completed).
    pub write_failures: usize,
    /// Queue entries skipped for pointing back at the search host.
    pub links_skipped: usize,
}

enum Flow {
    Continue,
    Done,
}

/// The orchestrator. Owns the surface handle, the content sink, and all
/// crawl state; every field is touched only from the event loop.
pub struct Crawler<S: RenderSurface> {
    surface: S,
    store: PageStore,
    config: CrawlConfig,
    /// Handle for self-notifications (content-saved completions).
    events_tx: EventSender,
    phase: CrawlPhase,
    pages_visited: u32,
    links: Vec<String>,
    cursor: usize,
    report: CrawlReport,
}

impl<S: RenderSurface> Crawler<S> {
    pub fn new(surface: S, store: PageStore, config: CrawlConfig, events_tx: EventSender) -> Self {
        Self {
            surface,
            store,
            config,
            events_tx,
            phase: CrawlPhase::SearchCollection,
            pages_visited: 0,
            links: Vec::new(),
            cursor: 0,
            report: CrawlReport::default(),
        }
    }

    /// Run the harvest to completion, consuming events from `rx`.
    pub async fn run(&mut self, mut rx: EventReceiver) -> Result<CrawlReport> {
        let target = self.config.search_url()?;
        info!("starting search collection: {target}");
        self.surface.load_url(&target).await.map_err(session_fault)?;

        self.event_loop(&mut rx).await?;

        info!(
            "harvest complete: {} result pages scanned, {} links collected, {} saved, {} skipped",
            self.report.pages_scanned,
            self.report.links_collected,
            self.report.pages_saved,
            self.report.links_skipped
        );
        Ok(self.report.clone())
    }

    /// Give the surface back for explicit teardown after a run.
    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Consume events until the machine reaches its terminal state. Each wait
    /// is bounded by the configured watchdog timeout; expiry is fatal.
    async fn event_loop(&mut self, rx: &mut EventReceiver) -> Result<()> {
        loop {
            let event = match tokio::time::timeout(self.config.event_timeout, rx.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    return Err(CrawlError::Session("event channel closed".into()).into());
                }
                Err(_) => return Err(CrawlError::Stalled(self.config.event_timeout).into()),
            };
            if let Flow::Done = self.handle(event).await? {
                return Ok(());
            }
        }
    }

    async fn handle(&mut self, event: CrawlEvent) -> Result<Flow> {
        match (self.phase, event) {
            // Subframe and sub-resource loads must not drive the machine;
            // reacting to them would re-inject scripts mid-page.
            (_, CrawlEvent::NavigationFinished { main_frame: false, .. }) => Ok(Flow::Continue),

            (CrawlPhase::SearchCollection, CrawlEvent::NavigationFinished { url, status, .. }) => {
                info!("results page loaded: {url} (HTTP {status})");
                let script = scripts::link_harvest(&self.config.banned_markers);
                self.surface
                    .execute_script(&script)
                    .await
                    .map_err(session_fault)?;
                Ok(Flow::Continue)
            }

            (CrawlPhase::SearchCollection, CrawlEvent::ConsoleMessage { text }) => {
                match extract::parse_result_message(&text, &self.config.banned_markers) {
                    Some(batch) => self.ingest_batch(batch).await,
                    // Unrelated console noise from the page.
                    None => Ok(Flow::Continue),
                }
            }

            (CrawlPhase::ContentExtraction, CrawlEvent::NavigationFinished { url, .. }) => {
                let html = self.surface.rendered_html().await.map_err(session_fault)?;
                let outcome = self.store.save(&url, &html);
                // One completion event per visit, written or not.
                events::emit(&self.events_tx, CrawlEvent::ContentSaved { outcome });
                Ok(Flow::Continue)
            }

            (CrawlPhase::ContentExtraction, CrawlEvent::ContentSaved { outcome }) => {
                if outcome.written() {
                    self.report.pages_saved += 1;
                } else {
                    self.report.write_failures += 1;
                }
                self.cursor += 1;
                self.visit_next().await
            }

            // Visited pages log whatever they like; none of it is ours.
            (CrawlPhase::ContentExtraction, CrawlEvent::ConsoleMessage { .. }) => {
                Ok(Flow::Continue)
            }

            (CrawlPhase::SearchCollection, CrawlEvent::ContentSaved { .. }) => {
                warn!("content-saved event before extraction phase; ignoring");
                Ok(Flow::Continue)
            }
        }
    }

    /// One extraction-result batch: append it, then paginate or switch phase.
    /// The page that produced the message counts as visited, so `max_pages`
    /// bounds the number of result pages scanned.
    async fn ingest_batch(&mut self, batch: Vec<String>) -> Result<Flow> {
        info!(
            "results page {} yielded {} organic links",
            self.pages_visited + 1,
            batch.len()
        );
        self.links.extend(batch);
        self.pages_visited += 1;
        self.report.pages_scanned = self.pages_visited;

        if self.pages_visited < self.config.max_pages {
            // Pacing throttle so pagination doesn't outrun the site's own
            // render and navigation timing.
            tokio::time::sleep(self.config.page_delay).await;
            self.surface
                .execute_script(&scripts::next_page())
                .await
                .map_err(session_fault)?;
            return Ok(Flow::Continue);
        }

        self.report.links_collected = self.links.len();
        if self.links.is_empty() {
            info!("no organic links collected; shutting down");
            return Ok(Flow::Done);
        }

        info!(
            "collected {} links; switching to content extraction",
            self.links.len()
        );
        self.phase = CrawlPhase::ContentExtraction;
        self.cursor = 0;
        self.visit_next().await
    }

    /// Navigate to the link under the cursor. Links pointing back at the
    /// search host are never navigated: the skip advances the cursor exactly
    /// like a completed visit and the loop moves on.
    async fn visit_next(&mut self) -> Result<Flow> {
        while let Some(link) = self.links.get(self.cursor) {
            if self.config.is_banned(link) {
                info!("skipping self-referential link: {link}");
                self.report.links_skipped += 1;
                self.cursor += 1;
                continue;
            }
            info!(
                "visiting link {}/{}: {link}",
                self.cursor + 1,
                self.links.len()
            );
            self.surface.load_url(link).await.map_err(session_fault)?;
            return Ok(Flow::Continue);
        }
        info!("all links visited");
        Ok(Flow::Done)
    }
}

/// Any surface failure at a required step is a session fault: fatal to the
/// crawl, reported, never retried.
fn session_fault(e: anyhow::Error) -> anyhow::Error {
    CrawlError::Session(format!("{e:#}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::mock::MockSurface;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::tempdir;

    fn test_config(out_dir: &std::path::Path) -> CrawlConfig {
        let mut config = CrawlConfig::new("rust jobs");
        config.page_delay = Duration::from_millis(0);
        config.event_timeout = Duration::from_secs(5);
        config.out_dir = out_dir.to_path_buf();
        config
    }

    /// Scenario: extraction with a trailing self-domain link. The first link
    /// is navigated and saved; the second is skipped without navigation and
    /// no second output unit appears.
    #[tokio::test]
    async fn test_self_domain_link_is_skipped_without_navigation() {
        let dir = tempdir().unwrap();
        let (tx, mut rx) = events::channel();
        let mock = MockSurface::new(tx.clone(), Vec::new());
        let store = PageStore::new(dir.path(), "page");

        let mut crawler = Crawler::new(mock.clone(), store, test_config(dir.path()), tx);
        crawler.phase = CrawlPhase::ContentExtraction;
        crawler.links = vec![
            "https://job1.com".to_string(),
            "https://google.com/ad".to_string(),
        ];

        assert!(matches!(crawler.visit_next().await.unwrap(), Flow::Continue));
        crawler.event_loop(&mut rx).await.unwrap();

        assert_eq!(crawler.cursor, 2);
        assert_eq!(crawler.report.pages_saved, 1);
        assert_eq!(crawler.report.links_skipped, 1);
        assert_eq!(mock.loaded_urls(), vec!["https://job1.com".to_string()]);
        assert!(dir.path().join("page_1.html").exists());
        assert!(!dir.path().join("page_2.html").exists());
    }

    /// Cursor advances by exactly one per visit — saved, skipped or
    /// write-failed — and never stalls the pipeline.
    #[tokio::test]
    async fn test_cursor_advances_once_per_visit_even_on_write_failure() {
        let dir = tempdir().unwrap();
        // Block the output path with a regular file so every write fails.
        let blocked = dir.path().join("occupied");
        std::fs::write(&blocked, "not a directory").unwrap();

        let (tx, mut rx) = events::channel();
        let mock = MockSurface::new(tx.clone(), Vec::new());
        let store = PageStore::new(&blocked, "page");

        let mut config = test_config(dir.path());
        config.out_dir = blocked.clone();
        let mut crawler = Crawler::new(mock.clone(), store, config, tx);
        crawler.phase = CrawlPhase::ContentExtraction;
        crawler.links = vec![
            "https://a.com".to_string(),
            "https://google.com/ad".to_string(),
            "https://b.com".to_string(),
        ];

        assert!(matches!(crawler.visit_next().await.unwrap(), Flow::Continue));
        crawler.event_loop(&mut rx).await.unwrap();

        assert_eq!(crawler.cursor, 3);
        assert_eq!(crawler.report.write_failures, 2);
        assert_eq!(crawler.report.pages_saved, 0);
        assert_eq!(crawler.report.links_skipped, 1);
        assert_eq!(
            mock.loaded_urls(),
            vec!["https://a.com".to_string(), "https://b.com".to_string()]
        );
    }

    /// A queue whose every entry is self-referential drains straight to
    /// termination without a single navigation.
    #[tokio::test]
    async fn test_all_banned_queue_terminates_without_navigation() {
        let dir = tempdir().unwrap();
        let (tx, _rx) = events::channel();
        let mock = MockSurface::new(tx.clone(), Vec::new());
        let store = PageStore::new(dir.path(), "page");

        let mut crawler = Crawler::new(mock.clone(), store, test_config(dir.path()), tx);
        crawler.phase = CrawlPhase::ContentExtraction;
        crawler.links = vec![
            "https://google.com/a".to_string(),
            "https://googleadservices.com/b".to_string(),
        ];

        assert!(matches!(crawler.visit_next().await.unwrap(), Flow::Done));
        assert_eq!(crawler.report.links_skipped, 2);
        assert!(mock.loaded_urls().is_empty());
    }

    /// The watchdog turns a lost notification into a fault instead of an
    /// indefinite hang.
    #[tokio::test]
    async fn test_watchdog_faults_on_missing_events() {
        let dir = tempdir().unwrap();
        let (tx, rx) = events::channel();
        let mock = MockSurface::silent();
        let store = PageStore::new(dir.path(), "page");

        let mut config = test_config(dir.path());
        config.event_timeout = Duration::from_millis(50);

        let err = Crawler::new(mock, store, config, tx)
            .run(rx)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CrawlError>(),
            Some(CrawlError::Stalled(_))
        ));
    }

    struct FailingSurface;

    #[async_trait]
    impl RenderSurface for FailingSurface {
        async fn load_url(&self, _url: &str) -> Result<()> {
            Err(anyhow!("no active session"))
        }
        async fn execute_script(&self, _source: &str) -> Result<()> {
            Err(anyhow!("no active session"))
        }
        async fn rendered_html(&self) -> Result<String> {
            Err(anyhow!("no active session"))
        }
    }

    /// A dead surface at the first required step is a fatal session fault.
    #[tokio::test]
    async fn test_unusable_surface_is_a_session_fault() {
        let dir = tempdir().unwrap();
        let (tx, rx) = events::channel();
        let store = PageStore::new(dir.path(), "page");

        let err = Crawler::new(FailingSurface, store, test_config(dir.path()), tx)
            .run(rx)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CrawlError>(),
            Some(CrawlError::Session(_))
        ));
    }
}
