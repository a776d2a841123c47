//! Crawl configuration.

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::CrawlError;

/// Default search endpoint the query is appended to.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://www.google.com/search";

/// Substrings marking sponsored placements or the search host itself.
/// Links containing any of these are never treated as organic results.
pub const DEFAULT_BANNED_MARKERS: &[&str] = &["googleadservices", "google.com"];

/// Everything a harvest run needs to know up front.
#[derive(Clone, Debug)]
pub struct CrawlConfig {
    /// Search query term(s), as typed by the user.
    pub query: String,
    /// Search endpoint the query is appended to.
    pub search_endpoint: String,
    /// Number of result pages to scan before visiting links.
    pub max_pages: u32,
    /// Pacing delay between a link batch and the next pagination step.
    /// A throttle against outrunning the site's render timing, not a
    /// correctness requirement.
    pub page_delay: Duration,
    /// Watchdog bound on each wait for a surface event.
    pub event_timeout: Duration,
    /// Directory saved pages and the manifest land in.
    pub out_dir: PathBuf,
    /// File name prefix for saved pages.
    pub file_prefix: String,
    /// Substrings marking sponsored or self-referential links.
    pub banned_markers: Vec<String>,
}

impl CrawlConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            max_pages: 3,
            page_delay: Duration::from_millis(1500),
            event_timeout: Duration::from_secs(30),
            out_dir: PathBuf::from("."),
            file_prefix: "page".to_string(),
            banned_markers: DEFAULT_BANNED_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Initial navigation target: the endpoint with the query URL-encoded in.
    pub fn search_url(&self) -> Result<String, CrawlError> {
        if self.query.trim().is_empty() {
            return Err(CrawlError::Config("search query must not be empty".into()));
        }
        let mut url = Url::parse(&self.search_endpoint)
            .map_err(|e| CrawlError::Config(format!("bad search endpoint: {e}")))?;
        url.query_pairs_mut().append_pair("q", &self.query);
        Ok(url.into())
    }

    /// True when a link points back at the search host or a sponsored
    /// redirector and must not be visited.
    pub fn is_banned(&self, link: &str) -> bool {
        self.banned_markers.iter().any(|m| link.contains(m.as_str()))
    }
}
