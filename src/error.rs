//! Crawl fault taxonomy.
//!
//! Only configuration and session-level faults halt a run. Extraction-payload
//! and content-write problems are recovered where they occur and never reach
//! this type.

use std::time::Duration;
use thiserror::Error;

/// A fault that terminates the crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Bad or missing configuration, detected before any engine work.
    #[error("configuration fault: {0}")]
    Config(String),

    /// The rendering surface was unusable at a required step.
    #[error("rendering surface fault: {0}")]
    Session(String),

    /// No surface event arrived within the watchdog bound.
    #[error("crawl stalled: no surface event within {0:?}")]
    Stalled(Duration),
}

impl CrawlError {
    /// Process exit code for this fault class. Configuration faults share
    /// clap's exit code for a missing argument.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Session(_) | Self::Stalled(_) => 3,
        }
    }
}
