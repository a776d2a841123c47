// Copyright 2026 Forager Contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed crawl events and the channel that delivers them.
//!
//! Every asynchronous notification the orchestrator reacts to — navigation
//! completions, console lines from injected scripts, content-saved
//! completions — is a [`CrawlEvent`] pushed into one `mpsc` channel with a
//! single consumer, so delivery order matches the order events occurred.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::store::SaveOutcome;

/// Every notification the crawl state machine consumes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CrawlEvent {
    /// A frame finished loading. Only the top-level document drives
    /// transitions; subframe completions carry `main_frame: false` and are
    /// dropped by the machine.
    NavigationFinished {
        main_frame: bool,
        url: String,
        status: u16,
    },
    /// One line from the page's console channel. Extraction-result messages
    /// arrive here; everything else is pass-through noise.
    ConsoleMessage { text: String },
    /// The content sink finished one save attempt, written or not.
    ContentSaved { outcome: SaveOutcome },
}

/// Producer handle held by the rendering surface (and by the crawler itself
/// for content-saved completions).
pub type EventSender = mpsc::UnboundedSender<CrawlEvent>;

/// Consumer handle owned by the crawl loop.
pub type EventReceiver = mpsc::UnboundedReceiver<CrawlEvent>;

/// Create the crawl event channel.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Emit an event, silently ignoring a closed channel (the consumer has
/// already shut down).
pub fn emit(tx: &EventSender, event: CrawlEvent) {
    let _ = tx.send(event);
}
