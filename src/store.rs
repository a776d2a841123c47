//! Content sink — numbered HTML outputs plus a JSONL manifest.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Completion record for one save attempt. Exactly one is produced per
/// handed-over page, whether the write landed or not.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// Sequence number of this save attempt (1-based, never reused).
    pub seq: u64,
    /// Source URL the content was rendered from.
    pub url: String,
    /// File the content landed in, `None` when the write failed.
    pub file: Option<String>,
    /// Size of the rendered content in bytes.
    pub bytes: usize,
}

impl SaveOutcome {
    pub fn written(&self) -> bool {
        self.file.is_some()
    }
}

/// Writes each visited page's rendered HTML to `<prefix>_<n>.html` under the
/// output directory, and appends one JSONL record per attempt to
/// `manifest.jsonl`.
///
/// The counter is owned by the store instance and increments once per save
/// attempt, so numbering is monotonic within a run and independent of the
/// crawl cursor.
pub struct PageStore {
    out_dir: PathBuf,
    prefix: String,
    next_seq: u64,
}

impl PageStore {
    pub fn new(out_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            prefix: prefix.into(),
            next_seq: 1,
        }
    }

    /// Persist one page. Never fails the crawl: a write error is logged and
    /// reported through the outcome so the caller still advances.
    pub fn save(&mut self, url: &str, html: &str) -> SaveOutcome {
        let seq = self.next_seq;
        self.next_seq += 1;

        let name = format!("{}_{}.html", self.prefix, seq);
        let path = self.out_dir.join(&name);

        let file = match self.write_page(&path, html) {
            Ok(()) => {
                info!("saved {url} ({} bytes) -> {}", html.len(), path.display());
                Some(name)
            }
            Err(e) => {
                error!("could not write {}: {e:#}", path.display());
                None
            }
        };

        let outcome = SaveOutcome {
            seq,
            url: url.to_string(),
            file,
            bytes: html.len(),
        };
        self.append_manifest(&outcome);
        outcome
    }

    fn write_page(&self, path: &Path, html: &str) -> Result<()> {
        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("create {}", self.out_dir.display()))?;
        std::fs::write(path, html).with_context(|| format!("write {}", path.display()))
    }

    /// Append one JSONL record per save attempt. The manifest is an index,
    /// not a gate: failures here are logged and ignored.
    fn append_manifest(&self, outcome: &SaveOutcome) {
        let record = serde_json::json!({
            "saved_at": Utc::now().to_rfc3339(),
            "seq": outcome.seq,
            "url": outcome.url,
            "file": outcome.file,
            "bytes": outcome.bytes,
            "status": if outcome.written() { "saved" } else { "write-failed" },
        });
        let path = self.out_dir.join("manifest.jsonl");
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{record}"));
        if let Err(e) = result {
            error!("manifest append failed: {e}");
        }
    }
}
