//! Result-message extraction.
//!
//! The injected scripts report one `FORAGE_RESULTS:<json array>` line over
//! the console channel. Decoding is deliberately forgiving: the payload comes
//! from a script this crate injected, but pages can interfere with logging,
//! so anything malformed degrades to a smaller (or empty) batch instead of a
//! fault reaching the orchestrator.

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use crate::scripts::RESULT_MARKER;

/// Parse one console line into an ordered batch of organic links.
///
/// Returns `None` when the marker is absent — the line is unrelated console
/// noise, not an extraction message. Links containing a banned marker are
/// dropped here as well as in the page script; duplicates are preserved.
pub fn parse_result_message(line: &str, banned_markers: &[String]) -> Option<Vec<String>> {
    let payload = line.strip_prefix(RESULT_MARKER)?;

    let links = match serde_json::from_str::<Vec<String>>(payload.trim()) {
        Ok(links) => links,
        Err(e) => {
            warn!("result payload is not a JSON array ({e}); falling back to quoted-token scan");
            quoted_tokens(payload)
        }
    };

    Some(
        links
            .into_iter()
            .filter(|link| !banned_markers.iter().any(|m| link.contains(m.as_str())))
            .collect(),
    )
}

/// Permissive fallback: every quoted token in order of appearance.
fn quoted_tokens(payload: &str) -> Vec<String> {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    let re = QUOTED.get_or_init(|| Regex::new(r#""([^"]+)""#).expect("static pattern"));
    re.captures_iter(payload).map(|c| c[1].to_string()).collect()
}
