//! Injected page scripts.
//!
//! Both scripts report back over the console side-channel. Each
//! SEARCH_COLLECTION cycle produces exactly one marker-prefixed result
//! message: the harvest script always emits one (empty when the container is
//! missing), and the pagination script either navigates — leading to the next
//! harvest message — or emits an empty batch when there is no next page.

/// Prefix on every script-emitted result message.
pub const RESULT_MARKER: &str = "FORAGE_RESULTS:";

/// CSS id of the organic results container.
const RESULTS_CONTAINER_ID: &str = "search";

/// Anchor selector for organic result entries within the container.
const RESULT_ANCHOR_SELECTOR: &str = "div.g a";

/// CSS id of the next-page control.
const NEXT_CONTROL_ID: &str = "pnnext";

/// Script that collects organic result links from the results container,
/// dropping any href containing a banned marker.
///
/// A missing container or zero surviving anchors still produce one
/// empty-list message, so the state machine always hears back.
pub fn link_harvest(banned_markers: &[String]) -> String {
    let banned = serde_json::to_string(banned_markers).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(function() {{
  var banned = {banned};
  var container = document.getElementById('{RESULTS_CONTAINER_ID}');
  if (!container) {{
    console.log('{RESULT_MARKER}' + JSON.stringify([]));
    return;
  }}
  var results = [];
  container.querySelectorAll('{RESULT_ANCHOR_SELECTOR}').forEach(function(a) {{
    var href = a.href;
    if (href && !banned.some(function(m) {{ return href.indexOf(m) !== -1; }})) {{
      results.push(href);
    }}
  }});
  console.log('{RESULT_MARKER}' + JSON.stringify(results));
}})();"#
    )
}

/// Script that triggers pagination via the next-page control.
///
/// When the control is absent the script emits an empty batch instead, so
/// "no next page" is handled identically to "page yielded nothing".
pub fn next_page() -> String {
    format!(
        r#"(function() {{
  var next = document.getElementById('{NEXT_CONTROL_ID}');
  if (next && next.href) {{
    window.location.href = next.href;
  }} else {{
    console.log('{RESULT_MARKER}' + JSON.stringify([]));
  }}
}})();"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec!["googleadservices".to_string(), "google.com".to_string()]
    }

    #[test]
    fn test_harvest_embeds_banned_markers() {
        let js = link_harvest(&markers());
        assert!(js.contains(r#"["googleadservices","google.com"]"#));
        assert!(js.contains("getElementById('search')"));
        assert!(js.contains("div.g a"));
    }

    #[test]
    fn test_harvest_emits_on_both_paths() {
        // One emission for the missing-container branch, one for the normal
        // branch — a result message is produced no matter what the page holds.
        let js = link_harvest(&markers());
        assert_eq!(js.matches(RESULT_MARKER).count(), 2);
        assert_eq!(js.matches("console.log").count(), 2);
    }

    #[test]
    fn test_pagination_emits_only_without_next_control() {
        let js = next_page();
        assert!(js.contains("getElementById('pnnext')"));
        assert!(js.contains("window.location.href"));
        assert_eq!(js.matches(RESULT_MARKER).count(), 1);
    }

    #[test]
    fn test_scripts_are_self_invoking() {
        for js in [link_harvest(&markers()), next_page()] {
            assert!(js.starts_with("(function()"));
            assert!(js.ends_with("})();"));
        }
    }
}
