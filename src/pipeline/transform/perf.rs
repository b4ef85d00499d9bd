//! Performance-monitoring injection before `</body>`.
//!
//! Adds an inline `performance.mark()` so the end of the document shows up in
//! timing data, followed by the deferred monitoring script.

use super::{StageError, Transform, insert_before_body_end};
use crate::utils::html::{escape_attr, find_tags};

/// Id of the inline mark script.
pub const PERF_MARK_ID: &str = "pageopt-perf-mark";

const MARK_SCRIPT: &str =
    r#"window.performance&&performance.mark&&performance.mark("pageopt:body-end")"#;

pub struct PerfInjector {
    script_src: String,
}

impl PerfInjector {
    pub fn new(script_src: impl Into<String>) -> Self {
        Self {
            script_src: script_src.into(),
        }
    }

    fn has_script(&self, html: &str) -> bool {
        find_tags(html, "script")
            .iter()
            .any(|tag| tag.get("src") == Some(self.script_src.as_str()))
    }
}

impl Transform for PerfInjector {
    fn name(&self) -> &'static str {
        "perf"
    }

    fn apply(&self, html: &str) -> Result<String, StageError> {
        if html.contains(PERF_MARK_ID) {
            return Ok(html.to_string());
        }

        let mut snippet = format!("<script id=\"{PERF_MARK_ID}\">{MARK_SCRIPT}</script>\n");
        if !self.script_src.is_empty() && !self.has_script(html) {
            snippet.push_str(&format!(
                "<script src=\"{}\" defer></script>\n",
                escape_attr(&self.script_src)
            ));
        }

        Ok(insert_before_body_end(html, &snippet).unwrap_or_else(|| html.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> PerfInjector {
        PerfInjector::new("assets/js/performance.js")
    }

    #[test]
    fn test_injects_before_body_end() {
        let out = stage().apply("<body><p>x</p></body>").unwrap();
        assert!(out.starts_with("<body><p>x</p><script id=\"pageopt-perf-mark\">"));
        assert!(out.contains("<script src=\"assets/js/performance.js\" defer></script>\n</body>"));
    }

    #[test]
    fn test_existing_marker_kept_single() {
        let once = stage().apply("<body></body>").unwrap();
        let twice = stage().apply(&once).unwrap();
        assert_eq!(twice, once);
        assert_eq!(twice.matches(PERF_MARK_ID).count(), 1);
    }

    #[test]
    fn test_existing_script_not_duplicated() {
        let html = r#"<body><script src="assets/js/performance.js" defer></script></body>"#;
        let out = stage().apply(html).unwrap();
        assert_eq!(out.matches("assets/js/performance.js").count(), 1);
        assert!(out.contains(PERF_MARK_ID));
    }

    #[test]
    fn test_missing_body_is_noop() {
        let html = "<head></head>";
        assert_eq!(stage().apply(html).unwrap(), html);
    }
}
