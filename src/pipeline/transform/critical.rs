//! Critical-CSS inlining.

use super::{StageError, Transform, insert_before_head_end};

/// Id of the inlined `<style>`; its presence marks an already-processed page.
pub const CRITICAL_ID: &str = "pageopt-critical";

/// Inlines the run's critical stylesheet before `</head>`.
///
/// Holds no CSS when the artifact failed to load, in which case every page
/// passes through unchanged.
pub struct CriticalCss {
    css: Option<String>,
}

impl CriticalCss {
    pub fn new(css: Option<String>) -> Self {
        Self { css }
    }
}

impl Transform for CriticalCss {
    fn name(&self) -> &'static str {
        "critical-css"
    }

    fn apply(&self, html: &str) -> Result<String, StageError> {
        let Some(css) = &self.css else {
            return Ok(html.to_string());
        };
        if html.contains(CRITICAL_ID) {
            return Ok(html.to_string());
        }

        let snippet = format!("<style id=\"{CRITICAL_ID}\">{css}</style>\n");
        Ok(insert_before_head_end(html, &snippet).unwrap_or_else(|| html.to_string()))
    }
}
