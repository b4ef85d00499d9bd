//! Fallback styles for visitors without JavaScript.

use super::{StageError, Transform, insert_before_body_end};

pub const FALLBACK_ID: &str = "pageopt-lazy-fallback";

/// Hides placeholder images that will never be swapped and forces lazily
/// loaded images visible.
const FALLBACK_CSS: &str = "img[data-src]{display:none!important}\
img[loading=\"lazy\"],.lazyload{opacity:1!important;visibility:visible!important}";

pub struct NoscriptFallback;

impl Transform for NoscriptFallback {
    fn name(&self) -> &'static str {
        "noscript"
    }

    fn apply(&self, html: &str) -> Result<String, StageError> {
        if html.contains(FALLBACK_ID) {
            return Ok(html.to_string());
        }
        let snippet =
            format!("<noscript id=\"{FALLBACK_ID}\"><style>{FALLBACK_CSS}</style></noscript>\n");
        Ok(insert_before_body_end(html, &snippet).unwrap_or_else(|| html.to_string()))
    }
}
