//! Text transforms applied to every page, in this order:
//!
//! 1. `critical`: inline the critical stylesheet before `</head>`
//! 2. `perf`: performance mark + deferred script before `</body>`
//! 3. `hints`: preconnect / dns-prefetch / preload links, deferred stylesheets
//! 4. `fonts`: async loading for web-font stylesheets
//! 5. `images`: lazy-loading and sizing attributes on `<img>`
//! 6. `placeholder`: `src` -> `data-src` swap (placeholder lazy mode only)
//! 7. `noscript`: fallback styles for visitors without JavaScript
//! 8. `minify`: whole-document minification (production only)
//!
//! Every transform returns its input unchanged when its insertion point is
//! missing, and recognizes its own earlier output so that a second run adds
//! nothing.

mod critical;
mod fonts;
mod hints;
mod images;
mod minify;
mod noscript;
mod perf;
mod placeholder;

pub use critical::CriticalCss;
pub use fonts::FontLoader;
pub use hints::ResourceHints;
pub use images::{ExemptPolicy, ImageAttrs};
pub use minify::Minify;
pub use noscript::NoscriptFallback;
pub use perf::PerfInjector;
pub use placeholder::LazyPlaceholder;

use std::time::Duration;

use thiserror::Error;

use crate::utils::exec::ExecError;
use crate::utils::html::{Tag, find_ci, rfind_ci, splice};

/// A failure that leaves the page untouched.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("minifier timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("output is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("panicked: {0}")]
    Panic(String),
}

/// One rewrite step over a whole document.
pub trait Transform: Send + Sync {
    /// Short name used in logs and the report.
    fn name(&self) -> &'static str;

    fn apply(&self, html: &str) -> Result<String, StageError>;
}

// =============================================================================
// Insertion points
// =============================================================================

const HEAD_END: &str = "</head>";
const BODY_END: &str = "</body>";

/// Insert `snippet` before the first `</head>`. `None` when there is none.
pub(crate) fn insert_before_head_end(html: &str, snippet: &str) -> Option<String> {
    find_ci(html, HEAD_END).map(|at| splice(html, at, snippet))
}

/// Insert `snippet` before the last `</body>`. `None` when there is none.
pub(crate) fn insert_before_body_end(html: &str, snippet: &str) -> Option<String> {
    rfind_ci(html, BODY_END).map(|at| splice(html, at, snippet))
}

/// Replace each tag for which `rewrite` returns new text, in one pass.
///
/// `tags` must be in document order, as `find_tags()` returns them.
pub(crate) fn rewrite_tags<F>(html: &str, tags: &[Tag<'_>], mut rewrite: F) -> String
where
    F: FnMut(&Tag<'_>) -> Option<String>,
{
    let mut out = String::with_capacity(html.len() + html.len() / 8);
    let mut pos = 0;
    for tag in tags {
        if let Some(text) = rewrite(tag) {
            out.push_str(&html[pos..tag.start]);
            out.push_str(&text);
            pos = tag.end;
        }
    }
    out.push_str(&html[pos..]);
    out
}

/// Whether a `rel` attribute value lists `token`.
pub(crate) fn rel_has(tag: &Tag<'_>, token: &str) -> bool {
    tag.get("rel")
        .is_some_and(|rel| rel.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case(token)))
}
