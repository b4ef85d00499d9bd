//! `[hints]` section: resource hints inserted before `</head>`.
//!
//! # Example
//!
//! ```toml
//! [hints]
//! preconnect = [
//!     { href = "https://fonts.googleapis.com" },
//!     { href = "https://fonts.gstatic.com", crossorigin = true },
//! ]
//! dns_prefetch = ["https://cdnjs.cloudflare.com"]
//! preload = [{ href = "/assets/js/performance.js", as = "script" }]
//! defer_styles = ["assets/vendor/"]   # stylesheets loaded via preload + onload swap
//! ```

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ConfigDiagnostics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreconnectHint {
    pub href: String,
    #[serde(default)]
    pub crossorigin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadHint {
    pub href: String,
    /// Preload destination (`script`, `style`, `font`, `image`, ...).
    #[serde(rename = "as")]
    pub kind: String,
    #[serde(default)]
    pub crossorigin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HintsConfig {
    pub preconnect: Vec<PreconnectHint>,
    pub dns_prefetch: Vec<String>,
    pub preload: Vec<PreloadHint>,
    /// `href` prefixes of first-party stylesheets to load without blocking render.
    pub defer_styles: Vec<String>,
}

impl Default for HintsConfig {
    fn default() -> Self {
        Self {
            preconnect: vec![
                PreconnectHint {
                    href: "https://fonts.googleapis.com".into(),
                    crossorigin: false,
                },
                PreconnectHint {
                    href: "https://fonts.gstatic.com".into(),
                    crossorigin: true,
                },
            ],
            dns_prefetch: vec!["https://cdnjs.cloudflare.com".into()],
            preload: vec![PreloadHint {
                href: "/assets/js/performance.js".into(),
                kind: "script".into(),
                crossorigin: false,
            }],
            defer_styles: vec!["assets/vendor/".into()],
        }
    }
}

impl HintsConfig {
    /// Origins must be absolute http(s) URLs.
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        for hint in &self.preconnect {
            if !is_http_origin(&hint.href) {
                diag.error(
                    "hints.preconnect",
                    format!("`{}` is not an absolute http(s) URL", hint.href),
                );
            }
        }
        for origin in &self.dns_prefetch {
            if !is_http_origin(origin) {
                diag.error(
                    "hints.dns_prefetch",
                    format!("`{origin}` is not an absolute http(s) URL"),
                );
            }
        }
        for hint in &self.preload {
            if hint.kind.is_empty() {
                diag.error("hints.preload", format!("`{}` has an empty `as`", hint.href));
            }
        }
    }
}

fn is_http_origin(s: &str) -> bool {
    Url::parse(s).is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
}
