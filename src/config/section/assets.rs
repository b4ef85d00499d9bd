//! `[assets]` section: artifacts the stages consume.
//!
//! ```toml
//! [assets]
//! critical_css = "assets/css/critical.css"          # file path, relative to root
//! performance_script = "/assets/js/performance.js"  # href injected into pages
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Critical stylesheet inlined into every `<head>`.
    pub critical_css: PathBuf,
    /// Reference (not a file path) of the deferred performance script.
    ///
    /// Root-relative, so pages at any depth resolve the same script.
    pub performance_script: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            critical_css: "assets/css/critical.css".into(),
            performance_script: "/assets/js/performance.js".into(),
        }
    }
}
