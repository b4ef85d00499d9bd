//! `[fonts]` section: which stylesheet host gets the async font-loading pattern.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontsConfig {
    /// Host serving font stylesheets.
    pub host: String,
    /// Host serving the font files themselves (preconnected with `crossorigin`).
    pub files_host: String,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            host: "fonts.googleapis.com".into(),
            files_host: "fonts.gstatic.com".into(),
        }
    }
}
