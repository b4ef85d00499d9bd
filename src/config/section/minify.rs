//! `[minify]` section.
//!
//! ```toml
//! [minify]
//! command = ["html-minifier-terser", "--collapse-whitespace"]  # empty = built-in
//! timeout_ms = 10000
//! ```
//!
//! An external command reads HTML on stdin and writes the result to stdout.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConfigDiagnostics;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinifyConfig {
    pub command: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for MinifyConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_ms: 10_000,
        }
    }
}

impl MinifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// # Checks
    /// - `timeout_ms` must be positive
    /// - a configured `command[0]` must be installed
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.timeout_ms == 0 {
            diag.error("minify.timeout_ms", "must be greater than 0");
        }
        if let Some(cmd) = self.command.first()
            && which::which(cmd).is_err()
        {
            diag.error("minify.command", format!("`{cmd}` not found"));
        }
    }
}
