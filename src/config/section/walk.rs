//! `[walk]` section: which files the directory walk yields.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Directory names never descended into (dot-directories are always skipped).
    pub skip_dirs: Vec<String>,
    /// File name suffixes excluded even when the extension matches.
    pub skip_suffixes: Vec<String>,
    /// File extensions treated as HTML.
    pub extensions: Vec<String>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            skip_dirs: [
                "node_modules",
                "vendor",
                "backup",
                "backups",
                "cache",
                "assets",
                "dist",
                "target",
            ]
            .map(String::from)
            .to_vec(),
            skip_suffixes: vec![".min.html".into()],
            extensions: vec!["html".into(), "htm".into()],
        }
    }
}
