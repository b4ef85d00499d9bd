//! `[run]` and `[report]` sections.
//!
//! ```toml
//! [run]
//! verbose = false
//! backup = false          # write `<file>.bak` before overwriting
//! cache = true            # in-run change cache; false forces reprocessing
//! persist_cache = false   # keep the cache in `.pageopt/cache.json`
//! mode = "production"     # production | development
//!
//! [report]
//! path = "optimization-report.json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::ModeKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub verbose: bool,
    pub backup: bool,
    pub cache: bool,
    pub persist_cache: bool,
    pub mode: ModeKind,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            backup: false,
            cache: true,
            persist_cache: false,
            mode: ModeKind::Production,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Report file, relative to the root.
    pub path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: "optimization-report.json".into(),
        }
    }
}
