//! Build mode: which output stages run for a given invocation.

use serde::{Deserialize, Serialize};

/// Mode name as written in `pageopt.toml` or passed with `--mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    #[default]
    Production,
    Development,
}

/// Stage switches derived from the selected mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildMode {
    /// Whether the minification stage runs last.
    pub minify: bool,
}

impl BuildMode {
    /// Production mode: minified output.
    pub const PRODUCTION: Self = Self { minify: true };

    /// Development mode: readable output, every stage except minification.
    pub const DEVELOPMENT: Self = Self { minify: false };

    #[inline]
    pub const fn is_dev(&self) -> bool {
        !self.minify
    }
}

impl From<ModeKind> for BuildMode {
    fn from(kind: ModeKind) -> Self {
        match kind {
            ModeKind::Production => Self::PRODUCTION,
            ModeKind::Development => Self::DEVELOPMENT,
        }
    }
}
