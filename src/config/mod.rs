//! Run configuration from `pageopt.toml` and CLI flags.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [run] [report] [assets] [hints] [fonts] [images] [minify] [walk]
//! ├── error.rs       # ConfigError, ConfigDiagnostics
//! └── mod.rs         # OptimizeConfig (this file)
//! ```
//!
//! The config file is optional. Lookup order: `-C <path>` (must exist), then
//! `<ROOT>/pageopt.toml`, then built-in defaults. CLI flags override file values.

mod error;
pub mod section;

pub use error::{ConfigDiagnostics, ConfigError};
pub use section::{
    AssetsConfig, FontsConfig, HintsConfig, ImagesConfig, LazyMode, MinifyConfig,
    PreconnectHint, PreloadHint, ReportConfig, RunConfig, WalkConfig,
};

use crate::{cli::Cli, core::BuildMode, log};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config file name, looked up in the root.
pub const CONFIG_FILE: &str = "pageopt.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing pageopt.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizeConfig {
    /// Absolute root directory being optimized (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Config file the values came from, if any (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Dry run: transform and report, never write (internal use only)
    #[serde(skip)]
    pub dry_run: bool,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub assets: AssetsConfig,

    #[serde(default)]
    pub hints: HintsConfig,

    #[serde(default)]
    pub fonts: FontsConfig,

    #[serde(default)]
    pub images: ImagesConfig,

    #[serde(default)]
    pub minify: MinifyConfig,

    #[serde(default)]
    pub walk: WalkConfig,
}

impl OptimizeConfig {
    /// Load configuration for a CLI invocation.
    pub fn load(cli: &Cli) -> Result<Self> {
        let args = cli.args();
        let root = fs::canonicalize(&args.root)
            .with_context(|| format!("root directory `{}` not found", args.root.display()))?;

        let config_path = match &cli.config {
            Some(path) if path.exists() => Some(path.clone()),
            Some(path) => return Err(ConfigError::NotFound(path.clone()).into()),
            None => Some(root.join(CONFIG_FILE)).filter(|p| p.exists()),
        };

        let mut config = match &config_path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };

        config.root = root;
        config.config_path = config_path;
        config.dry_run = cli.is_check();
        config.apply_cli(cli);
        config.resolve_paths();
        config.validate()?;

        Ok(config)
    }

    /// Parse a config file, warning about unknown fields.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let (config, ignored) = Self::parse_with_ignored(&content)
            .with_context(|| format!("failed to parse `{}`", path.display()))?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// CLI flags take precedence over file values.
    fn apply_cli(&mut self, cli: &Cli) {
        let args = cli.args();
        if args.verbose {
            self.run.verbose = true;
        }
        if let Some(backup) = args.backup {
            self.run.backup = backup;
        }
        if args.no_cache {
            self.run.cache = false;
        }
        if let Some(persist) = args.persist_cache {
            self.run.persist_cache = persist;
        }
        if let Some(mode) = args.mode {
            self.run.mode = mode;
        }
        if let Some(report) = &args.report {
            self.report.path = report.clone();
        }
    }

    /// Expand `~` and anchor relative paths at the root.
    fn resolve_paths(&mut self) {
        self.assets.critical_css = self.root_join(&self.assets.critical_css);
        self.report.path = self.root_join(&self.report.path);
    }

    /// Join `path` onto the root after `~` expansion; absolute paths are kept.
    pub fn root_join(&self, path: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let expanded = PathBuf::from(expanded);
        if expanded.is_absolute() {
            expanded
        } else {
            self.root.join(expanded)
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        self.hints.validate(&mut diag);
        self.minify.validate(&mut diag);
        if self.fonts.host.is_empty() {
            diag.error("fonts.host", "must not be empty");
        }
        diag.into_result()
    }

    pub fn build_mode(&self) -> BuildMode {
        self.run.mode.into()
    }

    /// Directory holding run state (persisted cache).
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".pageopt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ModeKind;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_parse_partial_config() {
        let (config, ignored) = OptimizeConfig::parse_with_ignored(
            r#"
            [run]
            backup = true
            mode = "development"

            [images]
            lazy = "placeholder"
            "#,
        )
        .unwrap();
        assert!(ignored.is_empty());
        assert!(config.run.backup);
        assert!(config.run.cache);
        assert_eq!(config.run.mode, ModeKind::Development);
        assert_eq!(config.images.lazy, LazyMode::Placeholder);
        assert_eq!(config.images.default_width, 800);
    }

    #[test]
    fn test_unknown_fields_collected() {
        let (_, ignored) = OptimizeConfig::parse_with_ignored(
            r#"
            [run]
            backpu = true
            "#,
        )
        .unwrap();
        assert_eq!(ignored, vec!["run.backpu".to_string()]);
    }

    #[test]
    fn test_load_applies_cli_overrides() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[run]\nbackup = true\ncache = true\n[report]\npath = \"out/report.json\"\n",
        )
        .unwrap();

        let root = dir.path().to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["pageopt", "check", &root, "--backup=false", "--no-cache"])
            .unwrap();
        let config = OptimizeConfig::load(&cli).unwrap();

        assert!(config.dry_run);
        assert!(!config.run.backup);
        assert!(!config.run.cache);
        assert!(config.report.path.is_absolute());
        assert!(config.report.path.ends_with("out/report.json"));
        assert!(config.assets.critical_css.starts_with(&config.root));
    }

    #[test]
    fn test_load_without_config_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["pageopt", "run", &root]).unwrap();
        let config = OptimizeConfig::load(&cli).unwrap();
        assert!(config.config_path.is_none());
        assert_eq!(config.build_mode(), BuildMode::PRODUCTION);
    }

    #[test]
    fn test_load_missing_explicit_config() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["pageopt", "-C", "/nonexistent/pageopt.toml", "run", &root])
            .unwrap();
        assert!(OptimizeConfig::load(&cli).is_err());
    }
}
