//! Writing results back to disk: rewritten pages, backups, and the run report.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::OptimizeConfig;
use crate::core::ModeKind;
use crate::metrics::{Outcome, RunSummary};
use crate::pipeline::TransformResult;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write temporary file next to `{0}`")]
    Temp(PathBuf, #[source] io::Error),

    #[error("failed to replace `{0}`")]
    Replace(PathBuf, #[source] io::Error),
}

/// What `Reporter::commit` did with one file.
#[derive(Debug)]
pub struct Commit {
    pub outcome: Outcome,
    /// Set when the backup copy could not be made; the write still happened.
    pub backup_warning: Option<String>,
}

impl Commit {
    fn plain(outcome: Outcome) -> Self {
        Self {
            outcome,
            backup_warning: None,
        }
    }
}

pub struct Reporter {
    backup: bool,
    dry_run: bool,
}

impl Reporter {
    pub fn new(config: &OptimizeConfig) -> Self {
        Self {
            backup: config.run.backup,
            dry_run: config.dry_run,
        }
    }

    /// Write a transformed page over its source.
    ///
    /// Failed results and unchanged content are never written. The new content
    /// goes to a sibling temporary file that is renamed over `path`, so the
    /// original survives any failed write.
    pub fn commit(
        &self,
        path: &Path,
        original: &str,
        result: &TransformResult,
    ) -> Result<Commit, WriteError> {
        if !result.is_ok() {
            return Ok(Commit::plain(Outcome::Failed));
        }
        if !result.changed(original) {
            return Ok(Commit::plain(Outcome::Unchanged));
        }
        if self.dry_run {
            return Ok(Commit::plain(Outcome::Planned));
        }

        let backup_warning = if self.backup {
            write_backup(path)
                .err()
                .map(|e| format!("backup of {} failed: {e:#}", path.display()))
        } else {
            None
        };

        write_atomic(path, result.content.as_bytes())?;
        Ok(Commit {
            outcome: Outcome::Written,
            backup_warning,
        })
    }
}

/// `index.html` -> `index.html.bak`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

fn write_backup(path: &Path) -> Result<()> {
    let backup = backup_path(path);
    fs::copy(path, &backup).with_context(|| format!("cannot copy to {}", backup.display()))?;
    Ok(())
}

/// Replace `path` with `contents` via a temporary file in the same directory.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), WriteError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp =
        NamedTempFile::new_in(dir).map_err(|e| WriteError::Temp(path.to_path_buf(), e))?;
    temp.write_all(contents)
        .and_then(|()| temp.flush())
        .map_err(|e| WriteError::Temp(path.to_path_buf(), e))?;
    // Temp files are created owner-only; keep the target's mode
    if let Ok(meta) = fs::metadata(path) {
        temp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| WriteError::Temp(path.to_path_buf(), e))?;
    }
    temp.persist(path)
        .map_err(|e| WriteError::Replace(path.to_path_buf(), e.error))?;
    Ok(())
}

// ============================================================================
// Run report
// ============================================================================

#[derive(Serialize)]
struct RunReport<'a> {
    root: &'a Path,
    mode: ModeKind,
    dry_run: bool,
    #[serde(flatten)]
    summary: &'a RunSummary,
    config: &'a OptimizeConfig,
}

/// Serialize the run summary to `report.path`.
pub fn write_report(summary: &RunSummary, config: &OptimizeConfig) -> Result<PathBuf> {
    let report = RunReport {
        root: &config.root,
        mode: config.run.mode,
        dry_run: config.dry_run,
        summary,
        config,
    };
    let json = serde_json::to_string_pretty(&report).context("failed to serialize run report")?;

    let path = &config.report.path;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    write_atomic(path, json.as_bytes())
        .with_context(|| format!("failed to write report {}", path.display()))?;
    Ok(path.clone())
}
