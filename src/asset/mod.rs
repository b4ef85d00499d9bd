//! Artifacts consumed by the transform stages.
//!
//! Artifacts are loaded once per run. A load failure disables the stage that
//! needs it; the run continues and the failure is reported as a warning.

pub mod minify;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{debug, utils::html::find_ci};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read `{0}`")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("`{0}` is empty")]
    Empty(PathBuf),

    #[error("`{0}` cannot be inlined: it contains `</style`")]
    Unembeddable(PathBuf),
}

/// Read and minify the critical stylesheet.
///
/// CSS that lightningcss rejects is inlined with whitespace collapsed instead.
pub fn load_critical_css(path: &Path) -> Result<String, ArtifactError> {
    let source =
        fs::read_to_string(path).map_err(|e| ArtifactError::Read(path.to_path_buf(), e))?;

    let css = minify::minify_css(&source).unwrap_or_else(|| {
        debug!("asset"; "{} did not parse, inlining unminified", path.display());
        minify::collapse_css(&source)
    });

    if css.trim().is_empty() {
        return Err(ArtifactError::Empty(path.to_path_buf()));
    }
    if find_ci(&css, "</style").is_some() {
        return Err(ArtifactError::Unembeddable(path.to_path_buf()));
    }
    Ok(css)
}
