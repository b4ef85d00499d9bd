//! Pipeline input and output.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::freshness::mtime_millis;

/// A page as read from disk. Never modified after reading.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub raw_content: String,
    pub size_bytes: usize,
    /// Modification time in milliseconds, if the platform reports one.
    pub mtime_ms: Option<u64>,
}

impl SourceDocument {
    /// Read a page. Content that is not UTF-8 is an `InvalidData` error.
    pub fn read(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let raw_content =
            String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Self::new(path, raw_content, mtime_millis(path)))
    }

    pub fn new(path: impl Into<PathBuf>, raw_content: String, mtime_ms: Option<u64>) -> Self {
        Self {
            path: path.into(),
            size_bytes: raw_content.len(),
            raw_content,
            mtime_ms,
        }
    }
}

/// The stage that failed and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub stage: String,
    pub message: String,
}

/// Outcome of running every stage over one document.
#[derive(Debug, Clone)]
pub struct TransformResult {
    /// Final content; the original content when `error` is set.
    pub content: String,
    pub size_before: usize,
    pub size_after: usize,
    /// `size_before - size_after`; negative when the page grew.
    pub savings_bytes: i64,
    pub savings_percent: f64,
    pub error: Option<ErrorInfo>,
    pub elapsed: Duration,
}

impl TransformResult {
    pub fn new(doc: &SourceDocument, content: String, elapsed: Duration) -> Self {
        let size_before = doc.size_bytes;
        let size_after = content.len();
        Self {
            content,
            size_before,
            size_after,
            savings_bytes: savings_bytes(size_before, size_after),
            savings_percent: savings_percent(size_before, size_after),
            error: None,
            elapsed,
        }
    }

    /// A failed run: the original content, unchanged sizes, and the error.
    pub fn failed(doc: &SourceDocument, error: ErrorInfo, elapsed: Duration) -> Self {
        Self {
            error: Some(error),
            ..Self::new(doc, doc.raw_content.clone(), elapsed)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the output differs from `original`.
    pub fn changed(&self, original: &str) -> bool {
        self.content != original
    }
}

#[allow(clippy::cast_possible_wrap)]
pub fn savings_bytes(before: usize, after: usize) -> i64 {
    before as i64 - after as i64
}

/// Percentage of `before` saved. Zero when there was nothing to begin with.
#[allow(clippy::cast_precision_loss)]
pub fn savings_percent(before: usize, after: usize) -> f64 {
    if before == 0 {
        0.0
    } else {
        savings_bytes(before, after) as f64 / before as f64 * 100.0
    }
}
