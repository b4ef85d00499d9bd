//! Run-wide statistics.
//!
//! One `MetricsAggregator` is created per run and fed sequentially, in
//! discovery order, by the committer. `summary()` freezes it into a
//! serializable `RunSummary` for the terminal and the JSON report.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use owo_colors::OwoColorize;
use serde::Serialize;

use crate::pipeline::{TransformResult, savings_percent};
use crate::utils::{date::DateTimeUtc, display_path, plural_count};

/// What happened to a file that went through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Rewritten on disk.
    Written,
    /// Would be rewritten (dry run).
    Planned,
    /// Pipeline output equals the input; nothing to write.
    Unchanged,
    /// A stage or the write failed; the file on disk is untouched.
    Failed,
}

impl Outcome {
    /// Counts toward `files_processed` and the size totals.
    pub const fn is_processed(self) -> bool {
        matches!(self, Self::Written | Self::Planned)
    }
}

/// Counters owned by the aggregator.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub files_unchanged: usize,
    pub files_failed: usize,
    pub total_size_before: u64,
    pub total_size_after: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub path: String,
    pub outcome: Outcome,
    pub size_before: usize,
    pub size_after: usize,
    pub savings_bytes: i64,
    pub savings_percent: f64,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureEntry {
    pub path: String,
    /// Failing stage, or `write` / `read`.
    pub stage: String,
    pub message: String,
}

pub struct MetricsAggregator {
    root: PathBuf,
    started: Instant,
    started_at: SystemTime,
    metrics: RunMetrics,
    files: Vec<FileEntry>,
    failures: Vec<FailureEntry>,
    warnings: Vec<String>,
    interrupted: bool,
    untouched: usize,
}

impl MetricsAggregator {
    /// Start timing a run. Paths are reported relative to `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            started: Instant::now(),
            started_at: SystemTime::now(),
            metrics: RunMetrics::default(),
            files: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
            interrupted: false,
            untouched: 0,
        }
    }

    /// Record a file that went through the pipeline.
    pub fn record(&mut self, path: &Path, result: &TransformResult, outcome: Outcome) {
        if outcome.is_processed() {
            self.metrics.files_processed += 1;
            self.metrics.total_size_before += result.size_before as u64;
            self.metrics.total_size_after += result.size_after as u64;
        } else if outcome == Outcome::Unchanged {
            self.metrics.files_unchanged += 1;
        } else {
            self.metrics.files_failed += 1;
            if let Some(error) = &result.error {
                self.push_failure(path, &error.stage, &error.message);
            }
        }

        self.files.push(FileEntry {
            path: self.display(path),
            outcome,
            size_before: result.size_before,
            size_after: result.size_after,
            savings_bytes: result.savings_bytes,
            savings_percent: round2(result.savings_percent),
            elapsed_ms: millis(result.elapsed),
        });
    }

    /// Record a file that failed outside the pipeline (read or write).
    pub fn record_failure(&mut self, path: &Path, stage: &str, message: &str) {
        self.metrics.files_failed += 1;
        self.push_failure(path, stage, message);
    }

    /// Record a file the change detector skipped.
    pub fn record_skipped(&mut self, _path: &Path) {
        self.metrics.files_skipped += 1;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Mark the run as stopped early by Ctrl+C, with `remaining` files never
    /// committed.
    pub fn interrupt(&mut self, remaining: usize) {
        self.interrupted = true;
        self.untouched += remaining;
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn summary(&self) -> RunSummary {
        let m = &self.metrics;
        let before = usize::try_from(m.total_size_before).unwrap_or(usize::MAX);
        let after = usize::try_from(m.total_size_after).unwrap_or(usize::MAX);

        RunSummary {
            started_at: DateTimeUtc::from_system_time(self.started_at).to_rfc3339(),
            duration_ms: millis(self.started.elapsed()),
            interrupted: self.interrupted,
            files_untouched: self.untouched,
            files_processed: m.files_processed,
            files_skipped: m.files_skipped,
            files_unchanged: m.files_unchanged,
            files_failed: m.files_failed,
            total_size_before: m.total_size_before,
            total_size_after: m.total_size_after,
            total_savings_bytes: m.total_size_before as i64 - m.total_size_after as i64,
            total_savings_percent: round2(savings_percent(before, after)),
            failures: self.failures.clone(),
            warnings: self.warnings.clone(),
            files: self.files.clone(),
        }
    }

    fn push_failure(&mut self, path: &Path, stage: &str, message: &str) {
        self.failures.push(FailureEntry {
            path: self.display(path),
            stage: stage.to_string(),
            message: message.to_string(),
        });
    }

    fn display(&self, path: &Path) -> String {
        display_path(path, &self.root)
    }
}

/// Frozen run statistics.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// RFC 3339 UTC start time.
    pub started_at: String,
    pub duration_ms: u64,
    pub interrupted: bool,
    /// Files left alone because the run was interrupted.
    pub files_untouched: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub files_unchanged: usize,
    pub files_failed: usize,
    pub total_size_before: u64,
    pub total_size_after: u64,
    pub total_savings_bytes: i64,
    pub total_savings_percent: f64,
    pub failures: Vec<FailureEntry>,
    pub warnings: Vec<String>,
    pub files: Vec<FileEntry>,
}

impl RunSummary {
    /// An interrupted run counts as failed: some pages were never processed.
    pub fn has_failures(&self) -> bool {
        self.files_failed > 0 || self.interrupted
    }

    /// Print failing files, one per line, and any interruption to stderr.
    pub fn print_failures(&self) {
        if self.interrupted {
            eprintln!();
            eprintln!(
                "{} {}",
                "interrupted".yellow().bold(),
                format!("({} left untouched)", plural_count(self.files_untouched, "file")).dimmed()
            );
        }
        if self.failures.is_empty() {
            return;
        }
        eprintln!();
        eprintln!(
            "{} {}",
            "failed".red().bold(),
            format!("({})", plural_count(self.failures.len(), "file")).dimmed()
        );
        for failure in &self.failures {
            eprintln!(
                "{}{}{} {} {}",
                "[".dimmed(),
                failure.path.cyan(),
                "]".dimmed(),
                "→".red(),
                format!("{}: {}", failure.stage, failure.message)
            );
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} optimized, {} unchanged, {} skipped",
            plural_count(self.files_processed, "file"),
            self.files_unchanged,
            self.files_skipped,
        )?;
        if self.files_failed > 0 {
            write!(f, ", {}", format!("{} failed", self.files_failed).red().bold())?;
        }
        if self.interrupted {
            write!(
                f,
                ", {}",
                format!("{} untouched", self.files_untouched).yellow().bold()
            )?;
        }
        write!(
            f,
            " {}",
            format!(
                "({} bytes saved, {:.2}%, {:.2}s)",
                self.total_savings_bytes,
                self.total_savings_percent,
                Duration::from_millis(self.duration_ms).as_secs_f64()
            )
            .dimmed()
        )
    }
}

#[allow(clippy::cast_possible_truncation)]
fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
