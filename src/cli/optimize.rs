//! Run orchestration.
//!
//! Phases:
//! - **Discover** - sorted walk of the root for pages
//! - **Read** - load pages in discovery order, drop those the cache says are done
//! - **Transform** - run the pipeline over all pages in parallel (rayon)
//! - **Commit** - write results, update the cache, and record metrics, one
//!   file at a time in discovery order
//! - **Finalize** - persist the cache, write the report

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::{
    config::OptimizeConfig,
    core::is_shutdown,
    debug,
    freshness::{CacheKey, ChangeDetector, cache_key, mtime_millis},
    log,
    logger::ProgressLine,
    metrics::{MetricsAggregator, Outcome, RunSummary},
    pipeline::{Pipeline, SourceDocument, TransformResult},
    report::{Reporter, write_report},
    scan::discover,
    utils::{display_path, plural_count},
};

/// Optimize every page under the configured root.
///
/// Per-file failures are recorded in the summary, never returned as errors.
pub fn optimize_site(config: &OptimizeConfig) -> Result<RunSummary> {
    let root = config.root.as_path();
    let mut metrics = MetricsAggregator::new(root);

    let mode = if config.build_mode().is_dev() {
        "development"
    } else {
        "production"
    };
    let action = if config.dry_run { "checking" } else { "optimizing" };
    log!("optimize"; "{} {} ({} mode)", action, root.display(), mode);

    // Discover
    let discovery = discover(root, &config.walk);
    for failure in &discovery.failures {
        log!("warning"; "walk: {}", failure);
        metrics.warn(format!("walk: {failure}"));
    }
    log!("optimize"; "{} found", plural_count(discovery.files.len(), "page"));

    let detector = load_detector(config);
    if !detector.is_enabled() {
        debug!("cache"; "disabled, every page is reprocessed");
    }
    let pipeline = Pipeline::new(config);
    debug!("optimize"; "stages: {}", pipeline.stage_names().join(" -> "));
    for warning in pipeline.warnings() {
        metrics.warn(warning.clone());
    }

    // Read
    let pending = read_pending(&discovery.files, &detector, &mut metrics, root);

    // Transform
    let results: Vec<Option<TransformResult>> = pending
        .par_iter()
        .map(|(doc, _)| (!is_shutdown()).then(|| pipeline.process(doc)))
        .collect();

    // Commit
    let reporter = Reporter::new(config);
    commit_all(&pending, results, &reporter, &detector, &mut metrics, root);

    // Finalize
    if config.run.persist_cache && !config.dry_run {
        let file = cache_file(config);
        if let Err(e) = detector.persist(&file) {
            log!("warning"; "failed to persist cache: {:#}", e);
            metrics.warn(format!("cache not persisted: {e:#}"));
        }
    }

    let summary = metrics.summary();
    let report = write_report(&summary, config).context("run report not written")?;
    log!("report"; "{}", display_path(&report, root));
    log!("done"; "{}", summary);
    Ok(summary)
}

fn cache_file(config: &OptimizeConfig) -> PathBuf {
    config.state_dir().join("cache.json")
}

fn load_detector(config: &OptimizeConfig) -> ChangeDetector {
    if config.run.persist_cache {
        ChangeDetector::load(&cache_file(config), config.run.cache)
    } else {
        ChangeDetector::new(config.run.cache)
    }
}

/// Read pages that need processing, paired with their cache keys.
fn read_pending(
    files: &[PathBuf],
    detector: &ChangeDetector,
    metrics: &mut MetricsAggregator,
    root: &Path,
) -> Vec<(SourceDocument, CacheKey)> {
    let mut pending = Vec::with_capacity(files.len());
    for path in files {
        let doc = match SourceDocument::read(path) {
            Ok(doc) => doc,
            Err(e) => {
                log!("error"; "{}: {}", display_path(path, root), e);
                metrics.record_failure(path, "read", &e.to_string());
                continue;
            }
        };
        match detector.check(path, doc.raw_content.as_bytes(), doc.mtime_ms) {
            Some(key) => pending.push((doc, key)),
            None => {
                debug!("skip"; "{} unchanged since last run", display_path(path, root));
                metrics.record_skipped(path);
            }
        }
    }
    pending
}

/// Commit results in discovery order.
///
/// A missing result or a shutdown request stops the run before the next file;
/// that file and everything after it stay untouched.
fn commit_all(
    pending: &[(SourceDocument, CacheKey)],
    results: Vec<Option<TransformResult>>,
    reporter: &Reporter,
    detector: &ChangeDetector,
    metrics: &mut MetricsAggregator,
    root: &Path,
) {
    let progress = (!pending.is_empty()).then(|| ProgressLine::new(&[("files", pending.len())]));
    for (i, ((doc, key), result)) in pending.iter().zip(results).enumerate() {
        let Some(result) = result.filter(|_| !is_shutdown()) else {
            let remaining = pending.len() - i;
            metrics.interrupt(remaining);
            log!("optimize"; "interrupted, {} left untouched", plural_count(remaining, "file"));
            break;
        };
        commit_one(doc, *key, &result, reporter, detector, metrics, root);
        if let Some(p) = &progress {
            p.inc("files");
        }
    }
    if let Some(p) = progress {
        p.finish();
    }
}

/// Write one result and account for it.
fn commit_one(
    doc: &SourceDocument,
    key: CacheKey,
    result: &TransformResult,
    reporter: &Reporter,
    detector: &ChangeDetector,
    metrics: &mut MetricsAggregator,
    root: &Path,
) {
    let path = doc.path.as_path();
    let shown = display_path(path, root);

    if let Some(error) = &result.error {
        log!("error"; "{}: {} failed: {}", shown, error.stage, error.message);
        metrics.record(path, result, Outcome::Failed);
        return;
    }

    let commit = match reporter.commit(path, &doc.raw_content, result) {
        Ok(commit) => commit,
        Err(e) => {
            let message = format!("{:#}", anyhow::Error::from(e));
            log!("error"; "{}: {}", shown, message);
            metrics.record_failure(path, "write", &message);
            return;
        }
    };

    if let Some(warning) = &commit.backup_warning {
        log!("warning"; "{}", warning);
        metrics.warn(warning.clone());
    }

    match commit.outcome {
        // What is on disk now is the written content at its new mtime
        Outcome::Written => detector.commit(
            path,
            cache_key(result.content.as_bytes(), mtime_millis(path)),
        ),
        Outcome::Unchanged => detector.commit(path, key),
        Outcome::Planned | Outcome::Failed => {}
    }

    debug!(
        "optimize";
        "{} {:?} {} -> {} bytes",
        shown,
        commit.outcome,
        result.size_before,
        result.size_after
    );
    metrics.record(path, result, commit.outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ModeKind;
    use std::fs;
    use tempfile::TempDir;

    const PAGE: &str = "<html><head></head><body><img src=\"a.png\"></body></html>";

    fn site() -> (TempDir, OptimizeConfig) {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("assets/css")).unwrap();
        fs::write(root.join("assets/css/critical.css"), "body { color: red }").unwrap();
        fs::write(root.join("index.html"), PAGE).unwrap();
        fs::create_dir_all(root.join("blog")).unwrap();
        fs::write(root.join("blog/post.html"), PAGE).unwrap();

        let mut config = OptimizeConfig {
            root: root.clone(),
            ..OptimizeConfig::default()
        };
        config.assets.critical_css = root.join("assets/css/critical.css");
        config.report.path = root.join("optimization-report.json");
        config.run.mode = ModeKind::Development;
        (dir, config)
    }

    #[test]
    fn test_optimize_site_rewrites_pages() {
        let (_dir, config) = site();
        let summary = optimize_site(&config).unwrap();

        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.files_failed, 0);
        assert!(summary.total_savings_bytes < 0);

        let page = fs::read_to_string(config.root.join("blog/post.html")).unwrap();
        assert!(page.contains("pageopt-critical"));
        assert!(page.contains(r#"loading="lazy""#));
        assert!(page.contains(r#"<script src="/assets/js/performance.js" defer></script>"#));
        assert!(config.report.path.exists());
        assert!(!config.root.join("index.html.bak").exists());
    }

    #[test]
    fn test_second_run_leaves_pages_unchanged() {
        let (_dir, config) = site();
        optimize_site(&config).unwrap();
        let first = fs::read_to_string(config.root.join("index.html")).unwrap();

        let summary = optimize_site(&config).unwrap();
        assert_eq!(summary.files_processed, 0);
        assert_eq!(summary.files_unchanged, 2);
        assert_eq!(fs::read_to_string(config.root.join("index.html")).unwrap(), first);
    }

    #[test]
    fn test_persisted_cache_skips_written_pages() {
        let (_dir, mut config) = site();
        config.run.persist_cache = true;
        optimize_site(&config).unwrap();
        assert!(config.state_dir().join("cache.json").exists());

        let summary = optimize_site(&config).unwrap();
        assert_eq!(summary.files_skipped, 2);
        assert_eq!(summary.files_processed, 0);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (_dir, mut config) = site();
        config.dry_run = true;
        let summary = optimize_site(&config).unwrap();

        assert_eq!(summary.files_processed, 2);
        assert_eq!(fs::read_to_string(config.root.join("index.html")).unwrap(), PAGE);
        assert!(config.report.path.exists());
    }

    #[test]
    fn test_missing_critical_css_is_a_warning() {
        let (_dir, mut config) = site();
        config.assets.critical_css = config.root.join("missing.css");
        let summary = optimize_site(&config).unwrap();

        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.warnings.len(), 1);
        let page = fs::read_to_string(config.root.join("index.html")).unwrap();
        assert!(!page.contains("pageopt-critical"));
        assert!(page.contains("pageopt-perf-mark"));
    }

    #[test]
    fn test_backup_written() {
        let (_dir, mut config) = site();
        config.run.backup = true;
        optimize_site(&config).unwrap();
        assert_eq!(
            fs::read_to_string(config.root.join("index.html.bak")).unwrap(),
            PAGE
        );
    }

    #[test]
    fn test_interrupted_commit_leaves_rest_untouched() {
        let (_dir, config) = site();
        let files = [config.root.join("blog/post.html"), config.root.join("index.html")];
        let detector = ChangeDetector::new(true);
        let mut metrics = MetricsAggregator::new(&config.root);
        let pending = read_pending(&files, &detector, &mut metrics, &config.root);
        assert_eq!(pending.len(), 2);

        let pipeline = Pipeline::new(&config);
        let results = vec![Some(pipeline.process(&pending[0].0)), None];
        commit_all(
            &pending,
            results,
            &Reporter::new(&config),
            &detector,
            &mut metrics,
            &config.root,
        );

        let summary = metrics.summary();
        assert!(summary.interrupted);
        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.files_untouched, 1);
        assert!(summary.has_failures());
        assert_ne!(fs::read_to_string(&files[0]).unwrap(), PAGE);
        assert_eq!(fs::read_to_string(&files[1]).unwrap(), PAGE);
        assert!(detector.get(&files[1]).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_a_warning() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, config) = site();
        let locked = config.root.join("blog");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Root ignores directory permissions
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let summary = optimize_site(&config);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        let summary = summary.unwrap();

        assert_eq!(summary.files_processed, 1);
        assert!(!summary.has_failures());
        assert!(summary.warnings.iter().any(|w| w.starts_with("walk: ")));
    }

    #[test]
    fn test_commit_updates_cache_with_written_state() {
        let (_dir, config) = site();
        let path = config.root.join("index.html");
        let doc = SourceDocument::read(&path).unwrap();
        let detector = ChangeDetector::new(true);
        let key = detector.check(&path, doc.raw_content.as_bytes(), doc.mtime_ms).unwrap();

        let pipeline = Pipeline::new(&config);
        let result = pipeline.process(&doc);
        let mut metrics = MetricsAggregator::new(&config.root);
        commit_one(
            &doc,
            key,
            &result,
            &Reporter::new(&config),
            &detector,
            &mut metrics,
            &config.root,
        );

        let written = fs::read_to_string(&path).unwrap();
        let entry = detector.get(&path).unwrap();
        assert_eq!(entry.key, cache_key(written.as_bytes(), mtime_millis(&path)));
        assert!(!detector.should_process(&path, written.as_bytes(), mtime_millis(&path)));
        assert_eq!(metrics.metrics().files_processed, 1);
    }
}
