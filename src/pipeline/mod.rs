//! Page transformation pipeline.
//!
//! Runs the ordered transforms over one document and contains their failures:
//!
//! ```text
//! SourceDocument ─► critical-css ─► perf ─► hints ─► fonts ─► images
//!                   ─► [placeholder] ─► noscript ─► [minify] ─► TransformResult
//! ```
//!
//! A stage that returns an error or panics ends processing for that document.
//! The result then carries the original content and the failing stage, and
//! the caller leaves the file on disk untouched.
//!
//! `Pipeline` holds only immutable state, so one instance is shared across
//! the rayon workers of a run.

mod document;
pub mod transform;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

pub use document::{ErrorInfo, SourceDocument, TransformResult, savings_percent};
pub use transform::{StageError, Transform};

use crate::asset::load_critical_css;
use crate::config::{LazyMode, OptimizeConfig};
use crate::log;
use transform::{
    CriticalCss, FontLoader, ImageAttrs, LazyPlaceholder, Minify, NoscriptFallback, PerfInjector,
    ResourceHints,
};

pub struct Pipeline {
    stages: Vec<Box<dyn Transform>>,
    /// Problems found while preparing the stages (e.g. a missing artifact).
    warnings: Vec<String>,
}

impl Pipeline {
    /// Build the stage list for a run, loading artifacts once.
    pub fn new(config: &OptimizeConfig) -> Self {
        let mut warnings = Vec::new();

        let critical_css = match load_critical_css(&config.assets.critical_css) {
            Ok(css) => Some(css),
            Err(e) => {
                let message = format!("critical CSS not inlined: {:#}", anyhow::Error::from(e));
                log!("warning"; "{}", message);
                warnings.push(message);
                None
            }
        };

        let mut stages: Vec<Box<dyn Transform>> = vec![
            Box::new(CriticalCss::new(critical_css)),
            Box::new(PerfInjector::new(&config.assets.performance_script)),
            Box::new(ResourceHints::new(&config.hints)),
            Box::new(FontLoader::new(&config.fonts)),
            Box::new(ImageAttrs::new(&config.images)),
        ];
        if config.images.lazy == LazyMode::Placeholder {
            stages.push(Box::new(LazyPlaceholder::new(&config.images)));
        }
        stages.push(Box::new(NoscriptFallback));
        if config.build_mode().minify {
            stages.push(Box::new(Minify::new(&config.minify, &config.root)));
        }

        Self { stages, warnings }
    }

    /// A pipeline over an explicit stage list.
    pub fn with_stages(stages: Vec<Box<dyn Transform>>) -> Self {
        Self {
            stages,
            warnings: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage over `doc`.
    pub fn process(&self, doc: &SourceDocument) -> TransformResult {
        let start = Instant::now();
        let mut content = doc.raw_content.clone();

        for stage in &self.stages {
            match run_stage(stage.as_ref(), &content) {
                Ok(next) => content = next,
                Err(e) => {
                    let error = ErrorInfo {
                        stage: stage.name().to_string(),
                        message: format!("{:#}", anyhow::Error::from(e)),
                    };
                    return TransformResult::failed(doc, error, start.elapsed());
                }
            }
        }

        TransformResult::new(doc, content, start.elapsed())
    }
}

/// Apply one stage, turning a panic into a `StageError`.
fn run_stage(stage: &dyn Transform, html: &str) -> Result<String, StageError> {
    panic::catch_unwind(AssertUnwindSafe(|| stage.apply(html)))
        .unwrap_or_else(|payload| Err(StageError::Panic(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ModeKind;
    use std::fs;
    use tempfile::TempDir;

    const SCENARIO: &str = r#"<html><head></head><body><img src="a.png"></body></html>"#;

    /// Config rooted in a temp dir holding `body{color:red}` as critical CSS.
    fn config(dir: &TempDir, mode: ModeKind, lazy: LazyMode) -> OptimizeConfig {
        let css = dir.path().join("assets/css/critical.css");
        fs::create_dir_all(css.parent().unwrap()).unwrap();
        fs::write(&css, "body {\n  color: red;\n}\n").unwrap();

        let mut config = OptimizeConfig {
            root: dir.path().to_path_buf(),
            ..OptimizeConfig::default()
        };
        config.assets.critical_css = css;
        config.run.mode = mode;
        config.images.lazy = lazy;
        config
    }

    fn doc(content: &str) -> SourceDocument {
        SourceDocument::new("page.html", content.to_string(), None)
    }

    struct Failing;

    impl Transform for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn apply(&self, _: &str) -> Result<String, StageError> {
            Err(StageError::Timeout(std::time::Duration::from_millis(5)))
        }
    }

    struct Panicking;

    impl Transform for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn apply(&self, _: &str) -> Result<String, StageError> {
            panic!("stage exploded")
        }
    }

    struct Upper;

    impl Transform for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn apply(&self, html: &str) -> Result<String, StageError> {
            Ok(html.to_uppercase())
        }
    }

    #[test]
    fn test_stage_order() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(&config(&dir, ModeKind::Production, LazyMode::Placeholder));
        assert_eq!(
            pipeline.stage_names(),
            [
                "critical-css",
                "perf",
                "hints",
                "fonts",
                "images",
                "placeholder",
                "noscript",
                "minify"
            ]
        );

        let pipeline = Pipeline::new(&config(&dir, ModeKind::Development, LazyMode::Native));
        assert!(!pipeline.stage_names().contains(&"minify"));
        assert!(!pipeline.stage_names().contains(&"placeholder"));
    }

    #[test]
    fn test_scenario_native() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(&config(&dir, ModeKind::Development, LazyMode::Native));
        let result = pipeline.process(&doc(SCENARIO));

        assert!(result.is_ok());
        assert!(pipeline.warnings().is_empty());
        assert!(result.content.contains(r#"<style id="pageopt-critical">body{color:red}</style>"#));
        assert!(result.content.contains(r#"loading="lazy""#));
        assert!(result.content.contains(r#"width="800""#));
        assert!(result.content.contains(r#"height="600""#));
        assert!(!result.content.contains(r#"data-src="a.png""#));
    }

    #[test]
    fn test_scenario_placeholder() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(&config(&dir, ModeKind::Development, LazyMode::Placeholder));
        let result = pipeline.process(&doc(SCENARIO));
        assert!(result.content.contains(r#"data-src="a.png""#));
        assert!(result.content.contains(r#"data-srcset="a.png 1x, a@2x.png 2x""#));
        assert!(result.content.contains(r#"loading="lazy""#));
    }

    #[test]
    fn test_idempotent_development() {
        let dir = TempDir::new().unwrap();
        for lazy in [LazyMode::Native, LazyMode::Placeholder] {
            let pipeline = Pipeline::new(&config(&dir, ModeKind::Development, lazy));
            let html = r#"<!DOCTYPE html>
<html>
<head>
<link rel="stylesheet" href="https://fonts.googleapis.com/css2?family=Inter">
<link rel="stylesheet" href="assets/vendor/lib.css">
</head>
<body>
<img class="logo" src="logo.png">
<img src="photo.jpg" alt="photo">
</body>
</html>
"#;
            let once = pipeline.process(&doc(html));
            let twice = pipeline.process(&doc(&once.content));
            assert_eq!(twice.content, once.content);
            assert!(once.content.contains(r#"<img class="logo" src="logo.png">"#));
        }
    }

    #[test]
    fn test_idempotent_production() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(&config(&dir, ModeKind::Production, LazyMode::Native));
        let once = pipeline.process(&doc(SCENARIO));
        let twice = pipeline.process(&doc(&once.content));
        assert!(once.is_ok());
        assert_eq!(twice.content, once.content);
    }

    #[test]
    fn test_existing_perf_marker_kept_single() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(&config(&dir, ModeKind::Development, LazyMode::Native));
        let html = r#"<html><head></head><body><script id="pageopt-perf-mark"></script></body></html>"#;
        let result = pipeline.process(&doc(html));
        assert_eq!(result.content.matches("pageopt-perf-mark").count(), 1);
    }

    #[test]
    fn test_missing_critical_css() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir, ModeKind::Development, LazyMode::Native);
        config.assets.critical_css = dir.path().join("missing.css");
        let pipeline = Pipeline::new(&config);

        assert_eq!(pipeline.warnings().len(), 1);
        assert!(pipeline.warnings()[0].contains("missing.css"));

        let result = pipeline.process(&doc(SCENARIO));
        assert!(result.is_ok());
        assert!(!result.content.contains("pageopt-critical"));
        assert!(result.content.contains("pageopt-perf-mark"));
        assert!(result.content.contains("pageopt-lazy-fallback"));
        assert!(result.content.contains(r#"loading="lazy""#));
    }

    #[test]
    fn test_fragment_without_markers_unchanged() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(&config(&dir, ModeKind::Development, LazyMode::Placeholder));
        let fragment = "<div><p>Plain fragment</p></div>";
        let result = pipeline.process(&doc(fragment));
        assert_eq!(result.content, fragment);
        assert_eq!(result.savings_bytes, 0);
    }

    #[test]
    fn test_stage_error_keeps_original() {
        let pipeline = Pipeline::with_stages(vec![Box::new(Upper), Box::new(Failing)]);
        let result = pipeline.process(&doc("<p>x</p>"));
        assert_eq!(result.content, "<p>x</p>");
        assert_eq!(result.error.as_ref().unwrap().stage, "failing");
    }

    #[test]
    fn test_panic_is_contained() {
        let pipeline = Pipeline::with_stages(vec![Box::new(Upper), Box::new(Panicking)]);
        let result = pipeline.process(&doc("<p>x</p>"));
        let error = result.error.unwrap();
        assert_eq!(error.stage, "panicking");
        assert!(error.message.contains("stage exploded"));
        assert_eq!(result.content, "<p>x</p>");
    }
}
