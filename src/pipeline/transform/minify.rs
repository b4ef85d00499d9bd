//! Whole-document minification, run only in production mode.
//!
//! The built-in minifier runs on a worker thread so the stage can give up on
//! it after the timeout. An external command gets the page on stdin and is
//! killed when it overruns.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crossbeam::channel;

use super::{StageError, Transform};
use crate::asset::minify::minify_html;
use crate::config::MinifyConfig;
use crate::utils::exec::Cmd;

pub struct Minify {
    command: Vec<String>,
    timeout: Duration,
    cwd: PathBuf,
}

impl Minify {
    pub fn new(config: &MinifyConfig, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: config.command.clone(),
            timeout: config.timeout(),
            cwd: cwd.into(),
        }
    }

    fn builtin(&self, html: &str) -> Result<String, StageError> {
        let (tx, rx) = channel::bounded(1);
        let input = html.as_bytes().to_vec();
        // A timed-out worker is detached; its result is dropped with the channel.
        thread::spawn(move || {
            let _ = tx.send(minify_html(&input));
        });

        let bytes = rx
            .recv_timeout(self.timeout)
            .map_err(|_| StageError::Timeout(self.timeout))?;
        Ok(String::from_utf8(bytes)?)
    }

    fn external(&self, html: &str) -> Result<String, StageError> {
        let output = Cmd::from_slice(&self.command)
            .cwd(&self.cwd)
            .stdin(html)
            .timeout(self.timeout)
            .run()?;
        Ok(String::from_utf8(output.stdout)?)
    }
}

impl Transform for Minify {
    fn name(&self) -> &'static str {
        "minify"
    }

    fn apply(&self, html: &str) -> Result<String, StageError> {
        if self.command.is_empty() {
            self.builtin(html)
        } else {
            self.external(html)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::exec::ExecError;

    fn stage(command: &[&str], timeout_ms: u64) -> Minify {
        let config = MinifyConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            timeout_ms,
        };
        Minify::new(&config, std::env::temp_dir())
    }

    #[test]
    fn test_builtin_shrinks() {
        let html = "<html>\n<head>\n</head>\n<body>\n  <!-- c -->\n  <p>hi</p>\n</body>\n</html>\n";
        let out = stage(&[], 10_000).apply(html).unwrap();
        assert!(out.len() < html.len());
        assert!(out.contains("</body>"));
    }

    #[cfg(unix)]
    #[test]
    fn test_external_command() {
        let out = stage(&["tr", "-d", "\\n"], 10_000).apply("<p>\nx\n</p>").unwrap();
        assert_eq!(out, "<p>x</p>");
    }

    #[cfg(unix)]
    #[test]
    fn test_external_timeout() {
        let err = stage(&["sleep", "5"], 50).apply("<p></p>").unwrap_err();
        assert!(matches!(err, StageError::Exec(ExecError::Timeout(..))));
    }

    #[cfg(unix)]
    #[test]
    fn test_external_failure() {
        let err = stage(&["false"], 10_000).apply("<p></p>").unwrap_err();
        assert!(matches!(err, StageError::Exec(ExecError::Failed { .. })));
    }
}
