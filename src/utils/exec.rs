//! External command execution with stdin piping and a hard deadline.
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! let output = Cmd::from_slice(&["html-minifier-terser", "--collapse-whitespace"])
//!     .stdin(html)
//!     .timeout(Duration::from_secs(10))
//!     .run()?;
//! ```

use std::{
    ffi::{OsStr, OsString},
    io::{Read, Write},
    path::{Path, PathBuf},
    process::{Child, Command, Output, Stdio},
    thread,
    time::{Duration, Instant},
};

use thiserror::Error;

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn `{0}`")]
    Spawn(String, #[source] std::io::Error),

    #[error("I/O error while running `{0}`")]
    Io(String, #[source] std::io::Error),

    #[error("`{0}` did not finish within {1:?}")]
    Timeout(String, Duration),

    #[error("`{name}` exited with {status}: {stderr}")]
    Failed {
        name: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Command builder for external process execution.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    stdin_data: Option<Vec<u8>>,
    timeout: Option<Duration>,
}

impl Cmd {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Create from a command array (e.g., `["npx", "html-minifier-terser"]`).
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| s.as_ref().to_owned())
            .unwrap_or_default();
        Self {
            program,
            args: iter.map(|s| s.as_ref().to_owned()).collect(),
            ..Default::default()
        }
    }

    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Set stdin data to pipe to the process.
    pub fn stdin<D: AsRef<[u8]>>(mut self, data: D) -> Self {
        self.stdin_data = Some(data.as_ref().to_vec());
        self
    }

    /// Kill the process if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    /// Run to completion, returning output of a successful exit.
    pub fn run(self) -> Result<Output, ExecError> {
        let name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| ExecError::Spawn(name.clone(), e))?;

        // Feed stdin from a thread: a large input would otherwise deadlock
        // against a child that fills its stdout pipe first.
        let stdin = child.stdin.take();
        let data = self.stdin_data.unwrap_or_default();
        let writer = thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                let _ = stdin.write_all(&data);
            }
        });

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_deadline(&mut child, self.timeout)
            .map_err(|e| ExecError::Io(name.clone(), e))?;

        // A descendant may still hold the pipes open, so on timeout the
        // writer and drain threads are detached rather than joined.
        let Some(status) = status else {
            return Err(ExecError::Timeout(name, self.timeout.unwrap_or_default()));
        };
        let _ = writer.join();

        let output = Output {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        };

        if !output.status.success() {
            return Err(ExecError::Failed {
                name,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

/// Read a pipe to the end on a background thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Wait for exit. Returns `None` (after killing the child) when the deadline passes.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_stdin_roundtrip() {
        let output = Cmd::new("cat").stdin("hello").run().unwrap();
        assert_eq!(output.stdout, b"hello");
    }

    #[test]
    fn test_timeout_kills_child() {
        let err = Cmd::from_slice(&["sleep", "5"])
            .timeout(Duration::from_millis(50))
            .run()
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout(..)));
    }

    #[test]
    fn test_timeout_with_descendant_holding_stdin() {
        let input = vec![b'x'; 1 << 20];
        let started = Instant::now();
        let err = Cmd::from_slice(&["sh", "-c", "exec 3<&0; sleep 3 <&3 & sleep 3"])
            .stdin(input)
            .timeout(Duration::from_millis(100))
            .run()
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout(..)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_failed_exit() {
        let err = Cmd::new("false").run().unwrap_err();
        assert!(matches!(err, ExecError::Failed { .. }));
    }

    #[test]
    fn test_missing_program() {
        let err = Cmd::new("pageopt-no-such-program").run().unwrap_err();
        assert!(matches!(err, ExecError::Spawn(..)));
    }
}
