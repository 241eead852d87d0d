//! Running database client tools.
//!
//! Dumps and imports can be large, so stdout/stdin are streamed rather than
//! buffered. stderr is drained on a separate thread so a chatty tool cannot
//! block on a full pipe.

use super::EngineResult;
use crate::error::EngineError;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Finds a client tool in `tools_dir`, or in `PATH` when none is given.
pub fn locate(tool: &str, tools_dir: Option<&Path>) -> EngineResult<PathBuf> {
    let found = match tools_dir {
        Some(dir) => which::which_in(tool, Some(dir), dir),
        None => which::which(tool),
    };
    found.map_err(|_| EngineError::ToolNotFound {
        tool: tool.to_string(),
    })
}

/// A client tool invocation.
pub struct ToolCommand {
    name: &'static str,
    args: Vec<String>,
    command: Command,
}

impl ToolCommand {
    /// Prepares an invocation of `name`, failing if it is not installed.
    pub fn new(name: &'static str, tools_dir: Option<&Path>) -> EngineResult<Self> {
        let program = locate(name, tools_dir)?;
        Ok(Self {
            name,
            args: Vec::new(),
            command: Command::new(program),
        })
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        let arg = arg.into();
        self.command.arg(&arg);
        self.args.push(arg);
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Sets an environment variable. Values are never logged.
    pub fn env(&mut self, key: &str, value: &str) -> &mut Self {
        self.command.env(key, value);
        self
    }

    /// Runs the tool and returns its stdout.
    pub fn output_text(mut self) -> EngineResult<String> {
        debug!("Running: {} {}", self.name, self.args.join(" "));
        let output = self
            .command
            .stdin(Stdio::null())
            .output()?;
        if !output.status.success() {
            return Err(self.failure(output.status, &String::from_utf8_lossy(&output.stderr)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Runs the tool, streaming its stdout into `out`.
    pub fn stream_stdout(mut self, out: &mut dyn Write) -> EngineResult<()> {
        debug!("Streaming: {} {}", self.name, self.args.join(" "));
        let mut child = self
            .command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stderr = drain_stderr(&mut child);

        let copied = match child.stdout.take() {
            Some(mut stdout) => io::copy(&mut stdout, out).map(|_| ()),
            None => Ok(()),
        };
        if let Err(e) = copied {
            // A killed tool always fails; the write error is the cause.
            let _ = child.kill();
            let _ = child.wait();
            join_stderr(stderr);
            return Err(EngineError::Io(e));
        }

        let status = child.wait()?;
        let stderr = join_stderr(stderr);
        if !status.success() {
            return Err(self.failure(status, &stderr));
        }
        Ok(())
    }

    /// Runs the tool, feeding `input` to its stdin.
    pub fn feed_stdin(mut self, input: &mut dyn Read) -> EngineResult<()> {
        debug!("Feeding: {} {}", self.name, self.args.join(" "));
        let mut child = self
            .command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        let stderr = drain_stderr(&mut child);

        let copied = match child.stdin.take() {
            // stdin is dropped at the end of this arm, closing the pipe
            Some(mut stdin) => io::copy(input, &mut stdin).map(|_| ()),
            None => Ok(()),
        };
        if let Err(e) = &copied {
            if e.kind() != io::ErrorKind::BrokenPipe {
                let _ = child.kill();
            }
        }

        let status = child.wait()?;
        let stderr = join_stderr(stderr);
        // A tool that exits early breaks the pipe; its own error is the useful one.
        if !status.success() {
            return Err(self.failure(status, &stderr));
        }
        copied.map_err(EngineError::from)
    }

    fn failure(&self, status: ExitStatus, stderr: &str) -> EngineError {
        EngineError::CommandFailed {
            tool: self.name.to_string(),
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        }
    }
}

fn drain_stderr(child: &mut Child) -> Option<JoinHandle<String>> {
    child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        })
    })
}

fn join_stderr(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool() {
        let err = locate("sitekeep-definitely-not-installed", None).unwrap_err();
        assert!(matches!(err, EngineError::ToolNotFound { .. }));
    }

    #[test]
    fn test_stream_stdout() {
        let mut cmd = ToolCommand::new("echo", None).unwrap();
        cmd.arg("hello");
        let mut out = Vec::new();
        cmd.stream_stdout(&mut out).unwrap();
        assert_eq!(out, b"hello\n");
    }

    struct Unwritable;

    impl Write for Unwritable {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "No space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stream_stdout_reports_write_error() {
        let mut cmd = ToolCommand::new("sh", None).unwrap();
        cmd.args(["-c", "echo first"]);
        let err = cmd.stream_stdout(&mut Unwritable).unwrap_err();
        match err {
            EngineError::Io(e) => assert_eq!(e.to_string(), "No space left on device"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_feed_stdin() {
        let cmd = ToolCommand::new("cat", None).unwrap();
        let mut input: &[u8] = b"SELECT 1;";
        cmd.feed_stdin(&mut input).unwrap();
    }

    #[test]
    fn test_failure_captures_stderr() {
        let mut cmd = ToolCommand::new("sh", None).unwrap();
        cmd.args(["-c", "echo broken >&2; exit 3"]);
        let err = cmd.output_text().unwrap_err();
        match err {
            EngineError::CommandFailed { tool, stderr, .. } => {
                assert_eq!(tool, "sh");
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
