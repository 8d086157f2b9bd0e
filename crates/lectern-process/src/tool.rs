//! Running external command-line tools.

use crate::error::{ProcessError, ProcessResult};
use std::io::Read;
use std::path::Path;
use std::process::{ChildStderr, Command, Output};
use std::thread::JoinHandle;
use tracing::debug;

/// Most stderr kept for an error message.
const STDERR_TAIL: usize = 8 * 1024;

/// Fail with `ToolNotFound` unless `tool` is on the PATH.
pub(crate) fn require(tool: &str) -> ProcessResult<()> {
    which::which(tool)
        .map(|_| ())
        .map_err(|_| ProcessError::ToolNotFound {
            tool: tool.to_string(),
        })
}

/// Fail with `FileNotFound` unless `path` exists.
pub(crate) fn require_file(path: &Path) -> ProcessResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ProcessError::FileNotFound(path.to_path_buf()))
    }
}

/// Run a prepared command and turn a non-zero exit into `ToolFailed`.
pub(crate) fn run(tool: &str, command: &mut Command) -> ProcessResult<Output> {
    debug!("Running {:?}", command);
    let output = command.output()?;

    if !output.status.success() {
        return Err(ProcessError::ToolFailed {
            tool: tool.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

/// Read a child's stderr to the end on its own thread.
///
/// A child blocked on a full stderr pipe never finishes its stdout, so any
/// caller streaming stdout must drain stderr concurrently. The handle yields
/// the last [`STDERR_TAIL`] bytes.
pub(crate) fn drain_stderr(mut stderr: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut tail: Vec<u8> = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match stderr.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    tail.extend_from_slice(&buf[..n]);
                    if tail.len() > STDERR_TAIL * 2 {
                        tail.drain(..tail.len() - STDERR_TAIL);
                    }
                }
            }
        }
        let start = tail.len().saturating_sub(STDERR_TAIL);
        String::from_utf8_lossy(&tail[start..]).trim().to_string()
    })
}
