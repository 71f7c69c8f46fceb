//! External tool invocation.
//!
//! Every stage of the pipeline drives external tools (bun, codesign, spctl,
//! hdiutil, xcrun) through these helpers so command logging and non-zero-exit
//! handling stay uniform. All invocations are synchronous from the pipeline's
//! point of view: a call returns only once the tool has exited.

use crate::error::{PackagerError, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Output};
use tokio::process::Command;

fn display_command<S: AsRef<OsStr>>(program: &str, args: &[S]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}

/// Runs a tool with inherited stdio, returning its exit status.
///
/// Spawn failures (tool not installed, not executable) are still errors;
/// a non-zero exit is reported through the returned status, so callers
/// decide whether it is fatal.
pub async fn run_status<S: AsRef<OsStr>>(program: &str, args: &[S]) -> Result<ExitStatus> {
    log::info!("  $ {}", display_command(program, args));
    let status = Command::new(program).args(args).status().await?;
    Ok(status)
}

/// Runs a tool with inherited stdio and fails on a non-zero exit.
pub async fn run<S: AsRef<OsStr>>(program: &str, args: &[S]) -> Result<()> {
    let status = run_status(program, args).await?;
    if !status.success() {
        return Err(PackagerError::Subprocess {
            command: display_command(program, args),
            code: status.code(),
            detail: String::new(),
        });
    }
    Ok(())
}

/// Runs a tool with captured output, failing on a non-zero exit with the
/// tool's stderr attached to the error.
pub async fn run_capture<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    cwd: Option<&Path>,
) -> Result<Output> {
    log::debug!("  $ {}", display_command(program, args));
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    let output = command.output().await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PackagerError::Subprocess {
            command: display_command(program, args),
            code: output.status.code(),
            detail: if stderr.trim().is_empty() {
                String::new()
            } else {
                format!("\n{}", stderr.trim_end())
            },
        });
    }
    Ok(output)
}
