//! Process-spawn boundary: run the cached binary and relay its exit code.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::debug;

/// Run `binary` with `args`, inheriting stdin, stdout and stderr.
///
/// Returns the child's exit code. On Unix a child killed by a signal
/// yields `128 + signal`, as shells report it.
pub async fn run_binary(binary: &Path, args: &[String]) -> Result<i32> {
    debug!(binary = %binary.display(), ?args, "Spawning");

    let status = Command::new(binary)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .with_context(|| format!("Failed to execute {}", binary.display()))?;

    Ok(exit_code(status))
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
