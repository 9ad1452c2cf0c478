//! Shell-script execution for the backup and health-check chores.
//!
//! Scripts get a hard five-minute budget; on exceed the child is killed via
//! SIGKILL and the task fails.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tracing::warn;

/// Hard ceiling on script execution.
pub const SCRIPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Run `script` via `sh`, capturing combined output (tail-truncated).
///
/// # Errors
///
/// Fails when the script is missing, exits non-zero, or exceeds `timeout`.
pub async fn run_script(script: &Path, timeout: Duration) -> anyhow::Result<String> {
    if !script.exists() {
        anyhow::bail!("script not found: {}", script.display());
    }

    let child = tokio::process::Command::new("sh")
        .arg(script)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning {}", script.display()))?;

    let pid = child.id();
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let _ = tx.send(child.wait_with_output().await);
    });

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(Ok(output))) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !output.status.success() {
                anyhow::bail!(
                    "script exited with {}: {}",
                    output.status,
                    tail(&stderr, 500)
                );
            }
            Ok(tail(&stdout, 1_000))
        }
        Ok(Ok(Err(e))) => Err(e).context("waiting for script"),
        Ok(Err(_)) => anyhow::bail!("script wait task dropped"),
        Err(_) => {
            if let Some(raw_pid) = pid {
                warn!(script = %script.display(), "script timed out — killing");
                // SAFETY: raw_pid is our direct child, still running.
                #[cfg(unix)]
                unsafe {
                    libc::kill(raw_pid as libc::pid_t, libc::SIGKILL);
                }
            }
            anyhow::bail!("script exceeded {}s and was killed", timeout.as_secs())
        }
    }
}

/// Last `max` characters of `s`, on a char boundary.
fn tail(s: &str, max: usize) -> String {
    let trimmed = s.trim_end();
    if trimmed.chars().count() <= max {
        trimmed.to_string()
    } else {
        let skip = trimmed.chars().count() - max;
        trimmed.chars().skip(skip).collect()
    }
}
