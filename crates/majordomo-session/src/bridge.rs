//! `SessionBridge` — drives the tmux CLI against a named socket.
//!
//! All pane I/O is best-effort: a failed inject is logged and reported as
//! `false`, never propagated. No retries of the whole inject at this layer —
//! callers decide.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use majordomo_core::config::TmuxConfig;
use majordomo_core::types::AgentSnapshot;

use crate::error::{Result, SessionError};
use crate::state::AgentStateTracker;

/// Lines captured from the bottom of the pane buffer.
const CAPTURE_LINES: u32 = 120;
/// Pane tail lines inspected when confirming submission.
const CONFIRM_TAIL_LINES: usize = 5;
/// Payload prefix length used for the confirmation check.
const CONFIRM_PREFIX_CHARS: usize = 40;
/// Extra Enter presses after the first before giving up.
const ENTER_RETRIES: u32 = 2;
/// Settle time after the pane-dismiss Escape.
const DISMISS_DELAY: Duration = Duration::from_millis(50);
/// Settle time between typing, Enter, and confirmation captures.
const CONFIRM_DELAY: Duration = Duration::from_millis(300);

/// Single owner of all interaction with the Claude pane.
pub struct SessionBridge {
    tmux_bin: String,
    socket: String,
    session: String,
    command: String,
    transcript_dir: PathBuf,
    state: AgentStateTracker,
    /// Serializes injects — concurrent callers get first-come-first-served.
    inject_lock: Mutex<()>,
}

impl SessionBridge {
    pub fn new(tmux: &TmuxConfig, transcript_dir: PathBuf) -> Self {
        Self {
            tmux_bin: "tmux".to_string(),
            socket: tmux.socket.clone(),
            session: tmux.session.clone(),
            command: tmux.command.clone(),
            transcript_dir,
            state: AgentStateTracker::new(),
            inject_lock: Mutex::new(()),
        }
    }

    /// Override the tmux binary path (tests point this at a stub).
    pub fn with_tmux_bin(mut self, bin: impl Into<String>) -> Self {
        self.tmux_bin = bin.into();
        self
    }

    // -----------------------------------------------------------------------
    // Agent state
    // -----------------------------------------------------------------------

    /// Record a hook event (`Stop` → idle, anything else → busy).
    pub fn update_agent_state(&self, hook_event: &str) {
        self.state.update(hook_event);
    }

    pub fn is_agent_idle(&self) -> bool {
        self.state.is_idle()
    }

    pub fn agent_snapshot(&self) -> AgentSnapshot {
        self.state.snapshot()
    }

    // -----------------------------------------------------------------------
    // Pane operations
    // -----------------------------------------------------------------------

    /// Whether the configured tmux session currently exists.
    pub async fn session_exists(&self) -> bool {
        match self.tmux(&["has-session", "-t", &self.session]).await {
            Ok(out) => out.status.success(),
            Err(e) => {
                error!(error = %e, "tmux has-session failed");
                false
            }
        }
    }

    /// Spawn the detached session if absent. Returns true when a new session
    /// was created.
    pub async fn start_session(&self) -> Result<bool> {
        if self.session_exists().await {
            return Ok(false);
        }
        let out = self
            .tmux(&["new-session", "-d", "-s", &self.session, &self.command])
            .await?;
        if !out.status.success() {
            return Err(SessionError::Command {
                command: "new-session".to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }
        info!(session = %self.session, "spawned detached session");
        Ok(true)
    }

    /// Capture the last ~[`CAPTURE_LINES`] lines of the pane buffer,
    /// ANSI-stripped.
    pub async fn capture_pane(&self) -> Result<String> {
        let start = format!("-{CAPTURE_LINES}");
        let out = self
            .tmux(&["capture-pane", "-p", "-t", &self.session, "-S", &start])
            .await?;
        if !out.status.success() {
            return Err(SessionError::Command {
                command: "capture-pane".to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }
        Ok(strip_text(&out.stdout))
    }

    /// Type `text` into the pane as if entered by the user.
    ///
    /// A pane-dismiss Escape is sent first so any autocomplete/menu is
    /// cleared. The payload is typed literally (`send-keys -l`). With
    /// `press_enter`, submission is confirmed by re-capturing the pane and
    /// re-pressing Enter while the payload prefix is still visible on the
    /// tail lines, up to [`ENTER_RETRIES`] extra times.
    ///
    /// Returns `true` only if the tmux command sequence completed without
    /// I/O errors. An unconfirmed submit after all retries is logged, not
    /// fatal.
    pub async fn inject_text(&self, text: &str, press_enter: bool) -> bool {
        let _guard = self.inject_lock.lock().await;

        if !self.session_exists().await {
            error!(session = %self.session, "inject refused: session does not exist");
            return false;
        }

        match self.try_inject(text, press_enter).await {
            Ok(()) => {
                debug!(chars = text.len(), press_enter, "inject complete");
                true
            }
            Err(e) => {
                error!(error = %e, "inject failed");
                false
            }
        }
    }

    async fn try_inject(&self, text: &str, press_enter: bool) -> Result<()> {
        self.send_keys(&["Escape"]).await?;
        tokio::time::sleep(DISMISS_DELAY).await;

        // -l types the payload literally; tmux handles all quoting.
        let out = self
            .tmux(&["send-keys", "-t", &self.session, "-l", "--", text])
            .await?;
        if !out.status.success() {
            return Err(SessionError::Command {
                command: "send-keys -l".to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }

        if !press_enter {
            return Ok(());
        }

        tokio::time::sleep(CONFIRM_DELAY).await;
        self.send_keys(&["Enter"]).await?;

        let needle = confirm_needle(text);
        if needle.is_empty() {
            return Ok(());
        }

        for attempt in 1..=ENTER_RETRIES {
            tokio::time::sleep(CONFIRM_DELAY).await;
            let pane = self.capture_pane().await?;
            if !tail_contains(&pane, &needle) {
                return Ok(());
            }
            warn!(attempt, "payload still visible in pane, retrying Enter");
            self.send_keys(&["Enter"]).await?;
        }

        tokio::time::sleep(CONFIRM_DELAY).await;
        let pane = self.capture_pane().await?;
        if tail_contains(&pane, &needle) {
            warn!("submit unconfirmed after {} attempts", ENTER_RETRIES + 1);
        }
        Ok(())
    }

    /// Path of the newest transcript file for this session, if any.
    pub fn newest_transcript_path(&self) -> Option<PathBuf> {
        majordomo_transcript::discover::newest_transcript(&self.transcript_dir)
            .ok()
            .flatten()
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    async fn send_keys(&self, keys: &[&str]) -> Result<std::process::Output> {
        let mut args = vec!["send-keys", "-t", self.session.as_str()];
        args.extend_from_slice(keys);
        let out = self.tmux(&args).await?;
        if !out.status.success() {
            return Err(SessionError::Command {
                command: format!("send-keys {}", keys.join(" ")),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }
        Ok(out)
    }

    async fn tmux(&self, args: &[&str]) -> Result<std::process::Output> {
        tokio::process::Command::new(&self.tmux_bin)
            .arg("-L")
            .arg(&self.socket)
            .args(args)
            .output()
            .await
            .map_err(|e| SessionError::Spawn(format!("{}: {e}", self.tmux_bin)))
    }
}

/// First [`CONFIRM_PREFIX_CHARS`] characters of the payload's first line.
fn confirm_needle(text: &str) -> String {
    text.lines()
        .next()
        .unwrap_or("")
        .chars()
        .take(CONFIRM_PREFIX_CHARS)
        .collect()
}

/// Whether any of the last [`CONFIRM_TAIL_LINES`] lines contains `needle`.
fn tail_contains(pane: &str, needle: &str) -> bool {
    let lines: Vec<&str> = pane.lines().collect();
    let start = lines.len().saturating_sub(CONFIRM_TAIL_LINES);
    lines[start..].iter().any(|line| line.contains(needle))
}

/// Strip ANSI escape codes and convert bytes to a UTF-8 string.
fn strip_text(raw: &[u8]) -> String {
    let clean = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&clean).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    /// Write a tmux stub that appends its argv to a log file and behaves per
    /// the embedded case table.
    fn stub_tmux(dir: &std::path::Path, body: &str) -> String {
        let log = dir.join("calls.log");
        let script = dir.join("tmux");
        let content = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$*\" >> {log}\n{body}\nexit 0\n",
            log = log.display()
        );
        let mut f = std::fs::File::create(&script).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        let mut perms = f.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();
        script.display().to_string()
    }

    fn calls(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn bridge(dir: &std::path::Path, body: &str) -> SessionBridge {
        let tmux = TmuxConfig::default();
        SessionBridge::new(&tmux, dir.join("transcripts")).with_tmux_bin(stub_tmux(dir, body))
    }

    #[tokio::test]
    async fn session_exists_reflects_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let b = bridge(
            dir.path(),
            "case \"$*\" in *has-session*) exit 1;; esac",
        );
        assert!(!b.session_exists().await);
    }

    #[tokio::test]
    async fn inject_sends_dismiss_literal_and_enter_in_order() {
        let dir = tempfile::tempdir().unwrap();
        // Empty pane capture — payload never visible, no retries.
        let b = bridge(dir.path(), "case \"$*\" in *capture-pane*) echo ready;; esac");

        assert!(b.inject_text("hello there", true).await);

        let log = calls(dir.path());
        let seq: Vec<&String> = log.iter().filter(|l| l.contains("send-keys")).collect();
        assert!(seq[0].contains("Escape"), "first send is the dismiss: {seq:?}");
        assert!(seq[1].contains("-l -- hello there"), "literal payload: {seq:?}");
        assert!(seq[2].contains("Enter"), "then Enter: {seq:?}");
        assert_eq!(seq.len(), 3, "no retries when pane is clear: {seq:?}");
    }

    #[tokio::test]
    async fn inject_without_enter_skips_submission() {
        let dir = tempfile::tempdir().unwrap();
        let b = bridge(dir.path(), "");

        assert!(b.inject_text("draft text", false).await);

        let log = calls(dir.path());
        assert!(!log.iter().any(|l| l.contains("Enter")));
    }

    #[tokio::test]
    async fn inject_retries_enter_while_payload_visible() {
        let dir = tempfile::tempdir().unwrap();
        // Pane always shows the payload — all retries fire.
        let b = bridge(
            dir.path(),
            "case \"$*\" in *capture-pane*) echo 'stuck payload that never submits';; esac",
        );

        assert!(b.inject_text("stuck payload that never submits", true).await);

        let log = calls(dir.path());
        let enters = log
            .iter()
            .filter(|l| l.contains("send-keys") && l.contains("Enter"))
            .count();
        assert_eq!(enters, 3, "initial Enter plus two retries: {log:?}");
    }

    #[tokio::test]
    async fn inject_refused_when_session_missing() {
        let dir = tempfile::tempdir().unwrap();
        let b = bridge(
            dir.path(),
            "case \"$*\" in *has-session*) exit 1;; esac",
        );

        assert!(!b.inject_text("anything", true).await);

        let log = calls(dir.path());
        assert!(!log.iter().any(|l| l.contains("-l")));
    }

    #[tokio::test]
    async fn capture_pane_strips_ansi() {
        let dir = tempfile::tempdir().unwrap();
        let b = bridge(
            dir.path(),
            "case \"$*\" in *capture-pane*) printf '\\033[31mred\\033[0m plain\\n';; esac",
        );

        let pane = b.capture_pane().await.unwrap();
        assert_eq!(pane.trim_end(), "red plain");
    }

    #[tokio::test]
    async fn start_session_is_noop_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let b = bridge(dir.path(), "");
        assert!(!b.start_session().await.unwrap());

        let dir2 = tempfile::tempdir().unwrap();
        let b2 = bridge(
            dir2.path(),
            "case \"$*\" in *has-session*) exit 1;; esac",
        );
        assert!(b2.start_session().await.unwrap());
        assert!(calls(dir2.path()).iter().any(|l| l.contains("new-session")));
    }

    #[test]
    fn confirm_needle_uses_first_line_prefix() {
        let long = format!("{}\nsecond line", "x".repeat(100));
        assert_eq!(confirm_needle(&long), "x".repeat(40));
        assert_eq!(confirm_needle("short"), "short");
        assert_eq!(confirm_needle(""), "");
    }

    #[test]
    fn tail_contains_only_checks_last_five_lines() {
        let pane = "needle\na\nb\nc\nd\ne\nf";
        assert!(!tail_contains(pane, "needle"));
        let pane = "a\nb\nneedle here\nc\nd";
        assert!(tail_contains(pane, "needle"));
    }
}
