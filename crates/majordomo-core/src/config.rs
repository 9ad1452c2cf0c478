use std::time::Duration;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 18710;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// How often the cron lane of the scheduler checks for due tasks.
pub const CRON_CHECK_SECS: u64 = 30;
/// Agent state is forced back to idle when the last hook event is older than this.
pub const AGENT_STATE_STALE_SECS: u64 = 600;
/// Hard ceiling on a pending voice response wait.
pub const VOICE_WAIT_SECS: u64 = 30;
/// Header injected by the public reverse proxy; admin routes 404 when present.
pub const EXTERNAL_ORIGIN_HEADER: &str = "x-external-origin";

/// Top-level config (majordomo.yaml + MAJORDOMO_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MajordomoConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tmux: TmuxConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub transcript: TranscriptConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub agent_comms: AgentCommsConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Displayed agent name — used in logs and as our peer identity.
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default = "default_agent_role")]
    pub role: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            role: default_agent_role(),
        }
    }
}

/// Which pane the session bridge talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmuxConfig {
    #[serde(default = "default_tmux_session")]
    pub session: String,
    /// Named tmux socket (`tmux -L <socket>`), isolating us from the user's default server.
    #[serde(default = "default_tmux_socket")]
    pub socket: String,
    /// Command run inside a freshly spawned session.
    #[serde(default = "default_tmux_command")]
    pub command: String,
}

impl Default for TmuxConfig {
    fn default() -> Self {
        Self {
            session: default_tmux_session(),
            socket: default_tmux_socket(),
            command: default_tmux_command(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// One of debug/info/warn/error. RUST_LOG overrides when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    #[serde(default)]
    pub log_rotation: LogRotationConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            state_dir: default_state_dir(),
            log_rotation: LogRotationConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Absolute path of a file inside the daemon state directory.
    pub fn state_path(&self, file: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRotationConfig {
    /// Soft per-file cap; rotation is daily, this bounds pathological days.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for LogRotationConfig {
    fn default() -> Self {
        Self {
            max_size_mb: default_max_size_mb(),
            max_files: default_max_files(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    /// Directory scanned for the newest `*.jsonl` transcript.
    #[serde(default = "default_transcript_dir")]
    pub dir: String,
    /// Safety-net polling cadence (interval string, e.g. "20s").
    #[serde(default = "default_transcript_poll")]
    pub poll_interval: String,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            dir: default_transcript_dir(),
            poll_interval: default_transcript_poll(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    pub telegram: Option<TelegramConfig>,
    pub email: Option<EmailConfig>,
    pub voice: Option<VoiceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Vault name of the bot token (never the token itself).
    pub bot_token_secret: String,
    /// Chat the primary human talks to us from.
    pub primary_chat_id: i64,
    /// Optional webhook ingress path served by the gateway; long polling when absent.
    pub webhook_path: Option<String>,
    /// Vault name of the webhook HMAC secret.
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Ordered list of mail backends; the first healthy provider wins.
    #[serde(default)]
    pub providers: Vec<EmailProviderConfig>,
    #[serde(default)]
    pub triage: TriageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailProviderConfig {
    pub name: String,
    /// Provider kind label (spool, imap, jmap, graph, …) — resolved by the
    /// adapter; unknown kinds are skipped with a startup warning.
    pub kind: String,
    pub address: String,
    /// Vault name of the provider credential.
    pub secret: Option<String>,
    /// Spool directory, for the filesystem-backed provider.
    pub dir: Option<String>,
}

/// String or regex patterns used by the triage classifier.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TriageConfig {
    #[serde(default)]
    pub vip: Vec<String>,
    #[serde(default)]
    pub junk: Vec<String>,
    #[serde(default)]
    pub newsletters: Vec<String>,
    #[serde(default)]
    pub receipts: Vec<String>,
    #[serde(default)]
    pub auto_read: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_stt")]
    pub stt: String,
    #[serde(default = "default_tts")]
    pub tts: String,
    pub wake_word: Option<String>,
    /// Registered voice client label (satellite hostname or app id).
    pub client: Option<String>,
    /// Who may open a conversation: "wake-word" or "push".
    #[serde(default = "default_voice_initiation")]
    pub initiation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentCommsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Vault name of the shared LAN bearer secret.
    #[serde(default = "default_comms_secret")]
    pub secret: String,
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Tried when the hostname is unreachable before declaring the peer down.
    pub fallback_ip: Option<String>,
    /// Base64 Ed25519 public key, when pinned out-of-band.
    pub public_key: Option<String>,
    #[serde(default)]
    pub teams: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    /// Relay participation (optional fallback when LAN delivery fails).
    #[serde(default)]
    pub enabled: bool,
    pub relay_url: Option<String>,
    #[serde(default = "default_relay_poll")]
    pub poll_interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub tasks: Vec<ScheduledTaskConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTaskConfig {
    pub name: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Interval string ("3m", "1h"). Exactly one of interval/cron should be set.
    pub interval: Option<String>,
    /// Standard five-field cron expression.
    pub cron: Option<String>,
    /// Task-specific settings, passed through opaquely.
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
    /// Consecutive denials before an unknown sender is auto-blocked.
    #[serde(default = "default_auto_block")]
    pub auto_block_after: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_incoming_max")]
    pub incoming_max_per_minute: u32,
    #[serde(default = "default_outgoing_max")]
    pub outgoing_max_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            incoming_max_per_minute: default_incoming_max(),
            outgoing_max_per_minute: default_outgoing_max(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_agent_name() -> String {
    "majordomo".to_string()
}
fn default_agent_role() -> String {
    "personal assistant".to_string()
}
fn default_tmux_session() -> String {
    "claude".to_string()
}
fn default_tmux_socket() -> String {
    "majordomo".to_string()
}
fn default_tmux_command() -> String {
    "claude".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_dir() -> String {
    home_subdir("logs")
}
fn default_state_dir() -> String {
    home_subdir("state")
}
fn default_max_size_mb() -> u64 {
    50
}
fn default_max_files() -> usize {
    5
}
fn default_transcript_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.claude/projects")
}
fn default_transcript_poll() -> String {
    "20s".to_string()
}
fn default_stt() -> String {
    "whisper".to_string()
}
fn default_tts() -> String {
    "piper".to_string()
}
fn default_voice_initiation() -> String {
    "wake-word".to_string()
}
fn default_comms_secret() -> String {
    "agent-comms-secret".to_string()
}
fn default_relay_poll() -> String {
    "30s".to_string()
}
fn default_auto_block() -> u32 {
    3
}
fn default_incoming_max() -> u32 {
    5
}
fn default_outgoing_max() -> u32 {
    10
}

fn home_subdir(leaf: &str) -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.majordomo/{leaf}")
}

impl MajordomoConfig {
    /// Load config from a YAML file with MAJORDOMO_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ./majordomo.yaml (project root)
    ///   3. ~/.majordomo/majordomo.yaml
    ///
    /// Unknown keys are ignored; missing keys fall back to defaults.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: MajordomoConfig = Figment::new()
            .merge(Yaml::file(&path))
            .merge(Env::prefixed("MAJORDOMO_").split("__"))
            .extract()
            .map_err(|e| crate::error::MajordomoError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    if std::path::Path::new("majordomo.yaml").exists() {
        return "majordomo.yaml".to_string();
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.majordomo/majordomo.yaml")
}

/// Parse an interval string into a [`Duration`].
///
/// Accepts bare seconds (`"90"`) or a `s`/`m`/`h`/`d` suffix (`"3m"`, `"1h"`).
pub fn parse_interval(s: &str) -> crate::error::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::error::MajordomoError::Config(
            "empty interval string".to_string(),
        ));
    }

    let (digits, unit) = match s.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => s.split_at(idx),
        None => (s, "s"),
    };

    let value: u64 = digits.parse().map_err(|_| {
        crate::error::MajordomoError::Config(format!("invalid interval: {s:?}"))
    })?;

    let secs = match unit {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3_600,
        "d" => value * 86_400,
        other => {
            return Err(crate::error::MajordomoError::Config(format!(
                "unknown interval unit {other:?} in {s:?}"
            )))
        }
    };

    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_interval_bare_seconds() {
        assert_eq!(parse_interval("90").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn parse_interval_suffixes() {
        assert_eq!(parse_interval("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_interval("3m").unwrap(), Duration::from_secs(180));
        assert_eq!(parse_interval("1h").unwrap(), Duration::from_secs(3_600));
        assert_eq!(parse_interval("2d").unwrap(), Duration::from_secs(172_800));
    }

    #[test]
    fn parse_interval_rejects_garbage() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("fast").is_err());
        assert!(parse_interval("5w").is_err());
        assert!(parse_interval("m5").is_err());
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let config: MajordomoConfig = Figment::new()
            .merge(Yaml::string("agent:\n  name: bmo\n"))
            .extract()
            .unwrap();
        assert_eq!(config.agent.name, "bmo");
        assert_eq!(config.daemon.port, DEFAULT_PORT);
        assert_eq!(config.security.rate_limits.incoming_max_per_minute, 5);
        assert_eq!(config.security.auto_block_after, 3);
        assert!(config.channels.telegram.is_none());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config: MajordomoConfig = Figment::new()
            .merge(Yaml::string(
                "agent:\n  name: bmo\nfuture_section:\n  x: 1\n",
            ))
            .extract()
            .unwrap();
        assert_eq!(config.agent.name, "bmo");
    }

    #[test]
    fn scheduler_tasks_parse_interval_or_cron() {
        let yaml = r#"
scheduler:
  tasks:
    - name: email-check
      cron: "*/15 * * * *"
    - name: peer-heartbeat
      interval: 5m
      enabled: false
"#;
        let config: MajordomoConfig =
            Figment::new().merge(Yaml::string(yaml)).extract().unwrap();
        assert_eq!(config.scheduler.tasks.len(), 2);
        assert_eq!(config.scheduler.tasks[0].cron.as_deref(), Some("*/15 * * * *"));
        assert!(config.scheduler.tasks[0].enabled);
        assert_eq!(config.scheduler.tasks[1].interval.as_deref(), Some("5m"));
        assert!(!config.scheduler.tasks[1].enabled);
    }
}
