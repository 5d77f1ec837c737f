//! Connection settings for the Letta agent.
//!
//! Values come from an optional TOML file and are then overridden by
//! `LETTA_*` environment variables. A resolved [`LettaConfig`] is read once
//! per call and never mutated while the call runs.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use tokio::process::Command;
use tracing::warn;

use crate::error::{LettaError, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8283";

const ENV_BASE_URL: &str = "LETTA_BASE_URL";
const ENV_AGENT_ID: &str = "LETTA_AGENT_ID";
const ENV_PASSWORD: &str = "LETTA_PASSWORD";
const ENV_SHOW_REASONING: &str = "LETTA_SHOW_REASONING";
const ENV_SHOW_USAGE_STATS: &str = "LETTA_SHOW_USAGE_STATS";
const ENV_TIMEOUT_SECS: &str = "LETTA_TIMEOUT_SECS";
const ENV_CONNECT_TIMEOUT_SECS: &str = "LETTA_CONNECT_TIMEOUT_SECS";

#[derive(Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LettaConfig {
    /// Agent server root, e.g. `https://letta.example.com`.
    pub base_url: String,
    pub agent_id: String,
    pub password: String,
    /// Command to run to get the password when `password` is empty.
    /// The command is run via `sh -c`.
    pub password_cmd: Option<String>,
    /// Surface `reasoning_message` frames in snapshots.
    pub show_reasoning: bool,
    /// Surface `usage_statistics` frames in snapshots.
    pub show_usage_stats: bool,
    /// Whole-request timeout, including the streamed body.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for LettaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            agent_id: String::new(),
            password: String::new(),
            password_cmd: None,
            show_reasoning: true,
            show_usage_stats: true,
            timeout_secs: 120,
            connect_timeout_secs: 10,
        }
    }
}

impl fmt::Debug for LettaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LettaConfig")
            .field("base_url", &self.base_url)
            .field("agent_id", &self.agent_id)
            .field("password", &"<redacted>")
            .field("password_cmd", &self.password_cmd)
            .field("show_reasoning", &self.show_reasoning)
            .field("show_usage_stats", &self.show_usage_stats)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Agent id and password, checked non-empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub agent_id: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("agent_id", &self.agent_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl LettaConfig {
    /// Config file (if any) with environment overrides applied.
    pub fn load() -> Self {
        Self::load_file_or_default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides taken from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_overrides(lookup)
    }

    pub fn from_toml_str(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn load_file_or_default() -> Self {
        let path = config_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to parse config file");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Apply `LETTA_*` overrides from `lookup` on top of `self`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(agent_id) = lookup(ENV_AGENT_ID) {
            self.agent_id = agent_id;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = password;
        }
        if let Some(value) = lookup(ENV_SHOW_REASONING) {
            self.show_reasoning = parse_flag(&value);
        }
        if let Some(value) = lookup(ENV_SHOW_USAGE_STATS) {
            self.show_usage_stats = parse_flag(&value);
        }
        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = parse_secs(ENV_TIMEOUT_SECS, &value, self.timeout_secs);
        }
        if let Some(value) = lookup(ENV_CONNECT_TIMEOUT_SECS) {
            self.connect_timeout_secs =
                parse_secs(ENV_CONNECT_TIMEOUT_SECS, &value, self.connect_timeout_secs);
        }
        self
    }

    /// Resolve the agent id and password, failing if either is empty.
    ///
    /// Runs `password_cmd` without blocking the executor, so a pending
    /// call can still be cancelled while the command runs.
    pub async fn credentials(&self) -> Result<Credentials> {
        if self.agent_id.trim().is_empty() {
            return Err(LettaError::Configuration(format!(
                "{ENV_AGENT_ID} must be set"
            )));
        }

        let password = self.resolve_password().await?;
        if password.is_empty() {
            return Err(LettaError::Configuration(format!(
                "{ENV_PASSWORD} must be set"
            )));
        }

        Ok(Credentials {
            agent_id: self.agent_id.clone(),
            password,
        })
    }

    pub async fn validate(&self) -> Result<()> {
        self.credentials().await.map(|_| ())
    }

    async fn resolve_password(&self) -> Result<String> {
        if !self.password.is_empty() {
            return Ok(self.password.clone());
        }

        let Some(cmd) = &self.password_cmd else {
            return Ok(String::new());
        };

        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| LettaError::Configuration(format!("password_cmd failed: {e}")))?;

        if !output.status.success() {
            return Err(LettaError::Configuration(format!(
                "password_cmd exited with {}",
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// `<base_url>/api/v1/agents/<agent_id>/messages/stream`, with
    /// `agent_id` escaped as a single path segment.
    pub fn stream_url(&self, agent_id: &str) -> Result<String> {
        self.endpoint(&["api", "v1", "agents", agent_id, "messages", "stream"])
    }

    /// `<base_url>/api/v1/progress`
    pub fn progress_url(&self) -> Result<String> {
        self.endpoint(&["api", "v1", "progress"])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<String> {
        let invalid = |reason: String| {
            LettaError::Configuration(format!("invalid base_url {:?}: {reason}", self.base_url))
        };

        let mut url = Url::parse(self.base_url()).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn parse_secs(key: &str, value: &str, fallback: u64) -> u64 {
    value.trim().parse().unwrap_or_else(|_| {
        warn!(key, value, "ignoring non-numeric timeout");
        fallback
    })
}

fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("letta-stream").join("config.toml")
}
