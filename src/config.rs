use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    BADGE_BLUR_FACTOR, BADGE_INTERVAL_MS, FETCH_DEBOUNCE_MS, MAX_RETRIES, MAX_RETRY_DELAY_SECS,
    RETRY_INITIAL_DELAY_MS, SCRUNCH_THRESHOLD,
};
use crate::retry::RetryPolicy;
use crate::state::Group;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub inbox: InboxConfig,
    #[serde(default)]
    pub badge: BadgeConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Groups offered as list filters
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_threads_path")]
    pub threads_path: String,
    #[serde(default = "default_messages_path")]
    pub messages_path: String,
    #[serde(default = "default_unread_path")]
    pub unread_path: String,
    /// Root the client-side routes are relative to
    #[serde(default = "default_history_root")]
    pub history_root: String,
    /// Sent as `csrfmiddlewaretoken` with every mutation
    #[serde(default)]
    pub csrf_token: String,
    /// Raw `Cookie` header for an existing session
    #[serde(default)]
    pub session_cookie: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            threads_path: default_threads_path(),
            messages_path: default_messages_path(),
            unread_path: default_unread_path(),
            history_root: default_history_root(),
            csrf_token: String::new(),
            session_cookie: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboxConfig {
    /// Debounce for thread list refreshes
    #[serde(default = "default_fetch_debounce_ms")]
    pub fetch_debounce_ms: u64,
    /// Read messages a thread may show before older ones collapse
    #[serde(default = "default_scrunch_threshold")]
    pub scrunch_threshold: usize,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            fetch_debounce_ms: default_fetch_debounce_ms(),
            scrunch_threshold: default_scrunch_threshold(),
        }
    }
}

impl InboxConfig {
    pub fn fetch_debounce(&self) -> Duration {
        Duration::from_millis(self.fetch_debounce_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BadgeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Poll interval while focused
    #[serde(default = "default_badge_interval_ms")]
    pub interval_ms: u64,
    /// Blurred interval is `interval_ms * blur_factor`
    #[serde(default = "default_blur_factor")]
    pub blur_factor: u32,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_badge_interval_ms(),
            blur_factor: default_blur_factor(),
        }
    }
}

impl BadgeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_retry_initial_delay_ms(),
            max_delay_secs: default_retry_max_delay_secs(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_secs(self.max_delay_secs),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub id: u64,
    pub name: String,
}

impl From<&GroupConfig> for Group {
    fn from(g: &GroupConfig) -> Self {
        Group::new(g.id, g.name.clone())
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_threads_path() -> String {
    "/messages/json/threads/".to_string()
}

fn default_messages_path() -> String {
    "/messages/".to_string()
}

fn default_unread_path() -> String {
    "/messages/unread-message-count/".to_string()
}

fn default_history_root() -> String {
    "/messages/".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_fetch_debounce_ms() -> u64 {
    FETCH_DEBOUNCE_MS
}

fn default_scrunch_threshold() -> usize {
    SCRUNCH_THRESHOLD
}

fn default_true() -> bool {
    true
}

fn default_badge_interval_ms() -> u64 {
    BADGE_INTERVAL_MS
}

fn default_blur_factor() -> u32 {
    BADGE_BLUR_FACTOR
}

fn default_max_retries() -> u32 {
    MAX_RETRIES
}

fn default_retry_initial_delay_ms() -> u64 {
    RETRY_INITIAL_DELAY_MS
}

fn default_retry_max_delay_secs() -> u64 {
    MAX_RETRY_DELAY_SECS
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("inboxnav");
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load the config file, falling back to defaults when it doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            tracing::info!(
                "No configuration at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.badge.blur_factor == 0 {
            anyhow::bail!("badge.blur_factor must be at least 1");
        }
        Ok(config)
    }

    pub fn groups(&self) -> Vec<Group> {
        self.groups.iter().map(Group::from).collect()
    }
}
