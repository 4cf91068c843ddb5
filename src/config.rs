use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const ENV_FILE: &str = ".env";
const CONFIG_PATH_VAR: &str = "HN_RELAY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";
const BOT_TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
const MAX_RETENTION_HOURS: i64 = 24 * 365 * 10;
const MAX_CYCLE_BUDGET_S: u64 = 24 * 60 * 60;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    #[serde(default = "default_feed_api_base")]
    pub api_base: String,
    /// Base of the human-facing site, used for comment permalinks.
    #[serde(default = "default_site_base")]
    pub site_base: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_feed_api_base() -> String {
    "https://hacker-news.firebaseio.com/v0".to_string()
}
fn default_site_base() -> String {
    "https://news.ycombinator.com".to_string()
}
fn default_batch_size() -> usize { 30 }

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_base: default_feed_api_base(),
            site_base: default_site_base(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    #[serde(default = "default_score_threshold")]
    pub score_threshold: i64,
    #[serde(default = "default_comments_threshold")]
    pub comments_threshold: i64,
    /// Counts strictly above this get the hot marker.
    #[serde(default = "default_hot_threshold")]
    pub hot_threshold: i64,
}

fn default_score_threshold() -> i64 { 50 }
fn default_comments_threshold() -> i64 { 10 }
fn default_hot_threshold() -> i64 { 100 }

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            comments_threshold: default_comments_threshold(),
            hot_threshold: default_hot_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    #[serde(default = "default_chat_id")]
    pub chat_id: String,
    #[serde(default = "default_parse_mode")]
    pub parse_mode: String,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}
fn default_chat_id() -> String {
    "@yahnc".to_string()
}
fn default_parse_mode() -> String {
    "HTML".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_telegram_api_base(),
            chat_id: default_chat_id(),
            parse_mode: default_parse_mode(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_s: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_s: u64,
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,
    /// Wall-clock budget shared by every network call of one cycle or task.
    #[serde(default = "default_cycle_budget")]
    pub cycle_budget_s: u64,
}

fn default_poll_interval() -> u64 { 300 }
fn default_cleanup_interval() -> u64 { 3600 }
fn default_retention_hours() -> i64 { 24 }
fn default_cycle_budget() -> u64 { 9 * 60 }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_s: default_poll_interval(),
            cleanup_interval_s: default_cleanup_interval(),
            retention_hours: default_retention_hours(),
            cycle_budget_s: default_cycle_budget(),
        }
    }
}

impl ScheduleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_s.max(1))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_s.max(1))
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours)
    }

    pub fn cycle_budget(&self) -> Duration {
        Duration::from_secs(self.cycle_budget_s)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub jitter_ms: u64,
}

fn default_workers() -> usize { 4 }
fn default_max_attempts() -> u32 { 5 }
fn default_base_delay_ms() -> u64 { 2000 }
fn default_multiplier() -> f64 { 2.0 }

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            jitter_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// JSON file backing the story records. In-memory when unset.
    pub path: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse config TOML")?;
        if config.feed.batch_size == 0 {
            anyhow::bail!("feed.batch_size must be > 0");
        }
        if config.queue.max_attempts == 0 {
            anyhow::bail!("queue.max_attempts must be > 0");
        }
        let retention_hours = config.schedule.retention_hours;
        if !(1..=MAX_RETENTION_HOURS).contains(&retention_hours) {
            anyhow::bail!(
                "schedule.retention_hours must be between 1 and {}, got {}",
                MAX_RETENTION_HOURS, retention_hours
            );
        }
        if config.schedule.cycle_budget_s > MAX_CYCLE_BUDGET_S {
            anyhow::bail!(
                "schedule.cycle_budget_s must be at most {}, got {}",
                MAX_CYCLE_BUDGET_S, config.schedule.cycle_budget_s
            );
        }
        Ok(config)
    }

    /// Path from `HN_RELAY_CONFIG`, falling back to `config.toml`.
    pub fn default_path() -> String {
        match std::env::var(CONFIG_PATH_VAR) {
            Ok(p) if !p.trim().is_empty() => sanitize_key(&p),
            _ => DEFAULT_CONFIG_PATH.to_string(),
        }
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        let path = Path::new(ENV_FILE);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        for (key, value) in parse_env_lines(&content) {
            if std::env::var(&key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }

    pub fn bot_token() -> Result<String> {
        match std::env::var(BOT_TOKEN_VAR) {
            Ok(token) if !sanitize_key(&token).is_empty() => Ok(sanitize_key(&token)),
            _ => anyhow::bail!("{} is not set (environment or {})", BOT_TOKEN_VAR, ENV_FILE),
        }
    }
}

fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    // Strip BOM if present (common on Windows-created files)
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut out = Vec::new();
    for line in content.lines() {
        let line = line.trim().trim_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            out.push((key.to_string(), value.to_string()));
        }
    }
    out
}

/// Strip carriage returns, BOM, and other invisible chars from a key/path value.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}
