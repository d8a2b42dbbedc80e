//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variables read by [`Config::apply_env`].
pub mod env_keys {
    pub const BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
    pub const CHAT_ID: &str = "TELEGRAM_CHAT_ID";
    pub const TEST_MODE: &str = "TEST_MODE";
    pub const ERROR_MODE: &str = "ERROR_MODE";
    pub const FORCE_RENDER: &str = "FORCE_RENDERED_FETCH";
    pub const STATE_PATH: &str = "STATE_PATH";
}

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Plain HTTP fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Headless browser fallback settings
    #[serde(default)]
    pub render: RenderConfig,

    /// Telegram destination and message templates
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Table heuristics
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Seen-state persistence
    #[serde(default)]
    pub state: StateConfig,

    /// Runtime switches
    #[serde(default)]
    pub modes: ModeFlags,

    /// Pages to poll, in processing order
    #[serde(default = "defaults::feeds")]
    pub feeds: Vec<FeedConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Overlay values from the environment.
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(env_keys::BOT_TOKEN) {
            self.telegram.bot_token = token.trim().to_string();
        }
        if let Some(chat) = lookup(env_keys::CHAT_ID) {
            self.telegram.chat_id = chat.trim().to_string();
        }
        if let Some(path) = lookup(env_keys::STATE_PATH).filter(|p| !p.trim().is_empty()) {
            self.state.path = path;
        }
        if let Some(flag) = lookup(env_keys::TEST_MODE) {
            self.modes.test_mode = is_truthy(&flag);
        }
        if let Some(flag) = lookup(env_keys::ERROR_MODE) {
            self.modes.error_report = is_truthy(&flag);
        }
        if let Some(flag) = lookup(env_keys::FORCE_RENDER) {
            self.modes.force_render = is_truthy(&flag);
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.telegram.timeout_secs == 0 {
            return Err(AppError::validation("telegram.timeout_secs must be > 0"));
        }
        if self.render.enabled && self.render.timeout_secs == 0 {
            return Err(AppError::validation("render.timeout_secs must be > 0"));
        }
        if self.modes.force_render && !self.render.enabled {
            return Err(AppError::validation(
                "force_render requires render.enabled = true",
            ));
        }
        if self.extraction.ticker_columns == 0 {
            return Err(AppError::validation(
                "extraction.ticker_columns must be > 0",
            ));
        }
        if self.state.path.trim().is_empty() {
            return Err(AppError::validation("state.path is empty"));
        }
        if self.feeds.is_empty() {
            return Err(AppError::validation("No feeds defined"));
        }

        let mut names = HashSet::new();
        for feed in &self.feeds {
            url::Url::parse(&feed.url)?;
            if !names.insert(feed.name.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate feed name: {}",
                    feed.name
                )));
            }
        }
        Ok(())
    }

    /// Check that both Telegram identifiers are present.
    pub fn validate_credentials(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() || self.telegram.chat_id.is_empty() {
            return Err(AppError::config(format!(
                "{} and {} must be set",
                env_keys::BOT_TOKEN,
                env_keys::CHAT_ID
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            render: RenderConfig::default(),
            telegram: TelegramConfig::default(),
            extraction: ExtractionConfig::default(),
            state: StateConfig::default(),
            modes: ModeFlags::default(),
            feeds: defaults::feeds(),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// Plain HTTP fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::fetch_timeout")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::fetch_timeout(),
        }
    }
}

/// Headless browser fallback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Whether the rendered fetch may be used at all
    #[serde(default)]
    pub enabled: bool,

    /// Chromium-compatible browser executable
    #[serde(default = "defaults::browser")]
    pub browser: String,

    /// Hard limit for one rendered fetch
    #[serde(default = "defaults::render_timeout")]
    pub timeout_secs: u64,

    /// How long the page may run scripts before the DOM is dumped
    #[serde(default = "defaults::ready_wait")]
    pub ready_wait_ms: u64,

    /// Extra command-line arguments passed to the browser
    #[serde(default = "defaults::browser_args")]
    pub extra_args: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            browser: defaults::browser(),
            timeout_secs: defaults::render_timeout(),
            ready_wait_ms: defaults::ready_wait(),
            extra_args: defaults::browser_args(),
        }
    }
}

/// Telegram destination and message templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,

    #[serde(default)]
    pub chat_id: String,

    /// Bot API base URL
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::notify_timeout")]
    pub timeout_secs: u64,

    /// Template for new-record alerts (see `Record::format`)
    #[serde(default = "defaults::alert_template")]
    pub alert_template: String,

    /// Canned message sent in test mode
    #[serde(default = "defaults::test_message")]
    pub test_message: String,

    /// Template for error reports; `{error}` is replaced
    #[serde(default = "defaults::error_template")]
    pub error_template: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: defaults::api_base(),
            timeout_secs: defaults::notify_timeout(),
            alert_template: defaults::alert_template(),
            test_message: defaults::test_message(),
            error_template: defaults::error_template(),
        }
    }
}

/// Table heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Heading texts that mark the trades table
    #[serde(default = "defaults::heading_labels")]
    pub heading_labels: Vec<String>,

    /// Number of leading cells searched for a ticker
    #[serde(default = "defaults::ticker_columns")]
    pub ticker_columns: usize,

    /// Rows with fewer non-empty cells are ignored
    #[serde(default = "defaults::min_columns")]
    pub min_columns: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            heading_labels: defaults::heading_labels(),
            ticker_columns: defaults::ticker_columns(),
            min_columns: defaults::min_columns(),
        }
    }
}

/// How new records are told apart from already notified ones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoveltyPolicy {
    /// Only the first record of each feed is compared to a single marker
    LatestOnly,
    /// Every record whose identity was never notified is new
    #[default]
    SetMembership,
}

/// Seen-state persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// JSON state file
    #[serde(default = "defaults::state_path")]
    pub path: String,

    #[serde(default)]
    pub policy: NoveltyPolicy,

    #[serde(default)]
    pub retention: RetentionConfig,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: defaults::state_path(),
            policy: NoveltyPolicy::default(),
            retention: RetentionConfig::default(),
        }
    }
}

/// Bounds for the set-membership ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "defaults::max_entries")]
    pub max_entries: usize,

    #[serde(default = "defaults::max_age_days")]
    pub max_age_days: Option<u32>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_entries: defaults::max_entries(),
            max_age_days: defaults::max_age_days(),
        }
    }
}

/// Runtime switches, usually set from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModeFlags {
    /// Send a canned message and exit without scraping
    #[serde(default)]
    pub test_mode: bool,

    /// Forward cycle failures to the chat
    #[serde(default)]
    pub error_report: bool,

    /// Skip the plain fetch and always render
    #[serde(default)]
    pub force_render: bool,
}

/// A page to poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

mod defaults {
    use super::FeedConfig;

    // Fetch defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0 Safari/537.36".into()
    }
    pub fn fetch_timeout() -> u64 {
        20
    }

    // Render defaults
    pub fn browser() -> String {
        "chromium".into()
    }
    pub fn render_timeout() -> u64 {
        45
    }
    pub fn ready_wait() -> u64 {
        15_000
    }
    pub fn browser_args() -> Vec<String> {
        vec!["--no-sandbox".into(), "--disable-gpu".into()]
    }

    // Telegram defaults
    pub fn api_base() -> String {
        "https://api.telegram.org".into()
    }
    pub fn notify_timeout() -> u64 {
        15
    }
    pub fn alert_template() -> String {
        "🟢 <b>New Trade Detected</b>\n{summary}\nSource: {feed} ({url})".into()
    }
    pub fn test_message() -> String {
        "✅ Test message: Bot is running in TEST_MODE.".into()
    }
    pub fn error_template() -> String {
        "❌ <b>Bot Error:</b>\n{error}".into()
    }

    // Extraction defaults
    pub fn heading_labels() -> Vec<String> {
        vec!["Trades".into()]
    }
    pub fn ticker_columns() -> usize {
        3
    }
    pub fn min_columns() -> usize {
        2
    }

    // State defaults
    pub fn state_path() -> String {
        "last_seen.json".into()
    }
    pub fn max_entries() -> usize {
        2000
    }
    pub fn max_age_days() -> Option<u32> {
        Some(180)
    }

    // Feed defaults
    pub fn feeds() -> Vec<FeedConfig> {
        vec![
            FeedConfig {
                name: "Pelosi".to_string(),
                url: "https://www.quiverquant.com/congresstrading/politician/Nancy%20Pelosi-P000197"
                    .to_string(),
            },
            FeedConfig {
                name: "All Congress Trades".to_string(),
                url: "https://www.quiverquant.com/congresstrading/".to_string(),
            },
        ]
    }
}
