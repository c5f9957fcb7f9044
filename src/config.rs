//! Configuration and settings management.
//!
//! Settings are layered from `config/*.toml` files and environment
//! variables, with serde defaults carrying the stock phrase sets and
//! command patterns. Components receive the values they need through their
//! constructors; nothing reads ambient globals.

use config::{Config, ConfigError, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Community access token: sends messages, runs the long poll.
    pub community_token: String,
    /// User access token: `wall.get(filter=postponed)` needs editor-level
    /// wall access that community tokens do not have.
    pub user_token: String,

    /// Freshness window for the post storage, in seconds.
    #[serde(default = "default_storage_keep_alive")]
    pub storage_keep_alive: i64,

    /// IANA timezone for all user-facing dates.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// `strftime` pattern for the post date in outbound messages.
    #[serde(default = "default_time_format")]
    pub time_format: String,
    /// Outbound post template; `{date}` and `{text}` are substituted.
    #[serde(default = "default_post_template")]
    pub post_template: String,

    /// Pattern for the public postponed-post lookup command.
    #[serde(default = "default_postponed_regex")]
    pub postponed_regex: String,
    /// Pattern for the manager-only storage refresh command.
    #[serde(default = "default_update_storage_regex")]
    pub update_storage_regex: String,
    /// Pattern for the manager-only calendar command.
    #[serde(default = "default_print_calendar_regex")]
    pub print_calendar_regex: String,

    /// Optional preamble before forwarding found posts; may be empty.
    #[serde(default)]
    pub postponed_found_phrases: Vec<String>,
    #[serde(default = "default_no_postponed_found")]
    pub no_postponed_found_phrases: Vec<String>,
    #[serde(default = "default_storage_updated")]
    pub storage_updated_phrases: Vec<String>,
    #[serde(default = "default_storage_updated_commend")]
    pub storage_updated_commend_phrases: Vec<String>,
    #[serde(default = "default_storage_empty")]
    pub storage_empty_phrases: Vec<String>,
    #[serde(default = "default_error_reply")]
    pub error_reply_phrases: Vec<String>,
}

const fn default_storage_keep_alive() -> i64 {
    900
}

fn default_timezone() -> String {
    "Europe/Moscow".to_string()
}

fn default_time_format() -> String {
    "%d.%m.%Y %H:%M:%S".to_string()
}

fn default_post_template() -> String {
    "📅: {date}\n📝: {text}".to_string()
}

fn default_postponed_regex() -> String {
    "отложк[ауе]".to_string()
}

fn default_update_storage_regex() -> String {
    "обнови".to_string()
}

fn default_print_calendar_regex() -> String {
    "календарь".to_string()
}

fn default_no_postponed_found() -> Vec<String> {
    vec!["Отложенных постов не найдено.".to_string()]
}

fn default_storage_updated() -> Vec<String> {
    vec!["Отложка обновлена.".to_string()]
}

fn default_storage_updated_commend() -> Vec<String> {
    vec!["Отложка обновлена. Спасибо за вашу работу!".to_string()]
}

fn default_storage_empty() -> Vec<String> {
    vec!["В хранилище пусто. Вероятно, в сообществе нет отложенных постов.".to_string()]
}

fn default_error_reply() -> Vec<String> {
    vec!["Что-то пошло не так, попробуйте позже.".to_string()]
}

/// Settings that loaded but cannot drive the bot.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("required setting {0} is empty")]
    MissingToken(&'static str),
    #[error("phrase list {0} must not be empty")]
    EmptyPhraseList(&'static str),
    #[error("invalid {name} pattern: {source}")]
    InvalidPattern {
        name: &'static str,
        source: regex::Error,
    },
    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),
}

/// Compiled command patterns, built once at startup.
#[derive(Debug, Clone)]
pub struct CommandPatterns {
    pub postponed: Regex,
    pub update_storage: Regex,
    pub print_calendar: Regex,
}

impl Settings {
    /// Loads settings from `config/*.toml` files and the environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading or deserialization fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("OTLOZHKA").separator("__"))
            // Plain env vars too; empty values are treated as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Validates everything the runtime depends on: tokens, required phrase
    /// lists, patterns, and the timezone, so a broken deployment fails at
    /// startup instead of mid-conversation.
    ///
    /// # Errors
    ///
    /// The first [`SettingsError`] encountered.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.community_token.is_empty() {
            return Err(SettingsError::MissingToken("community_token"));
        }
        if self.user_token.is_empty() {
            return Err(SettingsError::MissingToken("user_token"));
        }

        let required: [(&'static str, &Vec<String>); 5] = [
            (
                "no_postponed_found_phrases",
                &self.no_postponed_found_phrases,
            ),
            ("storage_updated_phrases", &self.storage_updated_phrases),
            (
                "storage_updated_commend_phrases",
                &self.storage_updated_commend_phrases,
            ),
            ("storage_empty_phrases", &self.storage_empty_phrases),
            ("error_reply_phrases", &self.error_reply_phrases),
        ];
        for (name, list) in required {
            if list.is_empty() {
                return Err(SettingsError::EmptyPhraseList(name));
            }
        }

        self.patterns()?;
        self.tz()?;
        Ok(())
    }

    /// Compiles the configured command patterns.
    ///
    /// # Errors
    ///
    /// [`SettingsError::InvalidPattern`] naming the offending pattern.
    pub fn patterns(&self) -> Result<CommandPatterns, SettingsError> {
        let compile = |name: &'static str, pattern: &str| {
            Regex::new(pattern).map_err(|source| SettingsError::InvalidPattern { name, source })
        };
        Ok(CommandPatterns {
            postponed: compile("postponed_regex", &self.postponed_regex)?,
            update_storage: compile("update_storage_regex", &self.update_storage_regex)?,
            print_calendar: compile("print_calendar_regex", &self.print_calendar_regex)?,
        })
    }

    /// Parses the configured timezone.
    ///
    /// # Errors
    ///
    /// [`SettingsError::InvalidTimezone`] for unknown identifiers.
    pub fn tz(&self) -> Result<chrono_tz::Tz, SettingsError> {
        self.timezone
            .parse()
            .map_err(|_| SettingsError::InvalidTimezone(self.timezone.clone()))
    }
}
