//! Configuration loader and validator for the retitle run.
//!
//! Layers, lowest to highest: built-in defaults, optional YAML file,
//! `RETITLE_*` / `YOUTUBE_API_BASE` environment overrides.
use chrono::Duration;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::engine::{DecisionContext, MarkerToken, DEFAULT_MARKER, DEFAULT_TITLE_TEMPLATE};

pub const ENV_TOKEN_JSON: &str = "YOUTUBE_TOKEN_JSON";
pub const ENV_OVERRIDE_TITLE: &str = "TODAYS_VIDEO_TITLE";
pub const ENV_TARGET_DELAY: &str = "RETITLE_TARGET_DELAY_MINUTES";
pub const ENV_CHECK_WINDOW: &str = "RETITLE_CHECK_WINDOW_MINUTES";
pub const ENV_MARKER: &str = "RETITLE_MARKER";
pub const ENV_MAX_RESULTS: &str = "RETITLE_MAX_RESULTS";
pub const ENV_TITLE_TEMPLATE: &str = "RETITLE_TITLE_TEMPLATE";
pub const ENV_API_BASE: &str = "YOUTUBE_API_BASE";

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3/";
pub const MAX_RESULTS_LIMIT: u32 = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("credential error: {0}")]
    Credential(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub youtube: YouTube,
    pub rules: Rules,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct YouTube {
    pub api_base: String,
    pub max_results: u32,
}

impl Default for YouTube {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            max_results: 20,
        }
    }
}

/// Eligibility window and rewrite settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Rules {
    pub target_delay_minutes: u32,
    pub check_window_minutes: u32,
    pub marker: String,
    pub title_template: String,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            target_delay_minutes: 10,
            check_window_minutes: 60,
            marker: DEFAULT_MARKER.into(),
            title_template: DEFAULT_TITLE_TEMPLATE.into(),
        }
    }
}

impl Config {
    pub fn target_delay(&self) -> Duration {
        Duration::minutes(i64::from(self.rules.target_delay_minutes))
    }

    pub fn check_window(&self) -> Duration {
        Duration::minutes(i64::from(self.rules.check_window_minutes))
    }

    pub fn marker(&self) -> MarkerToken {
        MarkerToken::new(self.rules.marker.clone())
    }

    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.youtube.api_base)
            .map_err(|_| ConfigError::Invalid("youtube.api_base must be a valid URL"))
    }

    /// Build the per-run decision context for the given clock reading.
    pub fn decision_context(&self, now: chrono::DateTime<chrono::Utc>) -> DecisionContext {
        DecisionContext {
            now,
            target_delay: self.target_delay(),
            check_window: self.check_window(),
            marker: self.marker(),
        }
    }

    /// Apply environment overrides using `lookup` as the variable source.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_TARGET_DELAY) {
            self.rules.target_delay_minutes = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("RETITLE_TARGET_DELAY_MINUTES must be an integer"))?;
        }
        if let Some(v) = lookup(ENV_CHECK_WINDOW) {
            self.rules.check_window_minutes = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("RETITLE_CHECK_WINDOW_MINUTES must be an integer"))?;
        }
        if let Some(v) = lookup(ENV_MAX_RESULTS) {
            self.youtube.max_results = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("RETITLE_MAX_RESULTS must be an integer"))?;
        }
        if let Some(v) = lookup(ENV_MARKER) {
            self.rules.marker = v;
        }
        if let Some(v) = lookup(ENV_TITLE_TEMPLATE) {
            self.rules.title_template = v;
        }
        if let Some(v) = lookup(ENV_API_BASE) {
            self.youtube.api_base = v;
        }
        Ok(())
    }
}

/// Load configuration: defaults, then `path` if given, then environment
/// overrides from `lookup`. The result is validated.
pub fn load<F>(path: Option<&Path>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            serde_yaml::from_str(&content)?
        }
        None => Config::default(),
    };
    cfg.apply_env(lookup)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Process environment as a lookup source.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// The optional per-run title override; blank values count as unset.
pub fn override_title<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(ENV_OVERRIDE_TITLE).filter(|t| !t.trim().is_empty())
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.rules.check_window_minutes <= cfg.rules.target_delay_minutes {
        return Err(ConfigError::Invalid(
            "rules.check_window_minutes must be greater than rules.target_delay_minutes",
        ));
    }
    if cfg.rules.marker.trim().is_empty() {
        return Err(ConfigError::Invalid("rules.marker must be non-blank"));
    }
    if cfg.rules.title_template.trim().is_empty() {
        return Err(ConfigError::Invalid("rules.title_template must be non-blank"));
    }
    if cfg.youtube.max_results == 0 || cfg.youtube.max_results > MAX_RESULTS_LIMIT {
        return Err(ConfigError::Invalid("youtube.max_results must be within 1..=50"));
    }
    cfg.api_base_url()?;
    Ok(())
}

/// Example YAML with every default spelled out.
pub fn example() -> &'static str {
    r#"youtube:
  api_base: "https://www.googleapis.com/youtube/v3/"
  max_results: 20

rules:
  target_delay_minutes: 10
  check_window_minutes: 60
  marker: "\n\n[updated-by-bot]"
  title_template: "🔥 {title} | Bot Updated Tagline!"
"#
}
