//! Runtime settings: well-known file locations, pipeline limits and the
//! external service parameters.
//!
//! Resolution order, later wins:
//! 1. Built-in defaults
//! 2. `sensing.yaml` in the base directory (optional)
//! 3. Environment (`GEMINI_MODEL`, `DISPLAY_LANGUAGE`)
//!
//! The base directory is the working directory unless `MORNING_SENSING_HOME`
//! is set. `GEMINI_API_KEY` is mandatory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::models::Channels;

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_DISPLAY_LANGUAGE: &str = "DISPLAY_LANGUAGE";
pub const ENV_HOME: &str = "MORNING_SENSING_HOME";

const SETTINGS_FILE: &str = "sensing.yaml";

/// Numeric knobs of the pipeline.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Limits {
    pub community_fetch_width: usize,
    pub news_fetch_width: usize,
    pub scoring_width: usize,
    pub max_entries_per_feed: usize,
    pub lookback_days: i64,
    pub buzz_title_limit: usize,
    pub buzz_keyword_count: usize,
    pub candidate_cap: usize,
    pub summary_chars: usize,
    pub prompt_summary_chars: usize,
    /// Inclusive bounds of the sleep before each scoring call.
    pub scoring_jitter_ms: (u64, u64),
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            community_fetch_width: 10,
            news_fetch_width: 20,
            scoring_width: 5,
            max_entries_per_feed: 30,
            lookback_days: 3,
            buzz_title_limit: 100,
            buzz_keyword_count: 15,
            candidate_cap: 150,
            summary_chars: 300,
            prompt_summary_chars: 200,
            scoring_jitter_ms: (500, 1500),
        }
    }
}

/// Shape of the optional `sensing.yaml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    gemini_model: Option<String>,
    display_language: Option<String>,
    feed_timeout_secs: Option<u64>,
    llm_timeout_secs: Option<u64>,
    translate_timeout_secs: Option<u64>,
    limits: Option<Limits>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub base_dir: PathBuf,
    pub gemini_api_key: String,
    pub gemini_model: String,
    /// Target language code for headlines and summaries.
    pub display_language: String,
    pub feed_timeout: Duration,
    pub llm_timeout: Duration,
    pub translate_timeout: Duration,
    pub limits: Limits,
}

impl Settings {
    /// Load settings from environment variables read through `lookup`
    /// (`std::env::var` outside tests). Blank values count as unset.
    ///
    /// Fails before anything else happens when the credential is absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let api_key = non_blank(ENV_API_KEY).unwrap_or_default();
        let base_dir = non_blank(ENV_HOME)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut settings = Self::load(base_dir, &api_key)?;
        if let Some(model) = non_blank(ENV_MODEL) {
            settings.gemini_model = model;
        }
        if let Some(lang) = non_blank(ENV_DISPLAY_LANGUAGE) {
            settings.display_language = lang;
        }
        Ok(settings)
    }

    /// Defaults overlaid with `sensing.yaml` from `base_dir`, if present.
    pub fn load(base_dir: PathBuf, api_key: &str) -> Result<Self, ConfigError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ConfigError::MissingCredential(ENV_API_KEY));
        }

        let mut settings = Self::with_defaults(base_dir, api_key);
        let path = settings.base_dir.join(SETTINGS_FILE);
        if !path.exists() {
            debug!(path = %path.display(), "No settings file; using defaults");
            return Ok(settings);
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Unreadable {
            path: path.clone(),
            source,
        })?;
        let file: FileSettings =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::InvalidYaml {
                path: path.clone(),
                source,
            })?;

        if let Some(model) = file.gemini_model {
            settings.gemini_model = model;
        }
        if let Some(lang) = file.display_language {
            settings.display_language = lang;
        }
        if let Some(secs) = file.feed_timeout_secs {
            settings.feed_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.llm_timeout_secs {
            settings.llm_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.translate_timeout_secs {
            settings.translate_timeout = Duration::from_secs(secs);
        }
        if let Some(limits) = file.limits {
            settings.limits = limits;
        }
        info!(path = %path.display(), "Loaded settings file");
        Ok(settings)
    }

    pub fn with_defaults(base_dir: PathBuf, api_key: &str) -> Self {
        Self {
            base_dir,
            gemini_api_key: api_key.to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
            display_language: "ko".to_string(),
            feed_timeout: Duration::from_secs(15),
            llm_timeout: Duration::from_secs(60),
            translate_timeout: Duration::from_secs(10),
            limits: Limits::default(),
        }
    }

    pub fn channels_path(&self) -> PathBuf {
        self.base_dir.join("channels.json")
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.base_dir.join("learned_preferences.json")
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.base_dir.join("prompts")
    }

    pub fn digest_path(&self) -> PathBuf {
        self.base_dir.join("today_news.json")
    }

    pub fn buzz_path(&self) -> PathBuf {
        self.base_dir.join("morning_buzz.json")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.base_dir.join("archive")
    }
}

/// Read `channels.json`. Its absence is fatal.
pub fn load_channels(path: &Path) -> Result<Channels, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}
