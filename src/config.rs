//! Environment configuration with an optional JSON file underneath.
//!
//! Environment variables override file values; blank variables count as unset.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const PROVIDER_ENV_VAR: &str = "CHAT_AGENT_PROVIDER";
pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";
pub const MODEL_ENV_VAR: &str = "CHAT_AGENT_MODEL";
pub const BASE_URL_ENV_VAR: &str = "CHAT_AGENT_BASE_URL";
pub const SESSIONS_DIR_ENV_VAR: &str = "CHAT_AGENT_SESSIONS_DIR";
pub const PROMPT_FILE_ENV_VAR: &str = "CHAT_AGENT_PROMPT_FILE";
pub const SHELL_TIMEOUT_ENV_VAR: &str = "CHAT_AGENT_SHELL_TIMEOUT_SEC";
pub const CONFIG_PATH_ENV_VAR: &str = "CHAT_AGENT_CONFIG_PATH";
pub const LOG_ENV_VAR: &str = "CHAT_AGENT_LOG";

pub const DEFAULT_PROVIDER_ID: &str = "openrouter";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_SESSIONS_DIR: &str = "chats";
pub const DEFAULT_PROMPT_FILE: &str = "agent_manual.md";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub sessions_dir: Option<PathBuf>,
    pub prompt_file: Option<PathBuf>,
    pub timeout_sec: Option<u64>,
    pub shell_timeout_sec: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub provider_id: String,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub sessions_dir: PathBuf,
    pub prompt_file: PathBuf,
    /// HTTP request timeout for model exchanges.
    pub timeout: Option<Duration>,
    pub shell_timeout: Option<Duration>,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_file(FileConfig::default())
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = match env_string_opt(CONFIG_PATH_ENV_VAR) {
            Some(path) => FileConfig::load(Path::new(&path))?,
            None => FileConfig::default(),
        };
        let mut config = Self::from_file(file);

        if let Some(provider_id) = env_string_opt(PROVIDER_ENV_VAR) {
            config.provider_id = provider_id.trim().to_ascii_lowercase();
        }
        config.api_key = env_string_opt(API_KEY_ENV_VAR).map(|key| key.trim().to_string());
        if let Some(model) = env_string_opt(MODEL_ENV_VAR) {
            config.model = model.trim().to_string();
        }
        if let Some(base_url) = env_string_opt(BASE_URL_ENV_VAR) {
            config.base_url = base_url.trim().to_string();
        }
        if let Some(dir) = env_string_opt(SESSIONS_DIR_ENV_VAR) {
            config.sessions_dir = PathBuf::from(dir);
        }
        if let Some(file) = env_string_opt(PROMPT_FILE_ENV_VAR) {
            config.prompt_file = PathBuf::from(file);
        }
        if let Some(raw) = env_string_opt(SHELL_TIMEOUT_ENV_VAR) {
            config.shell_timeout = Some(parse_timeout_secs(SHELL_TIMEOUT_ENV_VAR, &raw)?);
        }
        if let Some(filter) = env_string_opt(LOG_ENV_VAR) {
            config.log_filter = filter;
        }

        Ok(config)
    }

    fn from_file(file: FileConfig) -> Self {
        Self {
            provider_id: DEFAULT_PROVIDER_ID.to_string(),
            api_key: None,
            model: file.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: file.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            sessions_dir: file
                .sessions_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSIONS_DIR)),
            prompt_file: file
                .prompt_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROMPT_FILE)),
            timeout: positive_secs(file.timeout_sec),
            shell_timeout: positive_secs(file.shell_timeout_sec),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn positive_secs(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|secs| *secs > 0).map(Duration::from_secs)
}

fn parse_timeout_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason,
    };
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid("expected a whole number of seconds"))?;
    if secs == 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
