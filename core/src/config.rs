use crate::api::RetryPolicy;
use crate::locale::Language;
use crate::state::ChatSettings;
use directories::BaseDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "MINDBRIDGE_API_URL";
pub const LANGUAGE_ENV: &str = "MINDBRIDGE_LANGUAGE";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub language: Language,
    pub max_stored_messages: usize,
    pub storage_debounce: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            language: Language::Ko,
            max_stored_messages: 50,
            storage_debounce: Duration::from_millis(1000),
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_millis(30_000),
            data_dir: None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid mindbridge.yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("configuration invalid: {0}")]
    Invalid(String),
}

impl ClientSettings {
    /// Load `mindbridge.yaml` from the usual locations, falling back to
    /// defaults when none exists, then apply environment overrides
    /// (including a `.env` file in the working directory).
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let settings = match locate_config_file() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings.with_env_overrides(|name| std::env::var(name).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: MindBridgeConfig = serde_yaml::from_str(contents)?;
        resolve_app_settings(config.app.unwrap_or_default())
    }

    /// `lookup` is `std::env::var` in production; tests pass a closure.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(API_URL_ENV).filter(|value| !value.trim().is_empty()) {
            self.api_base_url = validate_base_url(&url)?;
        }
        if let Some(language) = lookup(LANGUAGE_ENV).filter(|value| !value.trim().is_empty()) {
            self.language = language
                .parse()
                .map_err(|err| ConfigError::Invalid(format!("{LANGUAGE_ENV}: {err}")))?;
        }
        Ok(self)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            base_delay: self.retry_delay,
        }
    }

    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            language: self.language,
            max_stored_messages: self.max_stored_messages,
            storage_debounce: self.storage_debounce,
        }
    }
}

fn resolve_app_settings(app: AppSection) -> Result<ClientSettings, ConfigError> {
    let defaults = ClientSettings::default();
    let api_base_url = match app.api_base_url {
        Some(url) => validate_base_url(&url)?,
        None => defaults.api_base_url,
    };
    let language = match app.language {
        Some(language) => language
            .parse()
            .map_err(|err| ConfigError::Invalid(format!("language: {err}")))?,
        None => defaults.language,
    };

    Ok(ClientSettings {
        api_base_url,
        language,
        max_stored_messages: positive(app.max_stored_messages, "max_stored_messages")?
            .map_or(defaults.max_stored_messages, |value| value as usize),
        storage_debounce: app
            .storage_debounce_ms
            .map_or(defaults.storage_debounce, Duration::from_millis),
        max_retries: positive(app.max_retries, "max_retries")?
            .map_or(defaults.max_retries, |value| value as u32),
        retry_delay: app
            .retry_delay_ms
            .map_or(defaults.retry_delay, Duration::from_millis),
        request_timeout: positive(app.request_timeout_ms, "request_timeout_ms")?
            .map_or(defaults.request_timeout, Duration::from_millis),
        data_dir: app.data_dir,
    })
}

fn positive(value: Option<u64>, name: &str) -> Result<Option<u64>, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::Invalid(format!("{name} must be greater than zero"))),
        other => Ok(other),
    }
}

pub fn validate_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed)
        .map_err(|err| ConfigError::Invalid(format!("api_base_url `{trimmed}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!(
            "api_base_url `{trimmed}` must use http or https"
        )));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn locate_config_file() -> Option<PathBuf> {
    mindbridge_yaml_candidates()
        .into_iter()
        .find(|path| path.exists())
}

fn mindbridge_yaml_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(base) = BaseDirs::new() {
        let config_dir = base.config_dir().join("mindbridge");
        paths.push(config_dir.join("mindbridge.yaml"));
        paths.push(config_dir.join("mindbridge.yml"));
        let home_dir = base.home_dir();
        paths.push(home_dir.join(".mindbridge").join("mindbridge.yaml"));
        paths.push(home_dir.join(".mindbridge").join("mindbridge.yml"));
    } else {
        paths.push(PathBuf::from("mindbridge.yaml"));
        paths.push(PathBuf::from("mindbridge.yml"));
    }
    paths
}

#[derive(Debug, Deserialize)]
struct MindBridgeConfig {
    app: Option<AppSection>,
}

#[derive(Debug, Default, Deserialize)]
struct AppSection {
    api_base_url: Option<String>,
    language: Option<String>,
    max_stored_messages: Option<u64>,
    storage_debounce_ms: Option<u64>,
    max_retries: Option<u64>,
    retry_delay_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    data_dir: Option<PathBuf>,
}
