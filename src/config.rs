use crate::github::client::endpoints::API_BASE_URL;
use crate::github::fetch::{FetchSettings, MAX_PER_PAGE};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Configuration keys enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    PerPage,
    RequestDelayMs,
    ResetBufferMs,
    MaxRetries,
    ApiBaseUrl,
    HideMetadata,
}

impl ConfigKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::PerPage => "per_page",
            ConfigKey::RequestDelayMs => "request_delay_ms",
            ConfigKey::ResetBufferMs => "reset_buffer_ms",
            ConfigKey::MaxRetries => "max_retries",
            ConfigKey::ApiBaseUrl => "api_base_url",
            ConfigKey::HideMetadata => "hide_metadata",
        }
    }

    /// Get all config keys
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::PerPage,
            ConfigKey::RequestDelayMs,
            ConfigKey::ResetBufferMs,
            ConfigKey::MaxRetries,
            ConfigKey::ApiBaseUrl,
            ConfigKey::HideMetadata,
        ]
    }
}

/// Filename for the project-specific configuration within the .issues2pdf directory.
pub const PROJECT_CONFIG_FILENAME: &str = "config.json";
/// Directory name for project-specific configuration.
pub const PROJECT_CONFIG_DIR: &str = ".issues2pdf";
/// Environment variable holding the access token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Parses a JSON configuration file content into a map of configuration values.
///
/// - Returns only the known keys of a JSON object; unknown keys are skipped.
/// - Returns an empty HashMap if the input `content` is empty or contains only whitespace.
/// - Returns an `Err` if the JSON parsing fails or the document is not an object.
pub fn parse_config(content: &[u8]) -> Result<HashMap<ConfigKey, Value>> {
    if content.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(HashMap::new());
    }

    let value: Value = serde_json::from_slice(content).context("Failed to parse config JSON")?;

    let mut config_map = HashMap::new();

    if let Value::Object(map) = &value {
        for key in ConfigKey::all() {
            if let Some(val) = map.get(key.as_str()) {
                config_map.insert(*key, val.clone());
            }
        }
        return Ok(config_map);
    }

    Err(anyhow::anyhow!("Config must be a JSON object"))
}

/// Reads `<dir>/.issues2pdf/config.json`; a missing file is an empty config.
pub fn load_project_config(dir: &Path) -> Result<HashMap<ConfigKey, Value>> {
    let path = dir.join(PROJECT_CONFIG_DIR).join(PROJECT_CONFIG_FILENAME);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&content)
}

fn u64_value(config: &HashMap<ConfigKey, Value>, key: ConfigKey) -> Option<u64> {
    config.get(&key).and_then(Value::as_u64)
}

impl FetchSettings {
    /// Settings from configuration; missing or mistyped values use defaults.
    pub fn from_config(config: &HashMap<ConfigKey, Value>) -> Self {
        let defaults = FetchSettings::default();
        FetchSettings {
            per_page: u64_value(config, ConfigKey::PerPage)
                .map(|n| n.clamp(1, u64::from(MAX_PER_PAGE)) as u32)
                .unwrap_or(defaults.per_page),
            request_delay: u64_value(config, ConfigKey::RequestDelayMs)
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_delay),
            reset_buffer: u64_value(config, ConfigKey::ResetBufferMs)
                .map(Duration::from_millis)
                .unwrap_or(defaults.reset_buffer),
            max_retries: u64_value(config, ConfigKey::MaxRetries)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

pub fn api_base_url(config: &HashMap<ConfigKey, Value>) -> String {
    config
        .get(&ConfigKey::ApiBaseUrl)
        .and_then(Value::as_str)
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| API_BASE_URL.to_string())
}

pub fn hide_metadata(config: &HashMap<ConfigKey, Value>) -> bool {
    config
        .get(&ConfigKey::HideMetadata)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Validates a token read from the environment.
pub fn token_from(value: Option<String>) -> Result<String> {
    match value {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(anyhow::anyhow!(
            "No token found. Please set the {TOKEN_ENV} environment variable."
        )),
    }
}
