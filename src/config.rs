use crate::processing::{ProcessingConfig, ProcessingPreset};
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_GENERATION_MODEL: &str = "llama3.1";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Rusty Digest server and CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Ollama runtime that serves the generation model.
    pub ollama_url: String,
    /// Model identifier used for every backend call.
    pub generation_model: String,
    /// Preset applied when a request does not name one.
    pub processing_preset: ProcessingPreset,
    /// Optional override for the preset's chunk size (characters).
    pub chunk_size: Option<usize>,
    /// Optional override for the preset's retry budget.
    pub max_retries: Option<u32>,
    /// Optional override for the per-call extraction timeout.
    pub fact_extraction_timeout_secs: Option<u64>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            generation_model: load_env_optional("GENERATION_MODEL")
                .unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string()),
            processing_preset: load_env_optional("PROCESSING_PRESET")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("PROCESSING_PRESET".to_string()))
                })
                .transpose()?
                .unwrap_or_default(),
            chunk_size: parse_optional("CHUNK_SIZE")?,
            max_retries: parse_optional("MAX_RETRIES")?,
            fact_extraction_timeout_secs: parse_optional("FACT_EXTRACTION_TIMEOUT_SECS")?,
            server_port: parse_optional("SERVER_PORT")?,
        })
    }

    /// Build the per-run processing configuration for a preset, applying env overrides.
    pub fn processing_config(&self, preset: Option<ProcessingPreset>) -> ProcessingConfig {
        let mut processing = ProcessingConfig::from_preset(preset.unwrap_or(self.processing_preset));
        if let Some(chunk_size) = self.chunk_size {
            processing.chunking.chunk_size = chunk_size;
        }
        if let Some(max_retries) = self.max_retries {
            processing.max_retries = max_retries;
        }
        if let Some(seconds) = self.fact_extraction_timeout_secs {
            processing.fact_extraction_timeout = Duration::from_secs(seconds);
        }
        processing
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            processing_preset: ProcessingPreset::default(),
            chunk_size: None,
            max_retries: None,
            fact_extraction_timeout_secs: None,
            server_port: None,
        }
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        ollama_url = %config.ollama_url,
        model = %config.generation_model,
        preset = %config.processing_preset,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_config_applies_overrides() {
        let config = Config {
            chunk_size: Some(1234),
            max_retries: Some(7),
            fact_extraction_timeout_secs: Some(5),
            ..Config::default()
        };
        let processing = config.processing_config(Some(ProcessingPreset::Quality));
        assert_eq!(processing.chunking.chunk_size, 1234);
        assert_eq!(processing.max_retries, 7);
        assert_eq!(processing.fact_extraction_timeout, Duration::from_secs(5));
    }

    #[test]
    fn processing_config_defaults_to_configured_preset() {
        let config = Config {
            processing_preset: ProcessingPreset::UltraFast,
            ..Config::default()
        };
        let processing = config.processing_config(None);
        assert_eq!(
            processing,
            ProcessingConfig::from_preset(ProcessingPreset::UltraFast)
        );
    }
}
