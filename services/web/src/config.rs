//! services/web/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub secret_key: String,
    pub cookie_secure: bool,
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub translation_model_path: PathBuf,
    pub translation_max_length: usize,
    pub intents_path: PathBuf,
    pub intent_mapping_path: PathBuf,
    pub response_seed: Option<u64>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Load Server and Database Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:5000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = var_or("DATABASE_URL", "sqlite://database.db");

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Session Settings ---
        let secret_key = lookup("SECRET_KEY")
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingVar("SECRET_KEY".to_string()))?;
        let cookie_secure = parse_bool("SESSION_COOKIE_SECURE", &var_or("SESSION_COOKIE_SECURE", "true"))?;

        // --- Load Model and Catalog Locations ---
        let model_path = PathBuf::from(var_or("MODEL_PATH", "../models/roberta_intent_model"));
        let tokenizer_path =
            PathBuf::from(var_or("TOKENIZER_PATH", "../models/roberta_intent_tokenizer"));
        let translation_model_path =
            PathBuf::from(var_or("TRANSLATION_MODEL_PATH", "../models/swa_en_model"));
        let max_length_str = var_or("TRANSLATION_MAX_LENGTH", "200");
        let translation_max_length = max_length_str
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 2)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "TRANSLATION_MAX_LENGTH".to_string(),
                    format!("'{}' is not a token count above 2", max_length_str),
                )
            })?;
        let intents_path = PathBuf::from(var_or("INTENTS_PATH", "../data/intents.json"));
        let intent_mapping_path =
            PathBuf::from(var_or("INTENT_MAPPING_PATH", "../data/intent_mapping.json"));

        let response_seed = lookup("RESPONSE_SEED")
            .map(|seed| {
                seed.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidValue("RESPONSE_SEED".to_string(), e.to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            secret_key,
            cookie_secure,
            model_path,
            tokenizer_path,
            translation_model_path,
            translation_max_length,
            intents_path,
            intent_mapping_path,
            response_seed,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' is not a boolean", other),
        )),
    }
}
