use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::AiSettings;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application configuration loaded from environment variables.
///
/// Nothing here is mandatory: without `DATABASE_URL` analyses are kept in
/// memory, and without `OPENAI_API_KEY` every analysis uses the keyword
/// fallback. Malformed numeric values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub port: u16,
    pub rust_log: String,
    pub max_upload_bytes: usize,
    pub ai: AiSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let ai = AiSettings {
            api_key: env.optional("OPENAI_API_KEY"),
            model: env
                .optional("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: env
                .optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(env.parse("AI_TIMEOUT_SECS", DEFAULT_AI_TIMEOUT_SECS)?),
            ..AiSettings::default()
        };

        Ok(Config {
            database_url: env.optional("DATABASE_URL"),
            database_max_connections: env.parse("DATABASE_MAX_CONNECTIONS", 10)?,
            port: env.parse("PORT", 8080)?,
            rust_log: env.optional("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            max_upload_bytes: env.parse("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            ai,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: None,
            database_max_connections: 10,
            port: 8080,
            rust_log: "info".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ai: AiSettings::default(),
        }
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Returns the variable's value, treating unset and blank the same way.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.optional(key) {
            Some(raw) => raw.parse::<T>().with_context(|| {
                format!("Environment variable '{key}' has an invalid value: '{raw}'")
            }),
            None => Ok(default),
        }
    }
}
