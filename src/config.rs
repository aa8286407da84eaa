use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OPENROUTER_MODEL: &str = "google/gemini-2.5-flash:online";

/// Which upstream model service answers analysis prompts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderConfig {
    Gemini { api_key: String, model: String },
    OpenRouter { api_key: String, model: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub database_path: String,
    pub request_timeout: Duration,
    pub provider: ProviderConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = match lookup("ANALYSIS_PROVIDER").as_deref().unwrap_or("gemini") {
            "gemini" => ProviderConfig::Gemini {
                api_key: required(&lookup, "GEMINI_API_KEY")?,
                model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            },
            "openrouter" => ProviderConfig::OpenRouter {
                api_key: required(&lookup, "OPENROUTER_API_KEY")?,
                model: lookup("OPENROUTER_MODEL")
                    .unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
            },
            other => {
                return Err(AppError::ConfigError(format!("Unknown analysis provider: {other}")));
            }
        };

        // Load server configuration with defaults
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = lookup("PORT").unwrap_or_else(|| "3001".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let timeout_secs = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| AppError::ConfigError(format!("Invalid request timeout: {}", e)))?,
            None => 90,
        };

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            database_path: lookup("DATABASE_PATH").unwrap_or_else(|| "app_analysis.db".to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
            provider,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::ConfigError(format!("{key} is not set"))),
    }
}
