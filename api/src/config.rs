use std::env;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::{info, warn};

use crate::validation::{PlatformRegistry, DEFAULT_PLATFORMS};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MAX_REQUEST_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_API_PREFIX: &str = "/api/v1";
pub const DEFAULT_CORS_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://localhost:8000",
    "http://localhost:8501",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub max_request_bytes: u64,
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
    pub platforms: PlatformRegistry,
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL".to_string()))?;

        let raw_addr = env::var("API_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidConfig(format!("Invalid API_BIND_ADDR `{}` ({})", raw_addr, e))
        })?;

        let api_prefix = normalize_prefix(
            &env::var("API_V1_PREFIX").unwrap_or_else(|_| DEFAULT_API_PREFIX.to_string()),
        )?;

        let platforms = match env::var("SUPPORTED_PLATFORMS") {
            Ok(raw) => PlatformRegistry::new(split_list(&raw)),
            Err(_) => PlatformRegistry::new(DEFAULT_PLATFORMS),
        };
        if platforms.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "SUPPORTED_PLATFORMS must name at least one platform".to_string(),
            ));
        }

        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(raw) => split_list(&raw),
            Err(_) => DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        };

        let config = ApiConfig {
            database_url,
            bind_addr,
            db_max_connections: env_number("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            max_request_bytes: env_number("MAX_REQUEST_BYTES", DEFAULT_MAX_REQUEST_BYTES),
            api_prefix,
            cors_origins,
            platforms,
        };

        info!(
            bind_addr = %config.bind_addr,
            api_prefix = %config.api_prefix,
            db_max_connections = config.db_max_connections,
            max_request_bytes = config.max_request_bytes,
            platforms = config.platforms.names().len(),
            "API configuration loaded"
        );

        Ok(config)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `api/v1/` becomes `/api/v1`; an empty prefix is rejected
fn normalize_prefix(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidConfig(
            "API_V1_PREFIX cannot be empty".to_string(),
        ));
    }
    Ok(format!("/{}", trimmed))
}

fn env_number<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => value,
            _ => {
                warn!("Invalid value for {key} (`{raw}`), using default {default}");
                default
            }
        },
        Err(_) => default,
    }
}
