use crate::error::{AppError, Result};
use std::{env, str::FromStr};

pub const DEFAULT_JWT_SECRET: &str = "just-an-example-secret-key-not-a-real-one";
pub const DEFAULT_JWT_ISSUER: &str = "contract-testing-api";
pub const DEFAULT_JWT_AUDIENCE: &str = "contract-testing-app";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub auth: AuthConfig,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_size: usize,
    /// Mounts `POST /provider-states`. Only meant for contract verification runs.
    pub provider_states_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::ConfigError(format!("Invalid LOG_FORMAT value: {}", other))),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("PORT", "5280")?,
                max_body_size: parse_var("MAX_BODY_SIZE", "1048576")?,
                provider_states_enabled: parse_flag("PROVIDER_STATES_ENABLED", false)?,
            },
            database: DatabaseConfig {
                url: env::var("DB_URL").unwrap_or_else(|_| "sqlite::memory:".to_string()),
                max_connections: parse_var("DB_MAX_CONNECTIONS", "1")?,
            },
            cors: CorsConfig {
                allowed_origins: parse_origins(
                    &env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
                ),
            },
            auth: AuthConfig {
                enabled: parse_flag("AUTH_ENABLED", false)?,
                jwt_secret: env::var("JWT_SECRET")
                    .unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
                issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| DEFAULT_JWT_ISSUER.to_string()),
                audience: env::var("JWT_AUDIENCE")
                    .unwrap_or_else(|_| DEFAULT_JWT_AUDIENCE.to_string()),
            },
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "compact".to_string())
                .parse()?,
        })
    }

    /// In-memory configuration with the provider-state endpoint mounted.
    pub fn for_tests() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                max_body_size: 1024 * 1024,
                provider_states_enabled: true,
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            cors: CorsConfig {
                allowed_origins: Vec::new(),
            },
            auth: AuthConfig {
                enabled: false,
                jwt_secret: DEFAULT_JWT_SECRET.to_string(),
                issuer: DEFAULT_JWT_ISSUER.to_string(),
                audience: DEFAULT_JWT_AUDIENCE.to_string(),
            },
            log_format: LogFormat::Compact,
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| AppError::ConfigError(format!("Invalid {} value", name)))
}

fn parse_flag(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(AppError::ConfigError(format!("Invalid {} value", name))),
        },
        Err(_) => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && *s != "*")
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_origin_means_any() {
        assert!(parse_origins("*").is_empty());
        assert!(parse_origins(" , ").is_empty());
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        assert_eq!(
            parse_origins("http://localhost:5173, https://example.com"),
            vec!["http://localhost:5173", "https://example.com"]
        );
    }

    #[test]
    fn log_format_parses_known_values() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_config_mounts_provider_states() {
        let config = AppConfig::for_tests();
        assert!(config.server.provider_states_enabled);
        assert!(!config.auth.enabled);
        assert_eq!(config.server_address(), "127.0.0.1:0");
    }
}
