//! Environment-driven configuration.
//!
//! Values come from the process environment after `.env` has been loaded by
//! `dotenvy`. Every setting has a documented default, so an empty environment
//! resolves to a local development setup.

mod database;
pub(crate) mod helpers;
mod redis;

use secrecy::SecretString;

pub use self::database::{DatabaseConfig, MIGRATIONS_TABLE, SEARCH_PATH};
pub use self::helpers::{EnvSource, ProcessEnv};
pub use self::redis::{RedisConfig, RedisTlsConfig};

use self::helpers::{optional_env, parse_env, parse_string_env};
use crate::error::ConfigError;

/// Deployment environment, read from `NODE_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub(crate) fn resolve(env: &dyn EnvSource) -> Self {
        Self::from_str(&parse_string_env(env, "NODE_ENV", "development"))
    }

    /// Unrecognised values count as development so TLS stays opt-in.
    fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" => Self::Production,
            "test" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Public base URL, used in logs and for the GraphiQL endpoint.
    pub url: String,
}

impl ServerConfig {
    /// Every route is mounted under this prefix.
    pub const GLOBAL_PREFIX: &'static str = "v1";

    fn resolve(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let port = parse_env(env, "SERVER_PORT", 3000)?;
        let url = optional_env(env, "SERVER_URL")
            .map(|raw| raw.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{port}"));
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "SERVER_URL".to_string(),
                message: format!("'{url}' must start with http:// or https://"),
            });
        }
        Ok(Self { port, url })
    }

    pub fn graphql_path(&self) -> String {
        format!("/{}/graphql", Self::GLOBAL_PREFIX)
    }
}

/// GitHub integration settings.
#[derive(Debug, Clone, Default)]
pub struct GithubConfig {
    /// Absent when `GITHUB_PERSONAL_TOKEN` is unset or blank.
    pub token: Option<SecretString>,
}

impl GithubConfig {
    fn resolve(env: &dyn EnvSource) -> Self {
        Self {
            token: optional_env(env, "GITHUB_PERSONAL_TOKEN").map(SecretString::from),
        }
    }
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub github: GithubConfig,
}

impl Config {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(&ProcessEnv)
    }

    pub fn resolve(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let environment = Environment::resolve(env);
        Ok(Self {
            environment,
            server: ServerConfig::resolve(env)?,
            database: DatabaseConfig::resolve(env)?,
            redis: RedisConfig::resolve(env, environment)?,
            github: GithubConfig::resolve(env),
        })
    }
}
