use secrecy::SecretString;

use crate::config::helpers::{EnvSource, parse_env, parse_string_env};
use crate::error::ConfigError;

/// Namespaces searched for unqualified table names, in order.
pub const SEARCH_PATH: &[&str] = &["public", "core", "discovery_source"];

/// Table recording which migrations have been applied.
pub const MIGRATIONS_TABLE: &str = "__migrations__";

/// PostgreSQL connection parameters.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub name: String,
    pub pool_size: usize,
}

impl DatabaseConfig {
    pub(crate) fn resolve(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let pool_size = parse_env(env, "POSTGRES_POOL_SIZE", 16usize)?;
        if pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "POSTGRES_POOL_SIZE".to_string(),
                message: "pool size must be at least 1".to_string(),
            });
        }

        Ok(Self {
            host: parse_string_env(env, "POSTGRES_HOST", "localhost"),
            port: parse_env(env, "POSTGRES_PORT", 5432)?,
            user: parse_string_env(env, "POSTGRES_USER", "postgres"),
            password: SecretString::from(parse_string_env(env, "POSTGRES_PASSWORD", "postgres")),
            name: parse_string_env(env, "POSTGRES_NAME", "postgres"),
            pool_size,
        })
    }

    /// Startup options passed to every connection.
    pub fn connection_options(&self) -> String {
        format!("-c search_path={}", SEARCH_PATH.join(","))
    }
}
