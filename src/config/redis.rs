use crate::config::Environment;
use crate::config::helpers::{EnvSource, parse_bool_env, parse_env, parse_string_env};
use crate::error::ConfigError;

/// TLS settings, present only when TLS is actually in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisTlsConfig {
    /// Skip certificate verification.
    pub insecure: bool,
}

/// Redis connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub tls: Option<RedisTlsConfig>,
}

impl RedisConfig {
    pub(crate) fn resolve(
        env: &dyn EnvSource,
        environment: Environment,
    ) -> Result<Self, ConfigError> {
        let tls_requested = parse_bool_env(env, "REDIS_TLS", false)?;
        let tls = if environment == Environment::Production && tls_requested {
            Some(RedisTlsConfig {
                insecure: parse_bool_env(env, "REDIS_TLS_INSECURE", true)?,
            })
        } else {
            None
        };

        Ok(Self {
            host: parse_string_env(env, "REDIS_HOST", "127.0.0.1"),
            port: parse_env(env, "REDIS_PORT", 6378)?,
            db: parse_env(env, "REDIS_DB", 0)?,
            tls,
        })
    }

    /// `host:port`, for logs and error messages.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection URL understood by the `redis` crate.
    pub fn connection_url(&self) -> String {
        match &self.tls {
            None => format!("redis://{}/{}", self.address(), self.db),
            Some(tls) if tls.insecure => {
                format!("rediss://{}/{}#insecure", self.address(), self.db)
            }
            Some(_) => format!("rediss://{}/{}", self.address(), self.db),
        }
    }
}
