//! Error types for every layer of the server.
//!
//! Database failures are carried verbatim: constraint violations come back as
//! `DatabaseError::Query` wrapping the driver error, and callers inspect the
//! SQLSTATE through [`DatabaseError::sql_state`] instead of matching on a
//! translated domain error.

use tokio_postgres::error::SqlState;

/// Configuration resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database access errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DatabaseError {
    /// SQLSTATE reported by the server, if this came from a failed statement.
    pub fn sql_state(&self) -> Option<&SqlState> {
        match self {
            Self::Query(err) => err.code(),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.sql_state() == Some(&SqlState::UNIQUE_VIOLATION)
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        self.sql_state() == Some(&SqlState::FOREIGN_KEY_VIOLATION)
    }
}

impl From<deadpool_postgres::PoolError> for DatabaseError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

/// Migration sequencing and execution errors.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("invalid migration catalog: {0}")]
    InvalidCatalog(String),

    #[error("migration {version} ({name}) failed at statement {index}: {source}")]
    Statement {
        version: i64,
        name: &'static str,
        index: usize,
        #[source]
        source: DatabaseError,
    },

    #[error("migration tracking failed: {0}")]
    Tracking(#[source] DatabaseError),

    #[error("applied migration {0} is not in the catalog")]
    UnknownApplied(i64),
}

impl From<deadpool_postgres::PoolError> for MigrationError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Tracking(DatabaseError::from(err))
    }
}

/// Redis service errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis service has not been started")]
    NotStarted,

    #[error("failed to connect to redis at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: redis::RedisError,
    },

    #[error("redis command failed: {0}")]
    Command(#[from] redis::RedisError),
}

/// External integration errors.
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("{0} client not initialized")]
    NotInitialized(&'static str),

    #[error("failed to build {name} client: {reason}")]
    Build { name: &'static str, reason: String },

    #[error("{name} request failed: {reason}")]
    Request { name: &'static str, reason: String },
}

/// Errors raised while starting or stopping a lifecycle-managed service.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("service {name} failed to start: {reason}")]
    StartFailed { name: String, reason: String },
}

impl From<CacheError> for LifecycleError {
    fn from(err: CacheError) -> Self {
        Self::StartFailed {
            name: "redis".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<IntegrationError> for LifecycleError {
    fn from(err: IntegrationError) -> Self {
        Self::StartFailed {
            name: "github".to_string(),
            reason: err.to_string(),
        }
    }
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
}
