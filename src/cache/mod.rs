//! Shared Redis connection.
//!
//! One multiplexed connection is opened by `start` and handed out as cheap
//! clones. Nothing connects before `start`, so constructing the service is
//! free and a missing Redis only surfaces at boot.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::RwLock;

use crate::config::RedisConfig;
use crate::error::{CacheError, LifecycleError};
use crate::lifecycle::Lifecycle;

pub struct RedisService {
    config: RedisConfig,
    connection: RwLock<Option<MultiplexedConnection>>,
}

impl RedisService {
    pub fn new(config: RedisConfig) -> Self {
        Self {
            config,
            connection: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Open the shared connection. Calling it again replaces the connection.
    pub async fn start(&self) -> Result<(), CacheError> {
        let address = self.config.address();
        let connect_err = |source| CacheError::Connect {
            address: address.clone(),
            source,
        };

        let client = redis::Client::open(self.config.connection_url()).map_err(connect_err)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(connect_err)?;

        *self.connection.write().await = Some(connection);
        tracing::info!(
            address = %address,
            db = self.config.db,
            tls = self.config.tls.is_some(),
            "Connected to Redis"
        );
        Ok(())
    }

    /// A handle on the shared connection.
    pub async fn client(&self) -> Result<MultiplexedConnection, CacheError> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or(CacheError::NotStarted)
    }

    /// Round-trip a `PING`; the server answers `PONG`.
    pub async fn ping(&self) -> Result<String, CacheError> {
        let mut connection = self.client().await?;
        let reply: String = redis::cmd("PING").query_async(&mut connection).await?;
        Ok(reply)
    }

    /// Release the shared connection. Returns `false` if there was none.
    pub async fn stop(&self) -> bool {
        let released = self.connection.write().await.take().is_some();
        if released {
            tracing::info!(address = %self.config.address(), "Redis connection released");
        }
        released
    }
}

#[async_trait]
impl Lifecycle for RedisService {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn start(&self) -> Result<(), LifecycleError> {
        Ok(RedisService::start(self).await?)
    }

    async fn stop(&self) {
        RedisService::stop(self).await;
    }
}
