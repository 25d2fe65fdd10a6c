//! Start/stop management for long-lived services.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::LifecycleError;

/// A service that owns an external connection for the process lifetime.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    fn name(&self) -> &'static str;

    async fn start(&self) -> Result<(), LifecycleError>;

    /// Release held resources. Must tolerate being called when not started.
    async fn stop(&self);
}

/// Ordered collection of services started at boot and stopped at shutdown.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<Arc<dyn Lifecycle>>,
    started: Mutex<Vec<Arc<dyn Lifecycle>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: Arc<dyn Lifecycle>) {
        self.services.push(service);
    }

    /// Start every service in registration order.
    ///
    /// On failure, services that already started are stopped in reverse
    /// order before the error is returned. Calling it again while services
    /// are running does nothing.
    pub async fn start_all(&self) -> Result<(), LifecycleError> {
        let mut started = self.started.lock().await;
        if !started.is_empty() {
            tracing::warn!("Services already started, ignoring start request");
            return Ok(());
        }
        for service in &self.services {
            if let Err(e) = service.start().await {
                tracing::error!(service = service.name(), error = %e, "Service failed to start");
                while let Some(running) = started.pop() {
                    running.stop().await;
                    tracing::info!(service = running.name(), "Service stopped");
                }
                return Err(e);
            }
            tracing::info!(service = service.name(), "Service started");
            started.push(Arc::clone(service));
        }
        Ok(())
    }

    /// Stop started services in reverse order. Later calls do nothing.
    pub async fn shutdown(&self) {
        let mut started = std::mem::take(&mut *self.started.lock().await);
        while let Some(service) = started.pop() {
            service.stop().await;
            tracing::info!(service = service.name(), "Service stopped");
        }
    }
}
