//! HTTP server: health probe and the GraphQL endpoint under `/v1`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::extract::State;
use axum::http::{HeaderValue, Method, header};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::graphql::AppSchema;
use crate::lifecycle::ServiceRegistry;

/// Shared state for all handlers.
pub struct AppState {
    pub schema: AppSchema,
    pub config: ServerConfig,
    pub shutdown_tx: RwLock<Option<oneshot::Sender<()>>>,
}

impl AppState {
    pub fn new(schema: AppSchema, config: ServerConfig) -> Self {
        Self {
            schema,
            config,
            shutdown_tx: RwLock::new(None),
        }
    }

    /// Signal the running server to stop accepting connections.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Build the router with every route mounted under the global prefix.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/graphql", get(graphiql_handler).post(graphql_handler));

    let origins: Vec<HeaderValue> = [
        state.config.url.clone(),
        format!("http://localhost:{}", state.config.port),
        format!("http://127.0.0.1:{}", state.config.port),
    ]
    .iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest(&format!("/{}", ServerConfig::GLOBAL_PREFIX), api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A server started by [`start_server`].
pub struct ServerHandle {
    pub addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Wait for the serve task to finish draining in-flight requests.
    ///
    /// Only returns after [`AppState::shutdown`] has been called.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            tracing::error!("HTTP server task failed: {}", e);
        }
    }
}

/// Bind `addr` and serve in a background task.
///
/// The handle carries the bound address, which differs from `addr` when
/// port 0 was requested. Call [`AppState::shutdown`] to stop the server.
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<ServerHandle, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
    let bound_addr = listener.local_addr().map_err(|e| ServerError::Bind {
        addr: addr.to_string(),
        reason: format!("failed to get local addr: {e}"),
    })?;

    let app = router(Arc::clone(&state));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("HTTP server shutting down");
            })
            .await
        {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tracing::info!(
        addr = %bound_addr,
        graphql = %format!("{}{}", state.config.url, state.config.graphql_path()),
        "HTTP server listening"
    );
    Ok(ServerHandle {
        addr: bound_addr,
        task,
    })
}

/// Serve until `signal` resolves, then tear everything down once: stop
/// accepting connections, drain in-flight requests, stop `services` in
/// reverse order.
pub async fn serve_until(
    state: &AppState,
    server: ServerHandle,
    services: &ServiceRegistry,
    signal: impl Future<Output = ()>,
) {
    signal.await;
    state.shutdown().await;
    server.wait().await;
    services.shutdown().await;
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn graphql_handler(
    State(state): State<Arc<AppState>>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    state.schema.execute(request.into_inner()).await.into()
}

async fn graphiql_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let endpoint = format!("{}{}", state.config.url, state.config.graphql_path());
    Html(GraphiQLSource::build().endpoint(&endpoint).finish())
}
