//! End-to-end HTTP tests for the GraphQL endpoint.
//!
//! These start a real axum server on a random port without a database and
//! talk to it with reqwest.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use timestack::config::ServerConfig;
use timestack::graphql::build_schema;
use timestack::server::{AppState, ServerHandle, start_server};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn start_test_server() -> (SocketAddr, Arc<AppState>, ServerHandle) {
    let state = Arc::new(AppState::new(
        build_schema(None),
        ServerConfig {
            port: 0,
            url: "http://127.0.0.1".to_string(),
        },
    ));
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = start_server(addr, Arc::clone(&state))
        .await
        .expect("server binds");
    (server.addr, state, server)
}

fn http() -> reqwest::Client {
    reqwest::Client::builder().timeout(TIMEOUT).build().unwrap()
}

#[tokio::test]
async fn author_query_over_http() {
    let (addr, state, _server) = start_test_server().await;

    let body: serde_json::Value = http()
        .post(format!("http://{addr}/v1/graphql"))
        .json(&json!({
            "query": "query($id: Int!) { author(id: $id) { id firstName lastName posts { id title votes } } }",
            "variables": { "id": 42 }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        body,
        json!({
            "data": {
                "author": {
                    "id": 42,
                    "firstName": "John",
                    "lastName": "Doe",
                    "posts": [{ "id": 42, "title": "Post 1", "votes": 1 }]
                }
            }
        })
    );

    state.shutdown().await;
}

#[tokio::test]
async fn entity_query_without_database_returns_error() {
    let (addr, state, _server) = start_test_server().await;

    let body: serde_json::Value = http()
        .post(format!("http://{addr}/v1/graphql"))
        .json(&json!({ "query": "{ tags(workspaceId: \"7f1c2a54-5d43-4c2b-9a59-0e5b7b0f5d11\") { id } }" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["errors"][0]["message"], "database unavailable");
    assert_eq!(body["data"], serde_json::Value::Null);

    state.shutdown().await;
}

#[tokio::test]
async fn health_reports_version() {
    let (addr, state, _server) = start_test_server().await;

    let response = http()
        .get(format!("http://{addr}/v1/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") })
    );

    state.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_accepting_connections() {
    let (addr, state, server) = start_test_server().await;
    state.shutdown().await;
    tokio::time::timeout(TIMEOUT, server.wait())
        .await
        .expect("server drains");

    let result = http()
        .get(format!("http://{addr}/v1/health"))
        .send()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn response_started_before_shutdown_is_delivered() {
    let (addr, state, server) = start_test_server().await;

    let request = tokio::spawn(async move {
        http()
            .post(format!("http://{addr}/v1/graphql"))
            .json(&json!({ "query": "{ author(id: 1) { firstName } }" }))
            .send()
            .await
    });
    let response = request.await.unwrap().unwrap();
    state.shutdown().await;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["author"]["firstName"], "John");
    tokio::time::timeout(TIMEOUT, server.wait())
        .await
        .expect("server drains");
}
