//! GitHub GraphQL API client.
//!
//! The token is optional. Without one the service starts uninitialized and
//! `client()` reports it, which keeps the rest of the server bootable.

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::GithubConfig;
use crate::error::{IntegrationError, LifecycleError};
use crate::lifecycle::Lifecycle;

pub const GITHUB_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

const CLIENT_NAME: &str = "github graphql";

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Vec<GraphqlResponseError>,
}

#[derive(Deserialize)]
struct GraphqlResponseError {
    message: String,
}

/// Authenticated client for a GitHub-compatible GraphQL endpoint.
#[derive(Clone)]
pub struct GithubGraphqlClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GithubGraphqlClient {
    pub fn new(token: &SecretString) -> Result<Self, IntegrationError> {
        Self::with_endpoint(token, GITHUB_GRAPHQL_ENDPOINT)
    }

    pub fn with_endpoint(
        token: &SecretString,
        endpoint: impl Into<String>,
    ) -> Result<Self, IntegrationError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| IntegrationError::Build {
                name: CLIENT_NAME,
                reason: format!("token is not a valid header value: {e}"),
            })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("timestack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IntegrationError::Build {
                name: CLIENT_NAME,
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run a query and return its `data` member.
    pub async fn query(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, IntegrationError> {
        let request_err = |reason: String| IntegrationError::Request {
            name: CLIENT_NAME,
            reason,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&GraphqlRequest { query, variables })
            .send()
            .await
            .map_err(|e| request_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(request_err(format!("HTTP {status}")));
        }

        let body: GraphqlResponse = response
            .json()
            .await
            .map_err(|e| request_err(e.to_string()))?;
        if !body.errors.is_empty() {
            let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(request_err(messages.join("; ")));
        }
        Ok(body.data.unwrap_or(serde_json::Value::Null))
    }
}

pub struct GithubService {
    config: GithubConfig,
    client: RwLock<Option<GithubGraphqlClient>>,
}

impl GithubService {
    pub fn new(config: GithubConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
        }
    }

    /// Build the client if a token is configured.
    pub async fn start(&self) -> Result<(), IntegrationError> {
        let Some(token) = &self.config.token else {
            tracing::warn!("GITHUB_PERSONAL_TOKEN not set, GitHub integration disabled");
            return Ok(());
        };
        let client = GithubGraphqlClient::new(token)?;
        *self.client.write().await = Some(client);
        tracing::info!(endpoint = GITHUB_GRAPHQL_ENDPOINT, "GitHub GraphQL client ready");
        Ok(())
    }

    pub async fn client(&self) -> Result<GithubGraphqlClient, IntegrationError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or(IntegrationError::NotInitialized(CLIENT_NAME))
    }

    pub async fn stop(&self) {
        self.client.write().await.take();
    }
}

#[async_trait]
impl Lifecycle for GithubService {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn start(&self) -> Result<(), LifecycleError> {
        Ok(GithubService::start(self).await?)
    }

    async fn stop(&self) {
        GithubService::stop(self).await;
    }
}
