use std::sync::Arc;

use reqwest::Url;
use tracing::debug;

use crate::adapter::GraphAuthenticationProvider;
use crate::auth::AuthorizationHeaderProvider;
use crate::client::GraphServiceClient;
use crate::error::GraphClientError;
use crate::http::{HttpClientFactory, GRAPH_BETA_HTTP_CLIENT};
use crate::options::GraphClientOptions;

/// Endpoint used when the options leave `base_url` unset.
pub const DEFAULT_GRAPH_BETA_URL: &str = "https://graph.microsoft.com/beta";

/// Builds [`GraphServiceClient`] instances from options and collaborators.
#[derive(Debug, Clone)]
pub struct ClientFactory {
    default_base_url: String,
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self {
            default_base_url: DEFAULT_GRAPH_BETA_URL.to_string(),
        }
    }
}

impl ClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_base_url(mut self, url: impl Into<String>) -> Self {
        self.default_base_url = url.into();
        self
    }

    /// Apply `configure` to default options, then build a client from the result.
    pub fn resolve<F>(
        &self,
        configure: F,
        auth_provider: Arc<dyn AuthorizationHeaderProvider>,
        http_source: &dyn HttpClientFactory,
    ) -> Result<GraphServiceClient, GraphClientError>
    where
        F: FnOnce(GraphClientOptions) -> GraphClientOptions,
    {
        let options = Arc::new(configure(GraphClientOptions::default()));
        self.build(options, auth_provider, http_source)
    }

    /// Build a client from an already materialized options snapshot.
    ///
    /// Scopes are checked before anything else is touched; no network calls happen here.
    pub fn build(
        &self,
        options: Arc<GraphClientOptions>,
        auth_provider: Arc<dyn AuthorizationHeaderProvider>,
        http_source: &dyn HttpClientFactory,
    ) -> Result<GraphServiceClient, GraphClientError> {
        let scopes = options.validated_scopes()?.to_vec();

        let raw = options
            .base_url
            .clone()
            .unwrap_or_else(|| self.default_base_url.clone());
        let base_url = Url::parse(&raw)
            .map_err(|source| GraphClientError::InvalidBaseUrl { url: raw, source })?;

        let http = http_source.create_client(GRAPH_BETA_HTTP_CLIENT)?;
        let auth = GraphAuthenticationProvider::new(
            auth_provider,
            options.clone(),
            scopes,
            base_url.clone(),
        );

        debug!(base_url = %base_url, "resolved Graph beta client");
        Ok(GraphServiceClient::new(http, auth, base_url, options))
    }
}
