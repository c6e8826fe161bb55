use std::sync::Arc;

use reqwest::{Client, Method, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::adapter::{GraphAuthenticationOptions, GraphAuthenticationProvider};
use crate::error::GraphClientError;
use crate::options::GraphClientOptions;

/// Authenticated client for the Microsoft Graph beta endpoint.
pub struct GraphServiceClient {
    http: Client,
    auth: GraphAuthenticationProvider,
    base_url: Url,
    options: Arc<GraphClientOptions>,
}

impl GraphServiceClient {
    pub fn new(
        http: Client,
        auth: GraphAuthenticationProvider,
        base_url: Url,
        options: Arc<GraphClientOptions>,
    ) -> Self {
        Self {
            http,
            auth,
            base_url,
            options,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn options(&self) -> &Arc<GraphClientOptions> {
        &self.options
    }

    pub fn authentication_provider(&self) -> &GraphAuthenticationProvider {
        &self.auth
    }

    /// Absolute URLs (e.g. `@odata.nextLink`) pass through; relative paths join the base URL.
    pub fn request_url(&self, path: &str) -> Result<Url, GraphClientError> {
        let raw = if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.as_str().trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        };
        Url::parse(&raw).map_err(|source| GraphClientError::InvalidBaseUrl { url: raw, source })
    }

    /// Authenticate and send a request, failing on a non-success status.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        per_call: Option<&GraphAuthenticationOptions>,
    ) -> Result<Response, GraphClientError> {
        let url = self.request_url(path)?;
        let mut request = self.http.request(method, url).build()?;
        self.auth.authenticate_request(&mut request, per_call).await?;

        debug!(method = %request.method(), url = %request.url(), "sending Graph request");
        let response = self.http.execute(request).await?.error_for_status()?;
        Ok(response)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GraphClientError> {
        self.get_with(path, None).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        per_call: Option<&GraphAuthenticationOptions>,
    ) -> Result<T, GraphClientError> {
        let resp = self
            .send(Method::GET, path, per_call)
            .await?
            .json::<T>()
            .await?;
        Ok(resp)
    }
}
