use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::GraphClientError;

/// Logical name of the HTTP client used by the Graph beta client.
pub const GRAPH_BETA_HTTP_CLIENT: &str = "GraphServiceClientBeta";

/// Hands out HTTP clients by logical name.
pub trait HttpClientFactory: Send + Sync {
    fn create_client(&self, name: &str) -> Result<Client, GraphClientError>;
}

/// Transport settings applied to one named client.
#[derive(Debug, Clone)]
pub struct HttpClientSettings {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
        }
    }
}

/// Keeps one `reqwest::Client` per name so connection pools are reused.
#[derive(Default)]
pub struct PooledHttpClientFactory {
    settings: HashMap<String, HttpClientSettings>,
    clients: Mutex<HashMap<String, Client>>,
}

impl PooledHttpClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register settings for `name`. Must happen before the first `create_client`.
    pub fn configure(mut self, name: impl Into<String>, settings: HttpClientSettings) -> Self {
        self.settings.insert(name.into(), settings);
        self
    }
}

impl HttpClientFactory for PooledHttpClientFactory {
    fn create_client(&self, name: &str) -> Result<Client, GraphClientError> {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = clients.get(name) {
            return Ok(client.clone());
        }

        let settings = self.settings.get(name).cloned().unwrap_or_default();
        let mut builder = Client::builder().timeout(settings.timeout);
        if let Some(agent) = settings.user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder.build()?;
        debug!(name, "created pooled HTTP client");
        clients.insert(name.to_string(), client.clone());
        Ok(client)
    }
}
