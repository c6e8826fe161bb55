use thiserror::Error;

/// Errors produced while building or using a Graph beta client.
#[derive(Debug, Error)]
pub enum GraphClientError {
    /// Required scopes were absent or empty when the client was resolved.
    #[error("{field}: the scopes for the called API are null or empty")]
    MissingScopes { field: &'static str },

    /// A collaborator was never registered before the services were built.
    #[error("no {0} has been registered")]
    MissingDependency(&'static str),

    #[error("failed to bind configuration section: {0}")]
    Binding(#[from] ::config::ConfigError),

    #[error("invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("token acquisition failed: {0}")]
    TokenAcquisition(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GraphClientError {
    pub(crate) fn missing_scopes() -> Self {
        Self::MissingScopes { field: "scopes" }
    }
}
