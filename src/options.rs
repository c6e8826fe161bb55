use serde::Deserialize;

use crate::config::ConfigSection;
use crate::error::GraphClientError;

/// Options for the Graph beta client.
///
/// Built once at startup and shared read-only between resolution scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphClientOptions {
    /// Base URL of the Graph endpoint. `None` falls back to the factory default.
    pub base_url: Option<String>,
    /// Scopes requested for every call made by the client.
    pub scopes: Option<Vec<String>>,
    /// Request an application token instead of a user-delegated one.
    pub request_app_token: bool,
    /// Account hint forwarded to the authorization header provider.
    pub user: Option<String>,
}

/// Keys a configuration section may set. Absent keys leave the target untouched.
#[derive(Debug, Default, Deserialize)]
struct OptionsPatch {
    #[serde(
        rename = "BaseUrl",
        alias = "baseUrl",
        alias = "base_url",
        alias = "baseurl",
        default
    )]
    base_url: Option<String>,
    #[serde(rename = "Scopes", alias = "scopes", default)]
    scopes: Option<Vec<String>>,
    #[serde(
        rename = "RequestAppToken",
        alias = "requestAppToken",
        alias = "request_app_token",
        alias = "requestapptoken",
        default
    )]
    request_app_token: Option<bool>,
    #[serde(rename = "User", alias = "user", default)]
    user: Option<String>,
}

impl GraphClientOptions {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_app_token(mut self, request_app_token: bool) -> Self {
        self.request_app_token = request_app_token;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Overlay the keys present in `section` onto these options.
    pub fn bind(mut self, section: &ConfigSection) -> Result<Self, GraphClientError> {
        let patch: OptionsPatch = section.bind()?;
        if let Some(base_url) = patch.base_url {
            self.base_url = Some(base_url);
        }
        if let Some(scopes) = patch.scopes {
            self.scopes = Some(scopes);
        }
        if let Some(app) = patch.request_app_token {
            self.request_app_token = app;
        }
        if let Some(user) = patch.user {
            self.user = Some(user);
        }
        Ok(self)
    }

    /// The configured scopes, or a fail-fast error naming `scopes`.
    pub fn validated_scopes(&self) -> Result<&[String], GraphClientError> {
        match self.scopes.as_deref() {
            Some(scopes) if !scopes.is_empty() => Ok(scopes),
            _ => Err(GraphClientError::missing_scopes()),
        }
    }
}
