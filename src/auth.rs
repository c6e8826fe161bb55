use std::env;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, ClientId, ClientSecret, Scope,
    TokenResponse, TokenUrl,
};
use tracing::debug;

use crate::error::GraphClientError;

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);
/// Assumed lifetime when the token endpoint omits `expires_in`.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);
/// Upper bound on the lifetime accepted from the token endpoint.
const MAX_LIFETIME: Duration = Duration::from_secs(24 * 3600);
const MAX_CACHED_SCOPES: u64 = 1_000;

/// Per-call options handed to an [`AuthorizationHeaderProvider`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationHeaderProviderOptions {
    /// Base URL of the API the header is meant for.
    pub base_url: Option<String>,
    /// Account hint for user-delegated tokens.
    pub user: Option<String>,
}

/// Produces `Authorization` header values for outgoing requests.
#[async_trait]
pub trait AuthorizationHeaderProvider: Send + Sync {
    /// Header value for a call made on behalf of a user.
    async fn create_authorization_header_for_user(
        &self,
        scopes: &[String],
        options: Option<&AuthorizationHeaderProviderOptions>,
    ) -> Result<String, GraphClientError>;

    /// Header value for a call made as the application itself.
    async fn create_authorization_header_for_app(
        &self,
        scope: &str,
        options: Option<&AuthorizationHeaderProviderOptions>,
    ) -> Result<String, GraphClientError>;
}

/// Confidential client registration used for the client-credentials flow.
#[derive(Clone)]
pub struct TokenAcquisitionSettings {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub authority_host: String,
}

impl std::fmt::Debug for TokenAcquisitionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAcquisitionSettings")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("authority_host", &self.authority_host)
            .finish_non_exhaustive()
    }
}

impl TokenAcquisitionSettings {
    /// Read `CLIENT_ID`, `CLIENT_SECRET`, `TENANT_ID` and optional `AUTHORITY_HOST`.
    pub fn from_env() -> Result<Self, GraphClientError> {
        Ok(Self {
            client_id: required_var("CLIENT_ID")?,
            client_secret: required_var("CLIENT_SECRET")?,
            tenant_id: required_var("TENANT_ID")?,
            authority_host: env::var("AUTHORITY_HOST")
                .unwrap_or_else(|_| DEFAULT_AUTHORITY_HOST.to_string()),
        })
    }

    fn endpoint(&self, leaf: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/{}",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id,
            leaf
        )
    }
}

fn required_var(name: &str) -> Result<String, GraphClientError> {
    env::var(name).map_err(|_| GraphClientError::TokenAcquisition(format!("{name} is not set")))
}

#[derive(Debug, Clone)]
struct CachedToken {
    secret: String,
    lifetime: Duration,
}

/// Evicts each token `EXPIRY_MARGIN` before the lifetime the token endpoint reported.
struct TokenExpiry;

impl Expiry<String, CachedToken> for TokenExpiry {
    fn expire_after_create(
        &self,
        _scope: &String,
        token: &CachedToken,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(token.lifetime.saturating_sub(EXPIRY_MARGIN))
    }
}

/// Application token acquisition through the OAuth2 client-credentials grant.
///
/// Tokens are cached per scope until shortly before they expire. Concurrent
/// misses for the same scope share one token request.
pub struct ClientCredentialsTokenAcquisition {
    client: BasicClient,
    cache: Cache<String, CachedToken>,
}

impl ClientCredentialsTokenAcquisition {
    pub fn new(settings: &TokenAcquisitionSettings) -> Result<Self, GraphClientError> {
        let auth_url = AuthUrl::new(settings.endpoint("authorize"))
            .map_err(|e| GraphClientError::TokenAcquisition(e.to_string()))?;
        let token_url = TokenUrl::new(settings.endpoint("token"))
            .map_err(|e| GraphClientError::TokenAcquisition(e.to_string()))?;

        let client = BasicClient::new(
            ClientId::new(settings.client_id.clone()),
            Some(ClientSecret::new(settings.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        Ok(Self {
            client,
            cache: Cache::builder()
                .max_capacity(MAX_CACHED_SCOPES)
                .expire_after(TokenExpiry)
                .build(),
        })
    }

    pub fn from_env() -> Result<Self, GraphClientError> {
        Self::new(&TokenAcquisitionSettings::from_env()?)
    }

    /// Access token for `scope`, served from cache while still fresh.
    pub async fn access_token(&self, scope: &str) -> Result<String, GraphClientError> {
        self.cache
            .try_get_with(scope.to_string(), self.request_token(scope))
            .await
            .map(|token| token.secret)
            .map_err(|e| GraphClientError::TokenAcquisition(e.to_string()))
    }

    async fn request_token(&self, scope: &str) -> Result<CachedToken, String> {
        debug!(scope, "requesting client-credentials token");
        let token_result = self
            .client
            .exchange_client_credentials()
            .add_scope(Scope::new(scope.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| e.to_string())?;

        let lifetime = token_result
            .expires_in()
            .unwrap_or(DEFAULT_LIFETIME)
            .min(MAX_LIFETIME);
        Ok(CachedToken {
            secret: token_result.access_token().secret().to_string(),
            lifetime,
        })
    }
}

#[async_trait]
impl AuthorizationHeaderProvider for ClientCredentialsTokenAcquisition {
    async fn create_authorization_header_for_user(
        &self,
        _scopes: &[String],
        _options: Option<&AuthorizationHeaderProviderOptions>,
    ) -> Result<String, GraphClientError> {
        Err(GraphClientError::TokenAcquisition(
            "user-delegated tokens cannot be acquired with client credentials; set RequestAppToken"
                .to_string(),
        ))
    }

    async fn create_authorization_header_for_app(
        &self,
        scope: &str,
        _options: Option<&AuthorizationHeaderProviderOptions>,
    ) -> Result<String, GraphClientError> {
        let token = self.access_token(scope).await?;
        Ok(format!("Bearer {token}"))
    }
}
