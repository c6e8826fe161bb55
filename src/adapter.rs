use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Request, Url};
use tracing::{debug, warn};

use crate::auth::{AuthorizationHeaderProvider, AuthorizationHeaderProviderOptions};
use crate::error::GraphClientError;
use crate::options::GraphClientOptions;

/// Hosts of the national and test Microsoft Graph clouds.
pub const GRAPH_HOSTS: &[&str] = &[
    "graph.microsoft.com",
    "graph.microsoft.us",
    "dod-graph.microsoft.us",
    "graph.microsoft.de",
    "microsoftgraph.chinacloudapi.cn",
    "canary.graph.microsoft.com",
    "graph.microsoft-ppe.com",
];

/// Overrides applied to a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphAuthenticationOptions {
    pub scopes: Option<Vec<String>>,
    pub request_app_token: Option<bool>,
    pub user: Option<String>,
}

/// Adds an `Authorization` header to requests bound for Microsoft Graph.
pub struct GraphAuthenticationProvider {
    provider: Arc<dyn AuthorizationHeaderProvider>,
    options: Arc<GraphClientOptions>,
    scopes: Vec<String>,
    base_url: Url,
}

impl GraphAuthenticationProvider {
    pub fn new(
        provider: Arc<dyn AuthorizationHeaderProvider>,
        options: Arc<GraphClientOptions>,
        scopes: Vec<String>,
        base_url: Url,
    ) -> Self {
        Self {
            provider,
            options,
            scopes,
            base_url,
        }
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Graph clouds only over https; the configured base URL on its own scheme and port.
    fn is_allowed_host(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let graph_host = url.scheme() == "https"
            && GRAPH_HOSTS.iter().any(|h| h.eq_ignore_ascii_case(host));
        let base_host = self.base_url.host_str() == Some(host)
            && self.base_url.scheme() == url.scheme()
            && self.base_url.port_or_known_default() == url.port_or_known_default();
        graph_host || base_host
    }

    /// Attach the authorization header to `request`.
    ///
    /// Requests to foreign hosts and requests that already carry an
    /// `Authorization` header are left untouched.
    pub async fn authenticate_request(
        &self,
        request: &mut Request,
        per_call: Option<&GraphAuthenticationOptions>,
    ) -> Result<(), GraphClientError> {
        if !self.is_allowed_host(request.url()) {
            warn!(url = %request.url(), "not attaching Graph credentials to foreign host");
            return Ok(());
        }
        if request.headers().contains_key(AUTHORIZATION) {
            return Ok(());
        }

        let scopes = per_call
            .and_then(|o| o.scopes.as_deref())
            .unwrap_or(self.scopes.as_slice());
        let Some(first_scope) = scopes.first() else {
            return Err(GraphClientError::missing_scopes());
        };
        let app_token = per_call
            .and_then(|o| o.request_app_token)
            .unwrap_or(self.options.request_app_token);
        let header_options = AuthorizationHeaderProviderOptions {
            base_url: Some(self.base_url.to_string()),
            user: per_call
                .and_then(|o| o.user.clone())
                .or_else(|| self.options.user.clone()),
        };

        debug!(app_token, scopes = ?scopes, "acquiring authorization header");
        let value = if app_token {
            self.provider
                .create_authorization_header_for_app(first_scope, Some(&header_options))
                .await?
        } else {
            self.provider
                .create_authorization_header_for_user(scopes, Some(&header_options))
                .await?
        };

        let mut header = HeaderValue::from_str(&value).map_err(|_| {
            GraphClientError::TokenAcquisition(
                "authorization header contains invalid characters".to_string(),
            )
        })?;
        header.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, header);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::Method;
    use std::sync::Mutex;

    /// Records each call and answers with a header derived from it.
    #[derive(Default)]
    pub(crate) struct RecordingProvider {
        pub(crate) calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AuthorizationHeaderProvider for RecordingProvider {
        async fn create_authorization_header_for_user(
            &self,
            scopes: &[String],
            options: Option<&AuthorizationHeaderProviderOptions>,
        ) -> Result<String, GraphClientError> {
            let user = options.and_then(|o| o.user.clone()).unwrap_or_default();
            self.calls
                .lock()
                .unwrap()
                .push(format!("user:{}:{}", scopes.join(" "), user));
            Ok(format!("Bearer user-{}", scopes.join("+")))
        }

        async fn create_authorization_header_for_app(
            &self,
            scope: &str,
            _options: Option<&AuthorizationHeaderProviderOptions>,
        ) -> Result<String, GraphClientError> {
            self.calls.lock().unwrap().push(format!("app:{scope}"));
            Ok(format!("Bearer app-{scope}"))
        }
    }

    fn adapter(
        provider: Arc<RecordingProvider>,
        options: GraphClientOptions,
    ) -> GraphAuthenticationProvider {
        let scopes = options.validated_scopes().unwrap().to_vec();
        GraphAuthenticationProvider::new(
            provider,
            Arc::new(options),
            scopes,
            Url::parse("https://graph.microsoft.com/beta").unwrap(),
        )
    }

    fn request(url: &str) -> Request {
        Request::new(Method::GET, Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn user_token_uses_all_scopes() {
        let provider = Arc::new(RecordingProvider::default());
        let adapter = adapter(
            provider.clone(),
            GraphClientOptions::default()
                .with_scopes(["User.Read", "Mail.Read"])
                .with_user("alice@contoso.com"),
        );
        let mut req = request("https://graph.microsoft.com/beta/me");

        adapter.authenticate_request(&mut req, None).await.unwrap();

        assert_eq!(
            req.headers()[AUTHORIZATION],
            "Bearer user-User.Read+Mail.Read"
        );
        assert_eq!(
            *provider.calls.lock().unwrap(),
            vec!["user:User.Read Mail.Read:alice@contoso.com".to_string()]
        );
    }

    #[tokio::test]
    async fn app_token_uses_first_scope() {
        let provider = Arc::new(RecordingProvider::default());
        let adapter = adapter(
            provider.clone(),
            GraphClientOptions::default()
                .with_scopes(["https://graph.microsoft.com/.default", "ignored"])
                .with_app_token(true),
        );
        let mut req = request("https://graph.microsoft.com/beta/users");

        adapter.authenticate_request(&mut req, None).await.unwrap();

        assert_eq!(
            *provider.calls.lock().unwrap(),
            vec!["app:https://graph.microsoft.com/.default".to_string()]
        );
    }

    #[tokio::test]
    async fn per_call_options_override_defaults() {
        let provider = Arc::new(RecordingProvider::default());
        let adapter = adapter(
            provider.clone(),
            GraphClientOptions::default().with_scopes(["User.Read"]),
        );
        let per_call = GraphAuthenticationOptions {
            scopes: Some(vec!["Sites.Read.All".into()]),
            request_app_token: Some(true),
            user: None,
        };
        let mut req = request("https://graph.microsoft.com/beta/sites");

        adapter
            .authenticate_request(&mut req, Some(&per_call))
            .await
            .unwrap();

        assert_eq!(req.headers()[AUTHORIZATION], "Bearer app-Sites.Read.All");
    }

    #[tokio::test]
    async fn empty_per_call_scopes_are_rejected() {
        let provider = Arc::new(RecordingProvider::default());
        let adapter = adapter(
            provider,
            GraphClientOptions::default().with_scopes(["User.Read"]),
        );
        let per_call = GraphAuthenticationOptions {
            scopes: Some(Vec::new()),
            ..Default::default()
        };
        let mut req = request("https://graph.microsoft.com/beta/me");

        let err = adapter
            .authenticate_request(&mut req, Some(&per_call))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphClientError::MissingScopes { .. }));
    }

    #[tokio::test]
    async fn foreign_hosts_get_no_credentials() {
        let provider = Arc::new(RecordingProvider::default());
        let adapter = adapter(
            provider.clone(),
            GraphClientOptions::default().with_scopes(["User.Read"]),
        );
        let mut req = request("https://evil.example.com/steal");

        adapter.authenticate_request(&mut req, None).await.unwrap();

        assert!(!req.headers().contains_key(AUTHORIZATION));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn plaintext_graph_urls_get_no_credentials() {
        let provider = Arc::new(RecordingProvider::default());
        let adapter = adapter(
            provider.clone(),
            GraphClientOptions::default().with_scopes(["User.Read"]),
        );
        let mut req = request("http://graph.microsoft.com/beta/me");

        adapter.authenticate_request(&mut req, None).await.unwrap();

        assert!(!req.headers().contains_key(AUTHORIZATION));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn configured_base_host_is_authenticated() {
        let provider = Arc::new(RecordingProvider::default());
        let scopes = vec!["User.Read".to_string()];
        let adapter = GraphAuthenticationProvider::new(
            provider.clone(),
            Arc::new(GraphClientOptions::default().with_scopes(scopes.clone())),
            scopes,
            Url::parse("http://127.0.0.1:8080/beta").unwrap(),
        );

        let mut same = request("http://127.0.0.1:8080/beta/me");
        adapter.authenticate_request(&mut same, None).await.unwrap();
        assert!(same.headers().contains_key(AUTHORIZATION));

        let mut other_port = request("http://127.0.0.1:9090/beta/me");
        adapter.authenticate_request(&mut other_port, None).await.unwrap();
        assert!(!other_port.headers().contains_key(AUTHORIZATION));
    }

    #[tokio::test]
    async fn existing_header_is_kept() {
        let provider = Arc::new(RecordingProvider::default());
        let adapter = adapter(
            provider.clone(),
            GraphClientOptions::default().with_scopes(["User.Read"]),
        );
        let mut req = request("https://graph.microsoft.us/beta/me");
        req.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Bearer preset"));

        adapter.authenticate_request(&mut req, None).await.unwrap();

        assert_eq!(req.headers()[AUTHORIZATION], "Bearer preset");
        assert!(provider.calls.lock().unwrap().is_empty());
    }
}
