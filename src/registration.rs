use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::auth::{
    AuthorizationHeaderProvider, ClientCredentialsTokenAcquisition, TokenAcquisitionSettings,
};
use crate::client::GraphServiceClient;
use crate::config::ConfigSection;
use crate::error::GraphClientError;
use crate::factory::ClientFactory;
use crate::http::{HttpClientFactory, PooledHttpClientFactory};
use crate::options::GraphClientOptions;

type Configurator =
    Box<dyn FnOnce(GraphClientOptions) -> Result<GraphClientOptions, GraphClientError> + Send>;

/// Collects the registrations needed to resolve a [`GraphServiceClient`].
#[derive(Default)]
pub struct GraphBetaServicesBuilder {
    factory: ClientFactory,
    configurators: Vec<Configurator>,
    auth_provider: Option<Arc<dyn AuthorizationHeaderProvider>>,
    http_factory: Option<Arc<dyn HttpClientFactory>>,
    token_acquisition: bool,
    token_settings: Option<TokenAcquisitionSettings>,
    graph_registered: bool,
}

impl GraphBetaServicesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_factory(mut self, factory: ClientFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_authorization_header_provider(
        mut self,
        provider: Arc<dyn AuthorizationHeaderProvider>,
    ) -> Self {
        self.auth_provider = Some(provider);
        self
    }

    pub fn with_http_client_factory(mut self, factory: Arc<dyn HttpClientFactory>) -> Self {
        self.http_factory = Some(factory);
        self
    }

    /// Settings for the token acquisition registered by [`Self::add_microsoft_graph_beta`].
    /// Without them the settings are read from the environment at build time.
    pub fn with_token_acquisition_settings(mut self, settings: TokenAcquisitionSettings) -> Self {
        self.token_settings = Some(settings);
        self
    }

    /// Register Graph beta together with client-credentials token acquisition and a
    /// pooled HTTP client factory. Existing registrations are kept.
    pub fn add_microsoft_graph_beta(mut self) -> Self {
        self.token_acquisition = true;
        if self.http_factory.is_none() {
            self.http_factory = Some(Arc::new(PooledHttpClientFactory::new()));
        }
        self.add_microsoft_graph_beta_with(|options| options)
    }

    /// Register Graph beta with options bound from a configuration section.
    pub fn add_microsoft_graph_beta_from_section(mut self, section: &ConfigSection) -> Self {
        let section = section.clone();
        self.configurators
            .push(Box::new(move |options| options.bind(&section)));
        self.graph_registered = true;
        self
    }

    /// Register Graph beta with options produced by `configure`.
    pub fn add_microsoft_graph_beta_with<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(GraphClientOptions) -> GraphClientOptions + Send + 'static,
    {
        self.configurators
            .push(Box::new(move |options| Ok(configure(options))));
        self.graph_registered = true;
        self
    }

    /// Materialize the options snapshot and check that every collaborator is present.
    pub fn build(self) -> Result<GraphBetaServices, GraphClientError> {
        if !self.graph_registered {
            return Err(GraphClientError::MissingDependency("Graph beta registration"));
        }

        let auth_provider: Arc<dyn AuthorizationHeaderProvider> = match self.auth_provider {
            Some(provider) => provider,
            None if self.token_acquisition => {
                let settings = match self.token_settings {
                    Some(settings) => settings,
                    None => TokenAcquisitionSettings::from_env()?,
                };
                Arc::new(ClientCredentialsTokenAcquisition::new(&settings)?)
            }
            None => {
                return Err(GraphClientError::MissingDependency(
                    "authorization header provider",
                ))
            }
        };
        let http_factory = self
            .http_factory
            .ok_or(GraphClientError::MissingDependency("HTTP client factory"))?;

        let mut options = GraphClientOptions::default();
        for configure in self.configurators {
            options = configure(options)?;
        }
        debug!(?options, "Graph beta options materialized");

        Ok(GraphBetaServices {
            inner: Arc::new(ServicesInner {
                factory: self.factory,
                options: Arc::new(options),
                auth_provider,
                http_factory,
            }),
        })
    }
}

struct ServicesInner {
    factory: ClientFactory,
    options: Arc<GraphClientOptions>,
    auth_provider: Arc<dyn AuthorizationHeaderProvider>,
    http_factory: Arc<dyn HttpClientFactory>,
}

/// Built registrations. Cheap to clone; every clone shares the same options snapshot.
#[derive(Clone)]
pub struct GraphBetaServices {
    inner: Arc<ServicesInner>,
}

impl GraphBetaServices {
    pub fn builder() -> GraphBetaServicesBuilder {
        GraphBetaServicesBuilder::new()
    }

    pub fn options(&self) -> &Arc<GraphClientOptions> {
        &self.inner.options
    }

    pub fn authorization_header_provider(&self) -> &Arc<dyn AuthorizationHeaderProvider> {
        &self.inner.auth_provider
    }

    pub fn http_client_factory(&self) -> &Arc<dyn HttpClientFactory> {
        &self.inner.http_factory
    }

    /// Start a resolution scope, e.g. one per inbound request.
    pub fn create_scope(&self) -> ResolutionScope {
        ResolutionScope {
            services: self.clone(),
            client: Mutex::new(None),
        }
    }
}

/// Lifetime boundary holding at most one client.
pub struct ResolutionScope {
    services: GraphBetaServices,
    client: Mutex<Option<Arc<GraphServiceClient>>>,
}

impl ResolutionScope {
    /// The scope's client, constructed on first use.
    ///
    /// Failures are not cached; every call after a failure retries construction.
    pub fn graph_client(&self) -> Result<Arc<GraphServiceClient>, GraphClientError> {
        let mut slot = self.client.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let inner = &self.services.inner;
        let client = Arc::new(inner.factory.build(
            inner.options.clone(),
            inner.auth_provider.clone(),
            inner.http_factory.as_ref(),
        )?);
        *slot = Some(client.clone());
        Ok(client)
    }
}
