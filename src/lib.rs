//! Authenticated Microsoft Graph beta client construction.
//!
//! [`GraphBetaServices`] collects the registrations (options, authorization
//! header provider, named HTTP client factory) and hands out one
//! [`GraphServiceClient`] per [`ResolutionScope`]. [`ClientFactory`] holds the
//! construction step itself for callers that wire collaborators by hand.

pub mod adapter;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod http;
pub mod options;
pub mod registration;

pub use adapter::{GraphAuthenticationOptions, GraphAuthenticationProvider};
pub use auth::{
    AuthorizationHeaderProvider, AuthorizationHeaderProviderOptions,
    ClientCredentialsTokenAcquisition, TokenAcquisitionSettings,
};
pub use client::GraphServiceClient;
pub use config::ConfigSection;
pub use error::GraphClientError;
pub use factory::{ClientFactory, DEFAULT_GRAPH_BETA_URL};
pub use http::{
    HttpClientFactory, HttpClientSettings, PooledHttpClientFactory, GRAPH_BETA_HTTP_CLIENT,
};
pub use options::GraphClientOptions;
pub use registration::{GraphBetaServices, GraphBetaServicesBuilder, ResolutionScope};
