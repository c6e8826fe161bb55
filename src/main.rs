use anyhow::anyhow;
use anyhow::Result;
use dotenvy::dotenv;
use graph_beta_client::{ConfigSection, GraphBetaServices, TokenAcquisitionSettings};
use std::env;
use tracing_subscriber::EnvFilter;

/// Client credentials only yield application tokens for the `.default` scope.
const APP_SCOPE: &str = "https://graph.microsoft.com/.default";

/// App-token defaults first, so `GraphBeta__*` variables can still override them.
fn services(
    section: &ConfigSection,
    settings: TokenAcquisitionSettings,
) -> Result<GraphBetaServices> {
    let services = GraphBetaServices::builder()
        .with_token_acquisition_settings(settings)
        .add_microsoft_graph_beta()
        .add_microsoft_graph_beta_with(|o| o.with_scopes([APP_SCOPE]).with_app_token(true))
        .add_microsoft_graph_beta_from_section(section)
        .build()?;
    Ok(services)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();
    let path = args
        .get(1)
        .cloned()
        .ok_or_else(|| anyhow!("Usage: <program> <GRAPH_PATH>"))?;

    // e.g. GraphBeta__BaseUrl, GraphBeta__Scopes
    let section = ConfigSection::from_env("GraphBeta")?;
    let services = services(&section, TokenAcquisitionSettings::from_env()?)?;

    let scope = services.create_scope();
    let client = scope.graph_client()?;
    tracing::info!(base_url = %client.base_url(), %path, "querying Graph beta");

    let body: serde_json::Value = client.get(&path).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TokenAcquisitionSettings {
        TokenAcquisitionSettings {
            client_id: "client".into(),
            client_secret: "secret".into(),
            tenant_id: "contoso".into(),
            authority_host: "https://login.microsoftonline.com".into(),
        }
    }

    #[test]
    fn defaults_to_application_tokens() {
        let section = ConfigSection::from_vars("GraphBeta", Vec::new()).unwrap();
        let services = services(&section, settings()).unwrap();

        assert!(services.options().request_app_token);
        assert_eq!(services.options().scopes, Some(vec![APP_SCOPE.to_string()]));
        assert!(services.create_scope().graph_client().is_ok());
    }

    #[test]
    fn environment_overrides_defaults() {
        let section = ConfigSection::from_vars(
            "GraphBeta",
            vec![("GraphBeta__Scopes".to_string(), "User.Read".to_string())],
        )
        .unwrap();
        let services = services(&section, settings()).unwrap();

        assert_eq!(services.options().scopes, Some(vec!["User.Read".to_string()]));
        assert!(services.options().request_app_token);
    }
}
