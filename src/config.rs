use std::env;

use ::config::{Config, ConfigError, Environment, File, FileFormat, Map};
use serde::de::DeserializeOwned;

use crate::error::GraphClientError;

/// Separator between nested section names, e.g. `DownstreamApis:GraphBeta`.
pub const SECTION_DELIMITER: char = ':';
/// Separator used in environment variable names, e.g. `GraphBeta__BaseUrl`.
pub const ENV_DELIMITER: &str = "__";

/// A named configuration section.
#[derive(Debug, Clone)]
pub struct ConfigSection {
    path: String,
    config: Config,
}

impl ConfigSection {
    /// Parse a JSON document and select the section at `path`.
    ///
    /// An empty path selects the whole document; a path that does not exist
    /// binds as an empty section.
    pub fn from_json_str(json: &str, path: &str) -> Result<Self, GraphClientError> {
        let config = Config::builder()
            .add_source(File::from_str(json, FileFormat::Json))
            .build()?;
        Ok(Self {
            path: path.to_string(),
            config,
        })
    }

    /// Build a section from the process environment, `<prefix>__<Key>`.
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    pub fn from_env(prefix: &str) -> Result<Self, GraphClientError> {
        let vars = env::vars_os().filter_map(|(name, value)| {
            Some((name.into_string().ok()?, value.into_string().ok()?))
        });
        Self::from_vars(prefix, vars)
    }

    /// Build a section from `(name, value)` pairs shaped like environment variables.
    ///
    /// `Scopes` is a comma separated list; other values are parsed as
    /// booleans or numbers where they look like one.
    pub fn from_vars<I>(prefix: &str, vars: I) -> Result<Self, GraphClientError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let source: Map<String, String> = vars.into_iter().collect();
        let config = Config::builder()
            .add_source(
                Environment::with_prefix(prefix)
                    .separator(ENV_DELIMITER)
                    .list_separator(",")
                    .with_list_parse_key("scopes")
                    .try_parsing(true)
                    .source(Some(source)),
            )
            .build()?;
        Ok(Self {
            path: String::new(),
            config,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Deserialize the section into `T`. A missing section binds as `T::default()`.
    pub fn bind<T: DeserializeOwned + Default>(&self) -> Result<T, GraphClientError> {
        let bound = if self.path.is_empty() {
            self.config.clone().try_deserialize::<T>()
        } else {
            let key = self.path.replace(SECTION_DELIMITER, ".");
            self.config.get::<T>(&key)
        };
        match bound {
            Ok(value) => Ok(value),
            Err(ConfigError::NotFound(_)) => Ok(T::default()),
            Err(err) => Err(err.into()),
        }
    }
}
