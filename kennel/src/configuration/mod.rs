//! Logic for loading configuration in to an object model

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]


use std::fmt;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use displaydoc::Display;
use http::HeaderValue;
use http::Method;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tower_http::cors;
use tower_http::cors::CorsLayer;

use crate::store::IdAllocation;

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not read configuration file {path}: {error}
    ReadFile {
        path: String,
        error: std::io::Error,
    },
    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
    /// could not deserialize configuration: {0}
    DeserializeConfigError(serde_yaml::Error),
}

/// The configuration of a kennel server.
///
/// Can be created through `serde::Deserialize` from various formats, or with the
/// builders of each section.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Configuration of the HTTP server.
    pub server: Server,

    /// Cross origin request configuration.
    pub cors: Cors,

    /// Configuration of the in-memory store.
    pub store: StoreConfig,

    /// Configuration of operation execution.
    pub execution: Execution,
}

#[buildstructor::buildstructor]
impl Configuration {
    #[builder(visibility = "pub")]
    fn new(
        server: Option<Server>,
        cors: Option<Cors>,
        store: Option<StoreConfig>,
        execution: Option<Execution>,
    ) -> Self {
        Self {
            server: server.unwrap_or_default(),
            cors: cors.unwrap_or_default(),
            store: store.unwrap_or_default(),
            execution: execution.unwrap_or_default(),
        }
    }
}

impl Configuration {
    /// Parses a YAML configuration. An empty document is the default configuration.
    pub fn from_yaml(raw_yaml: &str) -> Result<Self, ConfigurationError> {
        if raw_yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let configuration: Configuration =
            serde_yaml::from_str(raw_yaml).map_err(ConfigurationError::DeserializeConfigError)?;
        configuration.validate()
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let raw_yaml =
            std::fs::read_to_string(path).map_err(|error| ConfigurationError::ReadFile {
                path: path.display().to_string(),
                error,
            })?;
        Self::from_yaml(&raw_yaml)
    }

    fn validate(self) -> Result<Self, ConfigurationError> {
        if !self.server.path.starts_with('/') {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "invalid 'server.path' configuration",
                error: format!("'{}' must start with '/'", self.server.path),
            });
        }
        if self.server.path == self.server.health_check_path {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "invalid 'server.health_check_path' configuration",
                error: format!(
                    "'{}' is already used by the GraphQL endpoint",
                    self.server.health_check_path
                ),
            });
        }
        Ok(self)
    }
}

impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_yaml(s)
    }
}

/// Generate a JSON schema for the configuration.
pub fn generate_config_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(Configuration)
}

/// Configuration options pertaining to the HTTP server.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Server {
    /// The socket address and port to listen on.
    /// Defaults to 127.0.0.1:8080
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// The HTTP path on which GraphQL requests will be served.
    /// Defaults to "/graphql".
    #[serde(default = "default_graphql_path")]
    pub path: String,

    /// Serve a GraphiQL page on GET requests asking for HTML. Defaults to true.
    #[serde(default = "default_landing_page")]
    pub landing_page: bool,

    /// The HTTP path of the health check endpoint.
    /// Defaults to "/health".
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
}

#[buildstructor::buildstructor]
impl Server {
    #[builder(visibility = "pub")]
    fn new(
        listen: Option<SocketAddr>,
        path: Option<String>,
        landing_page: Option<bool>,
        health_check_path: Option<String>,
    ) -> Self {
        Self {
            listen: listen.unwrap_or_else(default_listen),
            path: path.unwrap_or_else(default_graphql_path),
            landing_page: landing_page.unwrap_or_else(default_landing_page),
            health_check_path: health_check_path.unwrap_or_else(default_health_check_path),
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Server::builder().build()
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}{}", self.listen, self.path)
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080)
}

fn default_graphql_path() -> String {
    String::from("/graphql")
}

fn default_landing_page() -> bool {
    true
}

fn default_health_check_path() -> String {
    String::from("/health")
}

/// Cross origin request configuration.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Cors {
    /// Set to true to allow any origin. Defaults to true.
    #[serde(default = "default_allow_any_origin")]
    pub allow_any_origin: bool,

    /// The origin(s) to allow requests from when `allow_any_origin` is false.
    pub origins: Vec<String>,
}

#[buildstructor::buildstructor]
impl Cors {
    #[builder(visibility = "pub")]
    fn new(allow_any_origin: Option<bool>, origins: Vec<String>) -> Self {
        Self {
            allow_any_origin: allow_any_origin.unwrap_or_else(default_allow_any_origin),
            origins,
        }
    }
}

impl Default for Cors {
    fn default() -> Self {
        Cors::builder().build()
    }
}

impl Cors {
    pub(crate) fn into_layer(self) -> CorsLayer {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(cors::Any);
        if self.allow_any_origin {
            return cors.allow_origin(cors::Any);
        }
        cors.allow_origin(cors::AllowOrigin::list(self.origins.iter().filter_map(
            |origin| {
                origin
                    .parse::<HeaderValue>()
                    .map_err(|_| tracing::error!("origin '{origin}' is not valid"))
                    .ok()
            },
        )))
    }
}

fn default_allow_any_origin() -> bool {
    true
}

/// Configuration of the in-memory store.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct StoreConfig {
    /// Load the sample owners and pets on startup. Defaults to true.
    #[serde(default = "default_seed")]
    pub seed: bool,

    /// How inserts pick the id of a new row. Defaults to `count`.
    pub id_allocation: IdAllocation,
}

#[buildstructor::buildstructor]
impl StoreConfig {
    #[builder(visibility = "pub")]
    fn new(seed: Option<bool>, id_allocation: Option<IdAllocation>) -> Self {
        Self {
            seed: seed.unwrap_or_else(default_seed),
            id_allocation: id_allocation.unwrap_or_default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::builder().build()
    }
}

fn default_seed() -> bool {
    true
}

/// Configuration of operation execution.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Execution {
    /// Reuse relationship lookups within one operation. Defaults to false.
    pub memoize_relationships: bool,
}
