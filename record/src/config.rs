//! Configuration for the record adapter.

use std::path::Path;

use common::StorageConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration shared by every worker client of one [`RecordDb`](crate::RecordDb).
///
/// # Example
///
/// ```toml
/// hosts = "10.0.0.1:2379,10.0.0.2:2379"
/// encoding = "whole_record"
///
/// [storage]
/// type = "Etcd"
///
/// [cache]
/// max_capacity = 100000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Cluster endpoints. Missing or empty fails at connection time.
    #[serde(default)]
    pub hosts: Endpoints,

    /// Store backend the connection handle is created for.
    #[serde(default)]
    pub storage: StorageConfig,

    /// How records are laid out in the key space.
    #[serde(default)]
    pub encoding: Encoding,

    /// Read-through cache. Disabled when absent.
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

impl Config {
    /// Parses a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }
}

/// Record layout in the key space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// One key per field at `/<key>/<field>`.
    #[default]
    PerField,
    /// One key per record at `/<key>` holding the encoded field map.
    WholeRecord,
}

/// Read-through cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached records. Unbounded when absent.
    #[serde(default)]
    pub max_capacity: Option<u64>,
}

/// The `host:port` endpoints of the store cluster.
///
/// Deserializes from either a comma-separated string or a list of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EndpointsRepr", into = "Vec<String>")]
pub struct Endpoints(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum EndpointsRepr {
    Joined(String),
    List(Vec<String>),
}

impl From<EndpointsRepr> for Endpoints {
    fn from(repr: EndpointsRepr) -> Self {
        match repr {
            EndpointsRepr::Joined(s) => Endpoints::parse(&s),
            EndpointsRepr::List(list) => Endpoints::from(list),
        }
    }
}

impl From<Endpoints> for Vec<String> {
    fn from(endpoints: Endpoints) -> Self {
        endpoints.0
    }
}

impl From<Vec<String>> for Endpoints {
    fn from(list: Vec<String>) -> Self {
        Endpoints(
            list.into_iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        )
    }
}

impl Endpoints {
    /// Splits a comma-separated endpoint list, ignoring blank entries.
    pub fn parse(joined: &str) -> Self {
        Endpoints::from(joined.split(',').map(str::to_string).collect::<Vec<_>>())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Checks there is at least one endpoint and each is `host:port`,
    /// optionally prefixed with `http://` or `https://`.
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(Error::Configuration(
                "no endpoints configured: set `hosts` to a comma-separated list of host:port"
                    .to_string(),
            ));
        }
        for endpoint in &self.0 {
            let authority = endpoint
                .strip_prefix("http://")
                .or_else(|| endpoint.strip_prefix("https://"))
                .unwrap_or(endpoint);
            let valid = match authority.rsplit_once(':') {
                Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
                None => false,
            };
            if !valid {
                return Err(Error::Configuration(format!(
                    "invalid endpoint {:?}: expected host:port",
                    endpoint
                )));
            }
        }
        Ok(())
    }
}
