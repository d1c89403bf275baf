//! Storage backend configuration.

use serde::{Deserialize, Serialize};

/// Which store the connection handle talks to.
///
/// Endpoints are not part of this type: they are supplied to the connection
/// manager at acquire time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Process-local ordered map. Endpoints are validated but not dialed.
    #[default]
    InMemory,
    /// An etcd v3 cluster. Requires the `etcd` feature.
    Etcd(EtcdStorageConfig),
}

/// Client settings for an etcd cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtcdStorageConfig {
    /// Deadline for establishing the connection, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Deadline applied by the client to every request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for EtcdStorageConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}
