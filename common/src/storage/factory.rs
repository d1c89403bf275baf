//! Storage factory for creating connection handles from configuration.

use std::sync::Arc;

use super::config::StorageConfig;
use super::in_memory::InMemoryStorage;
use super::{Storage, StorageResult};

/// Creates a connection handle for the configured backend.
///
/// # Arguments
///
/// * `config` - The storage configuration specifying the backend type and settings.
/// * `endpoints` - `host:port` strings of the cluster members to dial.
///
/// # Errors
///
/// Returns `StorageError::Storage` if the backend cannot be reached, or if it
/// was not compiled into this build.
pub async fn create_storage(
    config: &StorageConfig,
    endpoints: &[String],
) -> StorageResult<Arc<dyn Storage>> {
    match config {
        StorageConfig::InMemory => {
            tracing::debug!(endpoints = ?endpoints, "Creating in-memory storage");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        #[cfg(feature = "etcd")]
        StorageConfig::Etcd(etcd_config) => {
            let storage = super::etcd::EtcdStorage::connect(endpoints, etcd_config).await?;
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "etcd"))]
        StorageConfig::Etcd(_) => Err(super::StorageError::Storage(
            "etcd storage requested but the `etcd` feature is not enabled".to_string(),
        )),
    }
}
