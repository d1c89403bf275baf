//! Benchmark-facing client surface.
//!
//! A [`RecordDb`] is built once per process and shared. Each worker takes its
//! own [`RecordClient`], calls [`init`](RecordClient::init) before issuing
//! operations and [`cleanup`](RecordClient::cleanup) when done. Operations
//! never return errors across this boundary: failures are logged and reported
//! as [`Status::Error`].

use std::sync::Arc;

use crate::cache::RecordCache;
use crate::config::Config;
use crate::connection::{ConnectionManager, Connector, StorageConnector};
use crate::error::{Error, Result};
use crate::locks::KeyLocks;
use crate::model::{FieldMap, FieldSet};
use crate::store::RecordStore;

/// Outcome of a client operation.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    Error,
    NotImplemented,
}

/// Process-wide state shared by every worker client.
///
/// Holds the connection manager, and the cache and key locks, so that a
/// write through one client invalidates what any other client would read.
#[derive(Clone)]
pub struct RecordDb {
    inner: Arc<DbInner>,
}

struct DbInner {
    config: Config,
    manager: ConnectionManager,
    cache: Option<RecordCache>,
    locks: Arc<KeyLocks>,
}

impl RecordDb {
    /// Creates a database that dials the backend named in `config.storage`.
    pub fn new(config: Config) -> Self {
        let connector = Arc::new(StorageConnector::new(config.storage.clone()));
        Self::with_connector(config, connector)
    }

    /// Creates a database that obtains its connection handle from `connector`.
    pub fn with_connector(config: Config, connector: Arc<dyn Connector>) -> Self {
        let cache = config.cache.as_ref().map(RecordCache::new);
        Self {
            inner: Arc::new(DbInner {
                config,
                manager: ConnectionManager::new(connector),
                cache,
                locks: Arc::new(KeyLocks::new()),
            }),
        }
    }

    /// Returns a new, uninitialized worker client.
    pub fn client(&self) -> RecordClient {
        RecordClient {
            db: self.clone(),
            store: None,
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.inner.manager
    }

    /// Closes the shared connection. Fails while any client is initialized.
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.manager.shutdown().await
    }
}

/// A single worker's handle for record operations.
///
/// Dropping an initialized client releases its connection.
pub struct RecordClient {
    db: RecordDb,
    store: Option<RecordStore>,
}

impl RecordClient {
    /// Acquires the shared connection. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when no valid endpoints are configured
    /// and [`Error::Storage`] when the connection cannot be established.
    pub async fn init(&mut self) -> Result<()> {
        if self.store.is_some() {
            return Ok(());
        }
        let inner = &self.db.inner;
        let storage = inner.manager.acquire(&inner.config.hosts).await?;
        self.store = Some(RecordStore::new(
            storage,
            inner.config.encoding,
            inner.cache.clone(),
            Arc::clone(&inner.locks),
        ));
        Ok(())
    }

    /// Releases the shared connection. The client may be initialized again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvariantViolation`] if the client is not initialized.
    pub fn cleanup(&mut self) -> Result<()> {
        if self.store.take().is_none() {
            return Err(Error::InvariantViolation(
                "cleanup called on a client that is not initialized".to_string(),
            ));
        }
        self.db.inner.manager.release()?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self, op: &'static str) -> Option<&RecordStore> {
        if self.store.is_none() {
            tracing::error!(op, "Client used before init");
        }
        self.store.as_ref()
    }

    /// Reads `key`, adding the found fields to `result`.
    ///
    /// `fields` of `None` reads every field. `table` does not partition the
    /// key space.
    pub async fn read(
        &self,
        table: &str,
        key: &str,
        fields: Option<&FieldSet>,
        result: &mut FieldMap,
    ) -> Status {
        let Some(store) = self.store("read") else {
            return Status::Error;
        };
        match store.read(key, fields).await {
            Ok(Some(found)) => {
                result.extend(found);
                Status::Ok
            }
            Ok(None) => Status::NotFound,
            Err(e) => {
                tracing::error!(table, key, error = %e, "Error reading record");
                Status::Error
            }
        }
    }

    /// Range scans are not supported by this binding.
    pub async fn scan(
        &self,
        table: &str,
        start_key: &str,
        _record_count: usize,
        _fields: Option<&FieldSet>,
        _result: &mut Vec<FieldMap>,
    ) -> Status {
        tracing::debug!(table, start_key, "Scan is not implemented");
        Status::NotImplemented
    }

    pub async fn insert(&self, table: &str, key: &str, values: &FieldMap) -> Status {
        let Some(store) = self.store("insert") else {
            return Status::Error;
        };
        match store.insert(key, values).await {
            Ok(()) => Status::Ok,
            Err(e) => {
                tracing::error!(table, key, error = %e, "Error inserting record");
                Status::Error
            }
        }
    }

    /// Overwrites the named fields of `key`, keeping the others.
    pub async fn update(&self, table: &str, key: &str, values: &FieldMap) -> Status {
        let Some(store) = self.store("update") else {
            return Status::Error;
        };
        match store.update(key, values).await {
            Ok(()) => Status::Ok,
            Err(e) => {
                tracing::error!(table, key, error = %e, "Error updating record");
                Status::Error
            }
        }
    }

    pub async fn delete(&self, table: &str, key: &str) -> Status {
        let Some(store) = self.store("delete") else {
            return Status::Error;
        };
        match store.delete(key).await {
            Ok(()) => Status::Ok,
            Err(e) => {
                tracing::error!(table, key, error = %e, "Error deleting record");
                Status::Error
            }
        }
    }
}

impl Drop for RecordClient {
    fn drop(&mut self) {
        if self.store.take().is_some() {
            tracing::warn!("Client dropped without cleanup, releasing connection");
            if let Err(e) = self.db.inner.manager.release() {
                tracing::error!(error = %e, "Failed to release connection on drop");
            }
        }
    }
}
