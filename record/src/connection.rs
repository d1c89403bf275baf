//! Shared connection handle with reference-counted acquire/release.
//!
//! Every worker client acquires the connection on init and releases it on
//! cleanup. The first acquire dials the store; later ones reuse the same
//! handle. Releasing never tears the handle down: a handle stays open until
//! [`ConnectionManager::shutdown`] is called with no users left.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::storage::factory::create_storage;
use common::{Storage, StorageConfig, StorageResult};
use tokio::sync::Mutex;

use crate::config::Endpoints;
use crate::error::{Error, Result};

/// Creates connection handles. Injected so tests can observe and fake dialing.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoints: &Endpoints) -> StorageResult<Arc<dyn Storage>>;
}

/// Connects through the storage factory for a configured backend.
pub struct StorageConnector {
    config: StorageConfig,
}

impl StorageConnector {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for StorageConnector {
    async fn connect(&self, endpoints: &Endpoints) -> StorageResult<Arc<dyn Storage>> {
        create_storage(&self.config, endpoints.as_slice()).await
    }
}

/// Owns the single connection handle shared by all worker clients.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    handle: Mutex<Option<Arc<dyn Storage>>>,
    users: AtomicUsize,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            handle: Mutex::new(None),
            users: AtomicUsize::new(0),
        }
    }

    /// Registers a user and returns the shared handle, dialing the store if
    /// no handle exists yet.
    ///
    /// Concurrent first-time callers queue on the handle lock, so exactly one
    /// of them dials. Endpoints are validated before the lock is taken.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `endpoints` is empty or malformed,
    /// and [`Error::Storage`] if dialing fails. A failed acquire does not
    /// count as a user.
    pub async fn acquire(&self, endpoints: &Endpoints) -> Result<Arc<dyn Storage>> {
        endpoints.validate()?;

        let mut handle = self.handle.lock().await;
        let storage = match handle.as_ref() {
            Some(storage) => Arc::clone(storage),
            None => {
                let storage = self.connector.connect(endpoints).await?;
                tracing::info!(endpoints = ?endpoints.as_slice(), "Established shared store connection");
                *handle = Some(Arc::clone(&storage));
                storage
            }
        };
        // Counted under the handle lock so shutdown cannot close a handle
        // that was just handed out.
        let users = self.users.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(users, "Acquired store connection");
        Ok(storage)
    }

    /// Unregisters a user and returns how many remain.
    ///
    /// The handle is left open even when the count reaches zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvariantViolation`] if there is no user to release.
    pub fn release(&self) -> Result<usize> {
        let previous = self
            .users
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map_err(|_| {
                tracing::error!("Store connection released more times than acquired");
                Error::InvariantViolation(
                    "connection released more times than acquired".to_string(),
                )
            })?;
        let users = previous - 1;
        tracing::debug!(users, "Released store connection");
        Ok(users)
    }

    /// Number of users currently holding the connection.
    pub fn user_count(&self) -> usize {
        self.users.load(Ordering::SeqCst)
    }

    /// Whether a handle is currently open.
    pub async fn is_connected(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    /// Closes the shared handle. A later acquire dials again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvariantViolation`] while any user still holds the
    /// connection, and [`Error::Storage`] if closing fails.
    pub async fn shutdown(&self) -> Result<()> {
        let mut handle = self.handle.lock().await;
        let users = self.users.load(Ordering::SeqCst);
        if users > 0 {
            return Err(Error::InvariantViolation(format!(
                "cannot shut down connection with {} active users",
                users
            )));
        }
        if let Some(storage) = handle.take() {
            storage.close().await?;
            tracing::info!("Closed shared store connection");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::StorageError;
    use common::storage::in_memory::InMemoryStorage;

    use super::*;

    /// Counts dials and stalls each one so concurrent acquires overlap.
    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(&self, _endpoints: &Endpoints) -> StorageResult<Arc<dyn Storage>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(StorageError::Storage("connection refused".to_string()));
            }
            Ok(Arc::new(InMemoryStorage::new()))
        }
    }

    fn hosts() -> Endpoints {
        Endpoints::parse("127.0.0.1:2379")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_create_exactly_one_handle_under_concurrent_acquire() {
        // given
        let connector = Arc::new(CountingConnector::default());
        let manager = Arc::new(ConnectionManager::new(connector.clone()));

        // when
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.acquire(&hosts()).await.unwrap() })
            })
            .collect();
        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        // then
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert_eq!(manager.user_count(), 16);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    }

    #[tokio::test]
    async fn should_fail_acquire_without_endpoints() {
        // given
        let connector = Arc::new(CountingConnector::default());
        let manager = ConnectionManager::new(connector.clone());

        // when
        let result = manager.acquire(&Endpoints::default()).await;

        // then
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert_eq!(manager.user_count(), 0);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn should_not_count_user_when_dial_fails() {
        // given
        let connector = Arc::new(CountingConnector {
            fail: true,
            ..Default::default()
        });
        let manager = ConnectionManager::new(connector);

        // when
        let result = manager.acquire(&hosts()).await;

        // then
        assert!(matches!(result, Err(Error::Storage(_))));
        assert_eq!(manager.user_count(), 0);
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn should_reject_release_without_acquire() {
        // given
        let manager = ConnectionManager::new(Arc::new(CountingConnector::default()));

        // when
        let result = manager.release();

        // then
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
        assert_eq!(manager.user_count(), 0);
    }

    #[tokio::test]
    async fn should_reject_release_beyond_acquire_count() {
        // given
        let manager = ConnectionManager::new(Arc::new(CountingConnector::default()));
        manager.acquire(&hosts()).await.unwrap();
        manager.acquire(&hosts()).await.unwrap();

        // when
        let first = manager.release();
        let second = manager.release();
        let third = manager.release();

        // then
        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(0));
        assert!(matches!(third, Err(Error::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn should_keep_handle_after_last_release() {
        // given
        let connector = Arc::new(CountingConnector::default());
        let manager = ConnectionManager::new(connector.clone());
        let first = manager.acquire(&hosts()).await.unwrap();
        manager.release().unwrap();

        // when
        let second = manager.acquire(&hosts()).await.unwrap();

        // then
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_refuse_shutdown_while_in_use() {
        // given
        let manager = ConnectionManager::new(Arc::new(CountingConnector::default()));
        manager.acquire(&hosts()).await.unwrap();

        // when
        let result = manager.shutdown().await;

        // then
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
        assert!(manager.is_connected().await);
    }

    #[tokio::test]
    async fn should_redial_after_shutdown() {
        // given
        let connector = Arc::new(CountingConnector::default());
        let manager = ConnectionManager::new(connector.clone());
        manager.acquire(&hosts()).await.unwrap();
        manager.release().unwrap();

        // when
        manager.shutdown().await.unwrap();
        let connected_after_shutdown = manager.is_connected().await;
        manager.acquire(&hosts()).await.unwrap();

        // then
        assert!(!connected_after_shutdown);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }
}
