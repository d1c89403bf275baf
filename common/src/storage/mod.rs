pub mod config;
#[cfg(feature = "etcd")]
pub mod etcd;
pub mod factory;
pub mod in_memory;

use async_trait::async_trait;
use bytes::Bytes;

use crate::BytesRange;

/// A single key-value pair as held by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub key: Bytes,
    pub value: Bytes,
}

impl Record {
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }
}

/// Error type for storage operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Transport or protocol failure reported by the store client
    Storage(String),
    /// Internal errors
    Internal(String),
}

impl std::error::Error for StorageError {}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StorageError::Storage(msg) => write!(f, "Storage error: {}", msg),
            StorageError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StorageError {
    /// Converts any displayable client error to StorageError::Storage.
    pub fn from_storage(e: impl std::fmt::Display) -> Self {
        StorageError::Storage(e.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Iterator over storage records.
#[async_trait]
pub trait StorageIterator {
    async fn next(&mut self) -> StorageResult<Option<Record>>;
}

/// Read primitives of the store.
///
/// Each call is individually consistent: a read observes every write to the
/// same key acknowledged before it started. Nothing is promised across keys.
#[async_trait]
pub trait StorageRead: Send + Sync {
    async fn get(&self, key: Bytes) -> StorageResult<Option<Record>>;

    /// Returns an iterator over records in the given range, in key order.
    ///
    /// The returned iterator is owned and does not borrow from the storage,
    /// allowing it to be held across await points.
    async fn scan_iter(
        &self,
        range: BytesRange,
    ) -> StorageResult<Box<dyn StorageIterator + Send + 'static>>;

    /// Collects all records in the range into a Vec.
    #[tracing::instrument(level = "trace", skip_all)]
    async fn scan(&self, range: BytesRange) -> StorageResult<Vec<Record>> {
        let mut iter = self.scan_iter(range).await?;
        let mut records = Vec::new();
        while let Some(record) = iter.next().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// Collects every record whose key starts with `prefix`, in key order.
    ///
    /// Backends with a native prefix query (etcd's `WithPrefix`) override this.
    async fn scan_prefix(&self, prefix: Bytes) -> StorageResult<Vec<Record>> {
        self.scan(BytesRange::prefix(prefix)).await
    }
}

/// Read-write access to the store through one connection handle.
///
/// There are no batch or transactional writes: every `put` and `delete`
/// touches exactly one key.
#[async_trait]
pub trait Storage: StorageRead {
    /// Writes `record`, replacing any previous value at its key.
    async fn put(&self, record: Record) -> StorageResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn delete(&self, key: Bytes) -> StorageResult<()>;

    /// Closes the connection, releasing any resources.
    ///
    /// No further calls may be issued on this handle afterwards.
    async fn close(&self) -> StorageResult<()>;
}
