pub mod bytes;
pub mod storage;

pub use bytes::BytesRange;
pub use storage::config::{EtcdStorageConfig, StorageConfig};
pub use storage::{Record, Storage, StorageError, StorageIterator, StorageRead, StorageResult};
