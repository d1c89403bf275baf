//! etcd v3 storage backend.
//!
//! One [`EtcdStorage`] wraps one gRPC channel to the cluster. The underlying
//! client is cheap to clone, so each call clones it rather than serializing
//! callers behind a lock.

use std::ops::Bound;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use etcd_client::{Client, ConnectOptions, GetOptions, KvClient};

use super::config::EtcdStorageConfig;
use super::{Storage, StorageError, StorageIterator, StorageRead, StorageResult};
use crate::{BytesRange, Record};

pub struct EtcdStorage {
    kv: KvClient,
}

impl EtcdStorage {
    /// Dials the cluster at `endpoints`.
    pub async fn connect(endpoints: &[String], config: &EtcdStorageConfig) -> StorageResult<Self> {
        let options = ConnectOptions::new()
            .with_connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .with_timeout(Duration::from_millis(config.request_timeout_ms));
        let client = Client::connect(endpoints, Some(options)).await.map_err(|e| {
            StorageError::Storage(format!("Failed to connect to etcd {:?}: {}", endpoints, e))
        })?;
        tracing::info!(endpoints = ?endpoints, "Connected to etcd");
        Ok(Self {
            kv: client.kv_client(),
        })
    }

    async fn range(&self, key: Vec<u8>, options: GetOptions) -> StorageResult<Vec<Record>> {
        let response = self
            .kv
            .clone()
            .get(key, Some(options))
            .await
            .map_err(StorageError::from_storage)?;
        Ok(response
            .kvs()
            .iter()
            .map(|kv| {
                Record::new(
                    Bytes::copy_from_slice(kv.key()),
                    Bytes::copy_from_slice(kv.value()),
                )
            })
            .collect())
    }
}

#[async_trait]
impl StorageRead for EtcdStorage {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn get(&self, key: Bytes) -> StorageResult<Option<Record>> {
        let response = self
            .kv
            .clone()
            .get(key.to_vec(), None)
            .await
            .map_err(StorageError::from_storage)?;
        Ok(response
            .kvs()
            .first()
            .map(|kv| Record::new(key, Bytes::copy_from_slice(kv.value()))))
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn scan_iter(
        &self,
        range: BytesRange,
    ) -> StorageResult<Box<dyn StorageIterator + Send + 'static>> {
        let start = match range.start {
            Bound::Included(s) => s.to_vec(),
            Bound::Excluded(s) => {
                let mut s = s.to_vec();
                s.push(0);
                s
            }
            Bound::Unbounded => vec![0],
        };
        let options = match range.end {
            Bound::Included(e) => {
                let mut e = e.to_vec();
                e.push(0);
                GetOptions::new().with_range(e)
            }
            Bound::Excluded(e) => GetOptions::new().with_range(e.to_vec()),
            Bound::Unbounded => GetOptions::new().with_from_key(),
        };
        let records = self.range(start, options).await?;
        Ok(Box::new(EtcdIterator {
            records: records.into_iter(),
        }))
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn scan_prefix(&self, prefix: Bytes) -> StorageResult<Vec<Record>> {
        self.range(prefix.to_vec(), GetOptions::new().with_prefix()).await
    }
}

struct EtcdIterator {
    records: std::vec::IntoIter<Record>,
}

#[async_trait]
impl StorageIterator for EtcdIterator {
    async fn next(&mut self) -> StorageResult<Option<Record>> {
        Ok(self.records.next())
    }
}

#[async_trait]
impl Storage for EtcdStorage {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn put(&self, record: Record) -> StorageResult<()> {
        self.kv
            .clone()
            .put(record.key.to_vec(), record.value.to_vec(), None)
            .await
            .map_err(StorageError::from_storage)?;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn delete(&self, key: Bytes) -> StorageResult<()> {
        self.kv
            .clone()
            .delete(key.to_vec(), None)
            .await
            .map_err(StorageError::from_storage)?;
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        // The channel is torn down when the last client clone is dropped.
        tracing::debug!("Closing etcd storage");
        Ok(())
    }
}
