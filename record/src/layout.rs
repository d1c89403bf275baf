//! Record layouts: how one record maps onto store keys.
//!
//! Both layouts give `update` merge semantics: fields named in the update
//! overwrite, fields not named survive. Per-field gets this for free from
//! independent keys; whole-record reads, merges and writes back, relying on
//! the caller holding the record's key lock.
//!
//! A failed primitive fails the whole operation. Primitives that already
//! succeeded are not rolled back.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use common::{Record, Storage};
use futures::future::try_join_all;

use crate::codec::{decode_field_map, encode_field_map};
use crate::config::Encoding;
use crate::error::{Error, Result};
use crate::model::{FieldMap, FieldSet, select_fields};
use crate::path::{
    derive_field_path, derive_record_path, derive_record_prefix, field_name_from_path,
    validate_field_name,
};

#[async_trait]
pub(crate) trait RecordLayout: Send + Sync {
    /// Reads the requested fields of `key`, or all of them for `None`.
    ///
    /// Returns `None` when the record has none of the requested fields.
    async fn read(&self, key: &str, fields: Option<&FieldSet>) -> Result<Option<FieldMap>>;

    /// Writes `values` as the fields of `key`.
    async fn insert(&self, key: &str, values: &FieldMap) -> Result<()>;

    /// Overlays `values` on the stored fields of `key`.
    async fn update(&self, key: &str, values: &FieldMap) -> Result<()>;

    /// Removes every key belonging to `key`.
    async fn delete(&self, key: &str) -> Result<()>;
}

pub(crate) fn create_layout(
    encoding: Encoding,
    storage: Arc<dyn Storage>,
) -> Arc<dyn RecordLayout> {
    match encoding {
        Encoding::PerField => Arc::new(PerFieldLayout::new(storage)),
        Encoding::WholeRecord => Arc::new(WholeRecordLayout::new(storage)),
    }
}

/// One store key per field at `/<key>/<field>`.
pub(crate) struct PerFieldLayout {
    storage: Arc<dyn Storage>,
}

impl PerFieldLayout {
    pub(crate) fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    async fn read_all(&self, key: &str) -> Result<Option<FieldMap>> {
        let prefix = derive_record_prefix(key)?;
        let records = self.storage.scan_prefix(prefix.clone()).await?;
        if records.is_empty() {
            tracing::debug!(key, "No fields stored for record");
            return Ok(None);
        }
        let mut fields = FieldMap::with_capacity(records.len());
        for record in records {
            fields.insert(field_name_from_path(&prefix, &record.key)?, record.value);
        }
        Ok(Some(fields))
    }

    async fn read_some(&self, key: &str, requested: &FieldSet) -> Result<Option<FieldMap>> {
        let paths = requested
            .iter()
            .map(|field| Ok((field, derive_field_path(key, field)?)))
            .collect::<Result<Vec<(&String, Bytes)>>>()?;

        let found = try_join_all(paths.into_iter().map(|(field, path)| async move {
            let record = self.storage.get(path).await?;
            Ok::<_, Error>(record.map(|r| (field.clone(), r.value)))
        }))
        .await?;

        let fields: FieldMap = found.into_iter().flatten().collect();
        Ok((!fields.is_empty()).then_some(fields))
    }

    async fn put_all(&self, key: &str, values: &FieldMap) -> Result<()> {
        // Derive every path first so a bad field name writes nothing.
        let records = values
            .iter()
            .map(|(field, value)| Ok(Record::new(derive_field_path(key, field)?, value.clone())))
            .collect::<Result<Vec<_>>>()?;

        try_join_all(records.into_iter().map(|record| self.storage.put(record))).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordLayout for PerFieldLayout {
    async fn read(&self, key: &str, fields: Option<&FieldSet>) -> Result<Option<FieldMap>> {
        match fields {
            None => self.read_all(key).await,
            Some(requested) => self.read_some(key, requested).await,
        }
    }

    async fn insert(&self, key: &str, values: &FieldMap) -> Result<()> {
        self.put_all(key, values).await
    }

    async fn update(&self, key: &str, values: &FieldMap) -> Result<()> {
        self.put_all(key, values).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let prefix = derive_record_prefix(key)?;
        let records = self.storage.scan_prefix(prefix).await?;
        let count = records.len();
        try_join_all(records.into_iter().map(|record| self.storage.delete(record.key))).await?;
        tracing::debug!(key, count, "Deleted record fields");
        Ok(())
    }
}

/// One store key per record at `/<key>`, holding the encoded field map.
pub(crate) struct WholeRecordLayout {
    storage: Arc<dyn Storage>,
}

impl WholeRecordLayout {
    pub(crate) fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    async fn load(&self, path: Bytes) -> Result<Option<FieldMap>> {
        match self.storage.get(path).await? {
            Some(record) => Ok(Some(decode_field_map(&record.value)?)),
            None => Ok(None),
        }
    }

    async fn store(&self, path: Bytes, values: &FieldMap) -> Result<()> {
        for field in values.keys() {
            validate_field_name(field)?;
        }
        let value = encode_field_map(values)?;
        self.storage.put(Record::new(path, value)).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordLayout for WholeRecordLayout {
    async fn read(&self, key: &str, fields: Option<&FieldSet>) -> Result<Option<FieldMap>> {
        let Some(stored) = self.load(derive_record_path(key)?).await? else {
            return Ok(None);
        };
        let fields = match fields {
            None => stored,
            Some(requested) => select_fields(&stored, requested),
        };
        Ok((!fields.is_empty()).then_some(fields))
    }

    async fn insert(&self, key: &str, values: &FieldMap) -> Result<()> {
        self.store(derive_record_path(key)?, values).await
    }

    async fn update(&self, key: &str, values: &FieldMap) -> Result<()> {
        let path = derive_record_path(key)?;
        let mut merged = self.load(path.clone()).await?.unwrap_or_default();
        merged.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.store(path, &merged).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.storage.delete(derive_record_path(key)?).await?;
        Ok(())
    }
}
