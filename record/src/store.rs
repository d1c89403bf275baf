//! Record operations over one store handle, with the optional cache in front.

use std::sync::Arc;

use common::Storage;

use crate::cache::RecordCache;
use crate::config::Encoding;
use crate::error::{Error, Result};
use crate::layout::{RecordLayout, create_layout};
use crate::locks::KeyLocks;
use crate::model::{FieldMap, FieldSet, select_fields};
use crate::path::validate_field_name;

/// Reads and writes multi-field records.
///
/// Every write, and every cache fill, runs under the record's key lock.
/// Writes invalidate the cached entry before touching the store, so a fill
/// can never install data older than an acknowledged write. Cached entries
/// always hold the full record; subset reads select from them.
///
/// Cloning is cheap and clones share the cache and the key locks.
#[derive(Clone)]
pub(crate) struct RecordStore {
    layout: Arc<dyn RecordLayout>,
    cache: Option<RecordCache>,
    locks: Arc<KeyLocks>,
}

impl RecordStore {
    pub(crate) fn new(
        storage: Arc<dyn Storage>,
        encoding: Encoding,
        cache: Option<RecordCache>,
        locks: Arc<KeyLocks>,
    ) -> Self {
        Self {
            layout: create_layout(encoding, storage),
            cache,
            locks,
        }
    }

    /// Reads the requested fields of `key`, or every field for `None`.
    ///
    /// Requested fields the record lacks are left out of the result.
    /// Returns `Ok(None)` when none of them exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a malformed key or field name,
    /// [`Error::Storage`] if any store call fails and [`Error::Encoding`] if a
    /// stored value cannot be decoded.
    #[tracing::instrument(level = "trace", skip_all, fields(key = %key))]
    pub async fn read(&self, key: &str, fields: Option<&FieldSet>) -> Result<Option<FieldMap>> {
        let Some(requested) = fields else {
            return self.layout.read(key, None).await;
        };
        for field in requested {
            validate_field_name(field)?;
        }
        match &self.cache {
            Some(cache) => self.read_through(cache, key, requested).await,
            None => self.layout.read(key, Some(requested)).await,
        }
    }

    async fn read_through(
        &self,
        cache: &RecordCache,
        key: &str,
        requested: &FieldSet,
    ) -> Result<Option<FieldMap>> {
        if let Some(cached) = cache.get(key).await {
            tracing::trace!(key, "Record cache hit");
            return Ok(non_empty(select_fields(&cached, requested)));
        }

        let _guard = self.locks.lock(key).await;
        // Another reader may have filled it while we waited.
        if let Some(cached) = cache.get(key).await {
            return Ok(non_empty(select_fields(&cached, requested)));
        }
        tracing::trace!(key, "Record cache miss");
        let Some(full) = self.layout.read(key, None).await? else {
            return Ok(None);
        };
        let full = Arc::new(full);
        cache.put(key, Arc::clone(&full)).await;
        Ok(non_empty(select_fields(&full, requested)))
    }

    /// Writes `values` as the fields of `key`.
    ///
    /// For the per-field encoding, fields already stored but not named in
    /// `values` survive. For the whole-record encoding they are replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty map or a malformed key or
    /// field name, in which case nothing is written, and [`Error::Storage`] if
    /// any store call fails.
    #[tracing::instrument(level = "trace", skip_all, fields(key = %key))]
    pub async fn insert(&self, key: &str, values: &FieldMap) -> Result<()> {
        check_non_empty(key, values)?;
        let _guard = self.locks.lock(key).await;
        self.invalidate(key).await;
        self.layout.insert(key, values).await?;
        tracing::debug!(key, fields = values.len(), "Inserted record");
        Ok(())
    }

    /// Overwrites the fields named in `values`; other stored fields survive.
    ///
    /// # Errors
    ///
    /// As for [`insert`](Self::insert), plus [`Error::Encoding`] if the stored
    /// whole record cannot be decoded for merging.
    #[tracing::instrument(level = "trace", skip_all, fields(key = %key))]
    pub async fn update(&self, key: &str, values: &FieldMap) -> Result<()> {
        check_non_empty(key, values)?;
        let _guard = self.locks.lock(key).await;
        self.invalidate(key).await;
        self.layout.update(key, values).await?;
        tracing::debug!(key, fields = values.len(), "Updated record");
        Ok(())
    }

    /// Removes every field of `key`. Deleting an absent record succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a malformed key and
    /// [`Error::Storage`] if any store call fails. Fields deleted before the
    /// failure stay deleted.
    #[tracing::instrument(level = "trace", skip_all, fields(key = %key))]
    pub async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.locks.lock(key).await;
        self.invalidate(key).await;
        self.layout.delete(key).await?;
        tracing::debug!(key, "Deleted record");
        Ok(())
    }

    async fn invalidate(&self, key: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate(key).await;
        }
    }
}

fn check_non_empty(key: &str, values: &FieldMap) -> Result<()> {
    if values.is_empty() {
        return Err(Error::InvalidInput(format!(
            "no fields given for record {:?}",
            key
        )));
    }
    Ok(())
}

fn non_empty(fields: FieldMap) -> Option<FieldMap> {
    (!fields.is_empty()).then_some(fields)
}
