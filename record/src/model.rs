//! Data types for record operations.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;

/// The fields of one record: field name to opaque value.
pub type FieldMap = HashMap<String, Bytes>;

/// A set of field names to read. `None` in place of a set means every field.
pub type FieldSet = HashSet<String>;

/// Copies the requested fields out of `map`, skipping those it lacks.
pub(crate) fn select_fields(map: &FieldMap, fields: &FieldSet) -> FieldMap {
    fields
        .iter()
        .filter_map(|name| map.get(name).map(|value| (name.clone(), value.clone())))
        .collect()
}
