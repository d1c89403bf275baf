//! Key path derivation for records and fields.
//!
//! ```text
//! whole record:  / record_key
//! one field:     / record_key / field_name
//! field prefix:  / record_key /
//! ```
//!
//! The delimiter is reserved: record keys and field names containing it, or
//! empty ones, are rejected. That keeps the mapping injective and makes the
//! field prefix of `user1` disjoint from every path of `user10`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Path segment delimiter.
pub const DELIMITER: u8 = b'/';

fn validate_segment(kind: &str, segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", kind)));
    }
    if segment.as_bytes().contains(&DELIMITER) {
        return Err(Error::InvalidInput(format!(
            "{} {:?} contains reserved delimiter '{}'",
            kind, segment, DELIMITER as char
        )));
    }
    Ok(())
}

/// Checks a record key is non-empty and free of the delimiter.
pub fn validate_record_key(key: &str) -> Result<()> {
    validate_segment("record key", key)
}

/// Checks a field name is non-empty and free of the delimiter.
pub fn validate_field_name(field: &str) -> Result<()> {
    validate_segment("field name", field)
}

/// Path holding a whole encoded record.
pub fn derive_record_path(key: &str) -> Result<Bytes> {
    validate_record_key(key)?;
    let mut buf = BytesMut::with_capacity(1 + key.len());
    buf.put_u8(DELIMITER);
    buf.extend_from_slice(key.as_bytes());
    Ok(buf.freeze())
}

/// Prefix shared by every field path of `key`, and by nothing else.
pub fn derive_record_prefix(key: &str) -> Result<Bytes> {
    validate_record_key(key)?;
    let mut buf = BytesMut::with_capacity(2 + key.len());
    buf.put_u8(DELIMITER);
    buf.extend_from_slice(key.as_bytes());
    buf.put_u8(DELIMITER);
    Ok(buf.freeze())
}

/// Path holding a single field of a record.
pub fn derive_field_path(key: &str, field: &str) -> Result<Bytes> {
    validate_field_name(field)?;
    let prefix = derive_record_prefix(key)?;
    let mut buf = BytesMut::with_capacity(prefix.len() + field.len());
    buf.extend_from_slice(&prefix);
    buf.extend_from_slice(field.as_bytes());
    Ok(buf.freeze())
}

/// Recovers the field name from a path found under `prefix`.
pub fn field_name_from_path(prefix: &[u8], path: &[u8]) -> Result<String> {
    let suffix = path.strip_prefix(prefix).ok_or_else(|| {
        Error::Encoding(format!(
            "path {:?} is not under prefix {:?}",
            String::from_utf8_lossy(path),
            String::from_utf8_lossy(prefix)
        ))
    })?;
    let field = std::str::from_utf8(suffix)
        .map_err(|e| Error::Encoding(format!("field name is not valid UTF-8: {}", e)))?;
    validate_field_name(field).map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(field.to_string())
}
