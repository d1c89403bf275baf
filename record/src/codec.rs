//! Value encoding for whole-record storage.
//!
//! ```text
//! | version (u8) | field_count (u32) | field* |
//! field: | name_len (u16) | name (utf-8) | value_len (u32) | value |
//! ```
//!
//! Integers are little-endian. Fields are written in name order so equal maps
//! encode to equal bytes. Decoders reject unknown versions rather than guess.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::model::FieldMap;

/// Record value format version.
pub const CODEC_VERSION: u8 = 0x01;

pub fn encode_field_map(fields: &FieldMap) -> Result<Bytes> {
    let mut names: Vec<&String> = fields.keys().collect();
    names.sort();

    let size = 5 + fields
        .iter()
        .map(|(name, value)| 6 + name.len() + value.len())
        .sum::<usize>();
    let mut buf = BytesMut::with_capacity(size);
    buf.put_u8(CODEC_VERSION);
    buf.put_u32_le(fields.len() as u32);
    for name in names {
        let value = &fields[name];
        let name_len = u16::try_from(name.len()).map_err(|_| {
            Error::InvalidInput(format!("field name too long: {} bytes", name.len()))
        })?;
        let value_len = u32::try_from(value.len()).map_err(|_| {
            Error::InvalidInput(format!("field {:?} value too long: {} bytes", name, value.len()))
        })?;
        buf.put_u16_le(name_len);
        buf.extend_from_slice(name.as_bytes());
        buf.put_u32_le(value_len);
        buf.extend_from_slice(value);
    }
    Ok(buf.freeze())
}

fn ensure_remaining(buf: &Bytes, needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(Error::Encoding(format!(
            "truncated record: need {} bytes for {}, have {}",
            needed,
            what,
            buf.remaining()
        )));
    }
    Ok(())
}

pub fn decode_field_map(value: &Bytes) -> Result<FieldMap> {
    let mut buf = value.clone();
    ensure_remaining(&buf, 5, "header")?;
    let version = buf.get_u8();
    if version != CODEC_VERSION {
        return Err(Error::Encoding(format!(
            "unsupported record version: expected 0x{:02x}, got 0x{:02x}",
            CODEC_VERSION, version
        )));
    }
    let count = buf.get_u32_le() as usize;

    let mut fields = FieldMap::with_capacity(count.min(1024));
    for _ in 0..count {
        ensure_remaining(&buf, 2, "field name length")?;
        let name_len = buf.get_u16_le() as usize;
        ensure_remaining(&buf, name_len, "field name")?;
        let name = String::from_utf8(buf.split_to(name_len).to_vec())
            .map_err(|e| Error::Encoding(format!("field name is not valid UTF-8: {}", e)))?;

        ensure_remaining(&buf, 4, "value length")?;
        let value_len = buf.get_u32_le() as usize;
        ensure_remaining(&buf, value_len, "value")?;
        let value = buf.split_to(value_len);

        if fields.insert(name.clone(), value).is_some() {
            return Err(Error::Encoding(format!("duplicate field {:?}", name)));
        }
    }

    if buf.has_remaining() {
        return Err(Error::Encoding(format!(
            "{} trailing bytes after {} fields",
            buf.remaining(),
            count
        )));
    }
    Ok(fields)
}
