//! Length-prefixed byte fields.
//!
//! A field is `[1-byte length L][L bytes]`. A zero length means "no value":
//! `None` and an empty slice encode identically, and a zero prefix decodes to
//! `None`, never to an empty buffer.

use bytes::{BufMut, BytesMut};

use crate::error::{ProtocolError, Result};

/// Longest value a length prefix can describe.
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

/// Check that `value` fits in a length-prefixed field.
pub fn check_field(value: Option<&[u8]>) -> Result<()> {
    match value {
        Some(v) if v.len() > MAX_FIELD_LEN => Err(ProtocolError::FieldTooLarge(v.len())),
        _ => Ok(()),
    }
}

/// Bytes `value` occupies once encoded.
pub fn encoded_len(value: Option<&[u8]>) -> usize {
    1 + value.map_or(0, <[u8]>::len)
}

/// Append `value` as a length-prefixed field.
///
/// Nothing is written if the value is too long.
pub fn put_length_prefixed(dst: &mut BytesMut, value: Option<&[u8]>) -> Result<()> {
    check_field(value)?;
    let data = value.unwrap_or_default();
    dst.reserve(1 + data.len());
    dst.put_u8(data.len() as u8);
    dst.put_slice(data);
    Ok(())
}
