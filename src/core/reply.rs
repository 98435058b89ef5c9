//! Cursor over a reply payload.
//!
//! Every reply is a fixed sequence of fields, so the cursor only moves
//! forward and is never rewound. Each read is bounds-checked against what is
//! left; running off the end is a `TruncatedPayload` error that consumes
//! nothing of the field being read.

use bytes::Bytes;

use crate::error::{constants, ProtocolError, Result};

/// Byte order of a fixed-width field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

/// Integers the cursor can read as fixed-width fields.
pub trait FixedInt: Sized + private::Sealed {
    const WIDTH: usize;

    fn from_bytes(bytes: &[u8], order: ByteOrder) -> Self;
}

mod private {
    pub trait Sealed {}
}

macro_rules! fixed_int {
    ($($t:ty),*) => {$(
        impl private::Sealed for $t {}

        impl FixedInt for $t {
            const WIDTH: usize = std::mem::size_of::<$t>();

            fn from_bytes(bytes: &[u8], order: ByteOrder) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                match order {
                    ByteOrder::BigEndian => <$t>::from_be_bytes(raw),
                    ByteOrder::LittleEndian => <$t>::from_le_bytes(raw),
                }
            }
        }
    )*};
}

fixed_int!(u8, u16, u32, u64, i8, i16, i32, i64);

#[derive(Debug, Clone)]
pub struct ReplyCursor {
    buf: Bytes,
    offset: usize,
}

impl ReplyCursor {
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self {
            buf: buf.into(),
            offset: 0,
        }
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if len > self.remaining() {
            return Err(ProtocolError::TruncatedPayload {
                offset: self.offset,
                needed: len,
                available: self.remaining(),
            });
        }
        let out = self.buf.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(out)
    }

    /// Read a fixed-width integer in the given byte order.
    pub fn read_fixed<T: FixedInt>(&mut self, order: ByteOrder) -> Result<T> {
        let raw = self.read_bytes(T::WIDTH)?;
        Ok(T::from_bytes(&raw, order))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_fixed(ByteOrder::BigEndian)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_fixed(ByteOrder::BigEndian)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_fixed(ByteOrder::BigEndian)
    }

    /// Read a length-prefixed field; a zero length yields `None`.
    ///
    /// If the body is short, the length prefix stays consumed and the offset
    /// points at the missing body.
    pub fn read_length_prefixed(&mut self) -> Result<Option<Bytes>> {
        let len = self.read_u8()? as usize;
        if len == 0 {
            return Ok(None);
        }
        self.read_bytes(len).map(Some)
    }

    /// Require that the whole reply has been consumed.
    pub fn finish(&self, op: &'static str) -> Result<()> {
        if self.is_exhausted() {
            Ok(())
        } else {
            Err(ProtocolError::MalformedReply {
                op,
                reason: constants::ERR_TRAILING_BYTES,
            })
        }
    }
}
