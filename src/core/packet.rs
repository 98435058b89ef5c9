//! Wire packet layout and validation.
//!
//! ```text
//! offset  size  field
//! 0       8     sequence_id        (big-endian)
//! 8       4     payload_length L   (big-endian)
//! 12      4     header_checksum    = checksum(bytes 0..12)
//! 16      L     payload
//! 16+L    4     payload_checksum   = checksum(payload) ^ header_checksum
//! ```
//!
//! The header checksum is verified before the length field is trusted, so a
//! corrupted length can never be mistaken for a differently-sized frame.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::core::checksum::checksum;
use crate::error::{constants, ProtocolError, Result};

/// Bytes before the payload: sequence id, length and header checksum.
pub const HEADER_LEN: usize = 16;

/// Bytes after the payload: the payload checksum.
pub const TRAILER_LEN: usize = 4;

/// Fixed per-frame overhead.
pub const FRAME_OVERHEAD: usize = HEADER_LEN + TRAILER_LEN;

/// One request or reply as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub sequence_id: u64,
    pub payload: Bytes,
}

/// A header whose checksum has been verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub sequence_id: u64,
    pub payload_len: usize,
    pub checksum: u32,
}

impl FrameHeader {
    /// Parse and verify the first [`HEADER_LEN`] bytes of a frame.
    ///
    /// Fails with `FramingCorruption` if the transmitted header checksum does
    /// not match the one recomputed over the id and length.
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        let mut id = [0u8; 8];
        id.copy_from_slice(&bytes[0..8]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[8..12]);
        let mut sent = [0u8; 4];
        sent.copy_from_slice(&bytes[12..16]);

        let expected = checksum(&bytes[0..12]);
        if u32::from_be_bytes(sent) != expected {
            warn!("Incorrect checksum on packet header");
            return Err(ProtocolError::FramingCorruption(
                constants::ERR_HEADER_CHECKSUM,
            ));
        }

        Ok(Self {
            sequence_id: u64::from_be_bytes(id),
            payload_len: u32::from_be_bytes(len) as usize,
            checksum: expected,
        })
    }

    /// Total bytes of the frame this header introduces.
    pub fn frame_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload_len
    }
}

impl Packet {
    pub fn new(sequence_id: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence_id,
            payload: payload.into(),
        }
    }

    /// Size of this packet once framed.
    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Append the framed packet to `dst`.
    ///
    /// Fails with `PayloadTooLarge` if the payload length does not fit the
    /// 32-bit length field; nothing is written in that case.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        let len =
            u32::try_from(self.payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
                len: self.payload.len(),
                max: u32::MAX as usize,
            })?;

        dst.reserve(self.encoded_len());

        let mut header = [0u8; 12];
        header[0..8].copy_from_slice(&self.sequence_id.to_be_bytes());
        header[8..12].copy_from_slice(&len.to_be_bytes());
        let header_checksum = checksum(&header);

        dst.put_slice(&header);
        dst.put_u32(header_checksum);
        dst.put_slice(&self.payload);
        dst.put_u32(checksum(&self.payload) ^ header_checksum);
        Ok(())
    }

    /// Serialize into a freshly allocated frame.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf.to_vec())
    }

    /// Parse one complete frame, copying the payload out.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_frame(Bytes::copy_from_slice(data))
    }

    /// Parse one complete frame without copying the payload.
    ///
    /// `frame` must contain exactly one frame. Any disagreement between the
    /// declared length and the bytes present is fatal: the stream framing
    /// can no longer be trusted.
    pub fn from_frame(frame: Bytes) -> Result<Self> {
        let Some(head) = frame.first_chunk::<HEADER_LEN>() else {
            return Err(ProtocolError::LengthMismatch {
                declared: FRAME_OVERHEAD,
                actual: frame.len(),
            });
        };
        let header = FrameHeader::parse(head)?;

        if frame.len() != header.frame_len() {
            return Err(ProtocolError::LengthMismatch {
                declared: header.frame_len(),
                actual: frame.len(),
            });
        }

        let payload_end = HEADER_LEN + header.payload_len;
        let mut trailer = [0u8; TRAILER_LEN];
        trailer.copy_from_slice(&frame[payload_end..]);

        let payload = frame.slice(HEADER_LEN..payload_end);
        if u32::from_be_bytes(trailer) != checksum(&payload) ^ header.checksum {
            warn!(
                sequence_id = header.sequence_id,
                len = header.payload_len,
                "Incorrect checksum on packet data"
            );
            return Err(ProtocolError::FramingCorruption(
                constants::ERR_PAYLOAD_CHECKSUM,
            ));
        }

        Ok(Self {
            sequence_id: header.sequence_id,
            payload,
        })
    }
}
