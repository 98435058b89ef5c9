//! Tokio codec framing [`Packet`]s over a byte stream.
//!
//! Partial reads are left in the read buffer until a whole frame is present.
//! The header checksum is checked as soon as the 16-byte header has arrived,
//! before the length field is used to size the wait for the rest.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::packet::{FrameHeader, Packet, HEADER_LEN};
use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy)]
pub struct WireCodec {
    max_payload_size: usize,
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new(MAX_PAYLOAD_SIZE)
    }
}

impl WireCodec {
    /// Codec rejecting payloads larger than `max_payload_size` bytes.
    pub fn new(max_payload_size: usize) -> Self {
        Self {
            max_payload_size: max_payload_size.min(u32::MAX as usize),
        }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

impl Decoder for WireCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        let Some(head) = src.first_chunk::<HEADER_LEN>() else {
            src.reserve(HEADER_LEN - src.len());
            return Ok(None);
        };
        let header = FrameHeader::parse(head)?;

        if header.payload_len > self.max_payload_size {
            return Err(ProtocolError::OversizedPacket(header.payload_len));
        }

        let frame_len = header.frame_len();
        if src.len() < frame_len {
            trace!(
                have = src.len(),
                need = frame_len,
                "Waiting for rest of frame"
            );
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len).freeze();
        Packet::from_frame(frame).map(Some)
    }
}

impl Encoder<Packet> for WireCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        if packet.payload.len() > self.max_payload_size {
            return Err(ProtocolError::PayloadTooLarge {
                len: packet.payload.len(),
                max: self.max_payload_size,
            });
        }
        packet.encode_into(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::constants;

    #[test]
    fn test_byte_at_a_time() {
        let packet = Packet::new(3, b"split across many reads".to_vec());
        let bytes = packet.to_bytes().unwrap();

        let mut codec = WireCodec::default();
        let mut buf = BytesMut::new();
        for (i, b) in bytes.iter().enumerate() {
            buf.extend_from_slice(&[*b]);
            let out = codec.decode(&mut buf).unwrap();
            if i + 1 < bytes.len() {
                assert!(out.is_none(), "frame produced early at byte {i}");
            } else {
                assert_eq!(out, Some(packet.clone()));
            }
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_corrupt_header_fails_before_payload_arrives() {
        let mut bytes = Packet::new(3, vec![0u8; 64]).to_bytes().unwrap();
        bytes[9] ^= 0x01;

        let mut codec = WireCodec::default();
        let mut buf = BytesMut::from(&bytes[..HEADER_LEN]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::FramingCorruption(constants::ERR_HEADER_CHECKSUM))
        ));
    }

    #[test]
    fn test_oversized_rejected_on_header() {
        let bytes = Packet::new(0, vec![0u8; 2048]).to_bytes().unwrap();
        let mut codec = WireCodec::new(1024);
        let mut buf = BytesMut::from(&bytes[..HEADER_LEN]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::OversizedPacket(2048))
        ));
    }

    #[test]
    fn test_encode_rejects_oversized() {
        let mut codec = WireCodec::new(16);
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(Packet::new(0, vec![0u8; 17]), &mut buf),
            Err(ProtocolError::PayloadTooLarge { len: 17, max: 16 })
        ));
        assert!(buf.is_empty());
    }
}
