//! # Core Protocol Components
//!
//! Low-level packet handling, codecs, and field encoding.
//!
//! This module is the foundation of the wire protocol: the checksum, packet
//! framing and validation, the stream codec, and the helpers used to build
//! request payloads and pick reply payloads apart.
//!
//! ## Components
//! - **Checksum**: Castagnoli CRC variant used for both frame checksums
//! - **Packet**: Binary frame with header and payload checksums
//! - **Codec**: Tokio codec for framing over byte streams
//! - **Field**: Length-prefixed field encoding
//! - **Reply**: Forward-only cursor over a reply payload
//!
//! ## Wire Format
//! ```text
//! [SequenceId(8)] [Length(4)] [HeaderCrc(4)] [Payload(N)] [PayloadCrc(4)]
//! ```
//!
//! ## Integrity
//! - The header checksum guards the length before it is trusted
//! - The payload checksum is chained to the header checksum
//! - Maximum payload size is enforced by the codec

pub mod checksum;
pub mod codec;
pub mod field;
pub mod packet;
pub mod reply;
