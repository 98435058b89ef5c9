//! # Error Types
//!
//! Error handling for the kivaloo wire protocol.
//!
//! This module defines every error variant that can surface from the wire
//! layer, from transport failures up to replies the service encoders cannot
//! make sense of.
//!
//! ## Error Categories
//! - **Transport**: connect/read/write failures and an unexpected EOF
//! - **Framing**: checksum mismatches, inconsistent or oversized lengths
//! - **Sequencing**: a reply whose sequence id does not answer the request
//! - **Decoding**: a reply shorter than the fields it must carry
//! - **Input validation**: oversized keys, values or request payloads,
//!   misaligned block data
//!
//! Framing, sequencing, decoding and transport errors leave the session in an
//! untrustworthy state; see [`ProtocolError::is_fatal`]. Status codes carried
//! inside a well-formed reply are never errors at this layer, with the
//! exception of codes an operation does not define.
//!
//! ## Example Usage
//! ```rust
//! use kivaloo_wire::error::{ProtocolError, Result};
//!
//! fn check_block(len: usize, block_size: usize) -> Result<()> {
//!     if len % block_size != 0 {
//!         return Err(ProtocolError::InvalidBlockSize { len, block_size });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_block(1024, 512).is_ok());
//! assert!(!check_block(100, 512).unwrap_err().is_fatal());
//! ```

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Checksum failures
    pub const ERR_HEADER_CHECKSUM: &str = "header checksum mismatch";
    pub const ERR_PAYLOAD_CHECKSUM: &str = "payload checksum mismatch";

    /// Reply-shape failures
    pub const ERR_TRAILING_BYTES: &str = "reply has trailing bytes";
    pub const ERR_TOO_MANY_PAIRS: &str = "too many key-value pairs for the size budget";
    pub const ERR_RANGE_STALLED: &str = "range resumed at its own start key";
}

/// ProtocolError is the primary error type for all wire operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Framing corruption: {0}")]
    FramingCorruption(&'static str),

    #[error("Packet length mismatch: header declares {declared} bytes, frame carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Request payload of {len} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Truncated payload: need {needed} bytes at offset {offset}, {available} available")]
    TruncatedPayload {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Sequence mismatch: expected reply {expected}, got {got}")]
    SequenceMismatch { expected: u64, got: u64 },

    #[error("Session closed")]
    SessionClosed,

    #[error("Timed out waiting for reply")]
    Timeout,

    #[error("Field too large: {0} bytes (maximum 255)")]
    FieldTooLarge(usize),

    #[error("Invalid block data: {len} bytes is not a multiple of the {block_size}-byte block size")]
    InvalidBlockSize { len: usize, block_size: usize },

    #[error("Unexpected status {status} in {op} reply")]
    UnexpectedStatus { op: &'static str, status: u32 },

    #[error("Malformed {op} reply: {reason}")]
    MalformedReply {
        op: &'static str,
        reason: &'static str,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Whether the session that produced this error must be discarded.
    ///
    /// Input validation errors are raised before anything reaches the
    /// transport, so the session stays usable after them.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProtocolError::FieldTooLarge(_)
                | ProtocolError::PayloadTooLarge { .. }
                | ProtocolError::InvalidBlockSize { .. }
                | ProtocolError::ConfigError(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
