//! # Service Protocols
//!
//! Typed clients for the two backend services that speak the wire protocol.
//!
//! Each operation builds an opcode plus argument payload, runs one round trip
//! on the [`Session`](crate::transport::Session) and interprets the reply.
//! Status codes an operation defines come back as that operation's own enum;
//! any other status is `UnexpectedStatus`.
//!
//! ## Components
//! - **Lbs**: block store (params, get, append, free)
//! - **Kvlds**: key-value store (set, cas, add, modify, delete, cad, get, range)

pub mod kvlds;
pub mod lbs;

pub use kvlds::{AddStatus, CadStatus, CasStatus, KvPair, KvParams, KvStore, ModifyStatus, RangePage};
pub use lbs::{AppendStatus, BlockParams, BlockStore};

use bytes::{BufMut, BytesMut};

use crate::core::reply::ReplyCursor;
use crate::error::{ProtocolError, Result};

/// Status code for success.
pub(crate) const STATUS_OK: u32 = 0;

/// Status code for the operation's defined failure (not found, mismatch, ...).
pub(crate) const STATUS_FAILED: u32 = 1;

/// Outcome of a lookup that may legitimately find nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::NotFound => None,
        }
    }
}

/// Start a request payload with its opcode.
pub(crate) fn request(opcode: u32, capacity: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(4 + capacity);
    buf.put_u32(opcode);
    buf
}

/// Read the leading status of a reply that defines only success.
pub(crate) fn expect_ok(reply: &mut ReplyCursor, op: &'static str) -> Result<()> {
    match reply.read_u32()? {
        STATUS_OK => Ok(()),
        status => Err(ProtocolError::UnexpectedStatus { op, status }),
    }
}

/// Read the leading status of a reply that defines success and failure.
///
/// Returns `true` for success.
pub(crate) fn read_status(reply: &mut ReplyCursor, op: &'static str) -> Result<bool> {
    match reply.read_u32()? {
        STATUS_OK => Ok(true),
        STATUS_FAILED => Ok(false),
        status => Err(ProtocolError::UnexpectedStatus { op, status }),
    }
}
