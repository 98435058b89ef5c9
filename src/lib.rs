//! # kivaloo-wire
//!
//! Client side of the kivaloo wire protocol: checksummed, sequence-numbered
//! request/reply frames exchanged over a local stream socket with the
//! block-store (LBS) and key-value (KVLDS) services.
//!
//! ## Layers
//! - [`core`]: checksum, packet framing, stream codec, field and reply decoding
//! - [`transport`]: the [`Session`] that numbers requests and matches replies
//! - [`service`]: typed [`BlockStore`] and [`KvStore`] clients
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging, counters
//!
//! ## Example
//! ```no_run
//! use kivaloo_wire::{KvStore, Lookup};
//!
//! # async fn run() -> kivaloo_wire::Result<()> {
//! let kv = KvStore::open("/tmp/kivaloo-test/kivaloo-kvlds-sock").await?;
//! kv.set(b"hello", b"world").await?;
//! if let Lookup::Found(value) = kv.get(b"hello").await? {
//!     assert_eq!(value.as_deref(), Some(&b"world"[..]));
//! }
//! kv.close().await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod core;
pub mod error;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::ClientConfig;
pub use crate::core::checksum::checksum;
pub use crate::core::codec::WireCodec;
pub use crate::core::packet::Packet;
pub use crate::core::reply::ReplyCursor;
pub use crate::error::{ProtocolError, Result};
pub use crate::service::{
    AddStatus, AppendStatus, BlockParams, BlockStore, CadStatus, CasStatus, KvPair, KvParams,
    KvStore, Lookup, ModifyStatus, RangePage,
};
pub use crate::transport::Session;
