//! Block-store (LBS) client.
//!
//! The block store is an append-only log of fixed-size blocks. The block size
//! is fetched with PARAMS when the client connects and used to size every
//! GET reply and to validate APPEND data before it is sent.
//!
//! ```text
//! opcode  op       request                         reply
//! 0x00    PARAMS   -                               block_size:u32 next_block:u64
//! 0x04    PARAMS2  -                               block_size:u32 next_block:u64 last_block:u64
//! 0x01    GET      block:u64                       status:u32 [data if status=0]
//! 0x02    APPEND   count:u32 start:u64 data        status:u32 [next_block:u64 if status=0]
//! 0x03    FREE     keep_from:u64                   status:u32
//! ```

use bytes::{BufMut, Bytes};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, instrument};

#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use tokio::net::UnixStream;

use super::{expect_ok, read_status, request, Lookup};
use crate::error::{ProtocolError, Result};
use crate::transport::Session;

pub mod opcode {
    pub const PARAMS: u32 = 0x00;
    pub const GET: u32 = 0x01;
    pub const APPEND: u32 = 0x02;
    pub const FREE: u32 = 0x03;
    pub const PARAMS2: u32 = 0x04;
}

/// `last_block` value reported by an empty store.
pub const NO_BLOCKS: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockParams {
    pub block_size: u32,
    /// Number the next appended block will receive.
    pub next_block: u64,
    /// Highest block still stored; only reported by PARAMS2, `None` when the
    /// store is empty or the reply was a plain PARAMS.
    pub last_block: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendStatus {
    /// Blocks were written; `next_block` follows the last one.
    Appended { next_block: u64 },
    /// The store refused the append, typically because `start_block` was
    /// not its next block.
    Rejected,
}

pub struct BlockStore<S> {
    session: Session<S>,
    block_size: usize,
}

#[cfg(unix)]
impl BlockStore<UnixStream> {
    /// Connect to the block store listening at `path`.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::connect(Session::open(path).await?).await
    }
}

impl<S> BlockStore<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Take over `session` and fetch the block size.
    #[instrument(skip_all)]
    pub async fn connect(session: Session<S>) -> Result<Self> {
        let mut store = Self {
            session,
            block_size: 0,
        };
        let params = store.params().await?;
        store.block_size = params.block_size as usize;
        debug!(
            block_size = params.block_size,
            next_block = params.next_block,
            "Block store ready"
        );
        Ok(store)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub async fn close(&self) -> Result<()> {
        self.session.close().await
    }

    pub async fn params(&self) -> Result<BlockParams> {
        let req = request(opcode::PARAMS, 0);
        self.session
            .call("PARAMS", req.freeze(), |reply| {
                Ok(BlockParams {
                    block_size: reply.read_u32()?,
                    next_block: reply.read_u64()?,
                    last_block: None,
                })
            })
            .await
    }

    pub async fn params2(&self) -> Result<BlockParams> {
        let req = request(opcode::PARAMS2, 0);
        self.session
            .call("PARAMS2", req.freeze(), |reply| {
                let block_size = reply.read_u32()?;
                let next_block = reply.read_u64()?;
                let last_block = reply.read_u64()?;
                Ok(BlockParams {
                    block_size,
                    next_block,
                    last_block: (last_block != NO_BLOCKS).then_some(last_block),
                })
            })
            .await
    }

    /// Read one block.
    pub async fn get(&self, block: u64) -> Result<Lookup<Bytes>> {
        let mut req = request(opcode::GET, 8);
        req.put_u64(block);

        let block_size = self.block_size;
        self.session
            .call("GET", req.freeze(), |reply| {
                Ok(if read_status(reply, "GET")? {
                    Lookup::Found(reply.read_bytes(block_size)?)
                } else {
                    Lookup::NotFound
                })
            })
            .await
    }

    /// Append `blocks` starting at block number `start_block`.
    ///
    /// `blocks` must hold a whole number of blocks; otherwise nothing is sent.
    #[instrument(skip(self, blocks), fields(len = blocks.len()))]
    pub async fn append(&self, start_block: u64, blocks: &[u8]) -> Result<AppendStatus> {
        let count = self.block_count(blocks.len())?;

        let mut req = request(opcode::APPEND, 12 + blocks.len());
        req.put_u32(count);
        req.put_u64(start_block);
        req.put_slice(blocks);

        self.session
            .call("APPEND", req.freeze(), |reply| {
                Ok(if read_status(reply, "APPEND")? {
                    AppendStatus::Appended {
                        next_block: reply.read_u64()?,
                    }
                } else {
                    AppendStatus::Rejected
                })
            })
            .await
    }

    /// Tell the store that blocks numbered below `keep_from` may be freed.
    ///
    /// Advisory: a later GET of such a block may still return its data.
    pub async fn free(&self, keep_from: u64) -> Result<()> {
        let mut req = request(opcode::FREE, 8);
        req.put_u64(keep_from);

        self.session
            .call("FREE", req.freeze(), |reply| expect_ok(reply, "FREE"))
            .await
    }

    fn block_count(&self, len: usize) -> Result<u32> {
        if self.block_size == 0 || len % self.block_size != 0 {
            return Err(ProtocolError::InvalidBlockSize {
                len,
                block_size: self.block_size,
            });
        }
        u32::try_from(len / self.block_size).map_err(|_| ProtocolError::PayloadTooLarge {
            len,
            max: (u32::MAX as usize).saturating_mul(self.block_size),
        })
    }
}
