//! Key-value store (KVLDS) client.
//!
//! Keys and values travel as length-prefixed fields, so a key or value is
//! at most 255 bytes and a zero-length field means "no value". Every field
//! is checked before the request is built; an oversized one fails with
//! `FieldTooLarge` and nothing reaches the wire.
//!
//! ```text
//! opcode  op      request                          reply
//! 0x100   PARAMS  -                                max_key_len:u32 max_value_len:u32
//! 0x110   SET     LP(key) LP(value)                status:u32
//! 0x111   CAS     LP(key) LP(old) LP(value)        status:u32
//! 0x112   ADD     LP(key) LP(value)                status:u32
//! 0x113   MODIFY  LP(key) LP(value)                status:u32
//! 0x120   DELETE  LP(key)                          status:u32
//! 0x121   CAD     LP(key) LP(old)                  status:u32
//! 0x130   GET     LP(key)                          status:u32 [LP(value) if status=0]
//! 0x131   RANGE   maxsize:u32 LP(start) LP(end)    status:u32 count:u32 LP(next) count*(LP(key) LP(value))
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, instrument, trace};

#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use tokio::net::UnixStream;

use super::{expect_ok, read_status, request, Lookup};
use crate::core::field::{check_field, encoded_len, put_length_prefixed};
use crate::core::reply::ReplyCursor;
use crate::error::{constants, ProtocolError, Result};
use crate::transport::Session;

pub mod opcode {
    pub const PARAMS: u32 = 0x100;
    pub const SET: u32 = 0x110;
    pub const CAS: u32 = 0x111;
    pub const ADD: u32 = 0x112;
    pub const MODIFY: u32 = 0x113;
    pub const DELETE: u32 = 0x120;
    pub const CAD: u32 = 0x121;
    pub const GET: u32 = 0x130;
    pub const RANGE: u32 = 0x131;
}

/// Limits advertised by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvParams {
    pub max_key_len: u32,
    pub max_value_len: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasStatus {
    Swapped,
    /// The current value was not the expected one; nothing changed.
    Mismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddStatus {
    Added,
    /// The key already had a value, which was left alone.
    Exists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyStatus {
    Modified,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadStatus {
    Deleted,
    Mismatch,
}

/// A key and its value as stored. Either side may be absent, since a
/// zero-length field decodes to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
}

/// One page of a range scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangePage {
    /// Where the next page starts; `None` once the range is exhausted.
    pub next_key: Option<Bytes>,
    /// Pairs in ascending key order.
    pub pairs: Vec<KvPair>,
}

impl RangePage {
    pub fn is_last(&self) -> bool {
        self.next_key.is_none()
    }
}

pub struct KvStore<S> {
    session: Session<S>,
    params: KvParams,
}

#[cfg(unix)]
impl KvStore<UnixStream> {
    /// Connect to the key-value store listening at `path`.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::connect(Session::open(path).await?).await
    }
}

impl<S> KvStore<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Take over `session` and fetch the store's limits.
    #[instrument(skip_all)]
    pub async fn connect(session: Session<S>) -> Result<Self> {
        let mut store = Self {
            session,
            params: KvParams {
                max_key_len: u8::MAX as u32,
                max_value_len: u8::MAX as u32,
            },
        };
        store.params = store.params().await?;
        debug!(
            max_key_len = store.params.max_key_len,
            max_value_len = store.params.max_value_len,
            "Key-value store ready"
        );
        Ok(store)
    }

    /// Limits fetched when the client connected.
    pub fn limits(&self) -> KvParams {
        self.params
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub async fn close(&self) -> Result<()> {
        self.session.close().await
    }

    pub async fn params(&self) -> Result<KvParams> {
        let req = request(opcode::PARAMS, 0);
        self.session
            .call("PARAMS", req.freeze(), |reply| {
                Ok(KvParams {
                    max_key_len: reply.read_u32()?,
                    max_value_len: reply.read_u32()?,
                })
            })
            .await
    }

    /// Store `value` under `key`, replacing any existing value.
    pub async fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)?;
        let req = encode(opcode::SET, &[Some(key), Some(value)])?;
        self.session
            .call("SET", req, |reply| expect_ok(reply, "SET"))
            .await
    }

    /// Replace the value of `key` with `value` if it is currently `old`.
    pub async fn cas(&self, key: &[u8], old: &[u8], value: &[u8]) -> Result<CasStatus> {
        self.check_key(key)?;
        self.check_value(old)?;
        self.check_value(value)?;
        let req = encode(opcode::CAS, &[Some(key), Some(old), Some(value)])?;
        self.session
            .call("CAS", req, |reply| {
                Ok(match read_status(reply, "CAS")? {
                    true => CasStatus::Swapped,
                    false => CasStatus::Mismatch,
                })
            })
            .await
    }

    /// Store `value` under `key` only if `key` has no value yet.
    pub async fn add(&self, key: &[u8], value: &[u8]) -> Result<AddStatus> {
        self.check_key(key)?;
        self.check_value(value)?;
        let req = encode(opcode::ADD, &[Some(key), Some(value)])?;
        self.session
            .call("ADD", req, |reply| {
                Ok(match read_status(reply, "ADD")? {
                    true => AddStatus::Added,
                    false => AddStatus::Exists,
                })
            })
            .await
    }

    /// Store `value` under `key` only if `key` already has a value.
    pub async fn modify(&self, key: &[u8], value: &[u8]) -> Result<ModifyStatus> {
        self.check_key(key)?;
        self.check_value(value)?;
        let req = encode(opcode::MODIFY, &[Some(key), Some(value)])?;
        self.session
            .call("MODIFY", req, |reply| {
                Ok(match read_status(reply, "MODIFY")? {
                    true => ModifyStatus::Modified,
                    false => ModifyStatus::NotFound,
                })
            })
            .await
    }

    /// Remove `key`. Deleting a missing key succeeds.
    pub async fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;
        let req = encode(opcode::DELETE, &[Some(key)])?;
        self.session
            .call("DELETE", req, |reply| expect_ok(reply, "DELETE"))
            .await
    }

    /// Remove `key` if its value is currently `old`.
    pub async fn cad(&self, key: &[u8], old: &[u8]) -> Result<CadStatus> {
        self.check_key(key)?;
        self.check_value(old)?;
        let req = encode(opcode::CAD, &[Some(key), Some(old)])?;
        self.session
            .call("CAD", req, |reply| {
                Ok(match read_status(reply, "CAD")? {
                    true => CadStatus::Deleted,
                    false => CadStatus::Mismatch,
                })
            })
            .await
    }

    /// Look up `key`.
    ///
    /// A stored zero-length value comes back as `Found(None)`.
    pub async fn get(&self, key: &[u8]) -> Result<Lookup<Option<Bytes>>> {
        self.check_key(key)?;
        let req = encode(opcode::GET, &[Some(key)])?;
        self.session
            .call("GET", req, |reply| {
                Ok(if read_status(reply, "GET")? {
                    Lookup::Found(reply.read_length_prefixed()?)
                } else {
                    Lookup::NotFound
                })
            })
            .await
    }

    /// Fetch one page of the pairs with `start <= key < end`.
    ///
    /// An absent bound leaves that side open. The store stops adding pairs
    /// once the page would exceed `maxsize` bytes, but always returns at
    /// least one pair if any remain.
    #[instrument(skip(self, start, end))]
    pub async fn range(
        &self,
        maxsize: u32,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<RangePage> {
        self.check_bound(start)?;
        self.check_bound(end)?;

        let mut req = request(opcode::RANGE, 4 + encoded_len(start) + encoded_len(end));
        req.put_u32(maxsize);
        put_length_prefixed(&mut req, start)?;
        put_length_prefixed(&mut req, end)?;

        let page = self
            .session
            .call("RANGE", req.freeze(), |reply| {
                expect_ok(reply, "RANGE")?;
                read_range_page(reply, maxsize)
            })
            .await?;
        trace!(pairs = page.pairs.len(), last = page.is_last(), "Range page");
        Ok(page)
    }

    /// Walk a range page by page until the store reports no next key, or
    /// until the resume key reaches `end`.
    ///
    /// Pages are requested with `maxsize` each and concatenated in order. A
    /// bounded scan that runs out of keys resumes at `end` itself, so the
    /// walk stops there without asking for an empty page.
    pub async fn range_all(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        maxsize: u32,
    ) -> Result<Vec<KvPair>> {
        let mut pairs = Vec::new();
        let mut from: Option<Bytes> = start.map(Bytes::copy_from_slice);
        let mut pages = 0usize;
        // An empty bound travels as an absent field.
        let bound = end.filter(|e| !e.is_empty());

        loop {
            let page = self.range(maxsize, from.as_deref(), end).await?;
            pages += 1;

            let Some(next) = page.next_key else {
                pairs.extend(page.pairs);
                break;
            };
            if bound.is_some_and(|e| next[..] >= *e) {
                pairs.extend(page.pairs);
                break;
            }
            if page.pairs.is_empty() && from.as_ref() == Some(&next) {
                return Err(ProtocolError::MalformedReply {
                    op: "RANGE",
                    reason: constants::ERR_RANGE_STALLED,
                });
            }
            pairs.extend(page.pairs);
            from = Some(next);
        }

        debug!(pages, pairs = pairs.len(), "Range complete");
        Ok(pairs)
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        check_limit(key, self.params.max_key_len)
    }

    fn check_value(&self, value: &[u8]) -> Result<()> {
        check_limit(value, self.params.max_value_len)
    }

    fn check_bound(&self, bound: Option<&[u8]>) -> Result<()> {
        bound.map_or(Ok(()), |b| self.check_key(b))
    }
}

fn check_limit(data: &[u8], limit: u32) -> Result<()> {
    check_field(Some(data))?;
    if data.len() as u64 > limit as u64 {
        return Err(ProtocolError::FieldTooLarge(data.len()));
    }
    Ok(())
}

/// Build a request made of an opcode followed by length-prefixed fields.
fn encode(opcode: u32, fields: &[Option<&[u8]>]) -> Result<Bytes> {
    let len = fields.iter().map(|f| encoded_len(*f)).sum();
    let mut req: BytesMut = request(opcode, len);
    for field in fields {
        put_length_prefixed(&mut req, *field)?;
    }
    Ok(req.freeze())
}

/// Decode the body of a successful RANGE reply.
fn read_range_page(reply: &mut ReplyCursor, maxsize: u32) -> Result<RangePage> {
    let count = reply.read_u32()?;

    // Every pair takes at least two bytes, so only a single oversized pair
    // may exceed the budget.
    if count > 1 && count > maxsize / 2 {
        return Err(ProtocolError::MalformedReply {
            op: "RANGE",
            reason: constants::ERR_TOO_MANY_PAIRS,
        });
    }

    let next_key = reply.read_length_prefixed()?;
    let mut pairs = Vec::with_capacity((count as usize).min(reply.remaining() / 2));
    for _ in 0..count {
        let key = reply.read_length_prefixed()?;
        let value = reply.read_length_prefixed()?;
        pairs.push(KvPair { key, value });
    }

    Ok(RangePage { next_key, pairs })
}
