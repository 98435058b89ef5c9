//! In-memory stand-ins for the block-store and key-value services.
//!
//! Each fake is a plain `Fn(Bytes) -> Bytes` request handler so the same
//! backend can sit behind a `tokio::io::duplex` pipe or a real Unix socket
//! served by `transport::local::serve_with_shutdown`.

#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use bytes::{BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use kivaloo_wire::core::field::put_length_prefixed;
use kivaloo_wire::service::kvlds::opcode as kv_op;
use kivaloo_wire::service::lbs::opcode as lbs_op;
use kivaloo_wire::{Packet, ReplyCursor, WireCodec};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{duplex, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

pub const TEST_BLOCK_SIZE: u32 = 512;

fn status(code: u32) -> BytesMut {
    let mut out = BytesMut::new();
    out.put_u32(code);
    out
}

#[derive(Default)]
struct LbsState {
    blocks: BTreeMap<u64, Bytes>,
    next_block: u64,
}

/// Block store holding blocks of `block_size` bytes.
pub fn lbs_handler(block_size: u32) -> impl Fn(Bytes) -> Bytes + Send + Sync + Clone + 'static {
    let state = Arc::new(Mutex::new(LbsState::default()));
    move |req| {
        let mut st = state.lock().unwrap();
        let mut req = ReplyCursor::new(req);
        let out = match req.read_u32().unwrap() {
            lbs_op::PARAMS => {
                let mut out = BytesMut::new();
                out.put_u32(block_size);
                out.put_u64(st.next_block);
                out
            }
            lbs_op::PARAMS2 => {
                let mut out = BytesMut::new();
                out.put_u32(block_size);
                out.put_u64(st.next_block);
                out.put_u64(st.blocks.keys().next_back().copied().unwrap_or(u64::MAX));
                out
            }
            lbs_op::GET => match st.blocks.get(&req.read_u64().unwrap()) {
                Some(data) => {
                    let mut out = status(0);
                    out.put_slice(data);
                    out
                }
                None => status(1),
            },
            lbs_op::APPEND => {
                let count = req.read_u32().unwrap() as u64;
                let start = req.read_u64().unwrap();
                if start != st.next_block {
                    status(1)
                } else {
                    for i in 0..count {
                        let data = req.read_bytes(block_size as usize).unwrap();
                        st.blocks.insert(start + i, data);
                    }
                    st.next_block = start + count;
                    let mut out = status(0);
                    out.put_u64(st.next_block);
                    out
                }
            }
            lbs_op::FREE => {
                let keep_from = req.read_u64().unwrap();
                st.blocks = st.blocks.split_off(&keep_from);
                status(0)
            }
            other => panic!("unknown block-store opcode {other:#x}"),
        };
        out.freeze()
    }
}

fn field(req: &mut ReplyCursor) -> Vec<u8> {
    req.read_length_prefixed()
        .unwrap()
        .map(|b| b.to_vec())
        .unwrap_or_default()
}

fn put_field(out: &mut BytesMut, data: &[u8]) {
    put_length_prefixed(out, Some(data)).unwrap();
}

/// Key-value store with the 255-byte limits of the real service.
///
/// RANGE fills a page until the next pair would push it past `maxsize`, but
/// always returns at least one pair. Like the real service, a bounded scan
/// that runs out of keys resumes at its end bound; an unbounded one reports
/// an empty resume key.
pub fn kvlds_handler() -> impl Fn(Bytes) -> Bytes + Send + Sync + Clone + 'static {
    let state: Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>> = Arc::default();
    move |req| {
        let mut map = state.lock().unwrap();
        let mut req = ReplyCursor::new(req);
        let out = match req.read_u32().unwrap() {
            kv_op::PARAMS => {
                let mut out = BytesMut::new();
                out.put_u32(255);
                out.put_u32(255);
                out
            }
            kv_op::SET => {
                let (k, v) = (field(&mut req), field(&mut req));
                map.insert(k, v);
                status(0)
            }
            kv_op::CAS => {
                let (k, old, v) = (field(&mut req), field(&mut req), field(&mut req));
                match map.get_mut(&k) {
                    Some(cur) if *cur == old => {
                        *cur = v;
                        status(0)
                    }
                    _ => status(1),
                }
            }
            kv_op::ADD => {
                let (k, v) = (field(&mut req), field(&mut req));
                if map.contains_key(&k) {
                    status(1)
                } else {
                    map.insert(k, v);
                    status(0)
                }
            }
            kv_op::MODIFY => {
                let (k, v) = (field(&mut req), field(&mut req));
                match map.get_mut(&k) {
                    Some(cur) => {
                        *cur = v;
                        status(0)
                    }
                    None => status(1),
                }
            }
            kv_op::DELETE => {
                map.remove(&field(&mut req));
                status(0)
            }
            kv_op::CAD => {
                let (k, old) = (field(&mut req), field(&mut req));
                if map.get(&k) == Some(&old) {
                    map.remove(&k);
                    status(0)
                } else {
                    status(1)
                }
            }
            kv_op::GET => match map.get(&field(&mut req)) {
                Some(v) => {
                    let mut out = status(0);
                    put_field(&mut out, v);
                    out
                }
                None => status(1),
            },
            kv_op::RANGE => {
                let maxsize = req.read_u32().unwrap() as usize;
                let start = field(&mut req);
                let end = field(&mut req);

                let mut pairs = Vec::new();
                let mut size = 0usize;
                let mut next_key: &[u8] = &end;
                for (k, v) in map.range(start..) {
                    if !end.is_empty() && *k >= end {
                        break;
                    }
                    let pair_size = 2 + k.len() + v.len();
                    if !pairs.is_empty() && size + pair_size > maxsize {
                        next_key = k.as_slice();
                        break;
                    }
                    size += pair_size;
                    pairs.push((k, v));
                }

                let mut out = status(0);
                out.put_u32(pairs.len() as u32);
                put_field(&mut out, next_key);
                for (k, v) in pairs {
                    put_field(&mut out, k);
                    put_field(&mut out, v);
                }
                out
            }
            other => panic!("unknown key-value opcode {other:#x}"),
        };
        out.freeze()
    }
}

/// Serve `handler` on one end of an in-memory pipe and return the other.
pub fn spawn_duplex<H>(handler: H) -> DuplexStream
where
    H: Fn(Bytes) -> Bytes + Send + 'static,
{
    let (client, server) = duplex(64 * 1024);
    tokio::spawn(async move {
        let mut framed = Framed::new(server, WireCodec::default());
        while let Some(Ok(req)) = framed.next().await {
            let reply = Packet::new(req.sequence_id, handler(req.payload));
            if framed.send(reply).await.is_err() {
                break;
            }
        }
    });
    client
}

/// A handler served on a Unix socket inside a temporary directory.
#[cfg(unix)]
pub struct SocketBackend {
    pub path: PathBuf,
    shutdown: mpsc::Sender<()>,
    task: JoinHandle<kivaloo_wire::Result<()>>,
    _dir: tempfile::TempDir,
}

#[cfg(unix)]
impl SocketBackend {
    pub async fn start<H>(name: &str, handler: H) -> Self
    where
        H: Fn(Bytes) -> Bytes + Send + Sync + 'static,
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let (shutdown, rx) = mpsc::channel(1);
        let task = tokio::spawn(kivaloo_wire::transport::local::serve_with_shutdown(
            path.clone(),
            handler,
            rx,
        ));

        for _ in 0..200 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        Self {
            path,
            shutdown,
            task,
            _dir: dir,
        }
    }

    pub async fn stop(self) {
        self.shutdown.send(()).await.unwrap();
        self.task.await.unwrap().unwrap();
    }
}
