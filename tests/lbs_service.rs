//! Block store client against an in-memory backend.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{lbs_handler, spawn_duplex, TEST_BLOCK_SIZE};
use kivaloo_wire::config::TransportConfig;
use kivaloo_wire::{AppendStatus, BlockStore, Lookup, ProtocolError, Session};
use tokio::io::DuplexStream;

const BS: usize = TEST_BLOCK_SIZE as usize;

async fn store() -> BlockStore<DuplexStream> {
    let stream = spawn_duplex(lbs_handler(TEST_BLOCK_SIZE));
    BlockStore::connect(Session::new(stream)).await.unwrap()
}

/// A block holding `n` in its first four bytes.
fn block(n: u32) -> Vec<u8> {
    let mut b = vec![0u8; BS];
    b[..4].copy_from_slice(&n.to_be_bytes());
    b
}

#[tokio::test]
async fn test_params_and_params2_agree() {
    let lbs = store().await;
    assert_eq!(lbs.block_size(), BS);

    let p = lbs.params().await.unwrap();
    let p2 = lbs.params2().await.unwrap();
    assert_eq!(p.block_size, p2.block_size);
    assert_eq!(p.next_block, p2.next_block);
    assert_eq!(p.last_block, None);
    // Empty store reports the all-ones sentinel.
    assert_eq!(p2.last_block, None);
}

#[tokio::test]
async fn test_append_get_free() {
    let lbs = store().await;
    let next = lbs.params().await.unwrap().next_block;

    let status = lbs.append(next, &block(4)).await.unwrap();
    let AppendStatus::Appended { next_block } = status else {
        panic!("append rejected");
    };
    assert!(next_block > next);
    assert_eq!(lbs.params2().await.unwrap().last_block, Some(next));

    let data = lbs.get(next).await.unwrap().found().unwrap();
    assert_eq!(&data[..], &block(4)[..]);

    lbs.free(next_block).await.unwrap();
    match lbs.get(next).await.unwrap() {
        Lookup::Found(data) => assert_eq!(&data[..], &block(4)[..]),
        Lookup::NotFound => {}
    }
}

#[tokio::test]
async fn test_append_several_blocks() {
    let lbs = store().await;
    let mut data = block(1);
    data.extend(block(2));
    data.extend(block(3));

    assert_eq!(
        lbs.append(0, &data).await.unwrap(),
        AppendStatus::Appended { next_block: 3 }
    );
    for n in 0..3u64 {
        let got = lbs.get(n).await.unwrap().found().unwrap();
        assert_eq!(&got[..4], &(n as u32 + 1).to_be_bytes());
    }
}

#[tokio::test]
async fn test_append_at_wrong_position_rejected() {
    let lbs = store().await;
    assert_eq!(
        lbs.append(5, &block(0)).await.unwrap(),
        AppendStatus::Rejected
    );
    assert_eq!(lbs.get(5).await.unwrap(), Lookup::NotFound);
}

#[tokio::test]
async fn test_misaligned_append_fails_before_sending() {
    let lbs = store().await;
    let before = lbs.session().metrics();

    for len in [1, BS - 1, BS + 1, 3 * BS / 2] {
        let err = lbs.append(0, &vec![0u8; len]).await.unwrap_err();
        assert!(
            matches!(err, ProtocolError::InvalidBlockSize { block_size, .. } if block_size == BS),
            "len {len}: {err:?}"
        );
        assert!(!err.is_fatal());
    }

    let after = lbs.session().metrics();
    assert_eq!(after.requests_sent, before.requests_sent);
    assert_eq!(after.bytes_sent, before.bytes_sent);
    assert_eq!(lbs.session().next_sequence_id().await.unwrap(), 1);
}

#[tokio::test]
async fn test_append_over_payload_limit_keeps_session() {
    let stream = spawn_duplex(lbs_handler(TEST_BLOCK_SIZE));
    let config = TransportConfig {
        max_payload_size: 2 * BS,
        ..TransportConfig::default()
    };
    let lbs = BlockStore::connect(Session::with_config(stream, &config))
        .await
        .unwrap();

    // Two aligned blocks plus the opcode, count and start overflow the limit.
    let mut data = block(0);
    data.extend(block(1));
    let err = lbs.append(0, &data).await.unwrap_err();
    assert!(
        matches!(err, ProtocolError::PayloadTooLarge { len, max } if len == 2 * BS + 16 && max == 2 * BS),
        "{err:?}"
    );
    assert!(!err.is_fatal());
    assert!(!lbs.session().is_closed().await);
    assert_eq!(lbs.session().next_sequence_id().await.unwrap(), 1);

    assert_eq!(
        lbs.append(0, &block(0)).await.unwrap(),
        AppendStatus::Appended { next_block: 1 }
    );
}

#[tokio::test]
async fn test_free_keeps_later_blocks() {
    let lbs = store().await;
    let mut data = Vec::new();
    for n in 0..4 {
        data.extend(block(n));
    }
    lbs.append(0, &data).await.unwrap();

    lbs.free(2).await.unwrap();
    assert!(lbs.get(2).await.unwrap().is_found());
    assert!(lbs.get(3).await.unwrap().is_found());
}
