#![no_main]

use bytes::BytesMut;
use kivaloo_wire::WireCodec;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    let mut codec = WireCodec::new(64 * 1024);
    let mut buf = BytesMut::new();

    // Feed the input in uneven pieces, as a socket would.
    for chunk in data.chunks(7) {
        buf.extend_from_slice(chunk);
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(packet)) => assert!(packet.payload.len() <= 64 * 1024),
                Ok(None) => break,
                Err(_) => return,
            }
        }
    }
});
