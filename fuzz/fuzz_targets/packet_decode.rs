#![no_main]

use kivaloo_wire::Packet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Anything that decodes must re-encode to the same frame.
    if let Ok(packet) = Packet::from_bytes(data) {
        assert_eq!(packet.to_bytes().unwrap(), data);
    }
});
