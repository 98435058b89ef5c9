#![no_main]

use kivaloo_wire::ReplyCursor;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Shaped like a RANGE reply: status, count, next key, then pairs.
    let mut reply = ReplyCursor::new(data.to_vec());
    let Ok(_status) = reply.read_u32() else { return };
    let Ok(count) = reply.read_u32() else { return };
    if reply.read_length_prefixed().is_err() {
        return;
    }
    for _ in 0..count.min(1024) {
        let before = reply.position();
        if reply.read_length_prefixed().is_err() {
            assert!(reply.position() <= before + 1);
            return;
        }
        if reply.read_length_prefixed().is_err() {
            return;
        }
    }
    let _ = reply.finish("RANGE");
});
