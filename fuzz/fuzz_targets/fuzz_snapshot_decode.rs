//! Fuzz target: persisted snapshot decoding
//!
//! Feeds arbitrary bytes to `decode_snapshot`, the first thing a cycle
//! does with whatever NVS returns, and verifies:
//! - No panics under arbitrary byte inputs
//! - Anything that decodes re-encodes to a blob that decodes identically
//!
//! cargo fuzz run fuzz_snapshot_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use sensornode::power::{decode_snapshot, encode_snapshot};

fuzz_target!(|data: &[u8]| {
    let Ok(snapshot) = decode_snapshot(data) else {
        return;
    };
    let blob = encode_snapshot(&snapshot).expect("decoded snapshot must re-encode");
    let again = decode_snapshot(&blob).expect("re-encoded snapshot must decode");
    // NaN readings compare unequal to themselves; compare the bytes instead.
    assert_eq!(encode_snapshot(&again).ok(), Some(blob));
});
