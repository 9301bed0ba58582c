//! Fuzz target: node configuration parsing
//!
//! Drives `NodeConfig::from_json` with arbitrary documents and verifies:
//! - No panics under arbitrary input
//! - Every accepted config also builds a `NodeContext` (validation and
//!   context construction agree)
//!
//! cargo fuzz run fuzz_config_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use sensornode::app::context::NodeContext;
use sensornode::config::NodeConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(doc) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = NodeConfig::from_json(doc) else {
        return;
    };
    if let Err(e) = NodeContext::new(config, "0011aabbccdd") {
        panic!("validated config rejected by context: {e}");
    }
});
