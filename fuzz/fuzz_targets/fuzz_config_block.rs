//! Fuzz target: `config_store::decode_block`
//!
//! Arbitrary stored bytes must never panic the decoder, anything it
//! accepts must be a valid configuration, and re-encoding an accepted
//! block must decode to the same result.
//!
//! cargo fuzz run fuzz_config_block

#![no_main]

use greenhouse::config_store::{decode_block, encode_block};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some(block) = decode_block(data) else {
        return;
    };
    assert!(block.config.validate().is_ok(), "decoder accepted an invalid config");

    let again = decode_block(&encode_block(&block.config, block.generation))
        .expect("re-encoded block must decode");
    assert_eq!(again.config, block.config);
    assert_eq!(again.defaulted_fields, 0);
});
