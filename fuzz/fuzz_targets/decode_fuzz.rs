#![no_main]
use libfuzzer_sys::fuzz_target;
use rvl_codec::rvl::{self, CodecOptions};

fuzz_target!(|data: &[u8]| {
    // The decoder must never panic, only return errors.
    let _ = rvl::decode_with(data, &CodecOptions::default());
    let _ = rvl::decode_with(data, &CodecOptions::legacy());

    // Also fuzz the payload behind a valid small binary header.
    let mut framed = b"RVL\n".to_vec();
    framed.extend_from_slice(&17u32.to_le_bytes());
    framed.extend_from_slice(&5u32.to_le_bytes());
    framed.extend_from_slice(&[0; 8]);
    framed.extend_from_slice(data);
    let _ = rvl::decode(&framed);
});
