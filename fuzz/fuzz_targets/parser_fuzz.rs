#![no_main]
use libfuzzer_sys::fuzz_target;
use rvl_codec::rvl::{FrameHeader, HeaderShape, header};

fuzz_target!(|data: &[u8]| {
    // Header parsing in every shape, behind a valid magic.
    let mut bytes = header::RVL_MAGIC.to_vec();
    bytes.extend_from_slice(data);
    if let Ok((hdr, offset)) = FrameHeader::parse(&bytes) {
        assert!(offset <= bytes.len());
        assert!(hdr.width > 0 && hdr.height > 0);
    }
    let _ = FrameHeader::parse_as(&bytes, HeaderShape::Textual);
    let _ = FrameHeader::parse_as(&bytes, HeaderShape::Binary);

    // CLI argument parsing.
    let text = String::from_utf8_lossy(data);
    let args: Vec<String> = text.split_whitespace().take(32).map(str::to_string).collect();
    rvl_codec::cli::fuzz_try_parse_args(&args);
});
