#![no_main]
use libfuzzer_sys::fuzz_target;
use rvl_codec::rvl::{self, CodecOptions, DepthFrame, HeaderShape, NibbleOrder};

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // First byte: control flags. Remaining bytes: little-endian samples.
    let flags = data[0];
    let pixels: Vec<u16> = data[1..]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let width = pixels.len() as u32;
    let frame = DepthFrame::new(width, 1, pixels).unwrap();

    let options = CodecOptions {
        nibble_order: if flags & 1 != 0 {
            NibbleOrder::LeastSignificantFirst
        } else {
            NibbleOrder::MostSignificantFirst
        },
        header_shape: if flags & 2 != 0 {
            HeaderShape::Textual
        } else {
            HeaderShape::Binary
        },
    };

    // Textual frames whose payload reads as a clip line are refused.
    let Ok(bytes) = rvl::encode_with(&frame, &options) else {
        return;
    };
    let decoded = rvl::decode_with(&bytes, &options).unwrap();
    assert_eq!(decoded.frame, frame);
});
