// RVL depth-frame format.
//
// # Modules
//
// - `vle`       Variable-length nibble coding over little-endian 32-bit words
// - `run_delta` Zero/nonzero run decomposition with zigzag deltas
// - `header`    Binary and textual frame header parsing/emission
// - `frame`     Depth frames and whole-frame encode/decode

pub mod frame;
pub mod header;
pub mod run_delta;
pub mod vle;

pub use frame::{ClipPlanes, DecodedFrame, DepthFrame, decode, decode_with, encode, encode_with, encode_to};
pub use header::{FrameHeader, HeaderShape, RVL_MAGIC};
pub use run_delta::{RunSegment, RunStats};
pub use vle::{NibbleOrder, NibbleReader, NibbleWriter};

/// Knobs that the container does not record and the caller must agree on.
///
/// `header_shape` only affects encoding; decoding detects the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecOptions {
    pub nibble_order: NibbleOrder,
    pub header_shape: HeaderShape,
}

impl CodecOptions {
    /// Options matching frames written by the legacy RVL tools.
    pub fn legacy() -> Self {
        Self {
            nibble_order: NibbleOrder::LeastSignificantFirst,
            header_shape: HeaderShape::Textual,
        }
    }
}
