// Depth frames and whole-frame encode/decode.

use std::io::Write;

use log::{debug, warn};

use super::CodecOptions;
use super::header::{FrameHeader, HeaderShape, detect_shape, payload_looks_like_clip_line};
use super::run_delta::{self, RunStats};
use super::vle::{NibbleOrder, NibbleReader, NibbleWriter, WORD_BYTES};
use crate::error::{Result, RvlError};

// ---------------------------------------------------------------------------
// Clip planes
// ---------------------------------------------------------------------------

/// Near/far projection planes of the camera that produced a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlanes {
    near: f32,
    far: f32,
}

impl ClipPlanes {
    /// Both planes must be finite with `near < far`.
    pub fn new(near: f32, far: f32) -> Result<Self> {
        if !near.is_finite() || !far.is_finite() || near >= far {
            return Err(RvlError::InvalidClipPlanes { near, far });
        }
        Ok(Self { near, far })
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }
}

// ---------------------------------------------------------------------------
// DepthFrame
// ---------------------------------------------------------------------------

/// A single-plane 16-bit depth image in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    width: u32,
    height: u32,
    pixels: Vec<u16>,
    clip: Option<ClipPlanes>,
}

impl DepthFrame {
    /// Build a frame; `pixels.len()` must equal `width * height`.
    pub fn new(width: u32, height: u32, pixels: Vec<u16>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RvlError::InvalidDimensions { width, height });
        }
        let expected = usize::try_from(u64::from(width) * u64::from(height))
            .map_err(|_| RvlError::InvalidDimensions { width, height })?;
        if pixels.len() != expected {
            return Err(RvlError::PixelCountMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
            clip: None,
        })
    }

    /// Attach (or clear) clip planes.
    pub fn with_clip_planes(mut self, clip: Option<ClipPlanes>) -> Self {
        self.clip = clip;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn clip_planes(&self) -> Option<ClipPlanes> {
        self.clip
    }

    /// Sample at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Rows of the image, top to bottom.
    pub fn rows(&self) -> std::slice::ChunksExact<'_, u16> {
        self.pixels.chunks_exact(self.width as usize)
    }

    /// Hand the pixel buffer to a consumer.
    pub fn into_pixels(self) -> Vec<u16> {
        self.pixels
    }

    /// Pixel buffer as little-endian bytes (the raw dump format).
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
    }

    fn header(&self, shape: HeaderShape) -> FrameHeader {
        FrameHeader {
            width: self.width,
            height: self.height,
            clip: self.clip,
            shape,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// A decoded frame together with what the decoder saw.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub frame: DepthFrame,
    pub header: FrameHeader,
    pub stats: RunStats,
    /// Payload bytes actually consumed (whole words).
    pub payload_bytes: usize,
    /// Bytes after the last word the decoder needed.
    pub trailing_bytes: usize,
}

/// Decode an RVL file image with default options.
pub fn decode(bytes: &[u8]) -> Result<DepthFrame> {
    decode_with(bytes, &CodecOptions::default()).map(|d| d.frame)
}

/// Decode an RVL file image.
///
/// The header shape is detected from the bytes; `options.nibble_order`
/// selects how payload values are read.
pub fn decode_with(bytes: &[u8], options: &CodecOptions) -> Result<DecodedFrame> {
    let (header, offset) = FrameHeader::parse(bytes)?;
    debug!(
        "rvl: {:?} header, {}x{}, clip planes {:?}, payload at {offset}",
        header.shape, header.width, header.height, header.clip
    );

    let mut reader = NibbleReader::new(&bytes[offset..], options.nibble_order);
    let (pixels, stats) = run_delta::decode_pixels(&mut reader, header.pixel_count())?;

    let trailing_bytes = reader.remaining_bytes();
    if trailing_bytes % WORD_BYTES != 0 {
        warn!("rvl: payload ends {trailing_bytes} bytes past the last word read");
    } else if trailing_bytes > 0 {
        debug!("rvl: {trailing_bytes} unread payload bytes");
    }
    debug!(
        "rvl: decoded {} segments ({} zero, {} nonzero pixels)",
        stats.segments, stats.zero_pixels, stats.nonzero_pixels
    );

    let frame = DepthFrame {
        width: header.width,
        height: header.height,
        pixels,
        clip: header.clip,
    };
    Ok(DecodedFrame {
        frame,
        header,
        stats,
        payload_bytes: reader.bytes_consumed(),
        trailing_bytes,
    })
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a frame with the binary header and canonical nibble order.
pub fn encode(frame: &DepthFrame) -> Vec<u8> {
    let mut out = frame.header(HeaderShape::Binary).to_bytes();
    let (payload, _) = encode_payload(frame, NibbleOrder::MostSignificantFirst);
    out.extend_from_slice(&payload);
    out
}

/// Encode a frame into an in-memory RVL file image.
///
/// A textual header without clip planes is followed directly by the payload.
/// If those payload bytes would read back as a `"<near> <far>"` line the
/// frame cannot be stored that way and `AmbiguousTextualHeader` is returned.
pub fn encode_with(frame: &DepthFrame, options: &CodecOptions) -> Result<Vec<u8>> {
    encode_with_stats(frame, options).map(|(out, _)| out)
}

/// Encode a frame into `w`, returning the run statistics.
pub fn encode_to<W: Write>(w: &mut W, frame: &DepthFrame, options: &CodecOptions) -> Result<RunStats> {
    let (out, stats) = encode_with_stats(frame, options)?;
    w.write_all(&out)?;
    debug!(
        "rvl: encoded {}x{} in {} segments",
        frame.width, frame.height, stats.segments
    );
    Ok(stats)
}

fn encode_with_stats(frame: &DepthFrame, options: &CodecOptions) -> Result<(Vec<u8>, RunStats)> {
    let mut out = frame.header(options.header_shape).to_bytes();
    let header_len = out.len();
    let (payload, stats) = encode_payload(frame, options.nibble_order);
    out.extend_from_slice(&payload);

    if options.header_shape == HeaderShape::Textual
        && ((frame.clip.is_none() && payload_looks_like_clip_line(&out, header_len))
            || detect_shape(&out) != HeaderShape::Textual)
    {
        return Err(RvlError::AmbiguousTextualHeader);
    }
    Ok((out, stats))
}

fn encode_payload(frame: &DepthFrame, order: NibbleOrder) -> (Vec<u8>, RunStats) {
    let mut writer = NibbleWriter::with_capacity(frame.pixel_count(), order);
    let stats = run_delta::encode_pixels(&mut writer, frame.pixels());
    (writer.finish(), stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rvl::header::BINARY_HEADER_LEN;

    fn ramp(width: u32, height: u32) -> DepthFrame {
        let pixels = (0..width * height)
            .map(|i| if i % 5 == 0 { 0 } else { (1000 + i * 3) as u16 })
            .collect();
        DepthFrame::new(width, height, pixels).unwrap()
    }

    #[test]
    fn frame_validates_dimensions() {
        assert!(matches!(
            DepthFrame::new(0, 4, vec![]),
            Err(RvlError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            DepthFrame::new(2, 2, vec![0; 3]),
            Err(RvlError::PixelCountMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn clip_planes_validated() {
        assert!(ClipPlanes::new(0.1, 100.0).is_ok());
        assert!(ClipPlanes::new(1.0, 1.0).is_err());
        assert!(ClipPlanes::new(2.0, 1.0).is_err());
        assert!(ClipPlanes::new(f32::NAN, 1.0).is_err());
        assert!(ClipPlanes::new(0.0, f32::INFINITY).is_err());
    }

    #[test]
    fn accessors() {
        let frame = ramp(4, 3);
        assert_eq!(frame.get(1, 0), Some(1003));
        assert_eq!(frame.get(0, 0), Some(0));
        assert_eq!(frame.get(4, 0), None);
        assert_eq!(frame.rows().count(), 3);
        assert_eq!(frame.to_le_bytes()[2..4], 1003u16.to_le_bytes());
    }

    #[test]
    fn roundtrip_default() {
        let clip = ClipPlanes::new(0.305, 200.0).unwrap();
        let frame = ramp(16, 9).with_clip_planes(Some(clip));
        let bytes = encode(&frame);
        assert_eq!(&bytes[..4], b"RVL\n");
        assert_eq!(decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn roundtrip_all_options() {
        let frame = ramp(7, 5);
        for nibble_order in [
            NibbleOrder::MostSignificantFirst,
            NibbleOrder::LeastSignificantFirst,
        ] {
            for header_shape in [HeaderShape::Binary, HeaderShape::Textual] {
                let options = CodecOptions {
                    nibble_order,
                    header_shape,
                };
                let bytes = encode_with(&frame, &options).unwrap();
                let decoded = decode_with(&bytes, &options).unwrap();
                assert_eq!(decoded.frame, frame, "{options:?}");
                assert_eq!(decoded.header.shape, header_shape);
                assert_eq!(decoded.trailing_bytes, 0);
                assert_eq!(decoded.stats.total_pixels(), 35);
            }
        }
    }

    #[test]
    fn encode_to_matches_encode_with() {
        let frame = ramp(10, 10);
        let options = CodecOptions::default();
        let mut out = Vec::new();
        let stats = encode_to(&mut out, &frame, &options).unwrap();
        assert_eq!(out, encode_with(&frame, &options).unwrap());
        assert_eq!(out, encode(&frame));
        assert_eq!(stats.total_pixels(), 100);
    }

    #[test]
    fn trailing_bytes_reported() {
        let frame = ramp(3, 1);
        let mut bytes = encode(&frame);
        let payload_len = bytes.len() - BINARY_HEADER_LEN;
        bytes.extend_from_slice(&[0xAB, 0xCD]);
        let decoded = decode_with(&bytes, &CodecOptions::default()).unwrap();
        assert_eq!(decoded.frame, frame);
        assert_eq!(decoded.payload_bytes, payload_len);
        assert_eq!(decoded.trailing_bytes, 2);
    }

    // Payload of this frame starts with the bytes "2 5\n".
    fn payload_spelling_clip_line() -> DepthFrame {
        let mut pixels = vec![65533, 65534, 65534, 65532, 65533];
        pixels.extend([65533; 14]);
        DepthFrame::new(19, 1, pixels).unwrap()
    }

    #[test]
    fn textual_header_collision_rejected() {
        let frame = payload_spelling_clip_line();
        let options = CodecOptions {
            nibble_order: NibbleOrder::MostSignificantFirst,
            header_shape: HeaderShape::Textual,
        };
        let (payload, _) = encode_payload(&frame, options.nibble_order);
        assert_eq!(&payload[..4], b"2 5\n");

        assert!(matches!(
            encode_with(&frame, &options),
            Err(RvlError::AmbiguousTextualHeader)
        ));
        let mut sink = Vec::new();
        assert!(matches!(
            encode_to(&mut sink, &frame, &options),
            Err(RvlError::AmbiguousTextualHeader)
        ));
        assert!(sink.is_empty());

        // Unambiguous with clip planes or with the binary header.
        let clipped = frame
            .clone()
            .with_clip_planes(Some(ClipPlanes::new(0.1, 100.0).unwrap()));
        let bytes = encode_with(&clipped, &options).unwrap();
        assert_eq!(decode_with(&bytes, &options).unwrap().frame, clipped);
        assert_eq!(decode(&encode(&frame)).unwrap(), frame);
    }

    #[test]
    fn wide_binary_frames_roundtrip() {
        let frame = DepthFrame::new(2592, 1, vec![1000; 2592]).unwrap();
        assert_eq!(decode(&encode(&frame)).unwrap(), frame);
        let frame = DepthFrame::new(2592, 1944, vec![0; 2592 * 1944]).unwrap();
        assert_eq!(decode(&encode(&frame)).unwrap(), frame);
    }

    #[test]
    fn largest_header_with_short_payload_fails_fast() {
        let mut bytes = FrameHeader {
            width: 16384,
            height: 16384,
            clip: None,
            shape: HeaderShape::Binary,
        }
        .to_bytes();
        bytes.extend_from_slice(&[0; 4]);
        assert!(matches!(
            decode(&bytes),
            Err(RvlError::TruncatedStream { .. })
        ));
    }

    #[test]
    fn truncated_payload_yields_no_frame() {
        let bytes = encode(&ramp(32, 32));
        let cut = &bytes[..bytes.len() - 8];
        assert!(matches!(
            decode(cut),
            Err(RvlError::TruncatedStream { .. })
        ));
    }
}
