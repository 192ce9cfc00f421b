// Zero-run / nonzero-run decomposition with zigzag delta coding.
//
// A frame is coded as (zero_run, nonzero_run) pairs. Each nonzero pixel
// is stored as the zigzag-coded difference from the previous nonzero pixel;
// zero runs never touch that predictor.

use log::trace;

use super::vle::{NibbleOrder, NibbleReader, NibbleWriter};
use crate::error::{Result, RvlError};

/// One (zero run, nonzero run) pair of the decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSegment {
    pub zero_run: u32,
    pub nonzero_run: u32,
}

impl RunSegment {
    #[inline]
    pub fn pixels(&self) -> usize {
        self.zero_run as usize + self.nonzero_run as usize
    }
}

/// Totals gathered while coding one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub segments: u64,
    pub zero_pixels: u64,
    pub nonzero_pixels: u64,
}

impl RunStats {
    pub fn total_pixels(&self) -> u64 {
        self.zero_pixels + self.nonzero_pixels
    }

    fn record(&mut self, segment: RunSegment) {
        self.segments += 1;
        self.zero_pixels += u64::from(segment.zero_run);
        self.nonzero_pixels += u64::from(segment.nonzero_run);
    }
}

// ---------------------------------------------------------------------------
// Zigzag
// ---------------------------------------------------------------------------

/// Map a signed 16-bit delta onto an unsigned code, small magnitudes first.
#[inline]
pub fn zigzag_encode(delta: i16) -> u32 {
    u32::from(((delta << 1) ^ (delta >> 15)) as u16)
}

/// Inverse of [`zigzag_encode`].
#[inline]
pub fn zigzag_decode(coded: u32) -> i32 {
    ((coded >> 1) as i32) ^ -((coded & 1) as i32)
}

// ---------------------------------------------------------------------------
// Segmentation
// ---------------------------------------------------------------------------

/// Iterator over the run decomposition of a pixel buffer.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    pixels: &'a [u16],
    pos: usize,
}

/// Split `pixels` into the segments the encoder emits.
///
/// Every segment is a complete pair; a trailing zero run ends with an
/// explicit empty nonzero run. An empty buffer yields no segments.
pub fn segments(pixels: &[u16]) -> Segments<'_> {
    Segments { pixels, pos: 0 }
}

impl Segments<'_> {
    /// Length of the zero (or nonzero) run starting at `from`.
    fn run_len(&self, from: usize, nonzero: bool) -> usize {
        self.pixels[from..]
            .iter()
            .take_while(|&&p| (p != 0) == nonzero)
            .count()
    }
}

impl Iterator for Segments<'_> {
    type Item = RunSegment;

    fn next(&mut self) -> Option<RunSegment> {
        if self.pos >= self.pixels.len() {
            return None;
        }
        let zeros = self.run_len(self.pos, false);
        let nonzeros = self.run_len(self.pos + zeros, true);
        self.pos += zeros + nonzeros;
        Some(RunSegment {
            zero_run: zeros as u32,
            nonzero_run: nonzeros as u32,
        })
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Upper bound on the pixels reserved before any payload has been read.
const MAX_INITIAL_RESERVE: usize = 1 << 20;

fn initial_capacity(pixel_count: usize) -> usize {
    pixel_count.min(MAX_INITIAL_RESERVE)
}

/// Decode exactly `pixel_count` pixels from `reader`.
///
/// The buffer is only returned once complete; any failure discards it.
pub fn decode_pixels(
    reader: &mut NibbleReader<'_>,
    pixel_count: usize,
) -> Result<(Vec<u16>, RunStats)> {
    // The header alone may declare up to `HARD_MAX_PIXELS`; grow with the data.
    let mut pixels: Vec<u16> = Vec::with_capacity(initial_capacity(pixel_count));
    let mut stats = RunStats::default();
    let mut previous: i16 = 0;

    while pixels.len() < pixel_count {
        let zero_run = reader.decode_next()?;
        let remaining = pixel_count - pixels.len();
        if zero_run as usize > remaining {
            return Err(RvlError::PixelCountMismatch {
                expected: pixel_count,
                actual: pixels.len() + zero_run as usize,
            });
        }
        pixels.resize(pixels.len() + zero_run as usize, 0);

        let nonzero_run = reader.decode_next()?;
        let remaining = pixel_count - pixels.len();
        if nonzero_run as usize > remaining {
            return Err(RvlError::PixelCountMismatch {
                expected: pixel_count,
                actual: pixels.len() + nonzero_run as usize,
            });
        }
        for _ in 0..nonzero_run {
            let coded = reader.decode_next()?;
            if coded > u32::from(u16::MAX) {
                return Err(RvlError::DeltaOverflow { coded });
            }
            let delta = zigzag_decode(coded) as i16;
            let current = previous.wrapping_add(delta);
            pixels.push(current as u16);
            previous = current;
        }

        let segment = RunSegment {
            zero_run,
            nonzero_run,
        };
        trace!("segment {}: {segment:?}", stats.segments);
        stats.record(segment);
    }

    Ok((pixels, stats))
}

/// Decode a bare payload (no container header).
pub fn decompress(payload: &[u8], pixel_count: usize, order: NibbleOrder) -> Result<Vec<u16>> {
    let mut reader = NibbleReader::new(payload, order);
    decode_pixels(&mut reader, pixel_count).map(|(pixels, _)| pixels)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `pixels` into `writer`.
pub fn encode_pixels(writer: &mut NibbleWriter, pixels: &[u16]) -> RunStats {
    let mut stats = RunStats::default();
    let mut previous: i16 = 0;
    let mut pos = 0usize;

    for segment in segments(pixels) {
        writer.encode_next(segment.zero_run);
        writer.encode_next(segment.nonzero_run);
        pos += segment.zero_run as usize;
        for &pixel in &pixels[pos..pos + segment.nonzero_run as usize] {
            let current = pixel as i16;
            writer.encode_next(zigzag_encode(current.wrapping_sub(previous)));
            previous = current;
        }
        pos += segment.nonzero_run as usize;
        stats.record(segment);
    }

    stats
}

/// Encode a bare payload (no container header).
pub fn compress(pixels: &[u16], order: NibbleOrder) -> Vec<u8> {
    let mut writer = NibbleWriter::with_capacity(pixels.len(), order);
    encode_pixels(&mut writer, pixels);
    writer.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
