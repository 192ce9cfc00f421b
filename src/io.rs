// File-level I/O helpers for RVL frames.
//
// Provides `read_frame()` and `write_frame()` convenience functions around
// the in-memory codec with buffered file I/O. Optionally computes SHA-256
// checksums of the pixel data (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::error::Result;
use crate::rvl::frame::{self, DepthFrame};
use crate::rvl::{CodecOptions, HeaderShape, RunStats};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `write_frame()`.
#[derive(Debug, Clone)]
pub struct EncodeStats {
    pub width: u32,
    pub height: u32,
    /// Raw pixel size in bytes (2 per pixel).
    pub raw_size: u64,
    /// Encoded file size in bytes, header included.
    pub encoded_size: u64,
    pub header_shape: HeaderShape,
    pub runs: RunStats,
    /// SHA-256 of the little-endian pixel bytes (if `file-io` feature is enabled).
    pub pixels_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `read_frame()`.
#[derive(Debug, Clone)]
pub struct DecodeStats {
    pub width: u32,
    pub height: u32,
    /// Encoded file size in bytes.
    pub encoded_size: u64,
    /// Payload bytes consumed by the decoder.
    pub payload_size: u64,
    /// Bytes left after the last payload word.
    pub trailing_bytes: u64,
    pub header_shape: HeaderShape,
    pub runs: RunStats,
    /// SHA-256 of the little-endian pixel bytes (if `file-io` feature is enabled).
    pub pixels_sha256: Option<[u8; 32]>,
}

impl EncodeStats {
    /// Raw size divided by encoded size.
    pub fn ratio(&self) -> f64 {
        if self.encoded_size == 0 {
            return 0.0;
        }
        self.raw_size as f64 / self.encoded_size as f64
    }
}

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// read_frame
// ---------------------------------------------------------------------------

/// Read and decode an RVL file.
///
/// The whole file is read into memory; the header shape is detected and
/// `opts.nibble_order` selects the payload coding.
pub fn read_frame(path: &Path, opts: &CodecOptions) -> Result<(DepthFrame, DecodeStats)> {
    let bytes = std::fs::read(path)?;
    let decoded = frame::decode_with(&bytes, opts)?;

    let stats = DecodeStats {
        width: decoded.frame.width(),
        height: decoded.frame.height(),
        encoded_size: bytes.len() as u64,
        payload_size: decoded.payload_bytes as u64,
        trailing_bytes: decoded.trailing_bytes as u64,
        header_shape: decoded.header.shape,
        runs: decoded.stats,
        pixels_sha256: pixels_sha256(&decoded.frame),
    };
    Ok((decoded.frame, stats))
}

// ---------------------------------------------------------------------------
// write_frame
// ---------------------------------------------------------------------------

/// Encode `frame` into the file at `path`, replacing it if it exists.
pub fn write_frame(path: &Path, frame: &DepthFrame, opts: &CodecOptions) -> Result<EncodeStats> {
    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, file);
    let runs = frame::encode_to(&mut writer, frame, opts)?;
    let encoded_size = writer
        .into_inner()
        .map_err(|e| e.into_error())?
        .metadata()?
        .len();

    Ok(EncodeStats {
        width: frame.width(),
        height: frame.height(),
        raw_size: frame.pixel_count() as u64 * 2,
        encoded_size,
        header_shape: opts.header_shape,
        runs,
        pixels_sha256: pixels_sha256(frame),
    })
}

/// Write any byte buffer through a buffered file handle.
pub fn write_bytes(path: &Path, data: &[u8]) -> Result<()> {
    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(path)?);
    writer.write_all(data)?;
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Checksums
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
fn pixels_sha256(frame: &DepthFrame) -> Option<[u8; 32]> {
    let mut hasher = sha2::Sha256::new();
    for chunk in frame.pixels().chunks(BUF_SIZE / 2) {
        let bytes: Vec<u8> = chunk.iter().flat_map(|p| p.to_le_bytes()).collect();
        hasher.update(&bytes);
    }
    Some(hasher.finalize().into())
}

#[cfg(not(feature = "file-io"))]
fn pixels_sha256(_frame: &DepthFrame) -> Option<[u8; 32]> {
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
