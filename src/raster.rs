// Raster hand-off for decoded frames.
//
// `RasterSink` is the seam between the codec and whatever writes images.
// `PgmWriter` emits binary PGM (P5) with maxval 65535; PGM stores 16-bit
// samples big-endian, the opposite of the RVL payload words. `read_pgm`
// parses the same format back so the CLI can encode image files.

use std::io::Write;

use crate::error::{Result, RvlError};
use crate::rvl::frame::DepthFrame;

/// Consumer of one 16-bit grayscale image.
pub trait RasterSink {
    fn write_raster(&mut self, width: u32, height: u32, samples: &[u16]) -> Result<()>;

    fn write_frame(&mut self, frame: &DepthFrame) -> Result<()> {
        self.write_raster(frame.width(), frame.height(), frame.pixels())
    }
}

/// Binary PGM writer (P5, maxval 65535).
#[derive(Debug)]
pub struct PgmWriter<W: Write> {
    inner: W,
}

impl<W: Write> PgmWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> RasterSink for PgmWriter<W> {
    fn write_raster(&mut self, width: u32, height: u32, samples: &[u16]) -> Result<()> {
        let expected = width as usize * height as usize;
        if samples.len() != expected {
            return Err(RvlError::PixelCountMismatch {
                expected,
                actual: samples.len(),
            });
        }
        write!(self.inner, "P5\n{width} {height}\n65535\n")?;
        let body: Vec<u8> = samples.iter().flat_map(|s| s.to_be_bytes()).collect();
        self.inner.write_all(&body)?;
        self.inner.flush()?;
        Ok(())
    }
}

/// Encode a frame as an in-memory PGM image.
pub fn to_pgm(frame: &DepthFrame) -> Result<Vec<u8>> {
    let mut sink = PgmWriter::new(Vec::with_capacity(frame.pixel_count() * 2 + 32));
    sink.write_frame(frame)?;
    Ok(sink.into_inner())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Parse a binary PGM (P5) image. 8-bit images are widened unchanged.
pub fn read_pgm(bytes: &[u8]) -> Result<DepthFrame> {
    if !bytes.starts_with(b"P5") {
        return Err(RvlError::Raster("not a binary PGM (missing P5)".into()));
    }
    let mut pos = 2;
    let width: u32 = pgm_field(bytes, &mut pos, "width")?;
    let height: u32 = pgm_field(bytes, &mut pos, "height")?;
    let maxval: u32 = pgm_field(bytes, &mut pos, "maxval")?;
    if maxval == 0 || maxval > 65535 {
        return Err(RvlError::Raster(format!("maxval {maxval} out of range")));
    }
    // Exactly one whitespace byte separates the header from the samples.
    pos += 1;

    let count = width as usize * height as usize;
    let sample_bytes = if maxval > 255 { 2 } else { 1 };
    let body = bytes
        .get(pos..)
        .and_then(|b| b.get(..count * sample_bytes))
        .ok_or_else(|| RvlError::Raster(format!("expected {count} samples")))?;
    let pixels = if sample_bytes == 2 {
        body.chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect()
    } else {
        body.iter().map(|&b| u16::from(b)).collect()
    };
    DepthFrame::new(width, height, pixels)
}

/// Next whitespace-delimited decimal field, skipping `#` comments.
fn pgm_field<T: std::str::FromStr>(bytes: &[u8], pos: &mut usize, name: &str) -> Result<T> {
    loop {
        match bytes.get(*pos) {
            Some(b) if b.is_ascii_whitespace() => *pos += 1,
            Some(b'#') => {
                while bytes.get(*pos).is_some_and(|&b| b != b'\n') {
                    *pos += 1;
                }
            }
            _ => break,
        }
    }
    let start = *pos;
    while bytes.get(*pos).is_some_and(u8::is_ascii_digit) {
        *pos += 1;
    }
    std::str::from_utf8(&bytes[start..*pos])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| RvlError::Raster(format!("invalid {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pgm_samples_are_big_endian() {
        let frame = DepthFrame::new(2, 1, vec![0x1234, 0x00FF]).unwrap();
        let pgm = to_pgm(&frame).unwrap();
        assert_eq!(&pgm[..15], b"P5\n2 1\n65535\n\x12\x34");
        assert_eq!(&pgm[15..], &[0x00, 0xFF]);
    }

    #[test]
    fn pgm_roundtrip() {
        let frame = DepthFrame::new(3, 2, vec![0, 1, 256, 65535, 7, 0]).unwrap();
        let back = read_pgm(&to_pgm(&frame).unwrap()).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn pgm_with_comment_and_8bit() {
        let bytes = b"P5\n# made by hand\n2 2\n255\n\x00\x01\xFE\xFF";
        let frame = read_pgm(bytes).unwrap();
        assert_eq!(frame.pixels(), &[0, 1, 254, 255]);
    }

    #[test]
    fn pgm_rejects_garbage() {
        assert!(matches!(read_pgm(b"P2\n1 1\n255\n0"), Err(RvlError::Raster(_))));
        assert!(matches!(read_pgm(b"P5\n4 4\n65535\n\0\0"), Err(RvlError::Raster(_))));
        assert!(matches!(read_pgm(b"P5\nx 4\n255\n"), Err(RvlError::Raster(_))));
    }

    #[test]
    fn sink_checks_sample_count() {
        let mut sink = PgmWriter::new(Vec::new());
        assert!(matches!(
            sink.write_raster(2, 2, &[1, 2, 3]),
            Err(RvlError::PixelCountMismatch { .. })
        ));
    }
}
