// RVL frame header parsing and emission.
//
// Two header shapes exist. The binary shape is canonical:
//
//   0..4    magic "RVL\n"
//   4..8    width   (u32, little-endian)
//   8..12   height  (u32, little-endian)
//   12..16  near    (f32, little-endian)
//   16..20  far     (f32, little-endian)
//   20..    payload
//
// The textual shape written by older tools follows the magic with an ASCII
// line "<width> <height>\n", optionally a second line "<near> <far>\n", and
// the payload starts at the next byte.

use std::io::{self, Write};

use super::frame::ClipPlanes;
use crate::error::{Result, RvlError};

pub const RVL_MAGIC: [u8; 4] = *b"RVL\n";

/// Size of the binary header including the magic.
pub const BINARY_HEADER_LEN: usize = 20;

/// Longest ASCII header line we are willing to scan for.
const MAX_TEXT_LINE: usize = 64;

/// Largest frame a header may declare (256 Mi pixels).
pub const HARD_MAX_PIXELS: u64 = 1 << 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderShape {
    /// Fixed 20-byte little-endian header with clip planes.
    #[default]
    Binary,
    /// Legacy ASCII lines.
    Textual,
}

/// Parsed RVL frame header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
    pub width: u32,
    pub height: u32,
    pub clip: Option<ClipPlanes>,
    pub shape: HeaderShape,
}

impl FrameHeader {
    /// Number of pixels the payload must produce.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Serialize the header.
    ///
    /// Binary headers without clip planes store `0.0, 0.0`, which parses
    /// back as "no clip planes".
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = RVL_MAGIC.to_vec();
        match self.shape {
            HeaderShape::Binary => {
                let (near, far) = self.clip.map_or((0.0, 0.0), |c| (c.near(), c.far()));
                out.extend_from_slice(&self.width.to_le_bytes());
                out.extend_from_slice(&self.height.to_le_bytes());
                out.extend_from_slice(&near.to_le_bytes());
                out.extend_from_slice(&far.to_le_bytes());
            }
            HeaderShape::Textual => {
                out.extend_from_slice(format!("{} {}\n", self.width, self.height).as_bytes());
                if let Some(clip) = self.clip {
                    out.extend_from_slice(format!("{} {}\n", clip.near(), clip.far()).as_bytes());
                }
            }
        }
        out
    }

    /// Encoded header size in bytes (offset of the payload).
    pub fn encoded_len(&self) -> usize {
        match self.shape {
            HeaderShape::Binary => BINARY_HEADER_LEN,
            HeaderShape::Textual => self.to_bytes().len(),
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_bytes())
    }

    /// Parse a header, detecting its shape. Returns the header and the
    /// payload offset.
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize)> {
        check_magic(bytes)?;
        Self::parse_as(bytes, detect_shape(bytes))
    }

    /// Parse a header of a known shape.
    pub fn parse_as(bytes: &[u8], shape: HeaderShape) -> Result<(Self, usize)> {
        check_magic(bytes)?;
        match shape {
            HeaderShape::Binary => parse_binary(bytes),
            HeaderShape::Textual => parse_textual(bytes),
        }
    }
}

/// Guess the header shape of a buffer that starts with the magic.
///
/// The shape is textual when the line after the magic is exactly
/// `"<width> <height>"` with two positive decimal numbers, unless the same
/// bytes also form a valid binary header. The two readings only overlap when
/// a three-character line such as `"1 1"` fills the binary width field.
pub fn detect_shape(bytes: &[u8]) -> HeaderShape {
    let dimension_line = header_line(bytes, RVL_MAGIC.len())
        .and_then(|(line, _)| dimension_pair(line))
        .is_some();
    if dimension_line && parse_binary(bytes).is_err() {
        HeaderShape::Textual
    } else {
        HeaderShape::Binary
    }
}

/// True if a payload starting at `offset` would be read back as a
/// `"<near> <far>"` line.
pub(crate) fn payload_looks_like_clip_line(bytes: &[u8], offset: usize) -> bool {
    clip_line(bytes, offset).is_some()
}

/// Strict `"<digits> <digits>"` with both values positive.
fn dimension_pair(line: &[u8]) -> Option<(u32, u32)> {
    let space = line.iter().position(|&b| b == b' ')?;
    let (w, h) = (&line[..space], &line[space + 1..]);
    let number = |digits: &[u8]| -> Option<u32> {
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return None;
        }
        std::str::from_utf8(digits).ok()?.parse().ok().filter(|&n| n > 0)
    };
    Some((number(w)?, number(h)?))
}

fn check_magic(bytes: &[u8]) -> Result<()> {
    if bytes.len() < RVL_MAGIC.len() || bytes[..RVL_MAGIC.len()] != RVL_MAGIC {
        return Err(RvlError::BadMagic {
            found: bytes[..bytes.len().min(RVL_MAGIC.len())].to_vec(),
        });
    }
    Ok(())
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(RvlError::MalformedHeader(format!(
            "non-positive dimensions {width}x{height}"
        )));
    }
    let pixels = u64::from(width) * u64::from(height);
    if pixels > HARD_MAX_PIXELS {
        return Err(RvlError::MalformedHeader(format!(
            "frame too large: {width}x{height} exceeds {HARD_MAX_PIXELS} pixels"
        )));
    }
    Ok(())
}

fn clip_planes(near: f32, far: f32) -> Result<ClipPlanes> {
    ClipPlanes::new(near, far)
        .map_err(|_| RvlError::MalformedHeader(format!("invalid clip planes {near} {far}")))
}

fn parse_binary(bytes: &[u8]) -> Result<(FrameHeader, usize)> {
    let Some(fields) = bytes.get(RVL_MAGIC.len()..BINARY_HEADER_LEN) else {
        return Err(RvlError::MalformedHeader(format!(
            "binary header needs {BINARY_HEADER_LEN} bytes, got {}",
            bytes.len()
        )));
    };
    let field = |i: usize| -> [u8; 4] { [fields[i], fields[i + 1], fields[i + 2], fields[i + 3]] };

    let width = u32::from_le_bytes(field(0));
    let height = u32::from_le_bytes(field(4));
    check_dimensions(width, height)?;

    let near = f32::from_le_bytes(field(8));
    let far = f32::from_le_bytes(field(12));
    let clip = if near == 0.0 && far == 0.0 {
        None
    } else {
        Some(clip_planes(near, far)?)
    };

    Ok((
        FrameHeader {
            width,
            height,
            clip,
            shape: HeaderShape::Binary,
        },
        BINARY_HEADER_LEN,
    ))
}

fn parse_textual(bytes: &[u8]) -> Result<(FrameHeader, usize)> {
    let (line, mut offset) = header_line(bytes, RVL_MAGIC.len()).ok_or_else(|| {
        RvlError::MalformedHeader("missing \"<width> <height>\" line".into())
    })?;
    let line = std::str::from_utf8(line)
        .map_err(|_| RvlError::MalformedHeader("dimension line is not ASCII".into()))?;
    let (width, height) = match split_pair(line) {
        Some((w, h)) => (parse_field::<u32>(w, "width")?, parse_field::<u32>(h, "height")?),
        None => {
            return Err(RvlError::MalformedHeader(format!(
                "expected \"<width> <height>\", got {line:?}"
            )));
        }
    };
    check_dimensions(width, height)?;

    let mut clip = None;
    if let Some((near, far, next)) = clip_line(bytes, offset) {
        clip = Some(clip_planes(near, far)?);
        offset = next;
    }

    Ok((
        FrameHeader {
            width,
            height,
            clip,
            shape: HeaderShape::Textual,
        },
        offset,
    ))
}

/// The line starting at `from` (without its `\n`) and the offset just past
/// the newline, if a newline occurs within `MAX_TEXT_LINE` bytes.
fn header_line(bytes: &[u8], from: usize) -> Option<(&[u8], usize)> {
    let window = bytes.get(from..)?;
    let window = &window[..window.len().min(MAX_TEXT_LINE)];
    let len = window.iter().position(|&b| b == b'\n')?;
    let line = &window[..len];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Some((line, from + len + 1))
}

/// An optional `"<near> <far>"` line. Only lines made of number characters
/// qualify, so payload bytes are never mistaken for clip planes.
fn clip_line(bytes: &[u8], from: usize) -> Option<(f32, f32, usize)> {
    let (line, next) = header_line(bytes, from)?;
    let numeric = |b: &u8| b.is_ascii_digit() || b"+-.eE ".contains(b);
    if line.is_empty() || !line.iter().all(numeric) {
        return None;
    }
    let line = std::str::from_utf8(line).ok()?;
    let (near, far) = split_pair(line)?;
    Some((near.parse().ok()?, far.parse().ok()?, next))
}

fn split_pair(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.split_ascii_whitespace();
    let pair = (parts.next()?, parts.next()?);
    parts.next().is_none().then_some(pair)
}

fn parse_field<T: std::str::FromStr>(token: &str, name: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| RvlError::MalformedHeader(format!("invalid {name} {token:?}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
