// Error type shared by every layer of the codec.
//
// Decoding and encoding are single in-memory operations: every failure is
// reported to the caller as a typed value, never as a panic or process exit.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RvlError>;

#[derive(Debug, Error)]
pub enum RvlError {
    /// Source unreadable or sink unwritable.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The first four bytes are not `"RVL\n"`.
    #[error("bad magic: expected \"RVL\\n\", got {found:02X?}")]
    BadMagic { found: Vec<u8> },

    /// Header fields are missing, unparsable, non-positive or inconsistent.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The nibble coder needed another 32-bit word past the end of the payload.
    #[error("truncated stream: no complete word at payload offset {offset}")]
    TruncatedStream { offset: usize },

    /// Run lengths overshoot the frame, or a pixel buffer does not match
    /// the declared dimensions.
    #[error("pixel count mismatch: expected {expected}, got {actual}")]
    PixelCountMismatch { expected: usize, actual: usize },

    /// A variable-length value does not fit in 32 bits.
    #[error("variable-length value overflows 32 bits after {nibbles} nibbles")]
    ValueOverflow { nibbles: u32 },

    /// A nonzero-run delta whose zigzag code needs more than 16 bits.
    #[error("coded delta {coded} exceeds 16 bits")]
    DeltaOverflow { coded: u32 },

    /// A textual header would not read back as written: the payload after
    /// the dimension line parses as a clip-plane line, or the whole image
    /// parses as a binary header.
    #[error("textual header is ambiguous for this frame; attach clip planes or use the binary header")]
    AmbiguousTextualHeader,

    /// Linearized depth fell outside `[0, 65535]`.
    #[error("linearized depth {value} outside [0, 65535]")]
    RangeError { value: f64 },

    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("invalid clip planes: near={near}, far={far}")]
    InvalidClipPlanes { near: f32, far: f32 },

    #[error("frame carries no clip planes")]
    MissingClipPlanes,

    /// An input image the raster reader cannot use.
    #[error("invalid raster: {0}")]
    Raster(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let e: RvlError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(e, RvlError::Io(_)));
        assert!(e.to_string().contains("gone"));
    }

    #[test]
    fn bad_magic_shows_found_bytes() {
        let e = RvlError::BadMagic {
            found: b"PNG\n".to_vec(),
        };
        assert_eq!(
            e.to_string(),
            "bad magic: expected \"RVL\\n\", got [50, 4E, 47, 0A]"
        );
    }
}
