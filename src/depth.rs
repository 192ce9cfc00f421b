// Depth-buffer linearization.
//
// A decoded sample is a normalized, non-linear depth-buffer value where
// 65535 is the near plane and 0 the far plane. Linearization maps it to a
// normalized eye-space distance (0 at near, 65535 at far) using the
// perspective projection's clip planes. Arithmetic is done in `f64`.

use crate::error::{Result, RvlError};
use crate::rvl::frame::{ClipPlanes, DepthFrame};

const SAMPLE_MAX: f64 = u16::MAX as f64;

/// Converts depth-buffer samples to linear depth for fixed clip planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthLinearizer {
    near: f64,
    far: f64,
}

impl DepthLinearizer {
    /// Both planes must be finite with `near < far`.
    pub fn new(near: f32, far: f32) -> Result<Self> {
        ClipPlanes::new(near, far).map(Self::from_clip_planes)
    }

    pub fn from_clip_planes(clip: ClipPlanes) -> Self {
        Self {
            near: f64::from(clip.near()),
            far: f64::from(clip.far()),
        }
    }

    /// Eye-space distance of a depth-buffer sample.
    pub fn eye_depth(&self, sample: u16) -> f64 {
        let (near, far) = (self.near, self.far);
        let depth = 1.0 - f64::from(sample) / SAMPLE_MAX;
        let ndc = depth * 2.0 - 1.0;
        (2.0 * near * far) / (far + near - ndc * (far - near))
    }

    /// Linear normalized depth of a depth-buffer sample.
    pub fn linearize(&self, sample: u16) -> Result<u16> {
        let linear = (self.eye_depth(sample) - self.near) / (self.far - self.near);
        quantize(linear * SAMPLE_MAX)
    }

    /// Algebraic inverse of [`linearize`](Self::linearize), up to rounding.
    pub fn delinearize(&self, linear: u16) -> Result<u16> {
        let (near, far) = (self.near, self.far);
        let eye = near + f64::from(linear) / SAMPLE_MAX * (far - near);
        let ndc = (far + near - 2.0 * near * far / eye) / (far - near);
        let depth = (ndc + 1.0) / 2.0;
        quantize((1.0 - depth) * SAMPLE_MAX)
    }

    /// Linearize a buffer. On error the buffer is left untouched.
    pub fn linearize_in_place(&self, samples: &mut [u16]) -> Result<()> {
        let linear = samples
            .iter()
            .map(|&s| self.linearize(s))
            .collect::<Result<Vec<u16>>>()?;
        samples.copy_from_slice(&linear);
        Ok(())
    }

    /// Linearize a frame using its own clip planes.
    pub fn linearize_frame(frame: &DepthFrame) -> Result<DepthFrame> {
        let clip = frame.clip_planes().ok_or(RvlError::MissingClipPlanes)?;
        let linearizer = Self::from_clip_planes(clip);
        let pixels = frame
            .pixels()
            .iter()
            .map(|&s| linearizer.linearize(s))
            .collect::<Result<Vec<u16>>>()?;
        Ok(DepthFrame::new(frame.width(), frame.height(), pixels)?.with_clip_planes(Some(clip)))
    }
}

/// Round to the nearest sample. Values within half a step outside the range
/// are clamped; anything further out (or non-finite) is a `RangeError`.
fn quantize(value: f64) -> Result<u16> {
    if !value.is_finite() || !(-0.5..=SAMPLE_MAX + 0.5).contains(&value) {
        return Err(RvlError::RangeError { value });
    }
    Ok(value.round().clamp(0.0, SAMPLE_MAX) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries() {
        let lin = DepthLinearizer::new(0.1, 100.0).unwrap();
        assert_eq!(lin.linearize(0).unwrap(), 65535);
        assert_eq!(lin.linearize(65535).unwrap(), 0);
    }

    #[test]
    fn eye_depth_spans_clip_planes() {
        let lin = DepthLinearizer::new(0.305, 200.0).unwrap();
        assert!((lin.eye_depth(65535) - f64::from(0.305f32)).abs() < 1e-9);
        assert!((lin.eye_depth(0) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn linearize_is_monotonic() {
        let lin = DepthLinearizer::new(0.1, 100.0).unwrap();
        let mut last = u16::MAX;
        for sample in (0..=u16::MAX).step_by(257) {
            let v = lin.linearize(sample).unwrap();
            assert!(v <= last, "sample {sample}");
            last = v;
        }
    }

    #[test]
    fn delinearize_approximately_inverts() {
        let lin = DepthLinearizer::new(1.0, 10.0).unwrap();
        for sample in [0u16, 1000, 30000, 60000, 65535] {
            let back = lin.delinearize(lin.linearize(sample).unwrap()).unwrap();
            assert!(back.abs_diff(sample) <= 16, "{sample} -> {back}");
        }
    }

    #[test]
    fn invalid_planes_rejected() {
        assert!(matches!(
            DepthLinearizer::new(5.0, 1.0),
            Err(RvlError::InvalidClipPlanes { .. })
        ));
    }

    #[test]
    fn quantize_policy() {
        assert_eq!(quantize(-0.4).unwrap(), 0);
        assert_eq!(quantize(65535.4).unwrap(), 65535);
        assert!(matches!(quantize(-3.0), Err(RvlError::RangeError { .. })));
        assert!(matches!(quantize(70000.0), Err(RvlError::RangeError { .. })));
        assert!(matches!(quantize(f64::NAN), Err(RvlError::RangeError { .. })));
    }

    #[test]
    fn frame_needs_clip_planes() {
        let frame = DepthFrame::new(2, 1, vec![0, 65535]).unwrap();
        assert!(matches!(
            DepthLinearizer::linearize_frame(&frame),
            Err(RvlError::MissingClipPlanes)
        ));

        let clip = ClipPlanes::new(0.1, 100.0).unwrap();
        let out = DepthLinearizer::linearize_frame(&frame.with_clip_planes(Some(clip))).unwrap();
        assert_eq!(out.pixels(), &[65535, 0]);
        assert_eq!(out.clip_planes(), Some(clip));
    }

    #[test]
    fn in_place() {
        let lin = DepthLinearizer::new(0.1, 100.0).unwrap();
        let mut buf = [0u16, 65535];
        lin.linearize_in_place(&mut buf).unwrap();
        assert_eq!(buf, [65535, 0]);
    }
}
