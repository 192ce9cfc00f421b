//! rvl-codec: lossless RVL coding of 16-bit depth frames.
//!
//! The crate provides:
//! - The RVL format: nibble coder, run/delta codec and frame container (`rvl`)
//! - Depth-buffer linearization from clip planes (`depth`)
//! - A raster hand-off seam with a binary PGM writer (`raster`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use rvl_codec::rvl::{self, ClipPlanes, DepthFrame};
//!
//! let pixels = vec![0, 0, 0, 5, 65533, 0, 0, 1200];
//! let frame = DepthFrame::new(4, 2, pixels)
//!     .unwrap()
//!     .with_clip_planes(Some(ClipPlanes::new(0.1, 100.0).unwrap()));
//!
//! let bytes = rvl::encode(&frame);
//! assert!(bytes.starts_with(b"RVL\n"));
//! assert_eq!(rvl::decode(&bytes).unwrap(), frame);
//! ```

pub mod depth;
pub mod error;
pub mod io;
pub mod raster;
pub mod rvl;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Result, RvlError};
