//! # vhue-color
//!
//! Per-pixel colour transforms for the vhue pipeline.
//!
//! The pipeline only needs a pure `transform(pixel, angle) -> pixel`
//! function, expressed here as the [`PixelTransform`] trait. Two
//! implementations ship with the crate:
//!
//! - [`HueShift`] - rotates hue in HSV space, angle in degrees
//! - [`Identity`] - no-op, used to check partitioning and reassembly
//!
//! # Example
//!
//! ```rust
//! use vhue_color::{apply_serial, HueShift};
//! use vhue_core::ImageBuffer;
//!
//! let mut img = ImageBuffer::from_raw(1, 1, 3, vec![255, 0, 0]).unwrap();
//! apply_serial(&mut img, &HueShift, 240.0);
//! assert_eq!(img.data(), &[0, 0, 255]);
//! ```

#![warn(missing_docs)]

pub mod hsv;
pub mod transform;

pub use hsv::{normalize_angle, HueShift};
pub use transform::{apply_serial, transform_span, Identity, PixelTransform};
