//! The per-pixel transform seam and helpers that drive it over spans.

use vhue_core::{Error, ImageBuffer, Result, MAX_CHANNELS, MIN_CHANNELS};

/// A pure colour transform applied independently to each pixel.
///
/// Implementations must be deterministic for fixed inputs, total on every
/// `[u8; 3]`, and free of shared mutable state: workers call [`apply`]
/// concurrently without synchronisation.
///
/// [`apply`]: PixelTransform::apply
pub trait PixelTransform: Send + Sync {
    /// Transforms one RGB triple using the rotation `angle` in degrees.
    fn apply(&self, rgb: [u8; 3], angle: f32) -> [u8; 3];

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<T: PixelTransform + ?Sized> PixelTransform for std::sync::Arc<T> {
    #[inline]
    fn apply(&self, rgb: [u8; 3], angle: f32) -> [u8; 3] {
        (**self).apply(rgb, angle)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Leaves every pixel untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity;

impl PixelTransform for Identity {
    #[inline]
    fn apply(&self, rgb: [u8; 3], _angle: f32) -> [u8; 3] {
        rgb
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Transforms a packed span of pixels from `src` into `dst`.
///
/// Only the first three bytes of each pixel are passed to the transform;
/// a fourth (alpha) byte is copied through.
///
/// # Errors
///
/// [`Error::InvalidConfig`] if `channels` is unsupported, the spans differ in
/// length, or the length is not a whole number of pixels.
pub fn transform_span<T>(transform: &T, src: &[u8], dst: &mut [u8], channels: usize, angle: f32) -> Result<()>
where
    T: PixelTransform + ?Sized,
{
    if !(MIN_CHANNELS..=MAX_CHANNELS).contains(&channels) {
        return Err(Error::invalid_config(format!("unsupported channel count {channels}")));
    }
    if src.len() != dst.len() {
        return Err(Error::BufferSizeMismatch {
            expected: src.len(),
            actual: dst.len(),
        });
    }
    if src.len() % channels != 0 {
        return Err(Error::invalid_config(format!(
            "span of {} bytes is not a whole number of {channels}-byte pixels",
            src.len()
        )));
    }

    for (s, d) in src.chunks_exact(channels).zip(dst.chunks_exact_mut(channels)) {
        let out = transform.apply([s[0], s[1], s[2]], angle);
        d[..3].copy_from_slice(&out);
        d[3..].copy_from_slice(&s[3..]);
    }
    Ok(())
}

/// Transforms a whole image in place on the calling thread.
///
/// This is the single-threaded reference the parallel pipeline must match
/// byte for byte.
pub fn apply_serial<T>(image: &mut ImageBuffer, transform: &T, angle: f32)
where
    T: PixelTransform + ?Sized,
{
    let channels = image.channels();
    for px in image.data_mut().chunks_exact_mut(channels) {
        let out = transform.apply([px[0], px[1], px[2]], angle);
        px[..3].copy_from_slice(&out);
    }
}
