//! HSV hue rotation.
//!
//! Each pixel is taken to HSV, its hue is advanced by the rotation angle
//! (wrapping at 360°), and it is converted back. Saturation and value are
//! left alone, so greys stay grey and brightness is preserved.

use crate::PixelTransform;

/// Hue rotation in HSV space.
///
/// The angle is in degrees. Any multiple of 360° is exactly the identity:
/// the transform short-circuits instead of round-tripping through floats.
///
/// # Example
///
/// ```rust
/// use vhue_color::{HueShift, PixelTransform};
///
/// let shift = HueShift;
/// assert_eq!(shift.apply([255, 0, 0], 120.0), [0, 255, 0]);
/// assert_eq!(shift.apply([12, 34, 56], 360.0), [12, 34, 56]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HueShift;

impl PixelTransform for HueShift {
    #[inline]
    fn apply(&self, rgb: [u8; 3], angle: f32) -> [u8; 3] {
        let shift = normalize_angle(angle);
        if shift == 0.0 {
            return rgb;
        }

        let [r, g, b] = rgb.map(|c| c as f32 / 255.0);
        let (h, s, v) = rgb_to_hsv(r, g, b);
        if s == 0.0 {
            // Achromatic: hue is undefined, rotation is a no-op
            return rgb;
        }

        let h = (h + shift).rem_euclid(360.0);
        hsv_to_rgb(h, s, v).map(to_u8)
    }

    fn name(&self) -> &'static str {
        "hsv"
    }
}

/// Maps any angle in degrees into `[0, 360)`.
///
/// Non-finite angles map to `0.0` so the transform stays total.
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let a = angle.rem_euclid(360.0);
    // rem_euclid can round up to the modulus for tiny negative inputs
    if a >= 360.0 { 0.0 } else { a }
}

/// Convert RGB in `[0, 1]` to HSV with hue in degrees `[0, 360)`.
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max } else { 0.0 };

    if delta == 0.0 {
        return (0.0, s, v);
    }

    let h = if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    (h.rem_euclid(360.0), s, v)
}

/// Convert HSV (hue in degrees) to RGB in `[0, 1]`.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let c = v * s;
    let h_prime = h / 60.0;
    let x = c * (1.0 - ((h_prime % 2.0) - 1.0).abs());

    let (r1, g1, b1) = if h_prime < 1.0 {
        (c, x, 0.0)
    } else if h_prime < 2.0 {
        (x, c, 0.0)
    } else if h_prime < 3.0 {
        (0.0, c, x)
    } else if h_prime < 4.0 {
        (0.0, x, c)
    } else if h_prime < 5.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    let m = v - c;
    [r1 + m, g1 + m, b1 + m]
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}
