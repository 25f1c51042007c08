//! Packed 8-bit image buffer.
//!
//! [`ImageBuffer`] is the only pixel container in the pipeline. It owns a
//! flat row-major byte array:
//!
//! ```text
//! Memory: [R G B R G B R G B ...]  ← Row 0
//!         [R G B R G B R G B ...]  ← Row 1
//!         ...
//! ```
//!
//! RGBA buffers interleave alpha (`[R G B A R G B A ...]`). Rows are tightly
//! packed: the stride is always `width * channels`.
//!
//! # Usage
//!
//! ```rust
//! use vhue_core::ImageBuffer;
//!
//! let img = ImageBuffer::from_raw(4, 2, 3, vec![0u8; 24]).unwrap();
//! assert_eq!(img.row_stride(), 12);
//! assert_eq!(img.rows(1, 1).unwrap().len(), 12);
//! ```

use crate::{Error, Result};

/// Smallest supported channel count (RGB).
pub const MIN_CHANNELS: usize = 3;
/// Largest supported channel count (RGBA).
pub const MAX_CHANNELS: usize = 4;

/// Owned packed pixel buffer with its dimensions.
///
/// Invariant: `data.len() == width * height * channels`, with
/// `width > 0`, `height > 0` and `channels` in `3..=4`.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    data: Vec<u8>,
    width: usize,
    height: usize,
    channels: usize,
}

/// Returns `width * height * channels`, rejecting zero or overflowing shapes.
pub fn buffer_len(width: usize, height: usize, channels: usize) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(Error::invalid_config(format!(
            "image dimensions must be > 0, got {width}x{height}"
        )));
    }
    if !(MIN_CHANNELS..=MAX_CHANNELS).contains(&channels) {
        return Err(Error::invalid_config(format!(
            "expected {MIN_CHANNELS} or {MAX_CHANNELS} channels, got {channels}"
        )));
    }
    width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(channels))
        .ok_or_else(|| Error::invalid_config(format!("image dimensions overflow: {width}x{height}x{channels}")))
}

impl ImageBuffer {
    /// Wraps raw pixel data, validating it against the descriptor.
    pub fn from_raw(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        let expected = buffer_len(width, height, channels)?;
        if data.len() != expected {
            return Err(Error::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// Allocates a zero-filled buffer.
    pub fn new(width: usize, height: usize, channels: usize) -> Result<Self> {
        let len = buffer_len(width, height, channels)?;
        Ok(Self {
            data: vec![0; len],
            width,
            height,
            channels,
        })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels (rows).
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Bytes per pixel.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// `(width, height, channels)`.
    #[inline]
    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.channels)
    }

    /// Bytes per row.
    #[inline]
    pub fn row_stride(&self) -> usize {
        self.width * self.channels
    }

    /// Whole pixel buffer.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whole pixel buffer, mutable.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consumes the image and returns the raw bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Read-only view of `row_count` rows starting at `row_start`.
    ///
    /// Returns [`Error::InvalidConfig`] if the span leaves the image.
    pub fn rows(&self, row_start: usize, row_count: usize) -> Result<&[u8]> {
        let stride = self.row_stride();
        let end = row_start
            .checked_add(row_count)
            .filter(|&end| end <= self.height)
            .ok_or_else(|| {
                Error::invalid_config(format!(
                    "rows {row_start}..{} outside image height {}",
                    row_start.saturating_add(row_count),
                    self.height
                ))
            })?;
        Ok(&self.data[row_start * stride..end * stride])
    }

    /// Returns `true` if `other` has the same width, height and channels.
    #[inline]
    pub fn same_shape(&self, other: &ImageBuffer) -> bool {
        self.dimensions() == other.dimensions()
    }

    /// Size in bytes.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}
