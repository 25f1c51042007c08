//! Row-contiguous work chunks and the partitioner that produces them.
//!
//! An image of `height` rows is cut into horizontal bands, one per worker:
//!
//! ```text
//! height = 10, workers = 4  →  base = 2, remainder = 2
//!
//! row 0 ┐ chunk 0 (3 rows)
//! row 2 ┘
//! row 3 ┐ chunk 1 (3 rows)
//! row 5 ┘
//! row 6 ┐ chunk 2 (2 rows)
//! row 7 ┘
//! row 8 ┐ chunk 3 (2 rows)
//! row 9 ┘
//! ```
//!
//! The bands cover `[0, height)` exactly, in ascending `index` order, and
//! none is empty. A [`ChunkLayout`] pairs the bands with the image shape they
//! were computed for so the coordinator can reuse it across frames.

use serde::{Deserialize, Serialize};

use crate::image::buffer_len;
use crate::{Error, ImageBuffer, Result};

/// A contiguous span of image rows processed as one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    /// Position in the layout (0-based, ascending with `row_start`).
    pub index: usize,
    /// First row covered.
    pub row_start: usize,
    /// Number of rows covered (always ≥ 1).
    pub row_count: usize,
}

impl Chunk {
    /// One past the last row covered.
    #[inline]
    pub fn row_end(&self) -> usize {
        self.row_start + self.row_count
    }

    /// Byte offset of the chunk inside a buffer with the given row stride.
    #[inline]
    pub fn byte_offset(&self, row_stride: usize) -> usize {
        self.row_start * row_stride
    }

    /// Byte length of the chunk for the given row stride.
    #[inline]
    pub fn byte_len(&self, row_stride: usize) -> usize {
        self.row_count * row_stride
    }
}

/// How rows are spread across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionPolicy {
    /// Near-equal bands: the first `height % n` chunks get one extra row.
    #[default]
    Balanced,
    /// Strictly equal bands; fails unless `height` divides evenly.
    Exact,
}

/// Splits `height` rows into near-equal chunks for `worker_count` workers.
///
/// Shorthand for [`partition_with`] using [`PartitionPolicy::Balanced`].
///
/// # Example
///
/// ```rust
/// use vhue_core::partition;
///
/// let chunks = partition(2, 2).unwrap();
/// assert_eq!((chunks[0].row_start, chunks[0].row_count), (0, 1));
/// assert_eq!((chunks[1].row_start, chunks[1].row_count), (1, 1));
/// ```
pub fn partition(height: usize, worker_count: usize) -> Result<Vec<Chunk>> {
    partition_with(height, worker_count, PartitionPolicy::Balanced)
}

/// Splits `height` rows into chunks according to `policy`.
///
/// When `worker_count > height` the effective count is clamped to `height`
/// so that every chunk keeps at least one row.
///
/// # Errors
///
/// [`Error::InvalidConfig`] if either argument is zero, or if `policy` is
/// [`PartitionPolicy::Exact`] and the rows do not divide evenly.
pub fn partition_with(height: usize, worker_count: usize, policy: PartitionPolicy) -> Result<Vec<Chunk>> {
    if worker_count == 0 {
        return Err(Error::invalid_config("worker_count must be > 0"));
    }
    if height == 0 {
        return Err(Error::invalid_config("height must be > 0"));
    }

    let n = worker_count.min(height);
    let base = height / n;
    let remainder = height % n;

    if policy == PartitionPolicy::Exact && remainder != 0 {
        return Err(Error::invalid_config(format!(
            "{height} rows cannot be split equally across {n} workers"
        )));
    }

    let mut chunks = Vec::with_capacity(n);
    let mut row_start = 0;
    for index in 0..n {
        let row_count = base + usize::from(index < remainder);
        chunks.push(Chunk {
            index,
            row_start,
            row_count,
        });
        row_start += row_count;
    }
    debug_assert_eq!(row_start, height);

    Ok(chunks)
}

/// Chunk boundaries bound to the image shape and pool size they were computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLayout {
    width: usize,
    height: usize,
    channels: usize,
    worker_count: usize,
    policy: PartitionPolicy,
    chunks: Vec<Chunk>,
}

impl ChunkLayout {
    /// Computes the layout for an image shape and a requested worker count.
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        worker_count: usize,
        policy: PartitionPolicy,
    ) -> Result<Self> {
        buffer_len(width, height, channels)?;
        let chunks = partition_with(height, worker_count, policy)?;
        Ok(Self {
            width,
            height,
            channels,
            worker_count,
            policy,
            chunks,
        })
    }

    /// Computes the layout for `image`.
    pub fn for_image(image: &ImageBuffer, worker_count: usize, policy: PartitionPolicy) -> Result<Self> {
        let (w, h, c) = image.dimensions();
        Self::new(w, h, c, worker_count, policy)
    }

    /// Returns `true` if this layout can be reused for `image` on a pool of `worker_count`.
    pub fn matches(&self, image: &ImageBuffer, worker_count: usize) -> bool {
        image.dimensions() == (self.width, self.height, self.channels)
            && worker_count == self.worker_count
    }

    /// Chunks in ascending index order.
    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of chunks (the effective worker count).
    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Always `false`: a valid layout has at least one chunk.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// Image width the layout was computed for.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height the layout was computed for.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Channel count the layout was computed for.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Worker count requested when the layout was computed.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Policy used to split the rows.
    #[inline]
    pub fn policy(&self) -> PartitionPolicy {
        self.policy
    }

    /// Bytes per row.
    #[inline]
    pub fn row_stride(&self) -> usize {
        self.width * self.channels
    }

    /// Expected payload size of the result for `chunk`.
    #[inline]
    pub fn chunk_bytes(&self, chunk: &Chunk) -> usize {
        chunk.byte_len(self.row_stride())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_invariants(chunks: &[Chunk], height: usize) {
        let mut next = 0;
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert_eq!(c.row_start, next, "gap or overlap before chunk {i}");
            assert!(c.row_count >= 1);
            next = c.row_end();
        }
        assert_eq!(next, height);
    }

    #[test]
    fn test_partition_covers_all_rows() {
        for height in 1..=40 {
            for workers in 1..=45 {
                let chunks = partition(height, workers).unwrap();
                check_invariants(&chunks, height);
                assert_eq!(chunks.len(), workers.min(height));

                let min = chunks.iter().map(|c| c.row_count).min().unwrap();
                let max = chunks.iter().map(|c| c.row_count).max().unwrap();
                assert!(max - min <= 1, "unbalanced {height}/{workers}");
            }
        }
    }

    #[test]
    fn test_remainder_goes_to_first_chunks() {
        let chunks = partition(10, 4).unwrap();
        let counts: Vec<_> = chunks.iter().map(|c| c.row_count).collect();
        assert_eq!(counts, vec![3, 3, 2, 2]);
        assert_eq!(chunks[2].row_start, 6);
    }

    #[test]
    fn test_clamps_workers_to_height() {
        let chunks = partition(3, 8).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.row_count == 1));
    }

    #[test]
    fn test_rejects_zero() {
        assert!(matches!(partition(0, 4), Err(Error::InvalidConfig(_))));
        assert!(matches!(partition(4, 0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(partition(1081, 16).unwrap(), partition(1081, 16).unwrap());
    }

    #[test]
    fn test_exact_policy() {
        let chunks = partition_with(12, 4, PartitionPolicy::Exact).unwrap();
        assert!(chunks.iter().all(|c| c.row_count == 3));
        assert!(partition_with(10, 4, PartitionPolicy::Exact).is_err());
        // Clamped count always divides evenly
        assert_eq!(partition_with(3, 7, PartitionPolicy::Exact).unwrap().len(), 3);
    }

    #[test]
    fn test_layout_matches() {
        let img = ImageBuffer::new(4, 2, 3).unwrap();
        let layout = ChunkLayout::for_image(&img, 2, PartitionPolicy::Balanced).unwrap();
        assert!(layout.matches(&img, 2));
        assert!(!layout.matches(&img, 3));

        let other = ImageBuffer::new(4, 3, 3).unwrap();
        assert!(!layout.matches(&other, 2));

        assert_eq!(layout.row_stride(), 12);
        assert_eq!(layout.chunk_bytes(&layout.chunks()[1]), 12);
        assert_eq!(layout.chunks()[1].byte_offset(layout.row_stride()), 12);
    }
}
