//! Reassembles chunk results into a full frame.
//!
//! Each result owns the bytes of one chunk. The output buffer is cut into
//! per-chunk regions with `split_at_mut`, so every copy targets a slice no
//! other copy can touch. The copies then run in any order, in parallel when
//! the `parallel` feature is enabled, with no locking.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[allow(unused_imports)]
use tracing::{debug, trace};
use vhue_core::{ChunkLayout, Error, ImageBuffer, Result};

use crate::job::ChunkResult;

/// Writes every result back to its chunk's position in a new image.
///
/// `results` may arrive in any order; the output is byte-identical for every
/// permutation.
///
/// # Errors
///
/// - [`Error::ProtocolViolation`] if a result names a chunk outside `layout`,
///   repeats a chunk, or carries the wrong number of bytes
/// - [`Error::IncompleteFrame`] if any chunk of `layout` has no result
///
/// # Example
///
/// ```rust
/// use vhue_core::{ChunkLayout, PartitionPolicy};
/// use vhue_pool::{reconstruct, ChunkResult};
///
/// let layout = ChunkLayout::new(1, 2, 3, 2, PartitionPolicy::Balanced).unwrap();
/// let results = vec![
///     ChunkResult { frame: 0, chunk_index: 1, pixels: vec![4, 5, 6] },
///     ChunkResult { frame: 0, chunk_index: 0, pixels: vec![1, 2, 3] },
/// ];
/// let img = reconstruct(results, &layout).unwrap();
/// assert_eq!(img.data(), &[1, 2, 3, 4, 5, 6]);
/// ```
pub fn reconstruct(results: Vec<ChunkResult>, layout: &ChunkLayout) -> Result<ImageBuffer> {
    let ordered = order_results(results, layout)?;

    let stride = layout.row_stride();
    let mut out = vec![0u8; stride * layout.height()];

    let mut regions = Vec::with_capacity(layout.len());
    let mut rest = out.as_mut_slice();
    for chunk in layout.chunks() {
        let (region, tail) = std::mem::take(&mut rest).split_at_mut(chunk.byte_len(stride));
        regions.push(region);
        rest = tail;
    }
    debug_assert!(rest.is_empty());

    copy_regions(regions, &ordered);
    trace!(chunks = ordered.len(), bytes = out.len(), "frame reconstructed");

    ImageBuffer::from_raw(layout.width(), layout.height(), layout.channels(), out)
}

/// Validates results against the layout and sorts them by chunk index.
fn order_results(results: Vec<ChunkResult>, layout: &ChunkLayout) -> Result<Vec<ChunkResult>> {
    let mut slots: Vec<Option<ChunkResult>> = (0..layout.len()).map(|_| None).collect();

    for result in results {
        let idx = result.chunk_index;
        let chunk = layout.get(idx).ok_or_else(|| {
            Error::protocol(format!("chunk {idx} outside layout of {} chunks", layout.len()))
        })?;
        let expected = layout.chunk_bytes(chunk);
        if result.pixels.len() != expected {
            return Err(Error::protocol(format!(
                "chunk {idx} carries {} bytes, expected {expected}",
                result.pixels.len()
            )));
        }
        if slots[idx].is_some() {
            return Err(Error::protocol(format!("chunk {idx} delivered twice")));
        }
        slots[idx] = Some(result);
    }

    let missing: Vec<usize> = slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_none())
        .map(|(i, _)| i)
        .collect();
    if !missing.is_empty() {
        debug!(?missing, "cannot reconstruct frame");
        return Err(Error::IncompleteFrame { missing });
    }

    Ok(slots.into_iter().flatten().collect())
}

#[cfg(feature = "parallel")]
fn copy_regions(regions: Vec<&mut [u8]>, results: &[ChunkResult]) {
    regions
        .into_par_iter()
        .zip(results.par_iter())
        .for_each(|(dst, src)| dst.copy_from_slice(&src.pixels));
}

#[cfg(not(feature = "parallel"))]
fn copy_regions(regions: Vec<&mut [u8]>, results: &[ChunkResult]) {
    for (dst, src) in regions.into_iter().zip(results) {
        dst.copy_from_slice(&src.pixels);
    }
}
