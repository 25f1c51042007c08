//! Units of work exchanged between the coordinator and the workers.

use std::sync::Arc;

use vhue_color::{transform_span, PixelTransform};
use vhue_core::{Chunk, ImageBuffer, Result};

/// One chunk of one frame, ready to be transformed.
///
/// Immutable once created. The source image is shared read-only through an
/// [`Arc`]; the job only ever reads the rows its chunk covers.
#[derive(Debug, Clone)]
pub struct Job {
    frame: u64,
    chunk: Chunk,
    angle: f32,
    source: Arc<ImageBuffer>,
}

impl Job {
    /// Creates a job for `chunk` of `frame` at the given rotation angle.
    pub fn new(frame: u64, chunk: Chunk, angle: f32, source: Arc<ImageBuffer>) -> Self {
        Self {
            frame,
            chunk,
            angle,
            source,
        }
    }

    /// Frame this job belongs to.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Rows this job covers.
    #[inline]
    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    /// Rotation angle in degrees.
    #[inline]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Read-only view of the chunk's source rows.
    pub fn source_rows(&self) -> Result<&[u8]> {
        self.source.rows(self.chunk.row_start, self.chunk.row_count)
    }

    /// Transforms the chunk into a freshly allocated result buffer.
    pub fn run<T>(&self, transform: &T) -> Result<ChunkResult>
    where
        T: PixelTransform + ?Sized,
    {
        let src = self.source_rows()?;
        let mut pixels = vec![0u8; src.len()];
        transform_span(transform, src, &mut pixels, self.source.channels(), self.angle)?;
        Ok(ChunkResult {
            frame: self.frame,
            chunk_index: self.chunk.index,
            pixels,
        })
    }
}

/// Transformed pixels of one chunk, tagged with where they belong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    /// Frame the originating job belonged to.
    pub frame: u64,
    /// Index of the chunk in the frame's layout.
    pub chunk_index: usize,
    /// `row_count * width * channels` transformed bytes.
    pub pixels: Vec<u8>,
}

/// What a worker sends back for each job it takes.
#[derive(Debug)]
pub(crate) enum WorkerReport {
    Done(ChunkResult),
    Failed {
        worker: usize,
        frame: u64,
        chunk: usize,
        reason: String,
    },
}
