//! Error types for the hue rotation pipeline.
//!
//! One error enum is shared by every vhue crate so a failure raised deep in
//! the worker pool reaches the caller without re-wrapping.
//!
//! # Categories
//!
//! - **Configuration**: [`InvalidConfig`](Error::InvalidConfig),
//!   [`BufferSizeMismatch`](Error::BufferSizeMismatch). Raised before any
//!   worker is spawned.
//! - **Dispatch faults**: [`ProtocolViolation`](Error::ProtocolViolation),
//!   [`WorkerFailed`](Error::WorkerFailed), [`Disconnected`](Error::Disconnected),
//!   [`Io`](Error::Io).
//!   Fatal for the run.
//! - **Frame faults**: [`IncompleteFrame`](Error::IncompleteFrame) is fatal for
//!   the frame, [`Timeout`](Error::Timeout) is recoverable by the caller.
//!
//! # Usage
//!
//! ```rust
//! use vhue_core::{Error, Result};
//!
//! fn check_workers(n: usize) -> Result<()> {
//!     if n == 0 {
//!         return Err(Error::invalid_config("worker_count must be > 0"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_workers(0).unwrap_err().is_fatal());
//! ```

use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while partitioning, dispatching or reassembling a frame.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad worker count, dimensions or channel layout.
    ///
    /// Always detected before any worker is spawned or any job submitted.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raw pixel data does not match `width * height * channels`.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch {
        /// Bytes implied by the descriptor
        expected: usize,
        /// Bytes actually supplied
        actual: usize,
    },

    /// A result arrived that no submitted job can account for.
    ///
    /// Duplicate chunk indices, indices outside the layout and results whose
    /// payload length disagrees with their chunk all land here. This means
    /// the coordinator and the workers disagree about the frame and the run
    /// cannot continue.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Reconstruction was attempted without a result for every chunk.
    #[error("incomplete frame: missing chunks {missing:?}")]
    IncompleteFrame {
        /// Chunk indices with no matching result
        missing: Vec<usize>,
    },

    /// The collection deadline elapsed before every chunk reported back.
    #[error("timed out after {elapsed:?} waiting for frame {frame} ({received}/{expected} chunks)")]
    Timeout {
        /// Frame being collected
        frame: u64,
        /// Distinct chunks received before the deadline
        received: usize,
        /// Chunks submitted for the frame
        expected: usize,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// A worker's transform panicked while processing a chunk.
    #[error("worker {worker} failed on chunk {chunk}: {reason}")]
    WorkerFailed {
        /// Worker id
        worker: usize,
        /// Chunk being processed
        chunk: usize,
        /// Panic payload, if it was a string
        reason: String,
    },

    /// Every worker is gone, so jobs can no longer be delivered.
    #[error("worker pool disconnected")]
    Disconnected,

    /// The run was cancelled while a frame was in flight.
    #[error("cancelled")]
    Cancelled,

    /// The external frame sink rejected a frame.
    #[error("frame sink failed: {0}")]
    Sink(String),

    /// I/O error, e.g. the OS refused to spawn a worker thread.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates an [`Error::InvalidConfig`] error.
    #[inline]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates an [`Error::ProtocolViolation`] error.
    #[inline]
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolViolation(msg.into())
    }

    /// Creates an [`Error::Sink`] error.
    #[inline]
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Returns `true` if the caller may retry the frame.
    ///
    /// Only [`Timeout`](Error::Timeout) qualifies: the workers are still
    /// alive and late results for the abandoned frame are discarded.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the run must be aborted.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable() && !matches!(self, Self::Cancelled)
    }
}
