//! # vhue-pool
//!
//! Parallel hue rotation on a fixed pool of persistent worker threads.
//!
//! ## Pipeline
//!
//! ```text
//! ImageBuffer ──▶ partition ──▶ JobQueue ──▶ WorkerPool ──▶ collect ──▶ reconstruct ──▶ Frame
//!      ▲                                                                                 │
//!      └────────────────────── next angle (step, mod 360) ◀──────────────────────────────┘
//! ```
//!
//! - [`Coordinator`] - runs the frame loop and owns everything below
//! - [`JobQueue`] / [`WorkerEndpoint`] - the two ends of the job and result channels
//! - [`WorkerPool`] - long-lived worker threads, idle in a blocking receive
//! - [`reconstruct`] - stitches chunk results into a frame
//! - [`PipelineConfig`] - worker count, step, frame limit, deadlines
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vhue_color::HueShift;
//! use vhue_core::ImageBuffer;
//! use vhue_pool::{Coordinator, PipelineConfig};
//!
//! let config = PipelineConfig {
//!     worker_count: Some(2),
//!     frame_count: Some(3),
//!     ..Default::default()
//! };
//! let mut coord = Coordinator::new(config, HueShift).unwrap();
//! let src = Arc::new(ImageBuffer::from_raw(1, 2, 3, vec![255, 0, 0, 0, 255, 0]).unwrap());
//!
//! let mut angles = Vec::new();
//! let mut sink = |f: &vhue_pool::Frame| -> vhue_core::Result<()> {
//!     angles.push(f.angle);
//!     Ok(())
//! };
//! let summary = coord.run(src, &mut sink).unwrap();
//! assert_eq!(summary.frames, 3);
//! coord.shutdown().unwrap();
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): reconstruct with rayon

#![warn(missing_docs)]

pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod job;
pub mod queue;
pub mod reconstruct;
pub mod worker;

pub use cancel::CancelToken;
pub use config::{available_workers, FrameLimit, PipelineConfig};
pub use coordinator::{Coordinator, CoordinatorState, Frame, FrameSink, RunSummary};
pub use job::{ChunkResult, Job};
pub use queue::{channel, JobQueue, WorkerEndpoint};
pub use reconstruct::reconstruct;
pub use worker::WorkerPool;
