//! # vhue-core
//!
//! Core types for parallel hue rotation.
//!
//! - [`ImageBuffer`] - packed 8-bit RGB/RGBA buffer with its dimensions
//! - [`Chunk`], [`ChunkLayout`] - row-contiguous units of work
//! - [`partition`] - splits an image's rows across N workers
//! - [`Error`], [`Result`] - error taxonomy shared by every vhue crate
//!
//! ## Crate Structure
//!
//! ```text
//! vhue-core (this crate)
//!    ^
//!    |
//!    +-- vhue-color (pixel transforms)
//!    +-- vhue-pool  (job queue, workers, reconstruction, coordinator)
//!    +-- vhue-cli   (command line front end)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod chunk;
pub mod error;
pub mod image;

pub use chunk::{partition, partition_with, Chunk, ChunkLayout, PartitionPolicy};
pub use error::{Error, Result};
pub use image::{ImageBuffer, MAX_CHANNELS, MIN_CHANNELS};
