//! Pipeline configuration.
//!
//! ```yaml
//! worker_count: 8          # omit for one worker per hardware thread
//! rotation_step: 3.6       # degrees added per frame
//! initial_angle: 0.0
//! frame_count: 100         # or: run_forever: true
//! partition: balanced      # or: exact
//! queue_capacity: 16       # omit for an unbounded job queue
//! collect_timeout_ms: 2000 # omit to wait indefinitely
//! ```
//!
//! Setting `worker_count` well above the number of hardware threads does
//! not add throughput. It adds context switching and can make the rest of
//! the system unresponsive. The value is not capped, but a warning is logged
//! beyond [`OVERSUBSCRIBE_FACTOR`] times the hardware count.

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vhue_core::{Error, PartitionPolicy, Result};

/// Degrees per frame by default: one hundredth of a turn.
pub const DEFAULT_ROTATION_STEP: f32 = 3.6;

/// Frames rendered when neither `frame_count` nor `run_forever` is set.
pub const DEFAULT_FRAME_COUNT: u64 = 100;

/// Worker counts above this multiple of hardware threads log a warning.
pub const OVERSUBSCRIBE_FACTOR: usize = 3;

/// Number of hardware threads, or 1 if it cannot be determined.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// How many frames a run emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLimit {
    /// Stop after this many frames.
    Count(u64),
    /// Run until cancelled.
    Forever,
}

/// Options recognised by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Parallel workers. `None` uses [`available_workers`].
    pub worker_count: Option<usize>,
    /// Angle increment in degrees applied after each emitted frame.
    pub rotation_step: f32,
    /// Angle of the first frame, in degrees.
    pub initial_angle: f32,
    /// Frames to emit. Mutually exclusive with `run_forever`.
    pub frame_count: Option<u64>,
    /// Emit frames until cancelled.
    pub run_forever: bool,
    /// How rows are spread across workers.
    pub partition: PartitionPolicy,
    /// Bound on queued jobs. `None` is unbounded.
    pub queue_capacity: Option<usize>,
    /// Per-frame collection deadline in milliseconds. `None` waits forever.
    pub collect_timeout_ms: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            rotation_step: DEFAULT_ROTATION_STEP,
            initial_angle: 0.0,
            frame_count: None,
            run_forever: false,
            partition: PartitionPolicy::Balanced,
            queue_capacity: None,
            collect_timeout_ms: None,
        }
    }
}

impl PipelineConfig {
    /// Parses a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::invalid_config(format!("bad pipeline config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
            .map_err(|e| Error::invalid_config(format!("{}: {e}", path.display())))
    }

    /// Checks every option without spawning anything.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == Some(0) {
            return Err(Error::invalid_config("worker_count must be > 0"));
        }
        if self.queue_capacity == Some(0) {
            return Err(Error::invalid_config("queue_capacity must be > 0"));
        }
        if !self.rotation_step.is_finite() {
            return Err(Error::invalid_config("rotation_step must be finite"));
        }
        if !self.initial_angle.is_finite() {
            return Err(Error::invalid_config("initial_angle must be finite"));
        }
        if self.run_forever && self.frame_count.is_some() {
            return Err(Error::invalid_config("frame_count and run_forever are mutually exclusive"));
        }
        Ok(())
    }

    /// Worker count after applying the hardware default.
    pub fn effective_workers(&self) -> usize {
        self.worker_count.unwrap_or_else(available_workers)
    }

    /// Collection deadline, if configured.
    pub fn collect_timeout(&self) -> Option<Duration> {
        self.collect_timeout_ms.map(Duration::from_millis)
    }

    /// Frame limit after applying defaults.
    pub fn frame_limit(&self) -> FrameLimit {
        if self.run_forever {
            FrameLimit::Forever
        } else {
            FrameLimit::Count(self.frame_count.unwrap_or(DEFAULT_FRAME_COUNT))
        }
    }

    /// Returns `true` if `worker_count` exceeds the oversubscription threshold.
    pub fn is_oversubscribed(&self) -> bool {
        self.effective_workers() > available_workers() * OVERSUBSCRIBE_FACTOR
    }
}
