//! Frame loop driving the worker pool.
//!
//! One frame moves through these states:
//!
//! ```text
//! Idle ──▶ Dispatching ──▶ Collecting ──▶ Reconstructing ──▶ Idle
//!   │           │               │                │
//!   └───────────┴───── cancel ──┴────────────────┴──▶ ShuttingDown
//! ```
//!
//! - **Dispatching**: reuse the cached [`ChunkLayout`] (recomputed when the
//!   image shape or worker count changes) and submit one job per chunk.
//! - **Collecting**: wait for one result per chunk, with an optional deadline.
//! - **Reconstructing**: stitch the results into the output frame.
//!
//! Frame N is fully reconstructed before frame N+1 is dispatched. A failed
//! frame returns the coordinator to `Idle` without emitting anything.
//! Pausing through the [`CancelToken`] takes effect between frames.

use std::sync::Arc;

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};
use vhue_color::{normalize_angle, PixelTransform};
use vhue_core::{ChunkLayout, Error, ImageBuffer, Result};

use crate::cancel::CancelToken;
use crate::config::{available_workers, FrameLimit, PipelineConfig, OVERSUBSCRIBE_FACTOR};
use crate::job::{ChunkResult, Job};
use crate::queue::{channel, JobQueue};
use crate::reconstruct::reconstruct;
use crate::worker::WorkerPool;

/// Where the coordinator is in the frame cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Between frames.
    Idle,
    /// Submitting jobs for the current frame.
    Dispatching,
    /// Waiting for chunk results.
    Collecting,
    /// Writing results into the output buffer.
    Reconstructing,
    /// Cancelled or shut down. No further frames are produced.
    ShuttingDown,
}

/// One rendered frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position in the emitted sequence, starting at 0.
    pub index: u64,
    /// Hue rotation applied, in degrees.
    pub angle: f32,
    /// Transformed pixels.
    pub image: ImageBuffer,
}

/// Consumer of rendered frames.
///
/// Implemented for any `FnMut(&Frame) -> Result<()>`, so a closure is enough
/// in most cases. An error from the sink aborts the run.
pub trait FrameSink {
    /// Receives one frame.
    fn emit(&mut self, frame: &Frame) -> Result<()>;
}

impl<F: FnMut(&Frame) -> Result<()>> FrameSink for F {
    fn emit(&mut self, frame: &Frame) -> Result<()> {
        self(frame)
    }
}

/// Outcome of [`Coordinator::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Frames handed to the sink.
    pub frames: u64,
    /// Angle the next frame would have used.
    pub final_angle: f32,
    /// `true` if the run stopped because of cancellation.
    pub cancelled: bool,
}

/// Splits frames into chunks, farms them out and reassembles the results.
pub struct Coordinator {
    config: PipelineConfig,
    workers: usize,
    queue: JobQueue,
    pool: Option<WorkerPool>,
    layout: Option<ChunkLayout>,
    state: CoordinatorState,
    angle: f32,
    next_frame: u64,
    emitted: u64,
    cancel: CancelToken,
}

impl Coordinator {
    /// Validates `config` and starts the worker pool.
    pub fn new<T>(config: PipelineConfig, transform: T) -> Result<Self>
    where
        T: PixelTransform + 'static,
    {
        Self::with_transform(config, Arc::new(transform))
    }

    /// Like [`new`](Self::new), for a transform that is already shared.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] before any thread is spawned if `config` is
    /// invalid. [`Error::Io`] if the OS refuses a worker thread.
    pub fn with_transform(config: PipelineConfig, transform: Arc<dyn PixelTransform>) -> Result<Self> {
        config.validate()?;
        let workers = config.effective_workers();
        if config.is_oversubscribed() {
            warn!(
                workers,
                hardware = available_workers(),
                "worker_count exceeds {OVERSUBSCRIBE_FACTOR}x hardware threads; expect contention"
            );
        }

        let (queue, endpoint) = channel(config.queue_capacity)?;
        let pool = WorkerPool::spawn(workers, &queue, endpoint, transform)?;
        let angle = normalize_angle(config.initial_angle);

        debug!(workers, angle, step = config.rotation_step, "coordinator ready");
        Ok(Self {
            config,
            workers,
            queue,
            pool: Some(pool),
            layout: None,
            state: CoordinatorState::Idle,
            angle,
            next_frame: 0,
            emitted: 0,
            cancel: CancelToken::new(),
        })
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Angle the next [`render_frame`](Self::render_frame) will use.
    #[inline]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Number of workers in the pool.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Configuration in effect.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Layout used by the most recent frame, if any.
    pub fn layout(&self) -> Option<&ChunkLayout> {
        self.layout.as_ref()
    }

    /// Handle that cancels this coordinator from any thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Renders `source` rotated by `angle` degrees.
    ///
    /// Does not touch the running angle. On any error the coordinator returns
    /// to `Idle` (or `ShuttingDown` when cancelled) and no output is produced.
    pub fn render_at(&mut self, source: &Arc<ImageBuffer>, angle: f32) -> Result<ImageBuffer> {
        if self.cancel.is_cancelled() {
            self.state = CoordinatorState::ShuttingDown;
            return Err(Error::Cancelled);
        }
        if self.pool.is_none() {
            return Err(Error::Disconnected);
        }

        let outcome = self.render_inner(source, angle);
        self.state = match &outcome {
            Err(Error::Cancelled) => CoordinatorState::ShuttingDown,
            _ => CoordinatorState::Idle,
        };
        outcome
    }

    fn render_inner(&mut self, source: &Arc<ImageBuffer>, angle: f32) -> Result<ImageBuffer> {
        self.state = CoordinatorState::Dispatching;
        let layout = match self.layout.take() {
            Some(layout) if layout.matches(source, self.workers) => layout,
            _ => {
                let layout = ChunkLayout::for_image(source, self.workers, self.config.partition)?;
                debug!(
                    width = layout.width(),
                    height = layout.height(),
                    channels = layout.channels(),
                    chunks = layout.len(),
                    "chunk layout computed"
                );
                layout
            }
        };

        let frame = self.next_frame;
        self.next_frame += 1;
        let collected = self.dispatch_and_collect(frame, angle, source, &layout);
        let result = collected.and_then(|results| {
            self.state = CoordinatorState::Reconstructing;
            reconstruct(results, &layout)
        });
        self.layout = Some(layout);
        result
    }

    fn dispatch_and_collect(
        &mut self,
        frame: u64,
        angle: f32,
        source: &Arc<ImageBuffer>,
        layout: &ChunkLayout,
    ) -> Result<Vec<ChunkResult>> {
        for chunk in layout.chunks() {
            self.queue.submit(Job::new(frame, *chunk, angle, Arc::clone(source)))?;
        }
        trace!(frame, jobs = layout.len(), angle, "frame dispatched");

        self.state = CoordinatorState::Collecting;
        self.queue
            .collect_until(frame, layout.len(), self.config.collect_timeout(), &self.cancel)
    }

    /// Renders the next frame at the running angle, then advances the angle
    /// by `rotation_step` modulo 360.
    ///
    /// The angle only advances when a frame is produced, so a timed out frame
    /// can be retried by calling this again.
    pub fn render_frame(&mut self, source: &Arc<ImageBuffer>) -> Result<Frame> {
        let angle = self.angle;
        let image = self.render_at(source, angle)?;
        let frame = Frame {
            index: self.emitted,
            angle,
            image,
        };
        self.emitted += 1;
        self.angle = normalize_angle(angle + self.config.rotation_step);
        Ok(frame)
    }

    /// Renders frames into `sink` until the configured frame limit is reached
    /// or the run is cancelled.
    ///
    /// A paused [`CancelToken`] holds the loop at the next frame boundary.
    /// Cancellation is not an error: the pool is stopped, in-flight results
    /// are drained and the summary reports `cancelled: true`.
    ///
    /// A recoverable error ([`Error::Timeout`]) is returned with the pool
    /// still running, so the caller can retry with
    /// [`render_frame`](Self::render_frame) or call `run` again. Any other
    /// error stops the pool first.
    pub fn run<S>(&mut self, source: Arc<ImageBuffer>, sink: &mut S) -> Result<RunSummary>
    where
        S: FrameSink + ?Sized,
    {
        let limit = self.config.frame_limit();
        info!(
            width = source.width(),
            height = source.height(),
            workers = self.workers,
            ?limit,
            "run started"
        );

        let mut frames = 0;
        let mut cancelled = false;
        loop {
            if matches!(limit, FrameLimit::Count(n) if frames >= n) {
                break;
            }
            if self.cancel.is_paused() {
                info!(frames, "run paused");
                if self.cancel.wait_while_paused() {
                    info!(frames, "run resumed");
                }
            }
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let frame = match self.render_frame(&source) {
                Ok(frame) => frame,
                Err(Error::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(e) if e.is_recoverable() => {
                    warn!(frame = frames, error = %e, "frame abandoned, workers kept for retry");
                    return Err(e);
                }
                Err(e) => {
                    error!(frame = frames, error = %e, "run aborted");
                    self.stop_pool()?;
                    return Err(e);
                }
            };

            trace!(index = frame.index, angle = frame.angle, "emitting frame");
            if let Err(e) = sink.emit(&frame) {
                error!(frame = frame.index, error = %e, "frame sink failed");
                self.stop_pool()?;
                return Err(e);
            }
            frames += 1;
        }

        if cancelled {
            info!(frames, "run cancelled");
            self.stop_pool()?;
        } else {
            info!(frames, final_angle = self.angle, "run finished");
        }

        Ok(RunSummary {
            frames,
            final_angle: self.angle,
            cancelled,
        })
    }

    /// Stops the workers and discards whatever they still deliver.
    fn stop_pool(&mut self) -> Result<()> {
        self.state = CoordinatorState::ShuttingDown;
        let Some(pool) = self.pool.take() else {
            return Ok(());
        };
        let joined = pool.shutdown();
        let dropped = self.queue.drain_results();
        debug!(dropped, "in-flight results discarded");
        joined
    }

    /// Stops the workers, letting in-flight chunks finish.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_pool()
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.state)
            .field("workers", &self.workers)
            .field("angle", &self.angle)
            .field("next_frame", &self.next_frame)
            .field("emitted", &self.emitted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vhue_color::{apply_serial, HueShift, Identity};

    fn gradient(width: usize, height: usize, channels: usize) -> Arc<ImageBuffer> {
        let data = (0..width * height * channels).map(|i| (i * 7 % 256) as u8).collect();
        Arc::new(ImageBuffer::from_raw(width, height, channels, data).unwrap())
    }

    fn config(workers: usize) -> PipelineConfig {
        PipelineConfig {
            worker_count: Some(workers),
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_config_fails_before_spawn() {
        let err = Coordinator::new(config(0), Identity).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_render_matches_serial() {
        let src = gradient(9, 13, 3);
        let mut coord = Coordinator::new(config(4), HueShift).unwrap();
        let out = coord.render_at(&src, 123.0).unwrap();

        let mut expected = (*src).clone();
        apply_serial(&mut expected, &HueShift, 123.0);
        assert_eq!(out, expected);
        assert_eq!(coord.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_angle_advances_and_wraps() {
        let src = gradient(2, 2, 3);
        let cfg = PipelineConfig {
            worker_count: Some(2),
            rotation_step: 150.0,
            initial_angle: 300.0,
            ..Default::default()
        };
        let mut coord = Coordinator::new(cfg, Identity).unwrap();

        let f0 = coord.render_frame(&src).unwrap();
        let f1 = coord.render_frame(&src).unwrap();
        assert_eq!((f0.index, f0.angle), (0, 300.0));
        assert_eq!((f1.index, f1.angle), (1, 90.0));
        assert_eq!(coord.angle(), 240.0);
    }

    #[test]
    fn test_layout_reused_then_recomputed() {
        let mut coord = Coordinator::new(config(3), Identity).unwrap();
        assert!(coord.layout().is_none());

        coord.render_at(&gradient(4, 6, 3), 0.0).unwrap();
        let first = coord.layout().cloned().unwrap();
        coord.render_at(&gradient(4, 6, 3), 0.0).unwrap();
        assert_eq!(coord.layout(), Some(&first));

        let taller = gradient(4, 10, 4);
        let out = coord.render_at(&taller, 0.0).unwrap();
        assert_eq!(out, *taller);
        let layout = coord.layout().unwrap();
        assert_eq!((layout.height(), layout.channels()), (10, 4));
        assert_eq!(layout.chunks().iter().map(|c| c.row_count).sum::<usize>(), 10);
    }

    #[test]
    fn test_run_counts_frames() {
        let cfg = PipelineConfig {
            worker_count: Some(2),
            frame_count: Some(4),
            rotation_step: 90.0,
            ..Default::default()
        };
        let mut coord = Coordinator::new(cfg, HueShift).unwrap();
        let mut angles = Vec::new();
        let summary = coord
            .run(gradient(3, 3, 3), &mut |f: &Frame| -> Result<()> {
                angles.push(f.angle);
                Ok(())
            })
            .unwrap();

        assert_eq!(angles, vec![0.0, 90.0, 180.0, 270.0]);
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.final_angle, 0.0);
        assert!(!summary.cancelled);
        coord.shutdown().unwrap();
    }

    #[test]
    fn test_run_stops_on_cancel() {
        let cfg = PipelineConfig {
            worker_count: Some(2),
            run_forever: true,
            ..Default::default()
        };
        let mut coord = Coordinator::new(cfg, Identity).unwrap();
        let token = coord.cancel_token();
        let summary = coord
            .run(gradient(4, 4, 3), &mut |f: &Frame| -> Result<()> {
                if f.index == 2 {
                    token.cancel();
                }
                Ok(())
            })
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.frames, 3);
        assert_eq!(coord.state(), CoordinatorState::ShuttingDown);
        assert!(matches!(coord.render_at(&gradient(1, 1, 3), 0.0), Err(Error::Cancelled)));
    }

    #[test]
    fn test_sink_error_aborts_run() {
        let cfg = PipelineConfig {
            worker_count: Some(1),
            frame_count: Some(10),
            ..Default::default()
        };
        let mut coord = Coordinator::new(cfg, Identity).unwrap();
        let err = coord
            .run(gradient(2, 2, 3), &mut |_: &Frame| -> Result<()> { Err(Error::sink("disk full")) })
            .unwrap_err();
        assert!(matches!(err, Error::Sink(_)));
        assert!(matches!(coord.render_at(&gradient(1, 1, 3), 0.0), Err(Error::Disconnected)));
    }
}
