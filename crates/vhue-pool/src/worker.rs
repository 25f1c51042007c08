//! Long-lived worker threads.
//!
//! Workers are spawned once and live for the whole animation. Respawning
//! them every frame would cost more than transforming a small chunk.
//!
//! Each worker loops:
//!
//! ```text
//! ┌──▶ block on job channel ──▶ Stop / shutdown flag? ──▶ exit
//! │            │
//! │            ▼
//! │    transform chunk rows
//! │            │
//! └─── send ChunkResult ◀┘
//! ```
//!
//! An idle worker is parked in a channel receive and uses no CPU.
//! [`WorkerPool::shutdown`] raises a flag and sends one `Stop` per worker.
//! Idle workers wake and exit at once. Busy workers finish the chunk they
//! hold, so a chunk is never abandoned half-transformed.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
#[allow(unused_imports)]
use tracing::{debug, info, trace, warn};
use vhue_color::PixelTransform;
use vhue_core::{Error, Result};

use crate::job::WorkerReport;
use crate::queue::{Envelope, JobQueue, WorkerEndpoint};

/// Fixed set of persistent worker threads.
pub struct WorkerPool {
    handles: Vec<JoinHandle<u64>>,
    stop: Sender<Envelope>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawns exactly `n` workers serving `queue` through `endpoint`.
    ///
    /// `endpoint` must be the one returned alongside `queue` by
    /// [`channel`](crate::channel).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if `n == 0`, [`Error::Io`] if a thread cannot be
    /// spawned (workers already started are shut down first).
    pub fn spawn(
        n: usize,
        queue: &JobQueue,
        endpoint: WorkerEndpoint,
        transform: Arc<dyn PixelTransform>,
    ) -> Result<Self> {
        if n == 0 {
            return Err(Error::invalid_config("worker_count must be > 0"));
        }

        let mut pool = Self {
            handles: Vec::with_capacity(n),
            stop: queue.stop_sender(),
            shutdown: Arc::new(AtomicBool::new(false)),
        };

        for id in 0..n {
            let endpoint = endpoint.clone();
            let transform = Arc::clone(&transform);
            let shutdown = Arc::clone(&pool.shutdown);
            let spawned = thread::Builder::new()
                .name(format!("vhue-worker-{id}"))
                .spawn(move || worker_loop(id, endpoint, transform, shutdown));

            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    warn!(worker = id, error = %e, "failed to spawn worker");
                    pool.stop_logged("spawn failure");
                    return Err(Error::Io(e));
                }
            }
        }

        info!(workers = n, transform = transform.name(), "worker pool started");
        Ok(pool)
    }

    /// Number of workers.
    #[inline]
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Stops every worker after its current job and waits for all of them.
    ///
    /// # Errors
    ///
    /// [`Error::WorkerFailed`] if a worker thread itself panicked.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_all()
    }

    fn stop_all(&mut self) -> Result<()> {
        if self.handles.is_empty() {
            return Ok(());
        }
        self.shutdown.store(true, Ordering::Release);
        for _ in 0..self.handles.len() {
            // Receivers gone means every worker already exited
            if self.stop.send(Envelope::Stop).is_err() {
                break;
            }
        }

        let mut first_err = None;
        let mut total = 0;
        for (id, handle) in self.handles.drain(..).enumerate() {
            match handle.join() {
                Ok(processed) => total += processed,
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    warn!(worker = id, %reason, "worker thread panicked");
                    if first_err.is_none() {
                        first_err = Some(Error::WorkerFailed {
                            worker: id,
                            chunk: usize::MAX,
                            reason,
                        });
                    }
                }
            }
        }
        info!(jobs = total, "worker pool stopped");

        first_err.map_or(Ok(()), Err)
    }

    /// Stops the pool where the caller has no way to return the error.
    fn stop_logged(&mut self, during: &'static str) {
        if let Err(e) = self.stop_all() {
            warn!(error = %e, during, "worker pool shutdown failed");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_logged("drop");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.handles.len())
            .field("shutdown", &self.shutdown.load(Ordering::Relaxed))
            .finish()
    }
}

/// Body of one worker thread. Returns the number of jobs completed.
fn worker_loop(
    id: usize,
    endpoint: WorkerEndpoint,
    transform: Arc<dyn PixelTransform>,
    shutdown: Arc<AtomicBool>,
) -> u64 {
    trace!(worker = id, "worker idle");
    let mut processed = 0;

    while let Some(envelope) = endpoint.recv_envelope() {
        let job = match envelope {
            Envelope::Stop => break,
            Envelope::Job(job) => job,
        };
        if shutdown.load(Ordering::Acquire) {
            trace!(worker = id, frame = job.frame(), chunk = job.chunk().index, "dropping job during shutdown");
            break;
        }

        let chunk = job.chunk().index;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.run(transform.as_ref())));
        let report = match outcome {
            Ok(Ok(result)) => WorkerReport::Done(result),
            Ok(Err(e)) => WorkerReport::Failed {
                worker: id,
                frame: job.frame(),
                chunk,
                reason: e.to_string(),
            },
            Err(payload) => WorkerReport::Failed {
                worker: id,
                frame: job.frame(),
                chunk,
                reason: panic_message(payload.as_ref()),
            },
        };

        processed += 1;
        trace!(worker = id, frame = job.frame(), chunk, "chunk done");
        if endpoint.report(report).is_err() {
            debug!(worker = id, "result channel closed");
            break;
        }
    }

    trace!(worker = id, processed, "worker exiting");
    processed
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
