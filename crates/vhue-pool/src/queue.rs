//! Job and result channels between the coordinator and the workers.
//!
//! ```text
//!                  jobs (MPMC)                    results (MPSC)
//! Coordinator ──▶ [Job Job Job ...] ──▶ worker 0 ──▶ [Result ...] ──▶ Coordinator
//!                                  └──▶ worker 1 ──┘
//!                                  └──▶ worker N ──┘
//! ```
//!
//! The coordinator holds the [`JobQueue`] (job sender, result receiver). Each
//! worker holds a clone of the [`WorkerEndpoint`] (job receiver, result
//! sender). Once every worker has dropped its endpoint, [`submit`] and
//! [`collect`] fail with [`Error::Disconnected`] instead of blocking forever.
//!
//! [`submit`]: JobQueue::submit
//! [`collect`]: JobQueue::collect

use std::time::{Duration, Instant};

use crossbeam_channel::{after, bounded, never, select, unbounded, Receiver, Sender};
#[allow(unused_imports)]
use tracing::{debug, trace};
use vhue_core::{Error, Result};

use crate::cancel::{fired, CancelToken};
use crate::job::{ChunkResult, Job, WorkerReport};

/// Message on the job channel.
#[derive(Debug)]
pub(crate) enum Envelope {
    Job(Job),
    /// Wakes an idle worker so it can observe shutdown.
    Stop,
}

/// Creates a connected queue / endpoint pair.
///
/// `capacity = None` gives an unbounded job channel. That is sufficient
/// because all jobs of a frame are known up front and bounded by the worker
/// count. `Some(n)` bounds it, making [`JobQueue::submit`] block when full.
///
/// # Errors
///
/// [`Error::InvalidConfig`] for `Some(0)`.
pub fn channel(capacity: Option<usize>) -> Result<(JobQueue, WorkerEndpoint)> {
    let (job_tx, job_rx) = match capacity {
        None => unbounded(),
        Some(0) => return Err(Error::invalid_config("queue_capacity must be > 0")),
        Some(n) => bounded(n),
    };
    let (result_tx, result_rx) = unbounded();

    Ok((
        JobQueue {
            jobs: job_tx,
            results: result_rx,
            capacity,
        },
        WorkerEndpoint {
            jobs: job_rx,
            results: result_tx,
        },
    ))
}

/// Coordinator side of the queue: submits jobs, collects results.
#[derive(Debug)]
pub struct JobQueue {
    jobs: Sender<Envelope>,
    results: Receiver<WorkerReport>,
    capacity: Option<usize>,
}

impl JobQueue {
    /// Enqueues a job. Blocks only if the queue is bounded and full.
    pub fn submit(&self, job: Job) -> Result<()> {
        trace!(frame = job.frame(), chunk = job.chunk().index, "submit");
        self.jobs.send(Envelope::Job(job)).map_err(|_| Error::Disconnected)
    }

    /// Blocks until `expected` distinct chunks of `frame` have arrived.
    ///
    /// Results tagged with an earlier frame are leftovers from an abandoned
    /// frame and are discarded.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if `deadline` elapses first
    /// - [`Error::ProtocolViolation`] on a duplicate or out-of-range chunk index,
    ///   or a result from a frame not yet dispatched
    /// - [`Error::WorkerFailed`] if a worker reports a failed transform
    /// - [`Error::Disconnected`] if every worker is gone
    pub fn collect(&self, frame: u64, expected: usize, deadline: Option<Duration>) -> Result<Vec<ChunkResult>> {
        self.collect_inner(frame, expected, deadline, &never())
    }

    /// Like [`collect`](Self::collect), but returns [`Error::Cancelled`] as soon
    /// as `cancel` fires.
    ///
    /// Cancellation wins over completion: a frame whose last chunk arrives
    /// together with the cancel is not returned.
    pub fn collect_until(
        &self,
        frame: u64,
        expected: usize,
        deadline: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<Vec<ChunkResult>> {
        self.collect_inner(frame, expected, deadline, cancel.signal())
    }

    fn collect_inner(
        &self,
        frame: u64,
        expected: usize,
        deadline: Option<Duration>,
        cancel: &Receiver<()>,
    ) -> Result<Vec<ChunkResult>> {
        let started = Instant::now();
        let timer = deadline.map(after).unwrap_or_else(never);
        let mut seen = vec![false; expected];
        let mut results = Vec::with_capacity(expected);

        while results.len() < expected {
            if fired(cancel) {
                return Err(Self::cancelled(frame, results.len(), expected));
            }
            select! {
                recv(self.results) -> msg => {
                    let report = msg.map_err(|_| Error::Disconnected)?;
                    if let Some(result) = accept(report, frame, &mut seen)? {
                        results.push(result);
                    }
                }
                recv(timer) -> _ => {
                    debug!(frame, received = results.len(), expected, "collect deadline elapsed");
                    return Err(Error::Timeout {
                        frame,
                        received: results.len(),
                        expected,
                        elapsed: started.elapsed(),
                    });
                }
                recv(cancel) -> _ => {
                    return Err(Self::cancelled(frame, results.len(), expected));
                }
            }
        }
        if fired(cancel) {
            return Err(Self::cancelled(frame, results.len(), expected));
        }

        trace!(frame, expected, elapsed = ?started.elapsed(), "frame collected");
        Ok(results)
    }

    fn cancelled(frame: u64, received: usize, expected: usize) -> Error {
        debug!(frame, received, expected, "collect cancelled");
        Error::Cancelled
    }

    /// Discards every result currently queued. Returns how many were dropped.
    pub fn drain_results(&self) -> usize {
        self.results.try_iter().count()
    }

    /// Jobs submitted but not yet taken by a worker.
    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Job channel bound, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub(crate) fn stop_sender(&self) -> Sender<Envelope> {
        self.jobs.clone()
    }
}

/// Checks one report against the frame being collected.
///
/// Returns `Ok(None)` for a stale result or failure that should be ignored.
fn accept(report: WorkerReport, frame: u64, seen: &mut [bool]) -> Result<Option<ChunkResult>> {
    match report {
        WorkerReport::Failed {
            worker,
            frame: failed_frame,
            chunk,
            reason,
        } if failed_frame < frame => {
            debug!(worker, stale = failed_frame, frame, chunk, %reason, "discarding failure from abandoned frame");
            Ok(None)
        }
        WorkerReport::Failed {
            worker,
            frame: failed_frame,
            chunk,
            reason,
        } => {
            debug!(worker, frame = failed_frame, chunk, %reason, "worker reported failure");
            Err(Error::WorkerFailed { worker, chunk, reason })
        }
        WorkerReport::Done(result) if result.frame < frame => {
            debug!(stale = result.frame, frame, chunk = result.chunk_index, "discarding stale result");
            Ok(None)
        }
        WorkerReport::Done(result) if result.frame > frame => Err(Error::protocol(format!(
            "result for frame {} arrived while collecting frame {frame}",
            result.frame
        ))),
        WorkerReport::Done(result) => {
            let idx = result.chunk_index;
            match seen.get_mut(idx) {
                None => Err(Error::protocol(format!(
                    "chunk {idx} outside layout of {} chunks (frame {frame})",
                    seen.len()
                ))),
                Some(true) => Err(Error::protocol(format!("chunk {idx} delivered twice (frame {frame})"))),
                Some(slot) => {
                    *slot = true;
                    trace!(frame, chunk = idx, "chunk received");
                    Ok(Some(result))
                }
            }
        }
    }
}

/// Worker side of the queue: receives jobs, sends results.
///
/// Cloned once per worker. [`WorkerPool`](crate::WorkerPool) drives it, but
/// it is public so callers can run a worker loop of their own.
#[derive(Debug, Clone)]
pub struct WorkerEndpoint {
    jobs: Receiver<Envelope>,
    results: Sender<WorkerReport>,
}

impl WorkerEndpoint {
    /// Blocks for the next job.
    ///
    /// Returns `None` when told to stop or when the coordinator is gone.
    pub fn recv_job(&self) -> Option<Job> {
        match self.jobs.recv() {
            Ok(Envelope::Job(job)) => Some(job),
            Ok(Envelope::Stop) | Err(_) => None,
        }
    }

    /// Returns the next job if one is already queued.
    pub fn try_recv_job(&self) -> Option<Job> {
        match self.jobs.try_recv() {
            Ok(Envelope::Job(job)) => Some(job),
            _ => None,
        }
    }

    /// Sends a finished chunk back to the coordinator.
    pub fn send_result(&self, result: ChunkResult) -> Result<()> {
        self.results
            .send(WorkerReport::Done(result))
            .map_err(|_| Error::Disconnected)
    }

    pub(crate) fn recv_envelope(&self) -> Option<Envelope> {
        self.jobs.recv().ok()
    }

    pub(crate) fn report(&self, report: WorkerReport) -> Result<()> {
        self.results.send(report).map_err(|_| Error::Disconnected)
    }
}
