//! Cooperative pause and cancellation shared between a run and its controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// Cloneable handle that pauses, resumes or stops a run.
///
/// Cancelling sets a flag checked at frame boundaries and closes a channel,
/// which wakes any thread blocked in [`JobQueue::collect_until`](crate::JobQueue::collect_until).
/// Pausing holds the run at the next frame boundary until [`resume`](Self::resume)
/// or [`cancel`](Self::cancel); the waiting thread sleeps on a condition variable.
#[derive(Clone, Debug)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
    paused: Mutex<bool>,
    resumed: Condvar,
}

impl CancelToken {
    /// Creates a token that is neither paused nor cancelled.
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                signal: rx,
                paused: Mutex::new(false),
                resumed: Condvar::new(),
            }),
        }
    }

    /// Requests cancellation. Idempotent. Also releases a paused run.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        // Dropping the only sender disconnects `signal` for every waiter
        self.inner.trigger.lock().unwrap_or_else(|e| e.into_inner()).take();

        let _paused = self.inner.paused.lock().unwrap_or_else(|e| e.into_inner());
        self.inner.resumed.notify_all();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Holds the run at its next frame boundary.
    pub fn pause(&self) {
        *self.inner.paused.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }

    /// Lets a paused run continue.
    pub fn resume(&self) {
        *self.inner.paused.lock().unwrap_or_else(|e| e.into_inner()) = false;
        self.inner.resumed.notify_all();
    }

    /// Returns `true` while paused.
    pub fn is_paused(&self) -> bool {
        *self.inner.paused.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Blocks while paused. Returns `false` if the token was cancelled.
    pub fn wait_while_paused(&self) -> bool {
        let mut paused = self.inner.paused.lock().unwrap_or_else(|e| e.into_inner());
        while *paused && !self.is_cancelled() {
            paused = self.inner.resumed.wait(paused).unwrap_or_else(|e| e.into_inner());
        }
        !self.is_cancelled()
    }

    /// Channel that becomes ready (disconnected) on cancellation.
    pub(crate) fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns `true` if `signal` has been disconnected by a cancel.
pub(crate) fn fired(signal: &Receiver<()>) -> bool {
    matches!(signal.try_recv(), Err(TryRecvError::Disconnected))
}
