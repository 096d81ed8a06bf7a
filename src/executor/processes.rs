//! Pending work counter
//!
//! Every scheduled node task is counted before it is spawned and retires
//! exactly one unit when it finishes. The first fatal error is kept; later
//! ones are dropped.

use super::error::FlowError;
use super::lock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
pub struct Processes {
    pending: AtomicUsize,
    failed: AtomicBool,
    err: Mutex<Option<FlowError>>,
    notify: Notify,
}

impl Processes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `delta` additional tasks
    pub fn add(&self, delta: usize) {
        self.pending.fetch_add(delta, Ordering::AcqRel);
    }

    /// Retires one task, waking waiters when none remain
    pub fn done(&self) {
        let previous = self.pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "done called without a pending task");

        if previous == 1 {
            self.notify.notify_waiters();
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Waits until no task is pending
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Records a fatal error; returns false if an earlier error was kept
    pub fn fatal(&self, err: FlowError) -> bool {
        let mut slot = lock(&self.err);
        if slot.is_some() {
            debug!(error = %err, "dropping error, invocation already failed");
            return false;
        }

        *slot = Some(err);
        self.failed.store(true, Ordering::Release);
        true
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Renders the recorded error, if any
    pub fn err(&self) -> Option<String> {
        lock(&self.err).as_ref().map(ToString::to_string)
    }

    /// Takes the recorded error, leaving the failed flag set
    pub fn take_err(&self) -> Option<FlowError> {
        lock(&self.err).take()
    }
}

/// Retires one pending unit when dropped
pub(crate) struct Retire<'a>(pub(crate) &'a Processes);

impl Drop for Retire<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}
