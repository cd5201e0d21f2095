//! Test-controlled stand-in for the runtime's delivery scheduling.
//!
//! Scheduled tasks never run on their own. [`TickScheduler::flush`] drains the
//! queue in passes: each pass takes the tasks queued so far and runs them in
//! order; tasks they schedule wait for the next pass. Draining ends when a pass
//! finds the queue empty.

use crate::error::HarnessError;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use widgetbed_core::scheduler::{Scheduler, Task};

/// Pass limit used when none is configured.
pub const DEFAULT_MAX_FLUSH_PASSES: usize = 1000;

pub struct TickScheduler {
    queue: RefCell<Vec<Task>>,
    max_passes: usize,
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FLUSH_PASSES)
    }
}

impl TickScheduler {
    pub fn new(max_passes: usize) -> Self {
        Self { queue: RefCell::new(Vec::new()), max_passes }
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Drains the queue. Returns the number of tasks run.
    pub fn flush(&self) -> Result<usize, HarnessError> {
        self.flush_with(|| {})
    }

    /// Drains the queue, calling `after_batch` after every pass.
    ///
    /// All tasks run even if some fail; the first failure is returned once the
    /// queue is empty.
    pub fn flush_with(&self, mut after_batch: impl FnMut()) -> Result<usize, HarnessError> {
        let mut passes = 0;
        let mut executed = 0;
        let mut first_error = None;
        loop {
            let batch = self.queue.take();
            if batch.is_empty() {
                break;
            }
            passes += 1;
            if passes > self.max_passes {
                tracing::error!(passes, dropped = batch.len(), "flush did not settle");
                return Err(HarnessError::RunawayFlush { passes: self.max_passes });
            }
            tracing::trace!(pass = passes, tasks = batch.len(), "flushing scheduled tasks");
            for task in batch {
                executed += 1;
                if let Err(err) = task() {
                    if first_error.is_none() {
                        first_error = Some(err);
                    } else {
                        tracing::warn!(error = %err, "additional delivery failure during flush");
                    }
                }
            }
            after_batch();
        }
        if executed > 0 {
            tracing::debug!(passes, tasks = executed, "flush complete");
        }
        match first_error {
            Some(err) => Err(HarnessError::Delivery(err)),
            None => Ok(executed),
        }
    }
}

impl Scheduler for TickScheduler {
    fn schedule(&self, task: Task) {
        self.queue.borrow_mut().push(task);
    }
}

/// Future that completes on its second poll, giving other tasks of the
/// executor one chance to run.
#[derive(Debug, Default)]
pub struct NextTick {
    yielded: bool,
}

impl Future for NextTick {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

pub fn next_tick() -> NextTick {
    NextTick::default()
}
