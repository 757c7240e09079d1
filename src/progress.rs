//! Batch progress reporting.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

/// Thread-safe completion counter that logs every tenth of the batch.
///
/// Steps are computed from the real task count, so a batch of 7 tasks still
/// reports at most ten times and always reports 100% once.
#[derive(Debug)]
pub struct BatchProgress {
    total: usize,
    completed: AtomicUsize,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Record one finished task. Returns the percentage step reached, if this
    /// completion crossed a new 10% boundary.
    pub fn tick(&self) -> Option<usize> {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        let step = crossed_step(done, self.total)?;
        info!(
            completed = done,
            total = self.total,
            "Optimization progress: {}%",
            step
        );
        Some(step)
    }
}

/// Percentage step (10, 20, ... 100) reached by completion number `done`.
fn crossed_step(done: usize, total: usize) -> Option<usize> {
    if total == 0 || done > total {
        return None;
    }
    let now = done * 10 / total;
    let before = (done - 1) * 10 / total;
    (now > before).then_some(now * 10)
}
