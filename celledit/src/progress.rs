//! Coarse progress reporting for long traversals.

/// Receives progress updates. All methods are fire-and-forget.
pub trait Progress {
    /// Begins a task with the given label.
    fn start(&mut self, label: &str);
    /// Reports the percentage of the task completed so far.
    fn update(&mut self, percent: u32);
    /// Ends the current task.
    fn stop(&mut self);
}

/// Discards all progress updates.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&mut self, _label: &str) {}
    fn update(&mut self, _percent: u32) {}
    fn stop(&mut self) {}
}

/// Logs progress through `tracing`, skipping repeated percentages.
#[derive(Debug, Default, Clone)]
pub struct LogProgress {
    label: String,
    last: Option<u32>,
}

impl Progress for LogProgress {
    fn start(&mut self, label: &str) {
        self.label = label.to_string();
        self.last = None;
        tracing::info!(task = %self.label, "started");
    }

    fn update(&mut self, percent: u32) {
        let percent = percent.min(100);
        if self.last != Some(percent) {
            self.last = Some(percent);
            tracing::debug!(task = %self.label, percent, "progress");
        }
    }

    fn stop(&mut self) {
        tracing::info!(task = %self.label, "finished");
        self.last = None;
    }
}

/// The percentage of `done` out of `total`.
pub(crate) fn percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        100
    } else {
        (done * 100 / total) as u32
    }
}
