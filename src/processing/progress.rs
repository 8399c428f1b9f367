//! Progress reporting and cooperative cancellation for a summarization run.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

type ProgressFn = dyn Fn(u32, u32, Option<&str>) + Send + Sync;

/// Optional observer receiving `(current, total, status)` updates, where `total` is always 100.
#[derive(Clone, Default)]
pub struct Progress {
    callback: Option<Arc<ProgressFn>>,
}

impl Progress {
    /// Report progress to `callback`.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(u32, u32, Option<&str>) + Send + Sync + 'static,
    {
        Self {
            callback: Some(Arc::new(callback)),
        }
    }

    /// Discard every update.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Publish a percentage (clamped to 100) with an optional status message.
    pub fn report(&self, percent: u32, status: Option<&str>) {
        if let Some(callback) = &self.callback {
            callback(percent.min(100), 100, status);
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("enabled", &self.callback.is_some())
            .finish()
    }
}

/// Maps chunk completions onto a slice of the overall percentage range.
///
/// Completions may arrive in any order; the reported percentage only grows.
#[derive(Debug)]
pub(crate) struct ChunkTracker<'a> {
    progress: &'a Progress,
    total: usize,
    start: u32,
    end: u32,
    completed: AtomicUsize,
}

impl<'a> ChunkTracker<'a> {
    pub(crate) fn new(progress: &'a Progress, total: usize, start: u32, end: u32) -> Self {
        Self {
            progress,
            total,
            start,
            end,
            completed: AtomicUsize::new(0),
        }
    }

    fn percent_for(&self, completed: usize) -> u32 {
        if self.total == 0 {
            return self.end;
        }
        let span = u64::from(self.end.saturating_sub(self.start));
        let done = completed.min(self.total) as u64;
        self.start + (span * done / self.total as u64) as u32
    }

    pub(crate) fn started(&self, chunk_index: usize) {
        let status = format!("Extracting facts from chunk {} of {}", chunk_index + 1, self.total);
        let completed = self.completed.load(Ordering::SeqCst);
        self.progress
            .report(self.percent_for(completed), Some(status.as_str()));
    }

    pub(crate) fn finished(&self, chunk_index: usize) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let status = format!(
            "Finished chunk {} ({completed}/{} complete)",
            chunk_index + 1,
            self.total
        );
        self.progress
            .report(self.percent_for(completed), Some(status.as_str()));
    }
}

/// Cloneable flag a caller flips to abandon a run.
///
/// The pipeline checks it before every backend call sequence it schedules; calls already in
/// flight finish, but their results are discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Fresh, uncancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
