use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing summarization activity.
#[derive(Default)]
pub struct PipelineMetrics {
    runs_completed: AtomicU64,
    fast_path_runs: AtomicU64,
    fast_path_fallbacks: AtomicU64,
    chunks_processed: AtomicU64,
    chunks_failed: AtomicU64,
    regenerations: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed run and its chunk outcomes.
    pub fn record_run(&self, fast_path: bool, processed: u64, failed: u64) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        if fast_path {
            self.fast_path_runs.fetch_add(1, Ordering::Relaxed);
        }
        self.chunks_processed.fetch_add(processed, Ordering::Relaxed);
        self.chunks_failed.fetch_add(failed, Ordering::Relaxed);
    }

    /// Record that a fast-path attempt failed and the standard path took over.
    pub fn record_fast_path_fallback(&self) {
        self.fast_path_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a styled-summary regeneration.
    pub fn record_regeneration(&self) {
        self.regenerations.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            fast_path_runs: self.fast_path_runs.load(Ordering::Relaxed),
            fast_path_fallbacks: self.fast_path_fallbacks.load(Ordering::Relaxed),
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            regenerations: self.regenerations.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Summarization runs that returned a result since startup.
    pub runs_completed: u64,
    /// Runs that were served by the single-call fast path.
    pub fast_path_runs: u64,
    /// Fast-path attempts that failed over to the standard path.
    pub fast_path_fallbacks: u64,
    /// Chunks sent through fact extraction.
    pub chunks_processed: u64,
    /// Chunks whose extraction exhausted every retry.
    pub chunks_failed: u64,
    /// Styled summaries regenerated on request.
    pub regenerations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_runs_and_chunks() {
        let metrics = PipelineMetrics::new();
        metrics.record_run(false, 5, 1);
        metrics.record_run(true, 1, 0);
        metrics.record_fast_path_fallback();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.runs_completed, 2);
        assert_eq!(snapshot.fast_path_runs, 1);
        assert_eq!(snapshot.fast_path_fallbacks, 1);
        assert_eq!(snapshot.chunks_processed, 6);
        assert_eq!(snapshot.chunks_failed, 1);
    }

    #[test]
    fn snapshot_is_consistent() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
        metrics.record_regeneration();
        assert_eq!(metrics.snapshot().regenerations, 1);
    }
}
