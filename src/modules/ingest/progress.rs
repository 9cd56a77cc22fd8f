use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::modules::ingest::types::RunPhase;
use crate::shared::utils::logger::LogContext;

#[derive(Debug, Default)]
struct ProgressInner {
    rows_processed: AtomicU64,
    files_completed: AtomicU64,
    phase: AtomicU8,
}

/// Pull-based observation handle for an in-flight run. Counters are
/// monotonically increasing; cloning is cheap and the handle stays
/// valid after the run finishes.
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle {
    inner: Arc<ProgressInner>,
}

impl ProgressHandle {
    pub fn rows_processed(&self) -> u64 {
        self.inner.rows_processed.load(Ordering::Relaxed)
    }

    pub fn files_completed(&self) -> u64 {
        self.inner.files_completed.load(Ordering::Relaxed)
    }

    pub fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.inner.phase.load(Ordering::Relaxed))
    }

    pub(crate) fn record_rows(&self, count: u64) {
        self.inner.rows_processed.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_file_completed(&self) {
        self.inner.files_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_phase(&self, phase: RunPhase) {
        self.inner.phase.store(phase.as_u8(), Ordering::Relaxed);
    }
}

/// Manages progress counters and batched log reporting for a run.
///
/// Logging every chunk of an 11M-row run would flood the log; chunk
/// completions are reported every `report_every_chunks` chunks plus
/// always the first chunk of each source.
pub struct ProgressTracker {
    handle: ProgressHandle,
    report_every_chunks: usize,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            handle: ProgressHandle::default(),
            report_every_chunks: 10,
        }
    }

    pub fn with_report_interval(mut self, chunks: usize) -> Self {
        self.report_every_chunks = std::cmp::max(1, chunks);
        self
    }

    pub fn handle(&self) -> ProgressHandle {
        self.handle.clone()
    }

    pub fn set_phase(&self, phase: RunPhase) {
        self.handle.set_phase(phase);
    }

    /// Record a finished chunk; emits a log line only at the gated cadence.
    pub fn chunk_completed(&self, source: &str, chunk_index: usize, rows: u64) {
        self.handle.record_rows(rows);

        let should_report = chunk_index == 0 || (chunk_index + 1) % self.report_every_chunks == 0;
        if should_report {
            LogContext::load_progress(source, self.handle.rows_processed(), chunk_index);
        }
    }

    pub fn file_completed(&self, source: &str) {
        self.handle.record_file_completed();
        crate::log_info!(
            "Load: '{}' complete ({} files done, {} rows processed)",
            source,
            self.handle.files_completed(),
            self.handle.rows_processed()
        );
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
