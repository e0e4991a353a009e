//! Lifecycle events of a label scan store.
//!
//! The host supplies a [`LabelScanMonitor`] as the store's log sink. All
//! methods default to no-ops so that sinks only implement what they report.

use crate::error::RebuildError;
use crate::rebuild::RebuildSummary;
use crate::store::StoreState;
use std::path::Path;

/// Receives label scan store lifecycle events.
pub trait LabelScanMonitor: Send + Sync {
    /// `init` finished and left the store in `state`.
    fn init(&self, _path: &Path, _state: StoreState) {}

    /// No usable index was found; a rebuild is needed.
    fn no_index(&self, _path: &Path) {}

    /// The last commit was written by a rebuild that never finished.
    fn incomplete_index(&self, _path: &Path) {}

    /// The on-disk index failed validation.
    fn corrupt_index(&self, _path: &Path, _reason: &str) {}

    /// A full rebuild started.
    fn rebuilding(&self) {}

    /// A full rebuild finished and the store is serving.
    fn rebuilt(&self, _summary: &RebuildSummary) {}

    /// A full rebuild was aborted.
    fn rebuild_failed(&self, _error: &RebuildError) {}

    /// An update arrived during a rebuild and was queued.
    fn update_queued(&self, _pending: usize) {}

    /// Queued updates were replayed when a rebuild completed.
    fn updates_replayed(&self, _count: usize) {}
}

/// Forwards monitor events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMonitor;

impl LabelScanMonitor for TracingMonitor {
    fn init(&self, path: &Path, state: StoreState) {
        tracing::info!(path = %path.display(), %state, "Label scan store initialized");
    }

    fn no_index(&self, path: &Path) {
        tracing::info!(path = %path.display(), "No label scan index found, a rebuild is required");
    }

    fn incomplete_index(&self, path: &Path) {
        tracing::warn!(
            path = %path.display(),
            "Label scan index was left behind by an unfinished rebuild, a rebuild is required"
        );
    }

    fn corrupt_index(&self, path: &Path, reason: &str) {
        tracing::error!(path = %path.display(), reason, "Label scan index is corrupt");
    }

    fn rebuilding(&self) {
        tracing::info!("Rebuilding label scan store from the full store stream");
    }

    fn rebuilt(&self, summary: &RebuildSummary) {
        tracing::info!(
            nodes = summary.nodes,
            batches = summary.batches,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Label scan store rebuilt"
        );
    }

    fn rebuild_failed(&self, error: &RebuildError) {
        tracing::error!(error = %error, "Label scan store rebuild failed");
    }

    fn update_queued(&self, pending: usize) {
        tracing::trace!(pending, "Queued label update during rebuild");
    }

    fn updates_replayed(&self, count: usize) {
        if count > 0 {
            tracing::debug!(count, "Replayed label updates queued during rebuild");
        }
    }
}
