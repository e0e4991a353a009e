//! Full rebuild of a label scan store from the primary store.
//!
//! The coordinator puts the store into `Rebuilding`, writes one add-only
//! update per streamed node, commits every `batch_size` nodes and finally
//! hands control back through `end_rebuild`. Any failure stops consumption
//! and leaves the store `Failed`; a half-built index is never served.

use crate::error::RebuildError;
use crate::store::LabelScanStore;
use crate::update::FullStoreLabelUpdateStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Nodes written between commits unless configured otherwise.
pub const DEFAULT_REBUILD_BATCH_SIZE: usize = 10_000;

/// Cooperative cancellation of a running rebuild.
///
/// Observed at commit boundaries. A cancelled rebuild leaves the store `Failed`.
#[derive(Debug, Clone, Default)]
pub struct RebuildCancellation(Arc<AtomicBool>);

impl RebuildCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a completed rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildSummary {
    /// Nodes read from the full store stream
    pub nodes: u64,
    /// Commits issued, including the final one
    pub batches: u64,
    pub elapsed: Duration,
}

/// Drives full rebuilds.
#[derive(Debug, Clone)]
pub struct RebuildCoordinator {
    batch_size: u64,
    cancellation: RebuildCancellation,
}

impl Default for RebuildCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_REBUILD_BATCH_SIZE)
    }
}

impl RebuildCoordinator {
    /// Creates a coordinator committing every `batch_size` nodes (at least 1).
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1) as u64,
            cancellation: RebuildCancellation::new(),
        }
    }

    /// Uses `cancellation` instead of a private token.
    pub fn with_cancellation(mut self, cancellation: RebuildCancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Returns a handle that cancels rebuilds run by this coordinator.
    pub fn cancellation(&self) -> RebuildCancellation {
        self.cancellation.clone()
    }

    /// Rebuilds `store` from `source`.
    pub fn rebuild(
        &self,
        store: &LabelScanStore,
        source: &dyn FullStoreLabelUpdateStream,
    ) -> Result<RebuildSummary, RebuildError> {
        let started = Instant::now();

        if let Err(e) = store.begin_rebuild() {
            let err = RebuildError::from_store(0, e);
            store.monitor().rebuild_failed(&err);
            return Err(err);
        }

        let mut processed = 0u64;
        let mut batches = 0u64;
        let written = self.write_all(store, source, &mut processed, &mut batches);

        let result = written.and_then(|()| {
            store
                .end_rebuild(true)
                .map_err(|e| RebuildError::from_store(processed, e))
        });

        match result {
            Ok(_) => {
                let summary = RebuildSummary {
                    nodes: processed,
                    batches: batches + 1,
                    elapsed: started.elapsed(),
                };
                store.monitor().rebuilt(&summary);
                Ok(summary)
            }
            Err(err) => {
                // No-op when end_rebuild(true) itself failed
                if let Err(e) = store.end_rebuild(false) {
                    tracing::debug!(error = %e, "Rebuild was already closed");
                }
                store.monitor().rebuild_failed(&err);
                Err(err)
            }
        }
    }

    fn write_all(
        &self,
        store: &LabelScanStore,
        source: &dyn FullStoreLabelUpdateStream,
        processed: &mut u64,
        batches: &mut u64,
    ) -> Result<(), RebuildError> {
        for item in source.stream() {
            let item = item.map_err(|source| RebuildError::Source {
                processed: *processed,
                source,
            })?;
            store
                .write_rebuild_record(item)
                .map_err(|e| RebuildError::from_store(*processed, e))?;
            *processed += 1;

            if *processed % self.batch_size == 0 {
                store
                    .commit()
                    .map_err(|e| RebuildError::from_store(*processed, e))?;
                *batches += 1;
                tracing::debug!(processed = *processed, "Committed label scan rebuild batch");
                self.check_cancelled(*processed)?;
            }
        }
        self.check_cancelled(*processed)
    }

    fn check_cancelled(&self, processed: u64) -> Result<(), RebuildError> {
        if self.cancellation.is_cancelled() {
            return Err(RebuildError::Cancelled { processed });
        }
        Ok(())
    }

    /// Runs the rebuild on a dedicated background thread.
    pub fn spawn(
        self,
        store: Arc<LabelScanStore>,
        source: Arc<dyn FullStoreLabelUpdateStream>,
    ) -> std::io::Result<JoinHandle<Result<RebuildSummary, RebuildError>>> {
        std::thread::Builder::new()
            .name("labelscan-rebuild".into())
            .spawn(move || self.rebuild(&store, source.as_ref()))
    }
}
