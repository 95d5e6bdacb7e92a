//! All-or-nothing commit of an ingested DO sheet.

use serde::Serialize;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

use crate::error::{LedgerError, Result};
use crate::ingest::Ingestion;
use crate::model::DoEntry;
use crate::store::LedgerStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCommitReport {
    /// Entries as stored, with ids and timestamps.
    pub committed: Vec<DoEntry>,
    /// Invalid candidates that were shown to the user but not submitted.
    pub skipped_invalid: usize,
}

pub struct BulkCommitCoordinator<'a> {
    store: &'a dyn LedgerStore,
}

impl<'a> BulkCommitCoordinator<'a> {
    pub fn new(store: &'a dyn LedgerStore) -> Self {
        Self { store }
    }

    /// Submit every valid candidate as one batch.
    ///
    /// Invalid candidates are skipped. With no valid candidates at all the
    /// store is never called. If the store refuses the batch nothing is
    /// committed.
    pub fn commit(&self, ingestion: &Ingestion) -> Result<BulkCommitReport> {
        let entries = ingestion.valid_entries();
        let skipped_invalid = ingestion.invalid_count();
        if entries.is_empty() {
            log::warn!(
                "bulk commit refused: none of {} candidates are valid",
                ingestion.candidates.len()
            );
            return Err(LedgerError::NothingToCommit);
        }

        let rows = entries.len();
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::bulk_commit_span(rows).entered();

        let committed = self.store.insert_do_entries(entries).map_err(|e| {
            log::warn!("bulk commit of {} DO entries failed: {}", rows, e);
            e
        })?;

        #[cfg(feature = "metrics")]
        METRICS.record_batch_committed(committed.len());
        log::info!(
            "committed {} DO entries, skipped {} invalid rows",
            committed.len(),
            skipped_invalid
        );

        Ok(BulkCommitReport {
            committed,
            skipped_invalid,
        })
    }
}
