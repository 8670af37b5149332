//! Synchronous processing strategy
//!
//! Streams the ledger with the `csv` crate and drives the generator on the
//! calling thread. Reconciliation registers every manifest into a HashMap
//! backed [`SubmissionStore`] and walks the response rows in order.

use crate::core::{AccumulationFileGenerator, GeneratedFile, ResponseReconciler, SubmissionStore};
use crate::io::{group_by_batch, read_manifest, SyncLedgerReader};
use crate::payer::PayerAdapter;
use crate::strategy::{file_name_of, ProcessingStrategy};
use crate::types::{AccumulationError, DetailRecord, ReconciliationReport, RunContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Single-threaded strategy
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncProcessingStrategy;

impl ProcessingStrategy for SyncProcessingStrategy {
    fn generate(
        &self,
        ledger_path: &Path,
        adapter: Arc<dyn PayerAdapter>,
        ctx: &RunContext,
    ) -> Result<GeneratedFile, AccumulationError> {
        let records = SyncLedgerReader::new(ledger_path)?.collect::<Result<Vec<DetailRecord>, _>>()?;
        log::debug!(
            "Read {} ledger records from {}",
            records.len(),
            ledger_path.display()
        );

        AccumulationFileGenerator::new(adapter).generate(ctx, records)
    }

    fn reconcile(
        &self,
        response_path: &Path,
        adapter: Arc<dyn PayerAdapter>,
        ctx: &RunContext,
        manifests: &[PathBuf],
        history_batches: usize,
    ) -> Result<ReconciliationReport, AccumulationError> {
        let mut store = SubmissionStore::new(history_batches);
        for manifest in manifests {
            for (batch_id, records) in group_by_batch(read_manifest(manifest)?) {
                store.register_batch(&batch_id, records);
            }
        }
        log::debug!(
            "Submission history holds {} records from {} batches",
            store.len(),
            store.batch_ids().len()
        );

        let file_name = file_name_of(response_path)?;
        let contents =
            std::fs::read_to_string(response_path).map_err(|e| AccumulationError::IoError {
                message: format!(
                    "Failed to read response '{}': {}",
                    response_path.display(),
                    e
                ),
            })?;

        ResponseReconciler::new(adapter).reconcile(&file_name, &contents, ctx, &store)
    }
}
