//! Asynchronous processing strategy
//!
//! Runs on a multi-threaded tokio runtime. Generation reads the ledger with
//! `csv-async` in batches of `batch_size`, then encodes detail lines across
//! tasks and assembles the file in ledger order. Reconciliation registers the
//! manifests into a DashMap backed [`AsyncSubmissionStore`] and reconciles
//! row chunks concurrently, restoring file order before the report is built.
//!
//! # Configuration
//!
//! [`BatchConfig`] controls the read batch size (also the per-task chunk
//! size) and the number of runtime worker threads.

use crate::core::r#async::{AsyncSubmissionStore, BatchProcessor};
use crate::core::GeneratedFile;
use crate::io::{group_by_batch, parse_manifest, AsyncLedgerReader};
use crate::payer::PayerAdapter;
use crate::strategy::{file_name_of, ProcessingStrategy};
use crate::types::{AccumulationError, ReconciliationReport, RunContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for batch processing
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Ledger rows read per batch and records handled per task (default: 1000)
    pub batch_size: usize,

    /// Runtime worker threads (default: number of CPU cores)
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a configuration; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            log::warn!(
                "Invalid batch_size ({}), using default ({})",
                batch_size,
                default.batch_size
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            log::warn!(
                "Invalid max_concurrent_batches ({}), using default ({})",
                max_concurrent_batches,
                default.max_concurrent_batches
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Multi-threaded strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    fn runtime(&self) -> Result<tokio::runtime::Runtime, AccumulationError> {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| AccumulationError::IoError {
                message: format!("Failed to create tokio runtime: {}", e),
            })
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn generate(
        &self,
        ledger_path: &Path,
        adapter: Arc<dyn PayerAdapter>,
        ctx: &RunContext,
    ) -> Result<GeneratedFile, AccumulationError> {
        let ctx = *ctx;
        self.runtime()?.block_on(async {
            let processor = BatchProcessor::new(adapter, self.config.batch_size);

            let file = tokio::fs::File::open(ledger_path)
                .await
                .map_err(|e| AccumulationError::IoError {
                    message: format!("Failed to open ledger '{}': {}", ledger_path.display(), e),
                })?;

            // Wrap tokio file in a compatibility layer for csv-async
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncLedgerReader::new(compat_file);

            // Identity assignment needs the whole ledger: sequence numbers and
            // duplicate checks span batches
            let mut records = Vec::new();
            loop {
                let batch = reader.read_batch(self.config.batch_size).await?;
                if batch.is_empty() {
                    break;
                }
                records.extend(batch);
            }
            log::debug!(
                "Read {} ledger records from {}",
                records.len(),
                ledger_path.display()
            );

            let generator = processor.generator();
            let details = generator.prepare(&ctx, records)?;
            let encoded = processor.encode_details(ctx, details).await?;
            generator.assemble(&ctx, encoded)
        })
    }

    fn reconcile(
        &self,
        response_path: &Path,
        adapter: Arc<dyn PayerAdapter>,
        ctx: &RunContext,
        manifests: &[PathBuf],
        history_batches: usize,
    ) -> Result<ReconciliationReport, AccumulationError> {
        let file_name = file_name_of(response_path)?;

        self.runtime()?.block_on(async {
            let processor = BatchProcessor::new(adapter, self.config.batch_size);
            let reconciler = processor.reconciler();
            let mut report = reconciler.begin(&file_name, ctx)?;

            let store = Arc::new(AsyncSubmissionStore::new(history_batches));
            for manifest in manifests {
                let contents =
                    tokio::fs::read(manifest)
                        .await
                        .map_err(|e| AccumulationError::IoError {
                            message: format!(
                                "Failed to read manifest '{}': {}",
                                manifest.display(),
                                e
                            ),
                        })?;
                for (batch_id, records) in group_by_batch(parse_manifest(&contents)?) {
                    store.register_batch(&batch_id, records);
                }
            }
            log::debug!("Submission history holds {} records", store.len());

            let contents = tokio::fs::read_to_string(response_path)
                .await
                .map_err(|e| AccumulationError::IoError {
                    message: format!(
                        "Failed to read response '{}': {}",
                        response_path.display(),
                        e
                    ),
                })?;

            let rows = reconciler.parse_rows(&contents)?;
            let results = processor.reconcile_rows(rows, store).await?;
            report.absorb(results);
            reconciler.finish(&report);
            Ok(report)
        })
    }
}
