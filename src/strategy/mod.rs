//! Processing strategies
//!
//! A strategy decides how the engine is driven: single-threaded over the
//! `csv` crate, or on a tokio runtime over `csv-async` with per-record work
//! spread across tasks. Both strategies produce byte-identical batch files and
//! identical reconciliation reports.
//!
//! # Usage
//!
//! ```no_run
//! use accumulator_files::cli::StrategyType;
//! use accumulator_files::payer::create_adapter;
//! use accumulator_files::strategy::create_strategy;
//! use accumulator_files::types::{Environment, PayerId, RunContext};
//! use std::path::Path;
//!
//! let ctx = RunContext::new(chrono::Local::now().naive_local(), Environment::Production);
//! let strategy = create_strategy(StrategyType::Sync, None);
//! let file = strategy
//!     .generate(Path::new("ledger.csv"), create_adapter(PayerId::Summit, None), &ctx)
//!     .unwrap();
//! println!("{} details in {}", file.batch.record_count(), file.file_name);
//! ```

use crate::cli::StrategyType;
use crate::core::GeneratedFile;
use crate::payer::PayerAdapter;
use crate::types::{AccumulationError, ReconciliationReport, RunContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// How generation and reconciliation are driven
pub trait ProcessingStrategy: Send + Sync {
    /// Generate one batch file from a ledger export
    ///
    /// # Arguments
    ///
    /// * `ledger_path` - Ledger export CSV, details in file order
    /// * `adapter` - Target payer
    /// * `ctx` - Run timestamp and environment
    fn generate(
        &self,
        ledger_path: &Path,
        adapter: Arc<dyn PayerAdapter>,
        ctx: &RunContext,
    ) -> Result<GeneratedFile, AccumulationError>;

    /// Reconcile a response file against previously written manifests
    ///
    /// # Arguments
    ///
    /// * `response_path` - The payer's response file; its base name is matched
    ///   against the payer's pattern
    /// * `adapter` - Payer that sent the file
    /// * `ctx` - Run context; its date is used when the file name has none
    /// * `manifests` - Submission manifests, oldest first
    /// * `history_batches` - How many of the most recent batches to retain
    fn reconcile(
        &self,
        response_path: &Path,
        adapter: Arc<dyn PayerAdapter>,
        ctx: &RunContext,
        manifests: &[PathBuf],
        history_batches: usize,
    ) -> Result<ReconciliationReport, AccumulationError>;
}

/// Create a strategy
///
/// # Arguments
///
/// * `strategy_type` - Sync or async
/// * `config` - Batch configuration for the async strategy; defaults when `None`
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(config))
        }
    }
}

/// Base name of a response file, used for pattern matching
pub(crate) fn file_name_of(path: &Path) -> Result<String, AccumulationError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| AccumulationError::IoError {
            message: format!("'{}' has no usable file name", path.display()),
        })
}
