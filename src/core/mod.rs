//! Core business logic module
//!
//! This module contains the payer-independent engine:
//! - `code_table` - Code tables, reject catalogs and fuzzy column lookup
//! - `generator` - Batch file generation over a payer adapter
//! - `reconciler` - Response file parsing and reconciliation
//! - `submission_store` - Retained history of submitted details
//! - `traits` - Trait abstractions for interchangeable implementations
//! - `async` - Concurrent implementations

pub mod code_table;
pub mod r#async;
pub mod generator;
pub mod reconciler;
pub mod submission_store;
pub mod traits;

pub use generator::{AccumulationFileGenerator, EncodedDetail, GeneratedFile};
pub use r#async::{AsyncSubmissionStore, BatchProcessor};
pub use reconciler::{reconcile_row, ParsedRow, ResponseReconciler};
pub use submission_store::{SubmissionStore, DEFAULT_HISTORY_BATCHES};
pub use traits::SubmissionLookup;
