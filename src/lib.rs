//! Accumulator File Engine
//!
//! # Overview
//!
//! Health plans report each member's deductible and out-of-pocket
//! accumulations to partner payers in batch files, and reconcile the response
//! files those payers send back. This library generates the batch files and
//! reconciles the responses for several payers with very different formats,
//! with a sync and an async processing strategy.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (detail records, batches, outcomes, errors)
//! - [`codec`] - Overpunch amounts, fixed-width and CSV field packing
//! - [`payer`] - One adapter per payer: layouts, code tables, response handling
//! - [`core`] - Payer-independent engine:
//!   - [`core::generator`] - Batch file generation
//!   - [`core::reconciler`] - Response file reconciliation
//!   - [`core::submission_store`] - History of submitted details
//! - [`io`] - Ledger, manifest and report CSV formats
//! - [`strategy`] - Sync and async drivers
//! - [`cli`] - Command-line harness
//!
//! # Generation
//!
//! Every detail is validated and encoded independently; control totals are
//! counted in file order. Any invalid detail aborts the whole batch: a payer
//! file with a wrong trailer is worse than no file.
//!
//! # Reconciliation
//!
//! Response rows are matched to submissions by the unique id the payer echoes
//! back. Rejections, unmatched rows and amount mismatches are reported per
//! row; only file-level problems abort.

pub mod cli;
pub mod codec;
pub mod core;
pub mod io;
pub mod payer;
pub mod strategy;
pub mod types;

pub use core::{
    AccumulationFileGenerator, AsyncSubmissionStore, GeneratedFile, ResponseReconciler,
    SubmissionLookup, SubmissionStore,
};
pub use io::{write_issues_csv, write_manifest, write_outcomes_csv};
pub use payer::{create_adapter, PayerAdapter, ResponseProcessor, RoutingConfig};
pub use types::{
    AccumulationBatch, AccumulationError, DetailRecord, Environment, Member, PayerId,
    ReconciliationIssue, ReconciliationReport, RecordOutcome, RunContext,
};
