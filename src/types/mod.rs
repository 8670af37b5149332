//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `member`: Member demographics and their enumerations
//! - `run`: Run context (timestamp + environment)
//! - `detail`: Detail records, batches, control totals and submission records
//! - `response`: Response rows, outcomes and the reconciliation report
//! - `error`: Error types for the accumulator file engine

pub mod detail;
pub mod error;
pub mod member;
pub mod response;
pub mod run;

pub use detail::{
    AccumulationBatch, AccumulatorKind, Cents, ControlTotals, DetailRecord, EncodingKind,
    PayerId, SignedAmounts, SubmissionRecord, SubmittedDetail,
};
pub use error::AccumulationError;
pub use member::{Member, Relationship, Sex};
pub use response::{
    DetailMetadata, ReconciledAmounts, ReconciliationIssue, ReconciliationReport, RecordOutcome,
    ResponseRow, RowResult, RunDateSource,
};
pub use run::{Environment, RunContext};
