//! Concurrent implementations of core components
//!
//! This module provides the thread-safe counterparts used by the concurrent
//! strategy:
//!
//! - **AsyncSubmissionStore**: Submission history backed by DashMap
//! - **BatchProcessor**: Chunked tokio tasks for detail encoding and row
//!   reconciliation, results collected in input order
//!
//! # Thread Safety
//!
//! Lookups against the submission store never block each other. Payer adapters
//! are immutable and shared through `Arc`.

pub mod batch_processor;
pub mod submission_store;

pub use batch_processor::BatchProcessor;
pub use submission_store::AsyncSubmissionStore;
