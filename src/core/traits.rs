//! Core traits for submission lookup
//!
//! Reconciliation only ever needs to find a submission by unique id. Both the
//! synchronous store (HashMap) and the concurrent store (DashMap) implement
//! this, so the per-row reconciliation logic is written once.

use crate::types::SubmissionRecord;
use std::sync::Arc;

/// Find submitted records by unique id
pub trait SubmissionLookup {
    /// Get the most recent submission carrying `unique_id`
    fn find(&self, unique_id: &str) -> Option<SubmissionRecord>;
}

impl<L: SubmissionLookup + ?Sized> SubmissionLookup for Arc<L> {
    fn find(&self, unique_id: &str) -> Option<SubmissionRecord> {
        (**self).find(unique_id)
    }
}
