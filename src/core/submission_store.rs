//! Submission history for response reconciliation
//!
//! This module provides the SubmissionStore component that remembers what was
//! sent in recent batches so that a response row can be traced back to its
//! submission by unique id.
//!
//! # Retention
//!
//! Payers answer within a few cycles, so only the most recent
//! `history_batches` batches are kept. Registering a batch beyond that evicts
//! the oldest batch together with every unique id it still owns.
//!
//! # Re-delivery
//!
//! A record re-delivered under its cached unique id replaces the older entry:
//! the response will be about the latest delivery. An evicted batch never
//! removes an id that a newer batch has taken over.

use super::traits::SubmissionLookup;
use crate::types::SubmissionRecord;
use std::collections::{HashMap, VecDeque};

/// Batches retained when no history size is configured
pub const DEFAULT_HISTORY_BATCHES: usize = 5;

/// Validate a configured history size, falling back to the default for zero
pub fn history_batches_or_default(history_batches: usize) -> usize {
    if history_batches == 0 {
        log::warn!(
            "Invalid history_batches ({}), using default ({})",
            history_batches,
            DEFAULT_HISTORY_BATCHES
        );
        DEFAULT_HISTORY_BATCHES
    } else {
        history_batches
    }
}

/// Submission store keyed by unique id
///
/// Maintains a HashMap of unique id to submission plus the registration order
/// of batches for eviction.
#[derive(Debug, Clone)]
pub struct SubmissionStore {
    history_batches: usize,
    /// Batch ids with the unique ids they registered, oldest first
    batches: VecDeque<(String, Vec<String>)>,
    records: HashMap<String, SubmissionRecord>,
}

impl SubmissionStore {
    /// Create an empty store retaining `history_batches` batches
    ///
    /// # Arguments
    ///
    /// * `history_batches` - Number of most recent batches to keep; zero falls
    ///   back to [`DEFAULT_HISTORY_BATCHES`]
    pub fn new(history_batches: usize) -> Self {
        Self {
            history_batches: history_batches_or_default(history_batches),
            batches: VecDeque::new(),
            records: HashMap::new(),
        }
    }

    /// Register every record of one batch
    ///
    /// Registering a batch id that is already retained replaces it. When more
    /// than `history_batches` batches are retained the oldest is evicted.
    ///
    /// # Arguments
    ///
    /// * `batch_id` - Identifier of the generated batch
    /// * `records` - The batch's submission records
    pub fn register_batch(&mut self, batch_id: &str, records: Vec<SubmissionRecord>) {
        if let Some(position) = self.batches.iter().position(|(id, _)| id == batch_id) {
            if let Some((old_id, old_ids)) = self.batches.remove(position) {
                self.release(&old_id, &old_ids);
            }
        }

        let unique_ids: Vec<String> = records.iter().map(|r| r.unique_id.clone()).collect();
        for record in records {
            self.records.insert(record.unique_id.clone(), record);
        }
        self.batches.push_back((batch_id.to_string(), unique_ids));

        while self.batches.len() > self.history_batches {
            if let Some((evicted_id, evicted_ids)) = self.batches.pop_front() {
                log::debug!("Evicting batch {} from submission history", evicted_id);
                self.release(&evicted_id, &evicted_ids);
            }
        }
    }

    /// Remove ids still owned by `batch_id`
    fn release(&mut self, batch_id: &str, unique_ids: &[String]) {
        for unique_id in unique_ids {
            if self
                .records
                .get(unique_id)
                .is_some_and(|record| record.batch_id == batch_id)
            {
                self.records.remove(unique_id);
            }
        }
    }

    /// Get a stored submission by unique id
    pub fn get(&self, unique_id: &str) -> Option<&SubmissionRecord> {
        self.records.get(unique_id)
    }

    /// Retained batch ids, oldest first
    pub fn batch_ids(&self) -> Vec<&str> {
        self.batches.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for SubmissionStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_BATCHES)
    }
}

impl SubmissionLookup for SubmissionStore {
    fn find(&self, unique_id: &str) -> Option<SubmissionRecord> {
        self.get(unique_id).cloned()
    }
}

#[cfg(test)]
pub(crate) mod test_records {
    use crate::types::{PayerId, SubmissionRecord};

    pub fn submission(batch_id: &str, unique_id: &str, oop_cents: i64) -> SubmissionRecord {
        SubmissionRecord {
            batch_id: batch_id.to_string(),
            payer: PayerId::Summit,
            unique_id: unique_id.to_string(),
            source_record_id: format!("src-{}", unique_id),
            member_id: "12345678901".to_string(),
            sequence_number: 1,
            deductible_cents: 0,
            oop_cents,
            hra_cents: None,
            is_reversal: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_records::submission;
    use super::*;

    #[test]
    fn test_register_and_find() {
        let mut store = SubmissionStore::default();
        store.register_batch("b1", vec![submission("b1", "u1", 500), submission("b1", "u2", 250)]);

        let found = store.find("u2").unwrap();
        assert_eq!(found.batch_id, "b1");
        assert_eq!(found.oop_cents, 250);
        assert!(store.find("u3").is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_unique_id_in_prior_batch_resolves_to_that_batch() {
        let mut store = SubmissionStore::new(3);
        store.register_batch("b1", vec![submission("b1", "u1", 500)]);
        store.register_batch("b2", vec![submission("b2", "u2", 700)]);

        assert_eq!(store.find("u1").unwrap().batch_id, "b1");
        assert_eq!(store.find("u2").unwrap().batch_id, "b2");
    }

    #[test]
    fn test_oldest_batch_is_evicted_with_its_ids() {
        let mut store = SubmissionStore::new(2);
        store.register_batch("b1", vec![submission("b1", "u1", 100)]);
        store.register_batch("b2", vec![submission("b2", "u2", 200)]);
        store.register_batch("b3", vec![submission("b3", "u3", 300)]);

        assert_eq!(store.batch_ids(), vec!["b2", "b3"]);
        assert!(store.find("u1").is_none());
        assert!(store.find("u2").is_some());
        assert!(store.find("u3").is_some());
    }

    #[test]
    fn test_redelivery_replaces_and_survives_eviction() {
        let mut store = SubmissionStore::new(2);
        store.register_batch("b1", vec![submission("b1", "u1", 100)]);
        // Re-delivered under the cached unique id with new amounts
        store.register_batch("b2", vec![submission("b2", "u1", 150)]);
        assert_eq!(store.find("u1").unwrap().oop_cents, 150);

        store.register_batch("b3", vec![submission("b3", "u3", 300)]);
        // b1 evicted, but u1 now belongs to b2
        assert_eq!(store.find("u1").unwrap().batch_id, "b2");
    }

    #[test]
    fn test_reregistering_batch_replaces_it() {
        let mut store = SubmissionStore::new(2);
        store.register_batch("b1", vec![submission("b1", "u1", 100), submission("b1", "u2", 100)]);
        store.register_batch("b1", vec![submission("b1", "u1", 120)]);

        assert_eq!(store.batch_ids(), vec!["b1"]);
        assert_eq!(store.find("u1").unwrap().oop_cents, 120);
        assert!(store.find("u2").is_none());
    }

    #[test]
    fn test_zero_history_falls_back_to_default() {
        let mut store = SubmissionStore::new(0);
        for i in 0..DEFAULT_HISTORY_BATCHES + 1 {
            let batch = format!("b{}", i);
            store.register_batch(&batch, vec![submission(&batch, &format!("u{}", i), 1)]);
        }
        assert_eq!(store.batch_ids().len(), DEFAULT_HISTORY_BATCHES);
        assert!(store.find("u0").is_none());
    }
}
