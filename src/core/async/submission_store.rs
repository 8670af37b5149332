//! Thread-safe submission history
//!
//! Same retention and re-delivery rules as
//! [`SubmissionStore`](crate::core::SubmissionStore), backed by a DashMap so
//! that response rows can be looked up from many tasks at once. Registration
//! is serialized by a small mutex around the batch order; lookups never take it.

use crate::core::submission_store::history_batches_or_default;
use crate::core::traits::SubmissionLookup;
use crate::types::SubmissionRecord;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Thread-safe submission store keyed by unique id
#[derive(Debug)]
pub struct AsyncSubmissionStore {
    history_batches: usize,
    batches: Mutex<VecDeque<(String, Vec<String>)>>,
    records: DashMap<String, SubmissionRecord>,
}

impl AsyncSubmissionStore {
    pub fn new(history_batches: usize) -> Self {
        Self {
            history_batches: history_batches_or_default(history_batches),
            batches: Mutex::new(VecDeque::new()),
            records: DashMap::new(),
        }
    }

    /// Register every record of one batch, evicting the oldest batch beyond
    /// the retention limit
    pub fn register_batch(&self, batch_id: &str, records: Vec<SubmissionRecord>) {
        // A poisoned lock only means another registration panicked; the queue
        // itself is still consistent
        let mut batches = self
            .batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(position) = batches.iter().position(|(id, _)| id == batch_id) {
            if let Some((old_id, old_ids)) = batches.remove(position) {
                self.release(&old_id, &old_ids);
            }
        }

        let unique_ids: Vec<String> = records.iter().map(|r| r.unique_id.clone()).collect();
        for record in records {
            self.records.insert(record.unique_id.clone(), record);
        }
        batches.push_back((batch_id.to_string(), unique_ids));

        while batches.len() > self.history_batches {
            if let Some((evicted_id, evicted_ids)) = batches.pop_front() {
                log::debug!("Evicting batch {} from submission history", evicted_id);
                self.release(&evicted_id, &evicted_ids);
            }
        }
    }

    fn release(&self, batch_id: &str, unique_ids: &[String]) {
        for unique_id in unique_ids {
            self.records
                .remove_if(unique_id, |_, record| record.batch_id == batch_id);
        }
    }

    pub fn get(&self, unique_id: &str) -> Option<SubmissionRecord> {
        self.records
            .get(unique_id)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for AsyncSubmissionStore {
    fn default() -> Self {
        Self::new(crate::core::submission_store::DEFAULT_HISTORY_BATCHES)
    }
}

impl SubmissionLookup for AsyncSubmissionStore {
    fn find(&self, unique_id: &str) -> Option<SubmissionRecord> {
        self.get(unique_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::submission_store::test_records::submission;
    use std::sync::Arc;

    #[test]
    fn test_register_and_find() {
        let store = AsyncSubmissionStore::default();
        store.register_batch("b1", vec![submission("b1", "u1", 500)]);

        assert_eq!(store.find("u1").unwrap().oop_cents, 500);
        assert!(store.find("u2").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_eviction_keeps_redelivered_ids() {
        let store = AsyncSubmissionStore::new(2);
        store.register_batch("b1", vec![submission("b1", "u1", 100), submission("b1", "u2", 100)]);
        store.register_batch("b2", vec![submission("b2", "u1", 150)]);
        store.register_batch("b3", vec![submission("b3", "u3", 300)]);

        assert!(store.find("u2").is_none());
        assert_eq!(store.find("u1").unwrap().batch_id, "b2");
        assert!(store.find("u3").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lookups() {
        let store = Arc::new(AsyncSubmissionStore::default());
        let records = (0..100)
            .map(|i| submission("b1", &format!("u{}", i), i))
            .collect();
        store.register_batch("b1", records);

        let mut tasks = Vec::new();
        for i in 0..100 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store.find(&format!("u{}", i)).map(|r| r.oop_cents)
            }));
        }

        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap(), Some(i as i64));
        }
    }
}
