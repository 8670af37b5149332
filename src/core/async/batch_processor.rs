//! Chunked parallel processing for the concurrent strategy
//!
//! This module provides the `BatchProcessor` struct, which spreads the two
//! independent per-record steps over tokio tasks:
//!
//! - encoding detail lines during generation
//! - reconciling response rows against submitted history
//!
//! # Design
//!
//! Input is split into contiguous chunks, one task per chunk. Tasks are awaited
//! in the order they were spawned, so results come back in input order no
//! matter which task finishes first. Everything order-dependent (control
//! totals, unique id checks, report assembly) stays with the caller.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     ├── Arc<AccumulationFileGenerator>  (per-detail encoding)
//!     ├── Arc<ResponseReconciler>         (per-row reconciliation)
//!     └── chunk_size                      (records per task)
//! ```

use std::sync::Arc;

use super::AsyncSubmissionStore;
use crate::core::generator::{AccumulationFileGenerator, EncodedDetail};
use crate::core::reconciler::{reconcile_row, ParsedRow, ResponseReconciler};
use crate::payer::PayerAdapter;
use crate::types::{AccumulationError, RowResult, RunContext, SubmittedDetail};

/// Chunked parallel encoder and reconciler for one payer
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    generator: Arc<AccumulationFileGenerator>,
    reconciler: Arc<ResponseReconciler>,
    chunk_size: usize,
}

impl BatchProcessor {
    /// Create a processor for one payer
    ///
    /// # Arguments
    ///
    /// * `adapter` - The payer adapter shared by every task
    /// * `chunk_size` - Records handled by one task; zero is treated as one
    pub fn new(adapter: Arc<dyn PayerAdapter>, chunk_size: usize) -> Self {
        Self {
            generator: Arc::new(AccumulationFileGenerator::new(Arc::clone(&adapter))),
            reconciler: Arc::new(ResponseReconciler::new(adapter)),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn generator(&self) -> &AccumulationFileGenerator {
        &self.generator
    }

    pub fn reconciler(&self) -> &ResponseReconciler {
        &self.reconciler
    }

    /// Encode every detail line concurrently
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<EncodedDetail>)` - Encoded details in input order
    /// * `Err(AccumulationError)` - The first failing detail in input order, or
    ///   `TaskFailed` if a worker task panicked
    pub async fn encode_details(
        &self,
        ctx: RunContext,
        details: Vec<SubmittedDetail>,
    ) -> Result<Vec<EncodedDetail>, AccumulationError> {
        let total = details.len();
        let mut tasks = Vec::new();
        for chunk in into_chunks(details, self.chunk_size) {
            let generator = Arc::clone(&self.generator);
            tasks.push(tokio::spawn(async move {
                chunk
                    .into_iter()
                    .map(|detail| {
                        let line = generator.encode_detail(&detail, &ctx)?;
                        Ok(EncodedDetail { detail, line })
                    })
                    .collect::<Result<Vec<_>, AccumulationError>>()
            }));
        }

        log::debug!("Encoding {} details across {} tasks", total, tasks.len());

        let mut encoded = Vec::with_capacity(total);
        for task in tasks {
            let chunk = task
                .await
                .map_err(|e| AccumulationError::task_failed(e.to_string()))??;
            encoded.extend(chunk);
        }
        Ok(encoded)
    }

    /// Reconcile parsed response rows concurrently
    ///
    /// # Returns
    ///
    /// Row results in input order, ready for
    /// [`ReconciliationReport::absorb`](crate::types::ReconciliationReport::absorb)
    pub async fn reconcile_rows(
        &self,
        rows: Vec<ParsedRow>,
        store: Arc<AsyncSubmissionStore>,
    ) -> Result<Vec<RowResult>, AccumulationError> {
        // Surface ResponseUnsupported before spawning anything
        self.reconciler.processor()?;

        let total = rows.len();
        let mut tasks = Vec::new();
        for chunk in into_chunks(rows, self.chunk_size) {
            let reconciler = Arc::clone(&self.reconciler);
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                let processor = reconciler.processor()?;
                Ok::<_, AccumulationError>(
                    chunk
                        .into_iter()
                        .map(|row| reconcile_row(processor, row, store.as_ref()))
                        .collect::<Vec<_>>(),
                )
            }));
        }

        log::debug!("Reconciling {} rows across {} tasks", total, tasks.len());

        let mut results = Vec::with_capacity(total);
        for task in tasks {
            let chunk = task
                .await
                .map_err(|e| AccumulationError::task_failed(e.to_string()))??;
            results.extend(chunk);
        }
        Ok(results)
    }
}

/// Split into contiguous owned chunks of at most `size` items
fn into_chunks<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size.max(1)));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(size.max(1)).collect());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::submission_store::test_records::submission;
    use crate::payer::create_adapter;
    use crate::types::detail::fixtures::{context, record, submitted};
    use crate::types::{PayerId, ReconciliationIssue, ResponseRow};
    use rstest::rstest;

    fn processor(payer: PayerId, chunk_size: usize) -> BatchProcessor {
        BatchProcessor::new(create_adapter(payer, None), chunk_size)
    }

    fn details(count: usize) -> Vec<SubmittedDetail> {
        (1..=count)
            .map(|i| {
                submitted(
                    record(&format!("cb-{}", i), 100 * i as i64, 10 * i as i64),
                    &format!("20261018143000{:04}", i),
                    i as u32,
                )
            })
            .collect()
    }

    #[rstest]
    #[case(0, 3, 0)]
    #[case(7, 3, 3)]
    #[case(6, 3, 2)]
    #[case(2, 10, 1)]
    #[case(4, 0, 4)]
    fn test_into_chunks(#[case] items: usize, #[case] size: usize, #[case] expected: usize) {
        let chunks = into_chunks((0..items).collect::<Vec<_>>(), size);
        assert_eq!(chunks.len(), expected);
        let flattened: Vec<usize> = chunks.into_iter().flatten().collect();
        assert_eq!(flattened, (0..items).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_encode_details_matches_sequential_order() {
        let processor = processor(PayerId::Summit, 3);
        let ctx = context();
        let input = details(10);

        let expected: Vec<String> = input
            .iter()
            .map(|detail| processor.generator().encode_detail(detail, &ctx).unwrap())
            .collect();

        let encoded = processor.encode_details(ctx, input.clone()).await.unwrap();

        assert_eq!(encoded.len(), 10);
        let lines: Vec<String> = encoded.iter().map(|e| e.line.clone()).collect();
        assert_eq!(lines, expected);
        let ids: Vec<&str> = encoded.iter().map(|e| e.detail.unique_id.as_str()).collect();
        let input_ids: Vec<&str> = input.iter().map(|d| d.unique_id.as_str()).collect();
        assert_eq!(ids, input_ids);
    }

    #[tokio::test]
    async fn test_encode_details_reports_first_failure_in_order() {
        let processor = processor(PayerId::Keystone, 2);
        let mut input = details(6);
        // Keystone requires an 11-digit subscriber id
        input[3].record.member.subscriber_id = "BAD".to_string();
        input[3].record.source_record_id = "cb-bad-1".to_string();
        input[5].record.member.subscriber_id = "BAD".to_string();
        input[5].record.source_record_id = "cb-bad-2".to_string();

        let err = processor.encode_details(context(), input).await.unwrap_err();

        match err {
            AccumulationError::BatchGeneration {
                source_record_id, ..
            } => assert_eq!(source_record_id, "cb-bad-1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_encode_empty_input() {
        let encoded = processor(PayerId::NorthStar, 4)
            .encode_details(context(), Vec::new())
            .await
            .unwrap();
        assert!(encoded.is_empty());
    }

    fn summit_row(line: usize, unique_id: &str, oop: &str) -> ParsedRow {
        Ok(ResponseRow::new(line)
            .with("record_type", "D")
            .with("unique_id", unique_id)
            .with("deductible", "000000{")
            .with("oop", oop)
            .with("hra", "000000{")
            .with("status", "A"))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reconcile_rows_preserves_order() {
        let processor = processor(PayerId::Summit, 2);
        let store = Arc::new(AsyncSubmissionStore::default());
        store.register_batch(
            "b1",
            (1..=5)
                .map(|i| submission("b1", &format!("u{}", i), 500))
                .collect(),
        );

        let mut rows: Vec<ParsedRow> = (1..=5)
            .map(|i| summit_row(i, &format!("u{}", i), "000050{"))
            .collect();
        rows.push(summit_row(6, "missing", "000050{"));
        rows.push(Err(ReconciliationIssue::MalformedRow {
            line: 7,
            message: "bad".to_string(),
        }));

        let results = processor.reconcile_rows(rows, store).await.unwrap();

        let lines: Vec<usize> = results.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4, 5, 6, 7]);
        assert!(results[..5].iter().all(|r| r.outcome.as_ref().is_some_and(|o| o.accepted)));
        assert!(matches!(
            results[5].issues.as_slice(),
            [ReconciliationIssue::UnmatchedResponseRow { .. }]
        ));
        assert!(matches!(
            results[6].issues.as_slice(),
            [ReconciliationIssue::MalformedRow { line: 7, .. }]
        ));
    }

    #[tokio::test]
    async fn test_reconcile_rows_unsupported_payer() {
        let err = processor(PayerId::Keystone, 2)
            .reconcile_rows(Vec::new(), Arc::new(AsyncSubmissionStore::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AccumulationError::ResponseUnsupported { .. }));
    }
}
