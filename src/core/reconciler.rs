//! Response file reconciliation
//!
//! Parses a payer's response file with the adapter's response layout, matches
//! every processed row to its submission by unique id and reports per-record
//! outcomes plus non-fatal issues, in file order.
//!
//! Fatal (returned as `Err`): the payer has no response support, the file name
//! is not one of the payer's response files, or a required CSV column cannot be
//! located. Everything row-level is an issue and processing continues.

use super::code_table::resolve_columns;
use super::traits::SubmissionLookup;
use crate::codec::field::unpack;
use crate::codec::FieldSpec;
use crate::payer::{PayerAdapter, ResponseLayout, ResponseProcessor};
use crate::types::{
    AccumulationError, AccumulatorKind, ReconciliationIssue, ReconciliationReport, RecordOutcome,
    ResponseRow, RowResult, RunContext, RunDateSource,
};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::sync::Arc;

/// A response row, or the reason it could not be read
pub type ParsedRow = Result<ResponseRow, ReconciliationIssue>;

const ACCUMULATORS: [AccumulatorKind; 3] = [
    AccumulatorKind::Deductible,
    AccumulatorKind::OutOfPocket,
    AccumulatorKind::Hra,
];

/// Reconciles response files for one payer
#[derive(Debug, Clone)]
pub struct ResponseReconciler {
    adapter: Arc<dyn PayerAdapter>,
}

impl ResponseReconciler {
    pub fn new(adapter: Arc<dyn PayerAdapter>) -> Self {
        Self { adapter }
    }

    /// The payer's response processor
    ///
    /// # Errors
    ///
    /// `ResponseUnsupported` for payers that send no response files
    pub fn processor(&self) -> Result<&dyn ResponseProcessor, AccumulationError> {
        self.adapter
            .response()
            .ok_or_else(|| AccumulationError::response_unsupported(self.adapter.payer().as_str()))
    }

    /// Reconcile a whole response file against submitted history
    ///
    /// # Arguments
    ///
    /// * `file_name` - Base name of the response file, used for recognition and run date
    /// * `contents` - File contents
    /// * `ctx` - Run context; its date is the fallback run date
    /// * `store` - Submissions of the retained batches
    pub fn reconcile<L: SubmissionLookup + ?Sized>(
        &self,
        file_name: &str,
        contents: &str,
        ctx: &RunContext,
        store: &L,
    ) -> Result<ReconciliationReport, AccumulationError> {
        let processor = self.processor()?;
        let mut report = self.begin(file_name, ctx)?;
        let rows = self.parse_rows(contents)?;

        report.absorb(rows.into_iter().map(|row| reconcile_row(processor, row, store)));
        self.finish(&report);
        Ok(report)
    }

    /// Recognize the file and settle its run date
    pub fn begin(
        &self,
        file_name: &str,
        ctx: &RunContext,
    ) -> Result<ReconciliationReport, AccumulationError> {
        let processor = self.processor()?;
        let payer = self.adapter.payer();

        if !processor.recognizes(file_name) {
            return Err(AccumulationError::unrecognized_response_file(
                payer.as_str(),
                file_name,
            ));
        }

        let (run_date, source) = match processor.file_date(file_name) {
            Some(date) => (date, RunDateSource::FileName),
            None => {
                log::warn!(
                    "No run date in response file name '{}', assuming {}",
                    file_name,
                    ctx.today()
                );
                (ctx.today(), RunDateSource::FallbackToday)
            }
        };

        Ok(ReconciliationReport::new(payer, file_name, run_date, source))
    }

    /// Log the report summary
    pub fn finish(&self, report: &ReconciliationReport) {
        log::info!(
            "Reconciled {} response {}: {} rows, {} accepted, {} rejected, {} unmatched, {} echoed, {} issues",
            report.payer,
            report.file_name,
            report.rows_read,
            report.accepted(),
            report.rejected(),
            report.unmatched(),
            report.echoed_rows,
            report.issues.len()
        );
    }

    /// Split a response file into rows keyed by field name
    ///
    /// # Errors
    ///
    /// `UnresolvedColumn` when a required CSV column is missing from the header row
    pub fn parse_rows(&self, contents: &str) -> Result<Vec<ParsedRow>, AccumulationError> {
        match *self.processor()?.layout() {
            ResponseLayout::FixedWidth {
                segment,
                record_type_field,
                detail_record_type,
            } => {
                let record_type = segment
                    .field(record_type_field)
                    .ok_or_else(|| AccumulationError::missing_field(segment.name, record_type_field))?;
                let max_length = segment.line_length.unwrap_or(usize::MAX);

                let mut rows = Vec::new();
                for (index, line) in contents.lines().enumerate() {
                    let line_number = index + 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    if unpack(line, record_type).ok() != Some(detail_record_type) {
                        continue;
                    }
                    rows.push(parse_fixed_width_row(line_number, line, segment.fields, max_length));
                }
                Ok(rows)
            }
            ResponseLayout::Delimited { delimiter, columns } => {
                let mut reader = ReaderBuilder::new()
                    .has_headers(false)
                    .flexible(true)
                    .delimiter(delimiter)
                    .from_reader(contents.as_bytes());

                let mut positions: Option<HashMap<&'static str, usize>> = None;
                let mut rows = Vec::new();
                for result in reader.records() {
                    let record = match result {
                        Ok(record) => record,
                        Err(e) => {
                            let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
                            rows.push(Err(ReconciliationIssue::MalformedRow {
                                line,
                                message: e.to_string(),
                            }));
                            continue;
                        }
                    };
                    if record.iter().all(|cell| cell.trim().is_empty()) {
                        continue;
                    }
                    let line = record.position().map(|p| p.line() as usize).unwrap_or(0);

                    // First non-blank row is the column header
                    if positions.is_none() {
                        let header_row: Vec<String> =
                            record.iter().map(|cell| cell.trim().to_string()).collect();
                        positions = Some(resolve_columns(columns, &header_row)?);
                        continue;
                    }
                    let Some(resolved) = positions.as_ref() else {
                        continue;
                    };

                    let mut row = ResponseRow::new(line);
                    for (canonical, &index) in resolved {
                        row.insert(canonical, record.get(index).unwrap_or(""));
                    }
                    rows.push(Ok(row));
                }
                Ok(rows)
            }
        }
    }
}

fn parse_fixed_width_row(
    line_number: usize,
    line: &str,
    fields: &[FieldSpec],
    max_length: usize,
) -> ParsedRow {
    let malformed = |message: String| ReconciliationIssue::MalformedRow {
        line: line_number,
        message,
    };

    if !line.is_ascii() {
        return Err(malformed("line contains non-ASCII characters".to_string()));
    }
    if line.len() > max_length {
        return Err(malformed(format!(
            "line is {} bytes, layout allows {}",
            line.len(),
            max_length
        )));
    }

    let mut row = ResponseRow::new(line_number);
    for spec in fields {
        let value = unpack(line, spec).map_err(|e| malformed(e.to_string()))?;
        row.insert(spec.name, value);
    }
    Ok(row)
}

/// Reconcile one parsed row against submitted history
///
/// Shared by the sequential and concurrent strategies; never fails, every
/// problem is reported on the returned [`RowResult`].
pub fn reconcile_row<L: SubmissionLookup + ?Sized>(
    processor: &dyn ResponseProcessor,
    parsed: ParsedRow,
    store: &L,
) -> RowResult {
    let row = match parsed {
        Ok(row) => row,
        Err(issue) => {
            log::warn!("{}", issue);
            return RowResult {
                line: issue.line(),
                is_response: false,
                outcome: None,
                issues: vec![issue],
            };
        }
    };

    let metadata = processor.classify(&row);
    let mut result = RowResult {
        line: row.line,
        is_response: metadata.is_response,
        ..Default::default()
    };

    if !metadata.is_response {
        log::debug!("Line {}: echo of {}, skipped", row.line, metadata.unique_id);
        return result;
    }

    let recomputed = match processor.extract_amounts(&row) {
        Ok(amounts) => amounts,
        Err(e) => {
            let issue = ReconciliationIssue::MalformedRow {
                line: row.line,
                message: e.to_string(),
            };
            log::warn!("{}", issue);
            result.issues.push(issue);
            return result;
        }
    };

    let Some(submission) = store.find(&metadata.unique_id) else {
        let issue = ReconciliationIssue::UnmatchedResponseRow {
            line: row.line,
            unique_id: metadata.unique_id,
        };
        log::warn!("{}", issue);
        result.issues.push(issue);
        return result;
    };

    let submitted = submission.amounts();
    for kind in ACCUMULATORS {
        if let Some(actual) = recomputed.get(kind) {
            let expected = submitted.get(kind);
            if actual != expected {
                let issue = ReconciliationIssue::ReconciliationMismatch {
                    line: row.line,
                    unique_id: metadata.unique_id.clone(),
                    accumulator: kind,
                    expected,
                    actual,
                };
                log::warn!("{}", issue);
                result.issues.push(issue);
            }
        }
    }

    log::debug!(
        "Line {}: {} {} ({})",
        row.line,
        metadata.unique_id,
        if metadata.is_rejection { "rejected" } else { "accepted" },
        metadata.response_status
    );

    result.outcome = Some(RecordOutcome {
        line: row.line,
        unique_id: metadata.unique_id,
        source_record_id: submission.source_record_id,
        accepted: !metadata.is_rejection,
        should_update: metadata.should_update,
        status: metadata.response_status,
        code: metadata.response_code,
        reason: metadata.response_reason,
        recomputed,
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::generator::AccumulationFileGenerator;
    use crate::core::submission_store::SubmissionStore;
    use crate::payer::create_adapter;
    use crate::types::detail::fixtures::{context, record};
    use crate::types::{PayerId, ReconciledAmounts};
    use chrono::NaiveDate;

    /// Generate a Summit batch and register it; returns its detail lines
    fn summit_history(store: &mut SubmissionStore) -> Vec<String> {
        let adapter = create_adapter(PayerId::Summit, None);
        let file = AccumulationFileGenerator::new(adapter)
            .generate(
                &context(),
                vec![record("cb-1", 1000, 500), record("cb-2", 0, 250), record("cb-3", 0, 75)],
            )
            .unwrap();
        store.register_batch(&file.batch.batch_id, file.batch.submission_records());
        file.contents()
            .lines()
            .filter(|line| line.starts_with('D'))
            .map(String::from)
            .collect()
    }

    fn summit_reconciler() -> ResponseReconciler {
        ResponseReconciler::new(create_adapter(PayerId::Summit, None))
    }

    #[test]
    fn test_summit_response_outcomes_in_file_order() {
        let mut store = SubmissionStore::default();
        let details = summit_history(&mut store);

        let contents = format!(
            "H header line\n{}A         \n{}R001020   \n{}          \nT trailer\n",
            details[0], details[1], details[2]
        );
        let report = summit_reconciler()
            .reconcile("summit_accum_resp_20261019.txt", &contents, &context(), &store)
            .unwrap();

        assert_eq!(report.run_date, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert_eq!(report.run_date_source, RunDateSource::FileName);
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.echoed_rows, 1);
        assert!(report.issues.is_empty());

        assert_eq!(report.outcomes.len(), 2);
        let accepted = &report.outcomes[0];
        assert_eq!(accepted.source_record_id, "cb-1");
        assert!(accepted.accepted);
        assert_eq!(
            accepted.recomputed,
            ReconciledAmounts { deductible: Some(1000), oop: Some(500), hra: Some(0) }
        );

        let rejected = &report.outcomes[1];
        assert_eq!(rejected.line, 3);
        assert!(!rejected.accepted);
        assert!(rejected.should_update);
        assert_eq!(rejected.code, "001,020");
        assert_eq!(rejected.reason, "Member not found; Coverage not active on service date");
    }

    #[test]
    fn test_unmatched_row_is_reported_and_later_rows_processed() {
        let mut store = SubmissionStore::default();
        let details = summit_history(&mut store);

        let stranger = details[0].replacen("202610181430000001", "202501010000009999", 1);
        let contents = format!("{}A         \n{}A         \n", stranger, details[1]);
        let report = summit_reconciler()
            .reconcile("summit_accum_resp_20261019.txt", &contents, &context(), &store)
            .unwrap();

        assert_eq!(
            report.issues,
            vec![ReconciliationIssue::UnmatchedResponseRow {
                line: 1,
                unique_id: "202501010000009999".to_string(),
            }]
        );
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].source_record_id, "cb-2");
    }

    #[test]
    fn test_amount_mismatch_is_reported_not_corrected() {
        let mut store = SubmissionStore::default();
        let details = summit_history(&mut store);

        // oop slot 86..93: 000050{ (500) becomes 000020E (205)
        let mut altered = details[0].clone();
        altered.replace_range(86..93, "000020E");
        let contents = format!("{}A         \n", altered);
        let report = summit_reconciler()
            .reconcile("summit_accum_resp_20261019.txt", &contents, &context(), &store)
            .unwrap();

        assert_eq!(
            report.issues,
            vec![ReconciliationIssue::ReconciliationMismatch {
                line: 1,
                unique_id: "202610181430000001".to_string(),
                accumulator: AccumulatorKind::OutOfPocket,
                expected: 500,
                actual: 205,
            }]
        );
        assert_eq!(report.outcomes[0].recomputed.oop, Some(205));
    }

    #[test]
    fn test_malformed_overpunch_fails_only_that_row() {
        let mut store = SubmissionStore::default();
        let details = summit_history(&mut store);

        let mut broken = details[0].clone();
        broken.replace_range(86..93, "00X050{");
        let contents = format!("{}A         \n{}A         \n", broken, details[1]);
        let report = summit_reconciler()
            .reconcile("summit_accum_resp_20261019.txt", &contents, &context(), &store)
            .unwrap();

        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind(), "malformed_row");
        assert_eq!(report.issues[0].line(), 1);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.echoed_rows, 0);
    }

    #[test]
    fn test_overlong_line_is_malformed() {
        let store = SubmissionStore::default();
        let contents = format!("D{}\n", "0".repeat(120));
        let report = summit_reconciler()
            .reconcile("summit_accum_resp_20261019.txt", &contents, &context(), &store)
            .unwrap();
        assert_eq!(report.issues[0].kind(), "malformed_row");
    }

    #[test]
    fn test_missing_file_date_falls_back_and_is_flagged() {
        let store = SubmissionStore::default();
        let report = summit_reconciler()
            .reconcile("summit_accum_resp_prod.txt", "", &context(), &store)
            .unwrap();
        assert_eq!(report.run_date, context().today());
        assert_eq!(report.run_date_source, RunDateSource::FallbackToday);
        assert_eq!(report.issues[0].kind(), "run_date_fallback");
    }

    #[test]
    fn test_unrecognized_file_name() {
        let store = SubmissionStore::default();
        let result = summit_reconciler().reconcile("random.txt", "", &context(), &store);
        assert_eq!(
            result,
            Err(AccumulationError::unrecognized_response_file("summit", "random.txt"))
        );
    }

    #[test]
    fn test_payer_without_response_support() {
        let store = SubmissionStore::default();
        let reconciler = ResponseReconciler::new(create_adapter(PayerId::Keystone, None));
        assert_eq!(
            reconciler.reconcile("anything.txt", "", &context(), &store),
            Err(AccumulationError::response_unsupported("keystone"))
        );
    }

    fn northstar_store() -> SubmissionStore {
        let adapter = create_adapter(PayerId::NorthStar, None);
        let mut reversal = record("cb-2", 1000, 250);
        reversal.is_reversal = true;
        let file = AccumulationFileGenerator::new(adapter)
            .generate(&context(), vec![record("cb-1", 1000, 250), reversal])
            .unwrap();
        let mut store = SubmissionStore::default();
        store.register_batch(&file.batch.batch_id, file.batch.submission_records());
        store
    }

    #[test]
    fn test_northstar_drifting_headers() {
        let store = northstar_store();
        let reconciler = ResponseReconciler::new(create_adapter(PayerId::NorthStar, None));

        let contents = "\
RECORD_ID,Member ID,deductible amount,OOP,Response Status,Error Code\n\
20261018143000cb-1,12345678901,10.00,2.50,A,\n\
20261018143000cb-2R,12345678901,-10.00,-2.50,r,e03\n\
20261018143000cb-9,12345678901,1.00,1.00,A,\n\
20261018143000cb-1,12345678901,10.00,2.50,,\n";
        let report = reconciler
            .reconcile("northstar_accum_resp_20261020.csv", contents, &context(), &store)
            .unwrap();

        assert_eq!(report.rows_read, 4);
        assert_eq!(report.echoed_rows, 1);
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes[0].accepted);
        assert_eq!(report.outcomes[0].line, 2);
        assert_eq!(report.outcomes[0].recomputed.hra, None);

        assert!(!report.outcomes[1].accepted);
        assert_eq!(report.outcomes[1].source_record_id, "cb-2");
        assert_eq!(report.outcomes[1].reason, "Duplicate accumulator record");

        assert_eq!(report.unmatched(), 1);
        assert_eq!(report.issues[0].line(), 4);
    }

    #[test]
    fn test_northstar_missing_required_column_is_fatal() {
        let store = northstar_store();
        let reconciler = ResponseReconciler::new(create_adapter(PayerId::NorthStar, None));
        let result = reconciler.reconcile(
            "northstar_accum_resp_20261020.csv",
            "Unique ID,Deductible\n20261018143000cb-1,10.00\n",
            &context(),
            &store,
        );
        assert_eq!(result, Err(AccumulationError::unresolved_column("status")));
    }

    #[test]
    fn test_northstar_unparseable_amount_is_row_level() {
        let store = northstar_store();
        let reconciler = ResponseReconciler::new(create_adapter(PayerId::NorthStar, None));
        let contents = "Unique ID,OOP,Status\n20261018143000cb-1,two dollars,A\n20261018143000cb-1,2.50,A\n";
        let report = reconciler
            .reconcile("northstar_accum_resp_20261020.csv", contents, &context(), &store)
            .unwrap();
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind(), "malformed_row");
        assert_eq!(report.outcomes.len(), 1);
    }
}
