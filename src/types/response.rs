//! Response file rows, per-record outcomes and the reconciliation report

use super::detail::{AccumulatorKind, Cents, PayerId};
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

/// One parsed inbound line keyed by canonical field name
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseRow {
    /// 1-based line number in the response file
    pub line: usize,
    pub fields: HashMap<String, String>,
}

impl ResponseRow {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            fields: HashMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.fields.insert(name.to_string(), value.to_string());
    }

    /// Trimmed value, or "" when the field is absent
    pub fn get(&self, name: &str) -> &str {
        self.fields.get(name).map(|v| v.trim()).unwrap_or("")
    }
}

/// Classification of one response row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetailMetadata {
    /// The payer processed the row rather than echoing it back
    pub is_response: bool,
    /// The payer explicitly rejected the row
    pub is_rejection: bool,
    /// The ledger's submission status for this record must change
    pub should_update: bool,
    pub unique_id: String,
    pub member_id: String,
    pub response_status: String,
    pub response_code: String,
    pub response_reason: String,
}

/// Amounts recomputed from a response row's encoded fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconciledAmounts {
    pub deductible: Option<Cents>,
    pub oop: Option<Cents>,
    pub hra: Option<Cents>,
}

impl ReconciledAmounts {
    pub fn get(&self, kind: AccumulatorKind) -> Option<Cents> {
        match kind {
            AccumulatorKind::Deductible => self.deductible,
            AccumulatorKind::OutOfPocket => self.oop,
            AccumulatorKind::Hra => self.hra,
        }
    }
}

/// Per-record outcome handed back to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub line: usize,
    pub unique_id: String,
    pub source_record_id: String,
    pub accepted: bool,
    pub should_update: bool,
    pub status: String,
    pub code: String,
    pub reason: String,
    pub recomputed: ReconciledAmounts,
}

/// Non-fatal findings collected while reconciling a response file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationIssue {
    /// No submission in the retained history carries this unique id
    #[error("Line {line}: unique id {unique_id} does not match any submitted record")]
    UnmatchedResponseRow { line: usize, unique_id: String },

    /// The payer's amount differs from what was submitted
    #[error("Line {line}: {accumulator} for {unique_id} was submitted as {expected}, response carries {actual}")]
    ReconciliationMismatch {
        line: usize,
        unique_id: String,
        accumulator: AccumulatorKind,
        expected: Cents,
        actual: Cents,
    },

    /// The row could not be parsed or decoded
    #[error("Line {line}: {message}")]
    MalformedRow { line: usize, message: String },

    /// The run date was not in the file name and was assumed
    #[error("Run date not found in '{file_name}', assumed {assumed}")]
    RunDateFallback { file_name: String, assumed: NaiveDate },
}

impl ReconciliationIssue {
    /// Short machine-readable kind for issue reports
    pub fn kind(&self) -> &'static str {
        match self {
            ReconciliationIssue::UnmatchedResponseRow { .. } => "unmatched_response_row",
            ReconciliationIssue::ReconciliationMismatch { .. } => "reconciliation_mismatch",
            ReconciliationIssue::MalformedRow { .. } => "malformed_row",
            ReconciliationIssue::RunDateFallback { .. } => "run_date_fallback",
        }
    }

    /// Line the issue refers to; 0 for file-level issues
    pub fn line(&self) -> usize {
        match self {
            ReconciliationIssue::UnmatchedResponseRow { line, .. }
            | ReconciliationIssue::ReconciliationMismatch { line, .. }
            | ReconciliationIssue::MalformedRow { line, .. } => *line,
            ReconciliationIssue::RunDateFallback { .. } => 0,
        }
    }

    pub fn unique_id(&self) -> &str {
        match self {
            ReconciliationIssue::UnmatchedResponseRow { unique_id, .. }
            | ReconciliationIssue::ReconciliationMismatch { unique_id, .. } => unique_id,
            _ => "",
        }
    }
}

/// Where a report's run date came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDateSource {
    FileName,
    /// Not parseable from the file name; the run context's date was used
    FallbackToday,
}

/// Result of reconciling one response row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowResult {
    pub line: usize,
    /// False for rows the payer merely echoed back
    pub is_response: bool,
    pub outcome: Option<RecordOutcome>,
    pub issues: Vec<ReconciliationIssue>,
}

/// Everything learned from one response file, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationReport {
    pub payer: PayerId,
    pub file_name: String,
    pub run_date: NaiveDate,
    pub run_date_source: RunDateSource,
    pub rows_read: usize,
    pub echoed_rows: usize,
    pub outcomes: Vec<RecordOutcome>,
    pub issues: Vec<ReconciliationIssue>,
}

impl ReconciliationReport {
    pub fn new(payer: PayerId, file_name: &str, run_date: NaiveDate, run_date_source: RunDateSource) -> Self {
        let mut report = Self {
            payer,
            file_name: file_name.to_string(),
            run_date,
            run_date_source,
            rows_read: 0,
            echoed_rows: 0,
            outcomes: Vec::new(),
            issues: Vec::new(),
        };
        if run_date_source == RunDateSource::FallbackToday {
            report.issues.push(ReconciliationIssue::RunDateFallback {
                file_name: file_name.to_string(),
                assumed: run_date,
            });
        }
        report
    }

    /// Fold row results in; callers must pass them in file order
    pub fn absorb(&mut self, results: impl IntoIterator<Item = RowResult>) {
        for result in results {
            self.rows_read += 1;
            if !result.is_response && result.issues.is_empty() {
                self.echoed_rows += 1;
            }
            self.outcomes.extend(result.outcome);
            self.issues.extend(result.issues);
        }
    }

    pub fn accepted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.accepted).count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.accepted).count()
    }

    pub fn unmatched(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i, ReconciliationIssue::UnmatchedResponseRow { .. }))
            .count()
    }
}
