//! CSV formats owned by the harness
//!
//! This module centralizes the file formats the engine exchanges with the
//! surrounding ledger:
//! - LedgerCsvRecord structure for reading the ledger export
//! - Conversion from ledger rows to [`DetailRecord`]
//! - Submission manifest reading and writing
//! - Outcome and issue report serialization
//!
//! All functions are pure (no file system access) for easy testing, except
//! [`read_manifest`].

use crate::types::{
    AccumulationError, Cents, DetailRecord, Member, ReconciliationIssue, ReconciliationReport,
    Relationship, Sex, SubmissionRecord,
};
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim, Writer};
use serde::Deserialize;
use std::io::Write;
use std::path::Path;

/// Ledger export dates are ISO `YYYY-MM-DD`
const LEDGER_DATE_FORMAT: &str = "%Y-%m-%d";

/// Ledger export row
///
/// Optional columns may be missing from the header entirely or left blank.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LedgerCsvRecord {
    pub source_record_id: String,
    pub subscriber_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub sex: String,
    pub relationship: String,
    pub group_id: String,
    pub service_start_date: String,
    pub deductible_cents: Cents,
    pub oop_cents: Cents,
    #[serde(default)]
    pub hra_cents: Option<Cents>,
    #[serde(default)]
    pub is_reversal: Option<String>,
    #[serde(default)]
    pub is_regeneration: Option<String>,
    #[serde(default)]
    pub sequence_number: Option<u32>,
    #[serde(default)]
    pub cached_unique_id: Option<String>,
}

/// Convert a ledger row into a DetailRecord
///
/// # Arguments
///
/// * `csv_record` - The deserialized ledger row
/// * `line` - Line number in the export, for error messages
///
/// # Returns
///
/// * `Ok(DetailRecord)` - Successfully converted record
/// * `Err(AccumulationError::ParseError)` - Describes the field that failed
pub fn convert_ledger_record(
    csv_record: LedgerCsvRecord,
    line: u64,
) -> Result<DetailRecord, AccumulationError> {
    let fail = |message: String| AccumulationError::ParseError {
        line: Some(line),
        message: format!("record {}: {}", csv_record.source_record_id, message),
    };

    if csv_record.source_record_id.trim().is_empty() {
        return Err(AccumulationError::ParseError {
            line: Some(line),
            message: "source_record_id is blank".to_string(),
        });
    }

    let date_of_birth = parse_ledger_date("date_of_birth", &csv_record.date_of_birth)
        .map_err(|e| fail(e.to_string()))?;
    let service_start_date = parse_ledger_date("service_start_date", &csv_record.service_start_date)
        .map_err(|e| fail(e.to_string()))?;
    let sex = csv_record.sex.parse::<Sex>().map_err(&fail)?;
    let relationship = csv_record.relationship.parse::<Relationship>().map_err(&fail)?;
    let is_reversal = parse_flag("is_reversal", csv_record.is_reversal.as_deref()).map_err(&fail)?;
    let is_regeneration =
        parse_flag("is_regeneration", csv_record.is_regeneration.as_deref()).map_err(&fail)?;

    let cached_unique_id = csv_record
        .cached_unique_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    Ok(DetailRecord {
        source_record_id: csv_record.source_record_id.trim().to_string(),
        member: Member {
            subscriber_id: csv_record.subscriber_id.trim().to_string(),
            first_name: csv_record.first_name.trim().to_string(),
            last_name: csv_record.last_name.trim().to_string(),
            date_of_birth,
            sex,
            relationship,
            group_id: csv_record.group_id.trim().to_string(),
        },
        service_start_date,
        deductible_cents: csv_record.deductible_cents,
        oop_applied_cents: csv_record.oop_cents,
        hra_applied_cents: csv_record.hra_cents,
        is_reversal,
        is_regeneration,
        sequence_number: csv_record.sequence_number,
        cached_unique_id,
    })
}

fn parse_ledger_date(field: &str, value: &str) -> Result<NaiveDate, AccumulationError> {
    NaiveDate::parse_from_str(value.trim(), LEDGER_DATE_FORMAT)
        .map_err(|_| AccumulationError::invalid_date(field, value))
}

/// Boolean ledger flag; blank or absent means false
fn parse_flag(field: &str, value: Option<&str>) -> Result<bool, String> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("0") | Some("n") | Some("no") => Ok(false),
        Some("true") | Some("1") | Some("y") | Some("yes") => Ok(true),
        Some(other) => Err(format!("Invalid {} flag '{}'", field, other)),
    }
}

/// Write a batch's submission records as a manifest
pub fn write_manifest(
    records: &[SubmissionRecord],
    output: &mut dyn Write,
) -> Result<(), AccumulationError> {
    let mut writer = Writer::from_writer(output);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Parse manifest contents back into submission records
pub fn parse_manifest(contents: &[u8]) -> Result<Vec<SubmissionRecord>, AccumulationError> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(contents);
    reader
        .deserialize::<SubmissionRecord>()
        .map(|result| result.map_err(AccumulationError::from))
        .collect()
}

/// Read a manifest file from disk
pub fn read_manifest(path: &Path) -> Result<Vec<SubmissionRecord>, AccumulationError> {
    let contents = std::fs::read(path).map_err(|e| AccumulationError::IoError {
        message: format!("Failed to read manifest '{}': {}", path.display(), e),
    })?;
    parse_manifest(&contents)
}

/// Group manifest records by batch, in first-seen order
///
/// A manifest normally holds one batch, but concatenated manifests are
/// accepted.
pub fn group_by_batch(records: Vec<SubmissionRecord>) -> Vec<(String, Vec<SubmissionRecord>)> {
    let mut batches: Vec<(String, Vec<SubmissionRecord>)> = Vec::new();
    for record in records {
        match batches.iter_mut().find(|(id, _)| *id == record.batch_id) {
            Some((_, members)) => members.push(record),
            None => batches.push((record.batch_id.clone(), vec![record])),
        }
    }
    batches
}

fn optional_cents(cents: Option<Cents>) -> String {
    cents.map(|c| c.to_string()).unwrap_or_default()
}

/// Write per-record outcomes in file order
///
/// Columns: unique_id, source_record_id, accepted, should_update, status,
/// code, reason, deductible_cents, oop_cents, hra_cents
pub fn write_outcomes_csv(
    report: &ReconciliationReport,
    output: &mut dyn Write,
) -> Result<(), AccumulationError> {
    let mut writer = Writer::from_writer(output);

    writer.write_record([
        "unique_id",
        "source_record_id",
        "accepted",
        "should_update",
        "status",
        "code",
        "reason",
        "deductible_cents",
        "oop_cents",
        "hra_cents",
    ])?;

    for outcome in &report.outcomes {
        writer.write_record(&[
            outcome.unique_id.clone(),
            outcome.source_record_id.clone(),
            outcome.accepted.to_string(),
            outcome.should_update.to_string(),
            outcome.status.clone(),
            outcome.code.clone(),
            outcome.reason.clone(),
            optional_cents(outcome.recomputed.deductible),
            optional_cents(outcome.recomputed.oop),
            optional_cents(outcome.recomputed.hra),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write reconciliation issues: line, kind, unique_id, message
pub fn write_issues_csv(
    issues: &[ReconciliationIssue],
    output: &mut dyn Write,
) -> Result<(), AccumulationError> {
    let mut writer = Writer::from_writer(output);
    writer.write_record(["line", "kind", "unique_id", "message"])?;
    for issue in issues {
        writer.write_record(&[
            issue.line().to_string(),
            issue.kind().to_string(),
            issue.unique_id().to_string(),
            issue.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
