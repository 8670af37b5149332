//! Error types for the accumulator file engine
//!
//! This module defines every fatal error that can occur while generating a batch
//! file or while parsing an inbound response file. Non-fatal reconciliation
//! findings live in [`crate::types::response::ReconciliationIssue`].
//!
//! # Error Categories
//!
//! - **Encoding Errors**: field overflow, non-ASCII fixed-width values, broken layouts
//! - **Codec Errors**: malformed overpunch tokens, unparseable amounts and dates
//! - **Payer Rule Errors**: invalid member identifiers, unmapped code table keys
//! - **Batch Errors**: any detail-level failure wrapped with the offending source record
//! - **Response Errors**: unrecognized response files, unresolved response columns
//! - **File I/O Errors**: ledger/manifest/response files that cannot be read or written

use thiserror::Error;

/// Main error type for the accumulator file engine
///
/// Generation-time errors are always fatal to the whole batch: a file with a wrong
/// trailer count is worse than no file. Reconciliation-time errors returned by this
/// type are fatal to the response file as a whole (wrong payer, unreadable layout);
/// per-row problems are reported as issues instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccumulationError {
    /// A value does not fit its field
    ///
    /// Never truncated: a shortened subscriber id would credit the wrong member.
    #[error("Value '{value}' overflows field {field} (width {width})")]
    FieldOverflow {
        /// Field name from the payer layout
        field: String,
        /// Configured field width
        width: usize,
        /// The offending value
        value: String,
    },

    /// A fixed-width field received a non-ASCII value
    ///
    /// Fixed-width offsets are byte offsets, so multi-byte characters would shift
    /// every following column.
    #[error("Field {field} requires ASCII, got '{value}'")]
    NonAsciiField {
        /// Field name from the payer layout
        field: String,
        /// The offending value
        value: String,
    },

    /// A required field has no value
    #[error("Missing required field {field} in {segment} segment")]
    MissingField {
        /// Segment name (header, detail, trailer, response)
        segment: String,
        /// Field name from the payer layout
        field: String,
    },

    /// A fixed-width segment's field table does not add up to its line length
    #[error("{segment} segment layout covers {actual} bytes, expected {expected}")]
    SegmentLength {
        /// Segment name
        segment: String,
        /// Declared line length
        expected: usize,
        /// Width actually covered by the field table
        actual: usize,
    },

    /// An overpunch token could not be decoded
    #[error("Malformed overpunch token '{token}'")]
    MalformedOverpunch {
        /// The raw token
        token: String,
    },

    /// A monetary amount is negative where it must not be, or unparseable
    #[error("Invalid amount '{value}' for {field}")]
    InvalidAmount {
        /// Field or column name
        field: String,
        /// The raw value
        value: String,
    },

    /// Control total arithmetic overflowed
    #[error("Arithmetic overflow while computing {operation}")]
    AmountOverflow {
        /// Total being computed
        operation: String,
    },

    /// A date could not be parsed
    #[error("Invalid date '{value}' for {field}")]
    InvalidDate {
        /// Field or column name
        field: String,
        /// The raw value
        value: String,
    },

    /// A payer-specific member identifier rule rejected the record
    #[error("Invalid member identifier '{member_id}' on record {source_record_id}: {reason}")]
    InvalidMemberIdentifier {
        /// Ledger reference of the rejected record
        source_record_id: String,
        /// The identifier that failed validation
        member_id: String,
        /// Rule that failed
        reason: String,
    },

    /// No payer code exists for a domain value
    #[error("No {table} code mapped for {key}")]
    UnmappedCode {
        /// Code table name
        table: String,
        /// The domain value that had no code
        key: String,
    },

    /// Two details in one batch derived the same unique id
    #[error("Duplicate unique id {unique_id} within batch")]
    DuplicateUniqueId {
        /// The colliding unique id
        unique_id: String,
    },

    /// The batch has more details than the payer's unique id counter can number
    #[error("{payer} batch of {records} details exceeds capacity of {capacity}")]
    BatchCapacityExceeded {
        /// Payer identifier
        payer: String,
        /// Most details one batch can hold
        capacity: usize,
        /// Details in the rejected batch
        records: usize,
    },

    /// A detail record failed; the whole batch is aborted
    #[error("Batch generation aborted at record {source_record_id}: {source}")]
    BatchGeneration {
        /// Ledger reference of the offending record
        source_record_id: String,
        /// Underlying failure
        source: Box<AccumulationError>,
    },

    /// The payer adapter does not process response files
    #[error("Payer {payer} does not support response files")]
    ResponseUnsupported {
        /// Payer identifier
        payer: String,
    },

    /// A response file name does not match the payer's pattern
    #[error("File '{file_name}' is not a {payer} response file")]
    UnrecognizedResponseFile {
        /// Payer identifier
        payer: String,
        /// The rejected file name
        file_name: String,
    },

    /// A response column could not be located in the header row
    #[error("Response column {column} not found in header row")]
    UnresolvedColumn {
        /// Canonical column name
        column: String,
    },

    /// CSV parsing error
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// A worker task panicked or was cancelled
    #[error("Worker task failed: {message}")]
    TaskFailed {
        /// Join error reported by the runtime
        message: String,
    },
}

impl From<std::io::Error> for AccumulationError {
    fn from(error: std::io::Error) -> Self {
        AccumulationError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for AccumulationError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        AccumulationError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<csv_async::Error> for AccumulationError {
    fn from(error: csv_async::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        AccumulationError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl AccumulationError {
    /// Create a FieldOverflow error
    pub fn field_overflow(field: &str, width: usize, value: &str) -> Self {
        AccumulationError::FieldOverflow {
            field: field.to_string(),
            width,
            value: value.to_string(),
        }
    }

    /// Create a NonAsciiField error
    pub fn non_ascii(field: &str, value: &str) -> Self {
        AccumulationError::NonAsciiField {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(segment: &str, field: &str) -> Self {
        AccumulationError::MissingField {
            segment: segment.to_string(),
            field: field.to_string(),
        }
    }

    /// Create a SegmentLength error
    pub fn segment_length(segment: &str, expected: usize, actual: usize) -> Self {
        AccumulationError::SegmentLength {
            segment: segment.to_string(),
            expected,
            actual,
        }
    }

    /// Create a MalformedOverpunch error
    pub fn malformed_overpunch(token: &str) -> Self {
        AccumulationError::MalformedOverpunch {
            token: token.to_string(),
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(field: &str, value: &str) -> Self {
        AccumulationError::InvalidAmount {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an AmountOverflow error
    pub fn amount_overflow(operation: &str) -> Self {
        AccumulationError::AmountOverflow {
            operation: operation.to_string(),
        }
    }

    /// Create an InvalidDate error
    pub fn invalid_date(field: &str, value: &str) -> Self {
        AccumulationError::InvalidDate {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an InvalidMemberIdentifier error
    pub fn invalid_member_identifier(source_record_id: &str, member_id: &str, reason: &str) -> Self {
        AccumulationError::InvalidMemberIdentifier {
            source_record_id: source_record_id.to_string(),
            member_id: member_id.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an UnmappedCode error
    pub fn unmapped_code(table: &str, key: impl std::fmt::Debug) -> Self {
        AccumulationError::UnmappedCode {
            table: table.to_string(),
            key: format!("{:?}", key),
        }
    }

    /// Create a DuplicateUniqueId error
    pub fn duplicate_unique_id(unique_id: &str) -> Self {
        AccumulationError::DuplicateUniqueId {
            unique_id: unique_id.to_string(),
        }
    }

    /// Create a BatchCapacityExceeded error
    pub fn batch_capacity_exceeded(payer: &str, capacity: usize, records: usize) -> Self {
        AccumulationError::BatchCapacityExceeded {
            payer: payer.to_string(),
            capacity,
            records,
        }
    }

    /// Wrap a detail-level failure so the batch reports which record broke it
    ///
    /// Already-wrapped errors are returned unchanged.
    pub fn batch_generation(source_record_id: &str, source: AccumulationError) -> Self {
        match source {
            wrapped @ AccumulationError::BatchGeneration { .. } => wrapped,
            other => AccumulationError::BatchGeneration {
                source_record_id: source_record_id.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Create a ResponseUnsupported error
    pub fn response_unsupported(payer: &str) -> Self {
        AccumulationError::ResponseUnsupported {
            payer: payer.to_string(),
        }
    }

    /// Create an UnrecognizedResponseFile error
    pub fn unrecognized_response_file(payer: &str, file_name: &str) -> Self {
        AccumulationError::UnrecognizedResponseFile {
            payer: payer.to_string(),
            file_name: file_name.to_string(),
        }
    }

    /// Create an UnresolvedColumn error
    pub fn unresolved_column(column: &str) -> Self {
        AccumulationError::UnresolvedColumn {
            column: column.to_string(),
        }
    }

    /// Create a TaskFailed error
    pub fn task_failed(message: impl Into<String>) -> Self {
        AccumulationError::TaskFailed {
            message: message.into(),
        }
    }

    /// Create a ParseError without line information
    pub fn parse_error(message: impl Into<String>) -> Self {
        AccumulationError::ParseError {
            line: None,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::field_overflow(
        AccumulationError::field_overflow("subscriber_id", 11, "123456789012"),
        "Value '123456789012' overflows field subscriber_id (width 11)"
    )]
    #[case::malformed_overpunch(
        AccumulationError::malformed_overpunch("12X"),
        "Malformed overpunch token '12X'"
    )]
    #[case::invalid_member_identifier(
        AccumulationError::invalid_member_identifier("cb-7", "1234", "must be exactly 11 digits"),
        "Invalid member identifier '1234' on record cb-7: must be exactly 11 digits"
    )]
    #[case::segment_length(
        AccumulationError::segment_length("detail", 160, 158),
        "detail segment layout covers 158 bytes, expected 160"
    )]
    #[case::parse_error_with_line(
        AccumulationError::ParseError { line: Some(42), message: "Invalid field".to_string() },
        "CSV parse error at line 42: Invalid field"
    )]
    #[case::parse_error_without_line(
        AccumulationError::parse_error("Invalid field"),
        "CSV parse error: Invalid field"
    )]
    #[case::unmapped_code(
        AccumulationError::unmapped_code("relationship", "Other"),
        "No relationship code mapped for \"Other\""
    )]
    #[case::batch_capacity_exceeded(
        AccumulationError::batch_capacity_exceeded("summit", 9999, 10000),
        "summit batch of 10000 details exceeds capacity of 9999"
    )]
    fn test_error_display(#[case] error: AccumulationError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_batch_generation_names_source_record() {
        let error = AccumulationError::batch_generation(
            "cb-9",
            AccumulationError::field_overflow("last_name", 5, "Montgomery"),
        );
        assert_eq!(
            error.to_string(),
            "Batch generation aborted at record cb-9: Value 'Montgomery' overflows field last_name (width 5)"
        );
    }

    #[test]
    fn test_batch_generation_does_not_double_wrap() {
        let inner = AccumulationError::batch_generation(
            "cb-1",
            AccumulationError::duplicate_unique_id("20261018143000cb-1"),
        );
        let outer = AccumulationError::batch_generation("cb-2", inner.clone());
        assert_eq!(outer, inner);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: AccumulationError = io_error.into();
        assert!(matches!(error, AccumulationError::IoError { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}
