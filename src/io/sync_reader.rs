//! Synchronous ledger reader with iterator interface
//!
//! Provides a streaming iterator over detail records from a ledger export.
//! Delegates format concerns to the ledger_format module.
//!
//! # Iterator Interface
//!
//! SyncLedgerReader implements the Iterator trait, yielding
//! `Result<DetailRecord, AccumulationError>` for each CSV row:
//!
//! ```no_run
//! use accumulator_files::io::sync_reader::SyncLedgerReader;
//! use std::path::Path;
//!
//! let reader = SyncLedgerReader::new(Path::new("ledger.csv")).unwrap();
//! let records: Result<Vec<_>, _> = reader.collect();
//! ```

use crate::io::ledger_format::{convert_ledger_record, LedgerCsvRecord};
use crate::types::{AccumulationError, DetailRecord};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::path::Path;

/// Synchronous ledger reader
#[derive(Debug)]
pub struct SyncLedgerReader {
    reader: csv::Reader<File>,
    headers: StringRecord,
}

impl SyncLedgerReader {
    /// Open a ledger export
    ///
    /// # Errors
    ///
    /// `IoError` if the file cannot be opened, `ParseError` if its header row
    /// cannot be read
    pub fn new(path: &Path) -> Result<Self, AccumulationError> {
        let file = File::open(path).map_err(|e| AccumulationError::IoError {
            message: format!("Failed to open ledger '{}': {}", path.display(), e),
        })?;

        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        let headers = reader.headers()?.clone();

        Ok(Self { reader, headers })
    }
}

impl Iterator for SyncLedgerReader {
    type Item = Result<DetailRecord, AccumulationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = StringRecord::new();
        match self.reader.read_record(&mut record) {
            Ok(false) => None,
            Ok(true) => {
                // Physical line where the record starts; quoted cells may span lines
                let line = record.position().map(|pos| pos.line()).unwrap_or(0);
                Some(
                    record
                        .deserialize::<LedgerCsvRecord>(Some(&self.headers))
                        .map_err(|e| AccumulationError::ParseError {
                            line: Some(line),
                            message: e.to_string(),
                        })
                        .and_then(|csv_record| convert_ledger_record(csv_record, line)),
                )
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}
