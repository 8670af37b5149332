//! Asynchronous ledger reader with batch interface
//!
//! Reads detail records from a ledger export in fixed-size batches so the
//! concurrent strategy never holds more than one batch of raw rows at a time.
//!
//! # Architecture
//!
//! ```text
//! Ledger CSV → AsyncLedgerReader → Batches of DetailRecords
//!                   ↓
//!           ledger_format module
//!   (LedgerCsvRecord, convert_ledger_record)
//! ```

use crate::io::ledger_format::{convert_ledger_record, LedgerCsvRecord};
use crate::types::{AccumulationError, DetailRecord};
use csv_async::{AsyncReaderBuilder, StringRecord};
use futures::io::AsyncRead;

/// Asynchronous ledger reader
pub struct AsyncLedgerReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncReader<R>,
    headers: Option<StringRecord>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncLedgerReader<R> {
    /// Create a new reader from any async byte source
    ///
    /// # Arguments
    ///
    /// * `reader` - Async reader positioned at the header row
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_reader(reader);

        Self {
            csv_reader,
            headers: None,
        }
    }

    /// Read up to `batch_size` records
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<DetailRecord>)` - The next records; empty at end of input
    /// * `Err(AccumulationError)` - The first malformed row; generation must
    ///   not continue past it
    pub async fn read_batch(
        &mut self,
        batch_size: usize,
    ) -> Result<Vec<DetailRecord>, AccumulationError> {
        if self.headers.is_none() {
            self.headers = Some(self.csv_reader.headers().await?.clone());
        }
        let headers = self.headers.as_ref();

        let mut batch = Vec::with_capacity(batch_size);
        let mut record = StringRecord::new();
        while batch.len() < batch_size {
            if !self.csv_reader.read_record(&mut record).await? {
                break;
            }
            // Physical line where the record starts; quoted cells may span lines
            let line = record.position().map(|pos| pos.line()).unwrap_or(0);
            let csv_record = record
                .deserialize::<LedgerCsvRecord>(headers)
                .map_err(|e| AccumulationError::ParseError {
                    line: Some(line),
                    message: e.to_string(),
                })?;
            batch.push(convert_ledger_record(csv_record, line)?);
        }

        Ok(batch)
    }
}
