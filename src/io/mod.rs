//! I/O module
//!
//! Handles the ledger-side CSV formats.
//!
//! # Components
//!
//! - `ledger_format` - Ledger rows, submission manifests, outcome and issue reports
//! - `sync_reader` - Synchronous ledger reader with iterator interface
//! - `async_reader` - Asynchronous ledger reader with batch reading interface

pub mod async_reader;
pub mod ledger_format;
pub mod sync_reader;

pub use async_reader::AsyncLedgerReader;
pub use ledger_format::{
    convert_ledger_record, group_by_batch, parse_manifest, read_manifest, write_issues_csv,
    write_manifest, write_outcomes_csv, LedgerCsvRecord,
};
pub use sync_reader::SyncLedgerReader;
