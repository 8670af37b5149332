//! Batch file generation
//!
//! This module provides the `AccumulationFileGenerator`, which turns an ordered
//! list of ledger detail records into one payer batch file. It is generic over
//! [`PayerAdapter`]: the generator owns the protocol (identity, ordering,
//! counting, assembly), the adapter owns every payer-specific byte.
//!
//! # Generation Steps
//!
//! 1. **Prepare**: reject negative amounts, fix sequence numbers, signed
//!    amounts and unique ids, detect duplicate unique ids
//! 2. **Encode details**: validate, map and pack each detail independently
//! 3. **Assemble**: count control totals in file order, build header and
//!    trailer, join every line with the payer's terminator
//!
//! Steps 1 and 3 are sequential. Step 2 has no shared state and may run in
//! parallel (see [`crate::core::r#async::BatchProcessor`]).
//!
//! # Failure
//!
//! Any detail failure aborts the whole batch with
//! [`AccumulationError::BatchGeneration`] naming the offending record. No
//! partial file is ever produced.

use crate::codec::encode_segment;
use crate::payer::{PayerAdapter, UniqueIdScheme};
use crate::types::{
    AccumulationBatch, AccumulationError, ControlTotals, DetailRecord, RunContext, SignedAmounts,
    SubmittedDetail,
};
use std::collections::HashSet;
use std::sync::Arc;

/// A detail together with its encoded line
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDetail {
    pub detail: SubmittedDetail,
    pub line: String,
}

/// A complete batch file ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub batch: AccumulationBatch,
}

impl GeneratedFile {
    /// File contents as text; batch files are always UTF-8
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Generic batch generator for one payer
#[derive(Debug, Clone)]
pub struct AccumulationFileGenerator {
    adapter: Arc<dyn PayerAdapter>,
}

impl AccumulationFileGenerator {
    pub fn new(adapter: Arc<dyn PayerAdapter>) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &Arc<dyn PayerAdapter> {
        &self.adapter
    }

    /// Generate a complete batch file
    ///
    /// # Arguments
    ///
    /// * `ctx` - Run timestamp and environment
    /// * `records` - Detail records in the order they must appear in the file
    ///
    /// # Returns
    ///
    /// * `Ok(GeneratedFile)` - File name, bytes and the batch it encodes
    /// * `Err(AccumulationError)` - The batch was aborted; nothing was produced
    pub fn generate(
        &self,
        ctx: &RunContext,
        records: Vec<DetailRecord>,
    ) -> Result<GeneratedFile, AccumulationError> {
        let details = self.prepare(ctx, records)?;
        let encoded = details
            .into_iter()
            .map(|detail| {
                let line = self.encode_detail(&detail, ctx)?;
                Ok(EncodedDetail { detail, line })
            })
            .collect::<Result<Vec<_>, AccumulationError>>()?;
        self.assemble(ctx, encoded)
    }

    /// Fix the identity of every detail
    ///
    /// Sequence numbers default to the 1-based file position. Unique ids reuse
    /// a cached id unless the record was regenerated, otherwise follow the
    /// payer's scheme.
    ///
    /// # Errors
    ///
    /// * `BatchCapacityExceeded` when a counter scheme cannot number every record
    /// * `BatchGeneration` wrapping `InvalidAmount` for a negative ledger amount
    /// * `BatchGeneration` wrapping `DuplicateUniqueId` when two details derive
    ///   the same unique id
    pub fn prepare(
        &self,
        ctx: &RunContext,
        records: Vec<DetailRecord>,
    ) -> Result<Vec<SubmittedDetail>, AccumulationError> {
        let profile = self.adapter.profile();
        if let Some(capacity) = profile.unique_ids.capacity() {
            if records.len() > capacity {
                return Err(AccumulationError::batch_capacity_exceeded(
                    profile.payer.as_str(),
                    capacity,
                    records.len(),
                ));
            }
        }

        let mut seen = HashSet::with_capacity(records.len());
        let mut details = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let position = index + 1;
            check_non_negative(&record)?;

            let sequence_number = match record.sequence_number {
                Some(sequence_number) => sequence_number,
                None => u32::try_from(position).map_err(|_| {
                    AccumulationError::field_overflow("sequence_number", 10, &position.to_string())
                })?,
            };

            let unique_id = self.unique_id(ctx, &record, position);
            if !seen.insert(unique_id.clone()) {
                return Err(AccumulationError::batch_generation(
                    &record.source_record_id,
                    AccumulationError::duplicate_unique_id(&unique_id),
                ));
            }

            details.push(SubmittedDetail {
                unique_id,
                sequence_number,
                amounts: SignedAmounts::for_record(&record),
                record,
            });
        }

        Ok(details)
    }

    fn unique_id(&self, ctx: &RunContext, record: &DetailRecord, position: usize) -> String {
        if let Some(cached) = record.cached_unique_id.as_deref().filter(|id| !id.is_empty()) {
            if !record.is_regeneration {
                log::debug!(
                    "Reusing unique id {} for record {}",
                    cached,
                    record.source_record_id
                );
                return cached.to_string();
            }
            log::debug!(
                "Record {} was regenerated, not reusing unique id {}",
                record.source_record_id,
                cached
            );
        }

        match self.adapter.profile().unique_ids {
            UniqueIdScheme::SourceId => format!(
                "{}{}{}",
                ctx.timestamp_token(),
                record.source_record_id,
                if record.is_reversal { "R" } else { "" }
            ),
            UniqueIdScheme::Counter { width } => {
                format!("{}{:0width$}", ctx.timestamp_token(), position, width = width)
            }
        }
    }

    /// Validate, map and pack one detail line
    ///
    /// Independent of every other detail, so safe to call concurrently.
    pub fn encode_detail(
        &self,
        detail: &SubmittedDetail,
        ctx: &RunContext,
    ) -> Result<String, AccumulationError> {
        let wrap = |error: AccumulationError| {
            AccumulationError::batch_generation(&detail.record.source_record_id, error)
        };
        let profile = self.adapter.profile();

        self.adapter.validate(&detail.record).map_err(wrap)?;
        let values = self.adapter.detail_fields(detail, ctx).map_err(wrap)?;
        encode_segment(profile.format, &profile.layout.detail, &values).map_err(wrap)
    }

    /// Count, build header and trailer, and join the file in detail order
    pub fn assemble(
        &self,
        ctx: &RunContext,
        encoded: Vec<EncodedDetail>,
    ) -> Result<GeneratedFile, AccumulationError> {
        let profile = self.adapter.profile();

        let totals = encoded.iter().try_fold(ControlTotals::default(), |totals, item| {
            totals
                .add(&item.detail.amounts)
                .ok_or_else(|| AccumulationError::amount_overflow("trailer control totals"))
        })?;

        let header = encode_segment(
            profile.format,
            &profile.layout.header,
            &self.adapter.header_fields(ctx),
        )?;
        let trailer = encode_segment(
            profile.format,
            &profile.layout.trailer,
            &self.adapter.trailer_fields(ctx, &totals),
        )?;

        let mut contents = String::new();
        let mut details = Vec::with_capacity(encoded.len());
        for line in std::iter::once(header.as_str())
            .chain(encoded.iter().map(|item| item.line.as_str()))
            .chain(std::iter::once(trailer.as_str()))
        {
            contents.push_str(line);
            contents.push_str(profile.line_terminator);
        }
        details.extend(encoded.into_iter().map(|item| item.detail));

        let batch = AccumulationBatch {
            batch_id: AccumulationBatch::batch_id_for(profile.payer, ctx),
            payer: profile.payer,
            encoding: profile.encoding,
            run: *ctx,
            details,
            totals,
        };
        let file_name = self.adapter.file_name(ctx);

        log::info!(
            "Generated {} batch {} with {} details (oop total {})",
            profile.payer,
            file_name,
            batch.record_count(),
            batch.oop_total()
        );

        Ok(GeneratedFile {
            file_name,
            bytes: contents.into_bytes(),
            batch,
        })
    }
}

fn check_non_negative(record: &DetailRecord) -> Result<(), AccumulationError> {
    let amounts = [
        ("deductible_cents", record.deductible_cents),
        ("oop_cents", record.oop_applied_cents),
        ("hra_cents", record.hra_applied_cents.unwrap_or(0)),
    ];
    for (field, value) in amounts {
        if value < 0 {
            return Err(AccumulationError::batch_generation(
                &record.source_record_id,
                AccumulationError::invalid_amount(field, &value.to_string()),
            ));
        }
    }
    Ok(())
}
