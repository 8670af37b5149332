//! Detail records, batches and submission records
//!
//! A [`DetailRecord`] is what the ledger hands us: one billing episode's
//! contribution to a member's accumulators. Generation turns each one into a
//! [`SubmittedDetail`] (unique id, sequence number and signed amounts fixed),
//! collects them into an [`AccumulationBatch`], and keeps a slim
//! [`SubmissionRecord`] per detail so responses can be matched later.

use super::member::Member;
use super::run::RunContext;
use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Amounts are integer minor currency units (cents)
pub type Cents = i64;

/// Payers with an adapter in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PayerId {
    #[value(name = "northstar")]
    NorthStar,
    Keystone,
    Summit,
}

impl PayerId {
    pub fn as_str(self) -> &'static str {
        match self {
            PayerId::NorthStar => "northstar",
            PayerId::Keystone => "keystone",
            PayerId::Summit => "summit",
        }
    }
}

impl fmt::Display for PayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical encoding of a payer's files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingKind {
    Csv,
    FixedWidth,
}

/// Accumulator types reported to payers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccumulatorKind {
    Deductible,
    OutOfPocket,
    Hra,
}

impl fmt::Display for AccumulatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccumulatorKind::Deductible => "deductible",
            AccumulatorKind::OutOfPocket => "oop",
            AccumulatorKind::Hra => "hra",
        };
        f.write_str(name)
    }
}

/// One billing episode's accumulator contribution, as supplied by the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRecord {
    /// Ledger reference (e.g. a cost breakdown id)
    pub source_record_id: String,
    pub member: Member,
    pub service_start_date: NaiveDate,

    /// Non-negative; negated on output when `is_reversal`
    pub deductible_cents: Cents,
    /// Non-negative; negated on output when `is_reversal`
    pub oop_applied_cents: Cents,
    pub hra_applied_cents: Option<Cents>,

    /// Voids a prior submission of the same episode
    pub is_reversal: bool,

    /// Amounts were recomputed from current ledger state; a cached unique id
    /// must not be reused
    pub is_regeneration: bool,

    /// Payer-scoped ordinal; assigned from file position when absent
    pub sequence_number: Option<u32>,

    /// Unique id used when this record was last delivered
    pub cached_unique_id: Option<String>,
}

/// Signed amounts exactly as they are encoded in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignedAmounts {
    pub deductible: Cents,
    pub oop: Cents,
    pub hra: Option<Cents>,
}

impl SignedAmounts {
    /// Apply the reversal sign to a record's non-negative amounts
    pub fn for_record(record: &DetailRecord) -> Self {
        let sign = if record.is_reversal { -1 } else { 1 };
        Self {
            deductible: sign * record.deductible_cents,
            oop: sign * record.oop_applied_cents,
            hra: record.hra_applied_cents.map(|hra| sign * hra),
        }
    }

    pub fn get(&self, kind: AccumulatorKind) -> Cents {
        match kind {
            AccumulatorKind::Deductible => self.deductible,
            AccumulatorKind::OutOfPocket => self.oop,
            AccumulatorKind::Hra => self.hra.unwrap_or(0),
        }
    }
}

/// A detail record with its generation-time identity fixed
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedDetail {
    /// Idempotency token echoed back by payers
    pub unique_id: String,
    pub sequence_number: u32,
    pub amounts: SignedAmounts,
    pub record: DetailRecord,
}

/// Trailer control totals, accumulated in file order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlTotals {
    pub record_count: usize,
    pub oop_total: Cents,
    pub deductible_total: Cents,
}

impl ControlTotals {
    /// Add one detail's signed amounts
    ///
    /// Returns None on overflow.
    pub fn add(&self, amounts: &SignedAmounts) -> Option<Self> {
        Some(Self {
            record_count: self.record_count.checked_add(1)?,
            oop_total: self.oop_total.checked_add(amounts.oop)?,
            deductible_total: self.deductible_total.checked_add(amounts.deductible)?,
        })
    }
}

/// One generation run for one payer
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulationBatch {
    pub batch_id: String,
    pub payer: PayerId,
    pub encoding: EncodingKind,
    pub run: RunContext,
    /// Details in file order
    pub details: Vec<SubmittedDetail>,
    pub totals: ControlTotals,
}

impl AccumulationBatch {
    pub fn batch_id_for(payer: PayerId, run: &RunContext) -> String {
        format!("{}-{}", payer, run.timestamp_token())
    }

    pub fn record_count(&self) -> usize {
        self.totals.record_count
    }

    pub fn oop_total(&self) -> Cents {
        self.totals.oop_total
    }

    /// Slim per-detail records for the submission manifest
    pub fn submission_records(&self) -> Vec<SubmissionRecord> {
        self.details
            .iter()
            .map(|detail| SubmissionRecord::from_detail(&self.batch_id, self.payer, detail))
            .collect()
    }
}

/// What must be remembered about a submitted detail to reconcile its response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub batch_id: String,
    pub payer: PayerId,
    pub unique_id: String,
    pub source_record_id: String,
    pub member_id: String,
    pub sequence_number: u32,
    pub deductible_cents: Cents,
    pub oop_cents: Cents,
    pub hra_cents: Option<Cents>,
    pub is_reversal: bool,
}

impl SubmissionRecord {
    pub fn from_detail(batch_id: &str, payer: PayerId, detail: &SubmittedDetail) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            payer,
            unique_id: detail.unique_id.clone(),
            source_record_id: detail.record.source_record_id.clone(),
            member_id: detail.record.member.subscriber_id.clone(),
            sequence_number: detail.sequence_number,
            deductible_cents: detail.amounts.deductible,
            oop_cents: detail.amounts.oop,
            hra_cents: detail.amounts.hra,
            is_reversal: detail.record.is_reversal,
        }
    }

    pub fn amounts(&self) -> SignedAmounts {
        SignedAmounts {
            deductible: self.deductible_cents,
            oop: self.oop_cents,
            hra: self.hra_cents,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared record builders for unit tests across the crate

    use super::*;
    use crate::types::member::{Relationship, Sex};
    use crate::types::run::Environment;

    pub fn member() -> Member {
        Member {
            subscriber_id: "12345678901".to_string(),
            first_name: "Dana".to_string(),
            last_name: "Whitfield".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1984, 3, 9).unwrap(),
            sex: Sex::Female,
            relationship: Relationship::Subscriber,
            group_id: "GRP100".to_string(),
        }
    }

    pub fn record(source_record_id: &str, deductible: Cents, oop: Cents) -> DetailRecord {
        DetailRecord {
            source_record_id: source_record_id.to_string(),
            member: member(),
            service_start_date: NaiveDate::from_ymd_opt(2026, 9, 30).unwrap(),
            deductible_cents: deductible,
            oop_applied_cents: oop,
            hra_applied_cents: None,
            is_reversal: false,
            is_regeneration: false,
            sequence_number: None,
            cached_unique_id: None,
        }
    }

    pub fn submitted(record: DetailRecord, unique_id: &str, sequence_number: u32) -> SubmittedDetail {
        SubmittedDetail {
            unique_id: unique_id.to_string(),
            sequence_number,
            amounts: SignedAmounts::for_record(&record),
            record,
        }
    }

    pub fn context() -> RunContext {
        let run_at = NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        RunContext::new(run_at, Environment::Production)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_signed_amounts_negate_reversals() {
        let mut rec = record("cb-1", 1000, 250);
        rec.hra_applied_cents = Some(75);
        assert_eq!(
            SignedAmounts::for_record(&rec),
            SignedAmounts { deductible: 1000, oop: 250, hra: Some(75) }
        );

        rec.is_reversal = true;
        assert_eq!(
            SignedAmounts::for_record(&rec),
            SignedAmounts { deductible: -1000, oop: -250, hra: Some(-75) }
        );
    }

    #[test]
    fn test_control_totals_accumulate_signed_amounts() {
        let totals = ControlTotals::default()
            .add(&SignedAmounts { deductible: 1000, oop: 250, hra: None })
            .and_then(|t| t.add(&SignedAmounts { deductible: -400, oop: -100, hra: Some(5) }))
            .unwrap();
        assert_eq!(totals.record_count, 2);
        assert_eq!(totals.oop_total, 150);
        assert_eq!(totals.deductible_total, 600);
    }

    #[test]
    fn test_control_totals_detect_overflow() {
        let totals = ControlTotals { oop_total: i64::MAX, ..Default::default() };
        assert!(totals.add(&SignedAmounts { deductible: 0, oop: 1, hra: None }).is_none());
    }

    #[rstest]
    #[case("northstar", Some(PayerId::NorthStar))]
    #[case("Keystone", Some(PayerId::Keystone))]
    #[case("summit", Some(PayerId::Summit))]
    #[case("north-star", None)]
    #[case("acme", None)]
    fn test_payer_id_value_names(#[case] input: &str, #[case] expected: Option<PayerId>) {
        assert_eq!(PayerId::from_str(input, true).ok(), expected);
    }

    #[test]
    fn test_payer_id_value_names_match_display() {
        for payer in PayerId::value_variants() {
            let name = payer.to_possible_value().map(|v| v.get_name().to_string());
            assert_eq!(name.as_deref(), Some(payer.as_str()));
        }
    }

    #[test]
    fn test_batch_id_embeds_payer_and_timestamp() {
        assert_eq!(
            AccumulationBatch::batch_id_for(PayerId::Summit, &context()),
            "summit-20261018143000"
        );
    }
}
