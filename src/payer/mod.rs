//! Payer adapters
//!
//! Every payer speaks the same header/detail/trailer protocol with its own field
//! layout, code tables and rejection semantics. A payer is described by:
//!
//! - a [`PayerProfile`]: encoding, line terminator, segment layouts, unique id scheme
//! - pure functions on [`PayerAdapter`]: validation, header/detail/trailer values,
//!   file naming
//! - optionally a [`ResponseProcessor`]: response file recognition, layout,
//!   row classification and amount extraction
//!
//! The generator and reconciler in [`crate::core`] are generic over this trait;
//! adding a payer means adding a module here and a [`create_adapter`] arm.
//!
//! # Payers
//!
//! - [`northstar`] - CSV, decimal dollars, header-keyed CSV responses
//! - [`keystone`] - fixed-width overpunch with non-zero balance qualifiers, no responses
//! - [`summit`] - fixed-width overpunch with zero-filled balances, fixed-width responses

pub mod keystone;
pub mod northstar;
pub mod summit;

use crate::codec::{FieldValues, LineFormat, Segment};
use crate::core::code_table::ColumnAlias;
use crate::types::{
    AccumulationError, AccumulatorKind, Cents, ControlTotals, DetailMetadata, DetailRecord,
    EncodingKind, PayerId, ReconciledAmounts, ResponseRow, RunContext, SignedAmounts,
    SubmittedDetail,
};
use chrono::NaiveDate;
use regex::Regex;
use std::fmt::Debug;
use std::sync::Arc;

pub use keystone::KeystoneAdapter;
pub use northstar::NorthStarAdapter;
pub use summit::SummitAdapter;

/// Routing identifiers a payer assigns to us and to itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingConfig {
    pub sender_id: String,
    pub receiver_id: String,
}

impl RoutingConfig {
    pub fn new(sender_id: impl Into<String>, receiver_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
        }
    }

    /// Override either identifier, keeping the payer default for the other
    pub fn overridden(mut self, sender_id: Option<String>, receiver_id: Option<String>) -> Self {
        if let Some(sender_id) = sender_id {
            self.sender_id = sender_id;
        }
        if let Some(receiver_id) = receiver_id {
            self.receiver_id = receiver_id;
        }
        self
    }
}

/// How a payer wants detail unique ids built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueIdScheme {
    /// `{timestamp}{source_record_id}`, `R` appended for reversals
    SourceId,
    /// `{timestamp}{position}` with the position zero-padded to `width`
    Counter { width: usize },
}

impl UniqueIdScheme {
    /// Most details one batch can number, `None` when unbounded
    ///
    /// A counter of `width` digits stops at `10^width - 1`; one more detail
    /// would widen the id past the payer's unique id field.
    pub fn capacity(&self) -> Option<usize> {
        match *self {
            UniqueIdScheme::SourceId => None,
            UniqueIdScheme::Counter { width } => u32::try_from(width)
                .ok()
                .and_then(|width| 10usize.checked_pow(width))
                .map(|limit| limit - 1),
        }
    }
}

/// Header, detail and trailer layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayerLayout {
    pub header: Segment,
    pub detail: Segment,
    pub trailer: Segment,
}

/// Static description of a payer's outbound files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayerProfile {
    pub payer: PayerId,
    pub encoding: EncodingKind,
    pub format: LineFormat,
    pub line_terminator: &'static str,
    pub layout: PayerLayout,
    pub unique_ids: UniqueIdScheme,
}

/// Whether a balance slot is written when its amount is zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// Every slot, zero-filled when nothing applied
    Always,
    /// Only accumulators with a non-zero amount
    NonZeroOnly,
}

/// One emitted balance: accumulator, qualifier code and signed amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceEntry {
    pub kind: AccumulatorKind,
    pub qualifier: &'static str,
    pub amount: Cents,
}

/// Which accumulators a payer receives, in what order, under which qualifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalancePolicy {
    pub slots: &'static [(AccumulatorKind, &'static str)],
    pub emission: Emission,
}

impl BalancePolicy {
    /// Balances to emit for one detail, in slot order
    pub fn select(&self, amounts: &SignedAmounts) -> Vec<BalanceEntry> {
        self.slots
            .iter()
            .map(|&(kind, qualifier)| BalanceEntry {
                kind,
                qualifier,
                amount: amounts.get(kind),
            })
            .filter(|entry| self.emission == Emission::Always || entry.amount != 0)
            .collect()
    }
}

/// Payer-specific configuration and pure mapping functions
pub trait PayerAdapter: Send + Sync + Debug {
    fn profile(&self) -> &PayerProfile;

    /// Payer business rules checked before a detail is encoded
    fn validate(&self, _record: &DetailRecord) -> Result<(), AccumulationError> {
        Ok(())
    }

    fn header_fields(&self, ctx: &RunContext) -> FieldValues;

    fn detail_fields(
        &self,
        detail: &SubmittedDetail,
        ctx: &RunContext,
    ) -> Result<FieldValues, AccumulationError>;

    fn trailer_fields(&self, ctx: &RunContext, totals: &ControlTotals) -> FieldValues;

    /// Outbound file name for a run
    fn file_name(&self, ctx: &RunContext) -> String;

    /// Response file support, for payers that send acknowledgements
    fn response(&self) -> Option<&dyn ResponseProcessor> {
        None
    }

    fn payer(&self) -> PayerId {
        self.profile().payer
    }
}

/// Shape of a payer's response rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseLayout {
    /// The detail layout plus payer status columns; rows are the lines whose
    /// record type field equals `detail_record_type`
    FixedWidth {
        segment: Segment,
        record_type_field: &'static str,
        detail_record_type: &'static str,
    },
    /// A header row followed by data rows; columns found by name
    Delimited {
        delimiter: u8,
        columns: &'static [ColumnAlias],
    },
}

/// Payer-specific response file handling
pub trait ResponseProcessor: Send + Sync + Debug {
    fn layout(&self) -> &ResponseLayout;

    /// Pattern recognizing this payer's response files; a capture group named
    /// `date` (YYYYMMDD) carries the run date when present
    fn file_pattern(&self) -> &Regex;

    fn classify(&self, row: &ResponseRow) -> DetailMetadata;

    /// Recompute amounts from the row's encoded fields
    fn extract_amounts(&self, row: &ResponseRow) -> Result<ReconciledAmounts, AccumulationError>;

    fn recognizes(&self, file_name: &str) -> bool {
        self.file_pattern().is_match(file_name)
    }

    /// Run date embedded in the file name, if present and valid
    fn file_date(&self, file_name: &str) -> Option<NaiveDate> {
        let captures = self.file_pattern().captures(file_name)?;
        let token = captures.name("date")?.as_str();
        NaiveDate::parse_from_str(token, "%Y%m%d").ok()
    }
}

/// Create the adapter for a payer
///
/// `routing` replaces the payer's default routing identifiers.
pub fn create_adapter(payer: PayerId, routing: Option<RoutingConfig>) -> Arc<dyn PayerAdapter> {
    match payer {
        PayerId::NorthStar => Arc::new(NorthStarAdapter::new(
            routing.unwrap_or_else(NorthStarAdapter::default_routing),
        )),
        PayerId::Keystone => Arc::new(KeystoneAdapter::new(
            routing.unwrap_or_else(KeystoneAdapter::default_routing),
        )),
        PayerId::Summit => Arc::new(SummitAdapter::new(
            routing.unwrap_or_else(SummitAdapter::default_routing),
        )),
    }
}

/// Default routing for a payer
pub fn default_routing(payer: PayerId) -> RoutingConfig {
    match payer {
        PayerId::NorthStar => NorthStarAdapter::default_routing(),
        PayerId::Keystone => KeystoneAdapter::default_routing(),
        PayerId::Summit => SummitAdapter::default_routing(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const QUALIFIERS: &[(AccumulatorKind, &str)] = &[
        (AccumulatorKind::Deductible, "04"),
        (AccumulatorKind::OutOfPocket, "05"),
    ];

    #[rstest]
    #[case::oop_only(0, 500, vec!["05"])]
    #[case::both(1000, 500, vec!["04", "05"])]
    #[case::neither(0, 0, vec![])]
    #[case::reversal_is_non_zero(-1000, 0, vec!["04"])]
    fn test_non_zero_policy(#[case] deductible: Cents, #[case] oop: Cents, #[case] expected: Vec<&str>) {
        let policy = BalancePolicy { slots: QUALIFIERS, emission: Emission::NonZeroOnly };
        let selected: Vec<&str> = policy
            .select(&SignedAmounts { deductible, oop, hra: None })
            .iter()
            .map(|entry| entry.qualifier)
            .collect();
        assert_eq!(selected, expected);
    }

    #[test]
    fn test_always_policy_zero_fills_in_slot_order() {
        let policy = BalancePolicy {
            slots: &[
                (AccumulatorKind::Deductible, "D"),
                (AccumulatorKind::OutOfPocket, "O"),
                (AccumulatorKind::Hra, "H"),
            ],
            emission: Emission::Always,
        };
        let selected = policy.select(&SignedAmounts { deductible: 0, oop: 500, hra: None });
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0].amount, 0);
        assert_eq!(selected[1].amount, 500);
        assert_eq!(selected[2].kind, AccumulatorKind::Hra);
        assert_eq!(selected[2].amount, 0);
    }

    #[rstest]
    #[case::source_id(UniqueIdScheme::SourceId, None)]
    #[case::keystone_counter(UniqueIdScheme::Counter { width: 6 }, Some(999_999))]
    #[case::summit_counter(UniqueIdScheme::Counter { width: 4 }, Some(9_999))]
    fn test_unique_id_capacity(#[case] scheme: UniqueIdScheme, #[case] expected: Option<usize>) {
        assert_eq!(scheme.capacity(), expected);
    }

    #[test]
    fn test_routing_override_keeps_defaults() {
        let routing = RoutingConfig::new("SENDER", "RECEIVER").overridden(None, Some("OTHER".to_string()));
        assert_eq!(routing, RoutingConfig::new("SENDER", "OTHER"));
    }

    #[rstest]
    #[case(PayerId::NorthStar, EncodingKind::Csv)]
    #[case(PayerId::Keystone, EncodingKind::FixedWidth)]
    #[case(PayerId::Summit, EncodingKind::FixedWidth)]
    fn test_registry_builds_each_payer(#[case] payer: PayerId, #[case] encoding: EncodingKind) {
        let adapter = create_adapter(payer, None);
        assert_eq!(adapter.payer(), payer);
        assert_eq!(adapter.profile().encoding, encoding);
    }

    #[rstest]
    #[case(PayerId::NorthStar)]
    #[case(PayerId::Keystone)]
    #[case(PayerId::Summit)]
    fn test_every_layout_is_consistent(#[case] payer: PayerId) {
        let adapter = create_adapter(payer, None);
        let layout = adapter.profile().layout;
        for segment in [layout.header, layout.detail, layout.trailer] {
            segment
                .validate_layout()
                .unwrap_or_else(|e| panic!("{} {}: {}", payer, segment.name, e));
        }
        if let Some(response) = adapter.response() {
            if let ResponseLayout::FixedWidth { segment, .. } = response.layout() {
                segment.validate_layout().unwrap();
            }
        }
    }
}
