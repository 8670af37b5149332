//! Keystone: 160-byte fixed-width records with qualified balance slots
//!
//! A detail carries up to two balances, each a two-character qualifier followed
//! by an overpunch amount. Only accumulators with a non-zero amount are sent
//! and `balance_count` says how many slots are populated; the rest are blank.
//! Keystone does not return response files.

use super::{
    BalancePolicy, Emission, PayerAdapter, PayerLayout, PayerProfile, RoutingConfig,
    UniqueIdScheme,
};
use crate::codec::amount::{format_date, format_overpunch};
use crate::codec::{FieldSpec, FieldValues, LineFormat, Segment};
use crate::core::code_table::CodeTable;
use crate::types::{
    AccumulationError, AccumulatorKind, ControlTotals, DetailRecord, EncodingKind, PayerId,
    Relationship, RunContext, Sex, SubmittedDetail,
};

pub const LINE_LENGTH: usize = 160;

/// Keystone's sequence field is three digits wide and wraps
const SEQUENCE_MODULUS: u32 = 1000;

const SUBSCRIBER_ID_LENGTH: usize = 11;

const HEADER: Segment = Segment {
    name: "keystone header",
    line_length: Some(LINE_LENGTH),
    fields: &[
        FieldSpec::text("record_type", 0, 3).required(),
        FieldSpec::text("sender_id", 3, 10).required(),
        FieldSpec::text("receiver_id", 13, 10).required(),
        FieldSpec::numeric("file_date", 23, 8).required(),
        FieldSpec::numeric("file_time", 31, 6).required(),
        FieldSpec::text("environment", 37, 1).required(),
        FieldSpec::text("filler", 38, 122),
    ],
};

const DETAIL: Segment = Segment {
    name: "keystone detail",
    line_length: Some(LINE_LENGTH),
    fields: &[
        FieldSpec::text("record_type", 0, 3).required(),
        FieldSpec::numeric("sequence_number", 3, 3).required(),
        FieldSpec::text("unique_id", 6, 20).required(),
        FieldSpec::text("subscriber_id", 26, 11).required(),
        FieldSpec::text("last_name", 37, 25).required(),
        FieldSpec::text("first_name", 62, 15),
        FieldSpec::numeric("date_of_birth", 77, 8).required(),
        FieldSpec::text("sex", 85, 1).required(),
        FieldSpec::text("relationship", 86, 2).required(),
        FieldSpec::text("group_id", 88, 15),
        FieldSpec::numeric("service_date", 103, 8).required(),
        FieldSpec::text("transaction_code", 111, 1).required(),
        FieldSpec::numeric("balance_count", 112, 2).required(),
        FieldSpec::text("qualifier_1", 114, 2),
        FieldSpec::numeric("amount_1", 116, 11),
        FieldSpec::text("qualifier_2", 127, 2),
        FieldSpec::numeric("amount_2", 129, 11),
        FieldSpec::text("filler", 140, 20),
    ],
};

const TRAILER: Segment = Segment {
    name: "keystone trailer",
    line_length: Some(LINE_LENGTH),
    fields: &[
        FieldSpec::text("record_type", 0, 3).required(),
        FieldSpec::numeric("record_count", 3, 9).required(),
        FieldSpec::numeric("oop_total", 12, 13).required(),
        FieldSpec::text("filler", 25, 135),
    ],
};

const PROFILE: PayerProfile = PayerProfile {
    payer: PayerId::Keystone,
    encoding: EncodingKind::FixedWidth,
    format: LineFormat::FixedWidth,
    line_terminator: "\r\n",
    layout: PayerLayout {
        header: HEADER,
        detail: DETAIL,
        trailer: TRAILER,
    },
    unique_ids: UniqueIdScheme::Counter { width: 6 },
};

const BALANCES: BalancePolicy = BalancePolicy {
    slots: &[
        (AccumulatorKind::Deductible, "04"),
        (AccumulatorKind::OutOfPocket, "05"),
    ],
    emission: Emission::NonZeroOnly,
};

const BALANCE_SLOTS: [(&str, &str); 2] = [("qualifier_1", "amount_1"), ("qualifier_2", "amount_2")];

const RELATIONSHIP_CODES: &[(Relationship, &str)] = &[
    (Relationship::Subscriber, "01"),
    (Relationship::Spouse, "02"),
    (Relationship::Child, "03"),
    (Relationship::Other, "04"),
];

const SEX_CODES: &[(Sex, &str)] = &[(Sex::Male, "1"), (Sex::Female, "2"), (Sex::Unknown, "0")];

#[derive(Debug, Clone)]
pub struct KeystoneAdapter {
    routing: RoutingConfig,
    relationships: CodeTable<Relationship>,
    sexes: CodeTable<Sex>,
}

impl KeystoneAdapter {
    pub fn new(routing: RoutingConfig) -> Self {
        Self {
            routing,
            relationships: CodeTable::new("keystone relationship", RELATIONSHIP_CODES),
            sexes: CodeTable::new("keystone sex", SEX_CODES),
        }
    }

    pub fn default_routing() -> RoutingConfig {
        RoutingConfig::new("ACCUMHUB", "KEYSTONEBC")
    }
}

fn environment_code(ctx: &RunContext) -> &'static str {
    if ctx.environment.is_production() {
        "P"
    } else {
        "T"
    }
}

impl PayerAdapter for KeystoneAdapter {
    fn profile(&self) -> &PayerProfile {
        &PROFILE
    }

    /// Keystone subscriber ids are exactly eleven digits
    fn validate(&self, record: &DetailRecord) -> Result<(), AccumulationError> {
        let id = &record.member.subscriber_id;
        if id.len() != SUBSCRIBER_ID_LENGTH {
            return Err(AccumulationError::invalid_member_identifier(
                &record.source_record_id,
                id,
                &format!(
                    "must be {} digits, got {} characters",
                    SUBSCRIBER_ID_LENGTH,
                    id.chars().count()
                ),
            ));
        }
        if !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AccumulationError::invalid_member_identifier(
                &record.source_record_id,
                id,
                "must contain only digits",
            ));
        }
        Ok(())
    }

    fn header_fields(&self, ctx: &RunContext) -> FieldValues {
        FieldValues::new()
            .with("record_type", "HDR")
            .with("sender_id", self.routing.sender_id.as_str())
            .with("receiver_id", self.routing.receiver_id.as_str())
            .with("file_date", ctx.date_token())
            .with("file_time", ctx.time_token())
            .with("environment", environment_code(ctx))
    }

    fn detail_fields(
        &self,
        detail: &SubmittedDetail,
        _ctx: &RunContext,
    ) -> Result<FieldValues, AccumulationError> {
        let record = &detail.record;
        let member = &record.member;
        let balances = BALANCES.select(&detail.amounts);

        let mut values = FieldValues::new()
            .with("record_type", "DTL")
            .with(
                "sequence_number",
                (detail.sequence_number % SEQUENCE_MODULUS).to_string(),
            )
            .with("unique_id", detail.unique_id.as_str())
            .with("subscriber_id", member.subscriber_id.as_str())
            .with("last_name", member.last_name.to_ascii_uppercase())
            .with("first_name", member.first_name.to_ascii_uppercase())
            .with("date_of_birth", format_date(member.date_of_birth))
            .with("sex", self.sexes.code(member.sex)?)
            .with("relationship", self.relationships.code(member.relationship)?)
            .with("group_id", member.group_id.as_str())
            .with("service_date", format_date(record.service_start_date))
            .with("transaction_code", if record.is_reversal { "V" } else { "O" })
            .with("balance_count", balances.len().to_string());

        for (&(qualifier_field, amount_field), balance) in BALANCE_SLOTS.iter().zip(&balances) {
            values.set(qualifier_field, balance.qualifier);
            values.set(amount_field, format_overpunch(balance.amount));
        }
        Ok(values)
    }

    fn trailer_fields(&self, _ctx: &RunContext, totals: &ControlTotals) -> FieldValues {
        FieldValues::new()
            .with("record_type", "TRL")
            .with("record_count", totals.record_count.to_string())
            .with("oop_total", format_overpunch(totals.oop_total))
    }

    fn file_name(&self, ctx: &RunContext) -> String {
        format!(
            "KEYSTONE.ACCUM.{}.D{}.T{}",
            environment_code(ctx),
            ctx.run_at.format("%y%m%d"),
            ctx.time_token()
        )
    }
}
