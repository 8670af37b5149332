//! Summit: 100-byte fixed-width records with fixed balance slots
//!
//! Deductible, OOP and HRA always occupy their own overpunch slots, zero-filled
//! when nothing applied. Summit returns the submitted detail lines with a
//! status byte and three reject code slots appended.

use super::{
    BalancePolicy, Emission, PayerAdapter, PayerLayout, PayerProfile, ResponseLayout,
    ResponseProcessor, RoutingConfig, UniqueIdScheme,
};
use crate::codec::amount::{format_date, format_overpunch, parse_overpunch};
use crate::codec::{FieldSpec, FieldValues, LineFormat, Segment};
use crate::core::code_table::{CodeTable, KeyMatch, RejectCodeCatalog};
use crate::types::{
    AccumulationError, AccumulatorKind, ControlTotals, DetailMetadata, EncodingKind, Environment,
    PayerId, ReconciledAmounts, Relationship, ResponseRow, RunContext, Sex, SubmittedDetail,
};
use regex::Regex;
use std::sync::OnceLock;

pub const LINE_LENGTH: usize = 100;
pub const RESPONSE_LINE_LENGTH: usize = 110;

const HEADER: Segment = Segment {
    name: "summit header",
    line_length: Some(LINE_LENGTH),
    fields: &[
        FieldSpec::text("record_type", 0, 1).required(),
        FieldSpec::text("client_code", 1, 8).required(),
        FieldSpec::numeric("file_date", 9, 8).required(),
        FieldSpec::numeric("file_time", 17, 6).required(),
        FieldSpec::text("environment", 23, 4).required(),
        FieldSpec::text("filler", 27, 73),
    ],
};

const DETAIL_FIELDS: [FieldSpec; 12] = [
    FieldSpec::text("record_type", 0, 1).required(),
    FieldSpec::text("unique_id", 1, 18).required(),
    FieldSpec::text("member_id", 19, 12).required(),
    FieldSpec::text("last_name", 31, 19).required(),
    FieldSpec::text("first_name", 50, 11),
    FieldSpec::numeric("date_of_birth", 61, 8).required(),
    FieldSpec::text("sex", 69, 1).required(),
    FieldSpec::text("relationship", 70, 1).required(),
    FieldSpec::numeric("service_date", 71, 8).required(),
    FieldSpec::numeric("deductible", 79, 7).required(),
    FieldSpec::numeric("oop", 86, 7).required(),
    FieldSpec::numeric("hra", 93, 7).required(),
];

/// The detail layout followed by Summit's status columns
const fn response_fields() -> [FieldSpec; 16] {
    let mut fields = [FieldSpec::text("", 0, 0); 16];
    let mut i = 0;
    while i < DETAIL_FIELDS.len() {
        fields[i] = DETAIL_FIELDS[i];
        i += 1;
    }
    fields[12] = FieldSpec::text("status", 100, 1);
    fields[13] = FieldSpec::text("reject_code_1", 101, 3);
    fields[14] = FieldSpec::text("reject_code_2", 104, 3);
    fields[15] = FieldSpec::text("reject_code_3", 107, 3);
    fields
}

const RESPONSE_FIELDS: [FieldSpec; 16] = response_fields();

const REJECT_CODE_FIELDS: [&str; 3] = ["reject_code_1", "reject_code_2", "reject_code_3"];

const DETAIL: Segment = Segment {
    name: "summit detail",
    line_length: Some(LINE_LENGTH),
    fields: &DETAIL_FIELDS,
};

const TRAILER: Segment = Segment {
    name: "summit trailer",
    line_length: Some(LINE_LENGTH),
    fields: &[
        FieldSpec::text("record_type", 0, 1).required(),
        FieldSpec::numeric("record_count", 1, 7).required(),
        FieldSpec::numeric("oop_total", 8, 11).required(),
        FieldSpec::numeric("deductible_total", 19, 11).required(),
        FieldSpec::text("filler", 30, 70),
    ],
};

const PROFILE: PayerProfile = PayerProfile {
    payer: PayerId::Summit,
    encoding: EncodingKind::FixedWidth,
    format: LineFormat::FixedWidth,
    line_terminator: "\n",
    layout: PayerLayout {
        header: HEADER,
        detail: DETAIL,
        trailer: TRAILER,
    },
    unique_ids: UniqueIdScheme::Counter { width: 4 },
};

const BALANCES: BalancePolicy = BalancePolicy {
    slots: &[
        (AccumulatorKind::Deductible, "deductible"),
        (AccumulatorKind::OutOfPocket, "oop"),
        (AccumulatorKind::Hra, "hra"),
    ],
    emission: Emission::Always,
};

const RESPONSE_LAYOUT: ResponseLayout = ResponseLayout::FixedWidth {
    segment: Segment {
        name: "summit response",
        line_length: Some(RESPONSE_LINE_LENGTH),
        fields: &RESPONSE_FIELDS,
    },
    record_type_field: "record_type",
    detail_record_type: "D",
};

const RELATIONSHIP_CODES: &[(Relationship, &str)] = &[
    (Relationship::Subscriber, "S"),
    (Relationship::Spouse, "P"),
    (Relationship::Child, "D"),
    (Relationship::Other, "O"),
];

const SEX_CODES: &[(Sex, &str)] = &[(Sex::Male, "M"), (Sex::Female, "F"), (Sex::Unknown, "U")];

const REJECT_CODES: &[(&str, &str)] = &[
    ("001", "Member not found"),
    ("002", "Date of birth does not match member"),
    ("003", "Duplicate submission"),
    ("010", "Accumulator exceeds plan maximum"),
    ("011", "Reversal amount exceeds prior submissions"),
    ("020", "Coverage not active on service date"),
];

fn response_file_re() -> &'static Regex {
    static RESPONSE_FILE_RE: OnceLock<Regex> = OnceLock::new();
    RESPONSE_FILE_RE.get_or_init(|| {
        Regex::new(r"^summit_accum_resp_(?:[a-z]+_)?(?P<date>\d{8})?.*\.txt$")
            .expect("valid summit response file regex")
    })
}

#[derive(Debug, Clone)]
pub struct SummitAdapter {
    routing: RoutingConfig,
    relationships: CodeTable<Relationship>,
    sexes: CodeTable<Sex>,
    response: SummitResponse,
}

impl SummitAdapter {
    pub fn new(routing: RoutingConfig) -> Self {
        Self {
            routing,
            relationships: CodeTable::new("summit relationship", RELATIONSHIP_CODES),
            sexes: CodeTable::new("summit sex", SEX_CODES),
            response: SummitResponse::new(),
        }
    }

    /// Summit only identifies the sender, by client code
    pub fn default_routing() -> RoutingConfig {
        RoutingConfig::new("ACCMHUB1", "SUMMIT")
    }
}

impl PayerAdapter for SummitAdapter {
    fn profile(&self) -> &PayerProfile {
        &PROFILE
    }

    fn header_fields(&self, ctx: &RunContext) -> FieldValues {
        let environment = match ctx.environment {
            Environment::Production => "PROD",
            Environment::Staging => "STAG",
            Environment::Test => "TEST",
        };
        FieldValues::new()
            .with("record_type", "H")
            .with("client_code", self.routing.sender_id.as_str())
            .with("file_date", ctx.date_token())
            .with("file_time", ctx.time_token())
            .with("environment", environment)
    }

    fn detail_fields(
        &self,
        detail: &SubmittedDetail,
        _ctx: &RunContext,
    ) -> Result<FieldValues, AccumulationError> {
        let record = &detail.record;
        let member = &record.member;

        let mut values = FieldValues::new()
            .with("record_type", "D")
            .with("unique_id", detail.unique_id.as_str())
            .with("member_id", member.subscriber_id.as_str())
            .with("last_name", member.last_name.to_ascii_uppercase())
            .with("first_name", member.first_name.to_ascii_uppercase())
            .with("date_of_birth", format_date(member.date_of_birth))
            .with("sex", self.sexes.code(member.sex)?)
            .with("relationship", self.relationships.code(member.relationship)?)
            .with("service_date", format_date(record.service_start_date));

        for balance in BALANCES.select(&detail.amounts) {
            values.set(balance.qualifier, format_overpunch(balance.amount));
        }
        Ok(values)
    }

    fn trailer_fields(&self, _ctx: &RunContext, totals: &ControlTotals) -> FieldValues {
        FieldValues::new()
            .with("record_type", "T")
            .with("record_count", totals.record_count.to_string())
            .with("oop_total", format_overpunch(totals.oop_total))
            .with("deductible_total", format_overpunch(totals.deductible_total))
    }

    fn file_name(&self, ctx: &RunContext) -> String {
        format!(
            "summit_accum_{}_{}.txt",
            ctx.environment.tag().to_ascii_lowercase(),
            ctx.timestamp_token()
        )
    }

    fn response(&self) -> Option<&dyn ResponseProcessor> {
        Some(&self.response)
    }
}

/// Summit acknowledgement: status `A` accepted, `R` rejected, blank = echo
#[derive(Debug, Clone)]
pub struct SummitResponse {
    catalog: RejectCodeCatalog,
}

impl SummitResponse {
    fn new() -> Self {
        Self {
            catalog: RejectCodeCatalog::new(REJECT_CODES, KeyMatch::Exact),
        }
    }
}

impl ResponseProcessor for SummitResponse {
    fn layout(&self) -> &ResponseLayout {
        &RESPONSE_LAYOUT
    }

    fn file_pattern(&self) -> &Regex {
        response_file_re()
    }

    fn classify(&self, row: &ResponseRow) -> DetailMetadata {
        let status = row.get("status").to_ascii_uppercase();
        let codes: Vec<&str> = REJECT_CODE_FIELDS
            .iter()
            .map(|field| row.get(field))
            .filter(|code| !code.is_empty())
            .collect();

        let mut metadata = DetailMetadata {
            unique_id: row.get("unique_id").to_string(),
            member_id: row.get("member_id").to_string(),
            response_status: status.clone(),
            response_code: codes.join(","),
            ..Default::default()
        };

        match status.as_str() {
            "" => {}
            "A" => {
                metadata.is_response = true;
                metadata.should_update = true;
            }
            "R" => {
                metadata.is_response = true;
                metadata.is_rejection = true;
                metadata.should_update = true;
                metadata.response_reason = codes
                    .iter()
                    .map(|code| self.catalog.reason(code))
                    .collect::<Vec<_>>()
                    .join("; ");
            }
            other => {
                metadata.is_response = true;
                metadata.is_rejection = true;
                metadata.response_reason = format!("Unrecognized response status '{}'", other);
            }
        }
        metadata
    }

    fn extract_amounts(&self, row: &ResponseRow) -> Result<ReconciledAmounts, AccumulationError> {
        Ok(ReconciledAmounts {
            deductible: Some(parse_overpunch(row.get("deductible"))?),
            oop: Some(parse_overpunch(row.get("oop"))?),
            hra: Some(parse_overpunch(row.get("hra"))?),
        })
    }
}
