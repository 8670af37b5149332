//! NorthStar: comma-delimited batches, decimal dollar amounts
//!
//! Every line is a CSV row tagged `H`, `D` or `T` in its first column. The
//! response is a CSV export from the payer's portal whose column headers are
//! not stable between deliveries, so columns are located by name through
//! [`resolve_columns`](crate::core::code_table::resolve_columns).

use super::{
    BalancePolicy, Emission, PayerAdapter, PayerLayout, PayerProfile, ResponseLayout,
    ResponseProcessor, RoutingConfig, UniqueIdScheme,
};
use crate::codec::amount::{format_date, format_decimal, parse_decimal};
use crate::codec::{FieldSpec, FieldValues, LineFormat, Segment};
use crate::core::code_table::{CodeTable, ColumnAlias, KeyMatch, RejectCodeCatalog};
use crate::types::{
    AccumulationError, AccumulatorKind, Cents, ControlTotals, DetailMetadata, EncodingKind,
    PayerId, ReconciledAmounts, Relationship, ResponseRow, RunContext, Sex, SubmittedDetail,
};
use regex::Regex;
use std::sync::OnceLock;

const HEADER: Segment = Segment {
    name: "northstar header",
    line_length: None,
    fields: &[
        FieldSpec::text("record_type", 0, 1).required(),
        FieldSpec::text("sender_id", 1, 15).required(),
        FieldSpec::text("receiver_id", 2, 15).required(),
        FieldSpec::text("file_date", 3, 8).required(),
        FieldSpec::text("file_time", 4, 6).required(),
        FieldSpec::text("environment", 5, 1).required(),
    ],
};

const DETAIL: Segment = Segment {
    name: "northstar detail",
    line_length: None,
    fields: &[
        FieldSpec::text("record_type", 0, 1).required(),
        FieldSpec::text("sequence_number", 1, 9).required(),
        FieldSpec::text("unique_id", 2, 40).required(),
        FieldSpec::text("subscriber_id", 3, 20).required(),
        FieldSpec::text("first_name", 4, 35),
        FieldSpec::text("last_name", 5, 60).required(),
        FieldSpec::text("date_of_birth", 6, 8).required(),
        FieldSpec::text("sex", 7, 1),
        FieldSpec::text("relationship", 8, 2).required(),
        FieldSpec::text("group_id", 9, 30),
        FieldSpec::text("service_date", 10, 8).required(),
        FieldSpec::text("deductible", 11, 15).required(),
        FieldSpec::text("oop", 12, 15).required(),
        FieldSpec::text("hra", 13, 15).required(),
        FieldSpec::text("transaction_type", 14, 1).required(),
    ],
};

const TRAILER: Segment = Segment {
    name: "northstar trailer",
    line_length: None,
    fields: &[
        FieldSpec::text("record_type", 0, 1).required(),
        FieldSpec::text("record_count", 1, 9).required(),
        FieldSpec::text("oop_total", 2, 18).required(),
    ],
};

const PROFILE: PayerProfile = PayerProfile {
    payer: PayerId::NorthStar,
    encoding: EncodingKind::Csv,
    format: LineFormat::Delimited(b','),
    line_terminator: "\n",
    layout: PayerLayout {
        header: HEADER,
        detail: DETAIL,
        trailer: TRAILER,
    },
    unique_ids: UniqueIdScheme::SourceId,
};

const BALANCES: BalancePolicy = BalancePolicy {
    slots: &[
        (AccumulatorKind::Deductible, "deductible"),
        (AccumulatorKind::OutOfPocket, "oop"),
        (AccumulatorKind::Hra, "hra"),
    ],
    emission: Emission::Always,
};

const RELATIONSHIP_CODES: &[(Relationship, &str)] = &[
    (Relationship::Subscriber, "18"),
    (Relationship::Spouse, "01"),
    (Relationship::Child, "19"),
    (Relationship::Other, "G8"),
];

const SEX_CODES: &[(Sex, &str)] = &[(Sex::Male, "M"), (Sex::Female, "F"), (Sex::Unknown, "U")];

const REJECT_CODES: &[(&str, &str)] = &[
    ("E01", "Member not eligible on service date"),
    ("E02", "Subscriber not found"),
    ("E03", "Duplicate accumulator record"),
    ("E10", "Invalid accumulator amount"),
    ("E11", "Reversal does not match an original submission"),
    ("E20", "Service date outside plan year"),
];

const RESPONSE_COLUMNS: &[ColumnAlias] = &[
    ColumnAlias {
        canonical: "unique_id",
        headers: &["Unique ID", "Record ID", "Accumulator ID"],
        required: true,
    },
    ColumnAlias {
        canonical: "subscriber_id",
        headers: &["Subscriber ID", "Member ID"],
        required: false,
    },
    ColumnAlias {
        canonical: "deductible",
        headers: &["Deductible", "Deductible Amount"],
        required: false,
    },
    ColumnAlias {
        canonical: "oop",
        headers: &["OOP", "Out of Pocket", "OOP Amount"],
        required: false,
    },
    ColumnAlias {
        canonical: "hra",
        headers: &["HRA", "HRA Amount"],
        required: false,
    },
    ColumnAlias {
        canonical: "status",
        headers: &["Status", "Response Status"],
        required: true,
    },
    ColumnAlias {
        canonical: "reject_code",
        headers: &["Reject Code", "Error Code"],
        required: false,
    },
];

const RESPONSE_LAYOUT: ResponseLayout = ResponseLayout::Delimited {
    delimiter: b',',
    columns: RESPONSE_COLUMNS,
};

fn response_file_re() -> &'static Regex {
    static RESPONSE_FILE_RE: OnceLock<Regex> = OnceLock::new();
    RESPONSE_FILE_RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:[a-z]+_)?northstar_accum_resp_(?P<date>\d{8})?.*\.csv$")
            .expect("valid northstar response file regex")
    })
}

#[derive(Debug, Clone)]
pub struct NorthStarAdapter {
    routing: RoutingConfig,
    relationships: CodeTable<Relationship>,
    sexes: CodeTable<Sex>,
    response: NorthStarResponse,
}

impl NorthStarAdapter {
    pub fn new(routing: RoutingConfig) -> Self {
        Self {
            routing,
            relationships: CodeTable::new("northstar relationship", RELATIONSHIP_CODES),
            sexes: CodeTable::new("northstar sex", SEX_CODES),
            response: NorthStarResponse::new(),
        }
    }

    pub fn default_routing() -> RoutingConfig {
        RoutingConfig::new("ACCUMHUB", "NORTHSTAR")
    }
}

fn environment_code(ctx: &RunContext) -> &'static str {
    if ctx.environment.is_production() {
        "P"
    } else {
        "T"
    }
}

impl PayerAdapter for NorthStarAdapter {
    fn profile(&self) -> &PayerProfile {
        &PROFILE
    }

    fn header_fields(&self, ctx: &RunContext) -> FieldValues {
        FieldValues::new()
            .with("record_type", "H")
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

        let mut values = FieldValues::new()
            .with("record_type", "D")
            .with("sequence_number", detail.sequence_number.to_string())
            .with("unique_id", detail.unique_id.as_str())
            .with("subscriber_id", member.subscriber_id.as_str())
            .with("first_name", member.first_name.as_str())
            .with("last_name", member.last_name.as_str())
            .with("date_of_birth", format_date(member.date_of_birth))
            .with("sex", self.sexes.code(member.sex)?)
            .with("relationship", self.relationships.code(member.relationship)?)
            .with("group_id", member.group_id.as_str())
            .with("service_date", format_date(record.service_start_date))
            .with("transaction_type", if record.is_reversal { "R" } else { "A" });

        for balance in BALANCES.select(&detail.amounts) {
            values.set(balance.qualifier, format_decimal(balance.amount));
        }
        Ok(values)
    }

    fn trailer_fields(&self, _ctx: &RunContext, totals: &ControlTotals) -> FieldValues {
        FieldValues::new()
            .with("record_type", "T")
            .with("record_count", totals.record_count.to_string())
            .with("oop_total", format_decimal(totals.oop_total))
    }

    fn file_name(&self, ctx: &RunContext) -> String {
        let prefix = if ctx.environment.is_production() {
            String::new()
        } else {
            format!("{}_", ctx.environment.tag())
        };
        format!(
            "{}NORTHSTAR_ACCUM_{}_{}.csv",
            prefix,
            ctx.date_token(),
            ctx.time_token()
        )
    }

    fn response(&self) -> Option<&dyn ResponseProcessor> {
        Some(&self.response)
    }
}

/// NorthStar portal export: status `A` accepted, `R` rejected, blank = echo
#[derive(Debug, Clone)]
pub struct NorthStarResponse {
    catalog: RejectCodeCatalog,
}

impl NorthStarResponse {
    fn new() -> Self {
        Self {
            catalog: RejectCodeCatalog::new(REJECT_CODES, KeyMatch::Fuzzy),
        }
    }
}

fn optional_decimal(row: &ResponseRow, field: &str) -> Result<Option<Cents>, AccumulationError> {
    match row.get(field) {
        "" => Ok(None),
        value => parse_decimal(field, value).map(Some),
    }
}

impl ResponseProcessor for NorthStarResponse {
    fn layout(&self) -> &ResponseLayout {
        &RESPONSE_LAYOUT
    }

    fn file_pattern(&self) -> &Regex {
        response_file_re()
    }

    fn classify(&self, row: &ResponseRow) -> DetailMetadata {
        let status = row.get("status").to_ascii_uppercase();
        let code = row.get("reject_code").to_string();

        let mut metadata = DetailMetadata {
            unique_id: row.get("unique_id").to_string(),
            member_id: row.get("subscriber_id").to_string(),
            response_status: status.clone(),
            response_code: code.clone(),
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
                metadata.response_reason = self.catalog.reason(&code);
            }
            other => {
                // Processed by the payer but not something we can act on
                metadata.is_response = true;
                metadata.is_rejection = true;
                metadata.response_reason = format!("Unrecognized response status '{}'", other);
            }
        }
        metadata
    }

    fn extract_amounts(&self, row: &ResponseRow) -> Result<ReconciledAmounts, AccumulationError> {
        Ok(ReconciledAmounts {
            deductible: optional_decimal(row, "deductible")?,
            oop: optional_decimal(row, "oop")?,
            hra: optional_decimal(row, "hra")?,
        })
    }
}
