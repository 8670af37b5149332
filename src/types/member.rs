//! Member demographics carried on every detail record

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Member sex as recorded by eligibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M" | "MALE" => Ok(Sex::Male),
            "F" | "FEMALE" => Ok(Sex::Female),
            "U" | "UNKNOWN" | "" => Ok(Sex::Unknown),
            other => Err(format!("Invalid sex '{}'", other)),
        }
    }
}

/// Relationship of the member to the policy subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relationship {
    Subscriber,
    Spouse,
    Child,
    Other,
}

impl FromStr for Relationship {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subscriber" | "self" => Ok(Relationship::Subscriber),
            "spouse" => Ok(Relationship::Spouse),
            "child" | "dependent" => Ok(Relationship::Child),
            "other" => Ok(Relationship::Other),
            other => Err(format!("Invalid relationship '{}'", other)),
        }
    }
}

/// Member demographics as supplied by the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Payer-issued subscriber identifier
    pub subscriber_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub sex: Sex,
    pub relationship: Relationship,
    /// Group or carrier identifier
    pub group_id: String,
}
