//! Run context threaded through every generation and reconciliation call
//!
//! There is no process-wide "current time": callers build a [`RunContext`] once
//! per run and pass it down, so two batches can be generated concurrently and
//! tests can pin the clock.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment environment a batch is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    Test,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Upper-case tag embedded in non-production file names
    pub fn tag(self) -> &'static str {
        match self {
            Environment::Production => "PROD",
            Environment::Staging => "STG",
            Environment::Test => "TEST",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Test => "test",
        };
        f.write_str(name)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" | "p" => Ok(Environment::Production),
            "staging" | "stg" | "uat" => Ok(Environment::Staging),
            "test" | "qa" | "t" => Ok(Environment::Test),
            other => Err(format!("Invalid environment '{}'", other)),
        }
    }
}

/// Timestamp and environment of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub run_at: NaiveDateTime,
    pub environment: Environment,
}

impl RunContext {
    pub fn new(run_at: NaiveDateTime, environment: Environment) -> Self {
        Self {
            run_at,
            environment,
        }
    }

    /// The run's calendar date, used as "today" wherever a date must be assumed
    pub fn today(&self) -> NaiveDate {
        self.run_at.date()
    }

    /// `YYYYMMDDHHMMSS`, the prefix of every derived unique id
    pub fn timestamp_token(&self) -> String {
        self.run_at.format("%Y%m%d%H%M%S").to_string()
    }

    pub fn date_token(&self) -> String {
        self.run_at.format("%Y%m%d").to_string()
    }

    pub fn time_token(&self) -> String {
        self.run_at.format("%H%M%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn context() -> RunContext {
        let run_at = NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(14, 30, 5)
            .unwrap();
        RunContext::new(run_at, Environment::Test)
    }

    #[test]
    fn test_tokens() {
        let ctx = context();
        assert_eq!(ctx.timestamp_token(), "20261018143005");
        assert_eq!(ctx.date_token(), "20261018");
        assert_eq!(ctx.time_token(), "143005");
        assert_eq!(ctx.today(), NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
    }

    #[rstest]
    #[case("prod", Environment::Production)]
    #[case("UAT", Environment::Staging)]
    #[case("test", Environment::Test)]
    fn test_environment_parsing(#[case] input: &str, #[case] expected: Environment) {
        assert_eq!(input.parse::<Environment>().unwrap(), expected);
    }

    #[test]
    fn test_environment_tag() {
        assert!(Environment::Production.is_production());
        assert_eq!(Environment::Staging.tag(), "STG");
        assert!("mars".parse::<Environment>().is_err());
    }
}
