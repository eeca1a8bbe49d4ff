pub mod oracle;
pub mod points;

pub use oracle::{PriceOracle, PriceTables};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::models::RateSource;

/// What to do when no source yields a price and no stablecoin peg applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPricePolicy {
    /// Abort the snapshot with [`PriceError::NoPriceData`].
    Fail,
    /// Use a fixed rate.
    Default(Decimal),
    /// Report the rate as unavailable; the asset is valued at zero.
    ReturnNone,
}

impl FromStr for MissingPricePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "fail" => Ok(MissingPricePolicy::Fail),
            "none" | "return_none" => Ok(MissingPricePolicy::ReturnNone),
            _ => match s.strip_prefix("default:") {
                Some(value) => value
                    .trim()
                    .parse::<Decimal>()
                    .map(MissingPricePolicy::Default)
                    .map_err(|e| format!("invalid default price '{value}': {e}")),
                None => Err(format!(
                    "unknown missing-price policy '{s}' (expected fail, none or default:<value>)"
                )),
            },
        }
    }
}

impl fmt::Display for MissingPricePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingPricePolicy::Fail => write!(f, "fail"),
            MissingPricePolicy::Default(v) => write!(f, "default:{v}"),
            MissingPricePolicy::ReturnNone => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSourceKind {
    Primary,
    Secondary,
}

impl fmt::Display for PriceSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSourceKind::Primary => write!(f, "primary"),
            PriceSourceKind::Secondary => write!(f, "secondary"),
        }
    }
}

/// A price source that was consulted without producing a rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupIssue {
    NoData { source: PriceSourceKind },
    FetchFailed { source: PriceSourceKind, error: String },
    NoSecondaryId,
}

impl fmt::Display for LookupIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupIssue::NoData { source } => write!(f, "{source} source returned no data"),
            LookupIssue::FetchFailed { source, error } => {
                write!(f, "{source} source failed: {error}")
            }
            LookupIssue::NoSecondaryId => write!(f, "no secondary source id mapped"),
        }
    }
}

/// Outcome of one rate lookup, including every source that came up empty.
#[derive(Debug, Clone, PartialEq)]
pub struct UsdRate {
    pub symbol: String,
    pub date: NaiveDate,
    pub rate: Option<Decimal>,
    pub source: RateSource,
    pub issues: Vec<LookupIssue>,
}

impl UsdRate {
    /// Rate to multiply with; unavailable rates value the asset at zero.
    pub fn rate_or_zero(&self) -> Decimal {
        self.rate.unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("no price data for {symbol} on {date}: {}", describe(.issues))]
    NoPriceData {
        symbol: String,
        date: NaiveDate,
        issues: Vec<LookupIssue>,
    },
}

fn describe(issues: &[LookupIssue]) -> String {
    if issues.is_empty() {
        return "no sources consulted".into();
    }
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
