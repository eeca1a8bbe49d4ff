pub mod snapshot;

pub use snapshot::{AssetAmount, BalanceSnapshot, RateSource, ValuedAsset, ValuedSnapshotRow};

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::SnapshotError;

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Bitcoin,
    Ethereum,
    Solana,
}

impl Chain {
    pub fn short_name(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "btc",
            Chain::Ethereum => "eth",
            Chain::Solana => "sol",
        }
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "btc" | "bitcoin" => Ok(Chain::Bitcoin),
            "eth" | "ethereum" => Ok(Chain::Ethereum),
            "sol" | "solana" => Ok(Chain::Solana),
            other => Err(format!("unknown chain '{other}' (expected btc, eth or sol)")),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Bitcoin => write!(f, "bitcoin"),
            Chain::Ethereum => write!(f, "ethereum"),
            Chain::Solana => write!(f, "solana"),
        }
    }
}

// ---------------------------------------------------------------------------
// SnapshotCutoff: end of a UTC day
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotCutoff {
    date: NaiveDate,
}

impl SnapshotCutoff {
    pub fn end_of_day(date: NaiveDate) -> Self {
        Self { date }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Unix timestamp of `date 23:59:59 UTC`.
    pub fn timestamp(&self) -> i64 {
        let end = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        self.date.and_time(end).and_utc().timestamp()
    }

    pub fn day_start_iso(&self) -> String {
        format!("{}T00:00:00Z", self.date.format("%Y-%m-%d"))
    }

    pub fn day_end_iso(&self) -> String {
        format!("{}T23:59:59Z", self.date.format("%Y-%m-%d"))
    }

    /// `DD-MM-YYYY`, the date format of the secondary price source.
    pub fn coingecko_date(&self) -> String {
        self.date.format("%d-%m-%Y").to_string()
    }
}

impl fmt::Display for SnapshotCutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))
    }
}

// ---------------------------------------------------------------------------
// Unit conversion
// ---------------------------------------------------------------------------

/// Convert an integer amount in the smallest on-chain unit into human units.
pub fn from_smallest_unit(raw: u128, decimals: u32) -> Result<Decimal, SnapshotError> {
    let signed = i128::try_from(raw)
        .map_err(|_| SnapshotError::Amount(format!("{raw} does not fit a signed 128-bit value")))?;
    Decimal::try_from_i128_with_scale(signed, decimals)
        .map(|d| d.normalize())
        .map_err(|e| SnapshotError::Amount(format!("{raw} with {decimals} decimals: {e}")))
}

/// Read a decimal out of a JSON value that may be a string or a number.
pub fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    value
        .as_str()
        .and_then(|s| s.trim().parse::<Decimal>().ok())
        .or_else(|| value.as_f64().and_then(|f| Decimal::try_from(f).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cutoff_is_last_second_of_day() {
        let cutoff = SnapshotCutoff::end_of_day(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        // 2026-01-01T00:00:00Z = 1767225600
        assert_eq!(cutoff.timestamp(), 1_767_225_599);
        assert_eq!(cutoff.day_start_iso(), "2025-12-31T00:00:00Z");
        assert_eq!(cutoff.day_end_iso(), "2025-12-31T23:59:59Z");
        assert_eq!(cutoff.coingecko_date(), "31-12-2025");
    }

    #[test]
    fn test_chain_from_str() {
        assert_eq!("BTC".parse::<Chain>(), Ok(Chain::Bitcoin));
        assert_eq!("ethereum".parse::<Chain>(), Ok(Chain::Ethereum));
        assert_eq!("sol".parse::<Chain>(), Ok(Chain::Solana));
        assert!("doge".parse::<Chain>().is_err());
    }

    #[test]
    fn test_from_smallest_unit() {
        assert_eq!(from_smallest_unit(150_000_000, 8).unwrap(), Decimal::new(15, 1));
        assert_eq!(from_smallest_unit(1_000_000, 6).unwrap(), Decimal::ONE);
        assert_eq!(from_smallest_unit(0, 18).unwrap(), Decimal::ZERO);
        // 2.5 ETH in wei
        assert_eq!(
            from_smallest_unit(2_500_000_000_000_000_000, 18).unwrap(),
            Decimal::new(25, 1)
        );
    }

    #[test]
    fn test_from_smallest_unit_out_of_range() {
        assert!(from_smallest_unit(u128::MAX, 18).is_err());
    }

    #[test]
    fn test_decimal_from_json() {
        assert_eq!(decimal_from_json(&json!("1.5")), Some(Decimal::new(15, 1)));
        assert_eq!(decimal_from_json(&json!(2)), Some(Decimal::from(2)));
        assert_eq!(decimal_from_json(&json!("abc")), None);
        assert_eq!(decimal_from_json(&json!(null)), None);
    }
}
