use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Chain;

/// Where a USD rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Latest point of the day from the primary historical price API.
    Primary,
    /// Secondary per-day price source.
    Secondary,
    /// Fixed 1.0 for a designated stablecoin.
    StablecoinPeg,
    /// Value configured by the caller's missing-price policy.
    PolicyDefault,
    /// No rate; valued at zero.
    Unavailable,
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateSource::Primary => write!(f, "primary"),
            RateSource::Secondary => write!(f, "secondary"),
            RateSource::StablecoinPeg => write!(f, "stablecoin_peg"),
            RateSource::PolicyDefault => write!(f, "policy_default"),
            RateSource::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// One tracked asset's holding, in human units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAmount {
    /// Column label, e.g. `USDC`.
    pub symbol: String,
    /// Symbol the price source is asked for (WETH is priced as ETH).
    pub price_symbol: String,
    pub amount: Decimal,
}

impl AssetAmount {
    pub fn new(symbol: impl Into<String>, price_symbol: impl Into<String>, amount: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price_symbol: price_symbol.into(),
            amount,
        }
    }
}

/// Holdings of one wallet on one chain as of end of day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub chain: Chain,
    pub wallet: String,
    pub date: NaiveDate,
    /// Historical block the balances were read at (account chains with block-indexed state).
    pub block_number: Option<u64>,
    pub assets: Vec<AssetAmount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuedAsset {
    pub symbol: String,
    pub amount: Decimal,
    pub usd_rate: Option<Decimal>,
    pub usd_value: Decimal,
    pub rate_source: RateSource,
}

/// A balance snapshot joined with USD rates: one output row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuedSnapshotRow {
    pub chain: Chain,
    pub wallet: String,
    pub date: NaiveDate,
    pub block_number: Option<u64>,
    pub assets: Vec<ValuedAsset>,
    pub total_usd_value: Decimal,
}

impl ValuedSnapshotRow {
    pub fn asset(&self, symbol: &str) -> Option<&ValuedAsset> {
        self.assets.iter().find(|a| a.symbol == symbol)
    }
}

impl fmt::Display for ValuedSnapshotRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Snapshot: chain={} wallet={} date={} assets={} total_usd={}",
            self.chain,
            &self.wallet[..10.min(self.wallet.len())],
            self.date,
            self.assets.len(),
            self.total_usd_value,
        )
    }
}
