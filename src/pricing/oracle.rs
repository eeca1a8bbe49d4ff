use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use metrics::counter;
use rust_decimal::Decimal;

use super::points::{extract_price_points, latest_in_day, parse_points};
use super::{LookupIssue, MissingPricePolicy, PriceError, PriceSourceKind, UsdRate};
use crate::models::{RateSource, SnapshotCutoff};
use crate::providers::{AlchemyPricesClient, CoinGeckoClient};

/// Rate used for stablecoins when no source has data.
pub const STABLECOIN_PEG: Decimal = Decimal::ONE;

/// Immutable lookup tables the oracle is built with.
#[derive(Debug, Clone, Default)]
pub struct PriceTables {
    /// Upper-case symbols pegged to 1 USD when unpriced.
    pub stablecoins: BTreeSet<String>,
    /// Upper-case symbol → secondary source coin id.
    pub secondary_ids: BTreeMap<String, String>,
}

impl PriceTables {
    pub fn mainnet() -> Self {
        Self {
            stablecoins: ["USDC", "USDT", "USX"].into_iter().map(String::from).collect(),
            secondary_ids: [("JITOSOL", "jito-staked-sol")]
                .into_iter()
                .map(|(s, id)| (s.to_string(), id.to_string()))
                .collect(),
        }
    }

    pub fn is_stablecoin(&self, symbol: &str) -> bool {
        self.stablecoins.contains(&symbol.to_uppercase())
    }

    pub fn secondary_id(&self, symbol: &str) -> Option<&str> {
        self.secondary_ids.get(&symbol.to_uppercase()).map(String::as_str)
    }
}

/// Resolves end-of-day USD rates with source fallback.
#[derive(Debug, Clone)]
pub struct PriceOracle {
    primary: AlchemyPricesClient,
    secondary: Option<CoinGeckoClient>,
    tables: PriceTables,
}

impl PriceOracle {
    pub fn new(
        primary: AlchemyPricesClient,
        secondary: Option<CoinGeckoClient>,
        tables: PriceTables,
    ) -> Self {
        Self {
            primary,
            secondary,
            tables,
        }
    }

    /// USD rate of `symbol` at the end of `date`.
    ///
    /// Order: latest primary point of the day, then the stablecoin peg, then
    /// the secondary source, then `policy`. Only [`MissingPricePolicy::Fail`]
    /// turns "no rate" into an error; sources that failed along the way are
    /// reported in [`UsdRate::issues`].
    pub async fn rate_usd(
        &self,
        symbol: &str,
        date: NaiveDate,
        policy: MissingPricePolicy,
    ) -> Result<UsdRate, PriceError> {
        let cutoff = SnapshotCutoff::end_of_day(date);
        let mut issues = Vec::new();

        match self
            .primary
            .historical(symbol, &cutoff.day_start_iso(), &cutoff.day_end_iso())
            .await
        {
            Ok(payload) => {
                let points = parse_points(extract_price_points(&payload));
                if let Some(point) = latest_in_day(&points, date) {
                    tracing::debug!(
                        symbol,
                        %date,
                        rate = %point.value,
                        points = points.len(),
                        "Primary price resolved"
                    );
                    return Ok(found(symbol, date, point.value, RateSource::Primary, issues));
                }
                issues.push(LookupIssue::NoData {
                    source: PriceSourceKind::Primary,
                });
            }
            Err(e) => {
                tracing::warn!(symbol, %date, error = %e, "Primary price lookup failed");
                issues.push(LookupIssue::FetchFailed {
                    source: PriceSourceKind::Primary,
                    error: e.to_string(),
                });
            }
        }

        if self.tables.is_stablecoin(symbol) {
            counter!("price_fallbacks_total", "kind" => "stablecoin_peg").increment(1);
            tracing::info!(symbol, %date, "No market price, using stablecoin peg");
            return Ok(found(symbol, date, STABLECOIN_PEG, RateSource::StablecoinPeg, issues));
        }

        if let Some(secondary) = &self.secondary {
            match self.tables.secondary_id(symbol) {
                Some(coin_id) => match secondary.price_on_date(coin_id, &cutoff.coingecko_date()).await {
                    Ok(Some(rate)) => {
                        counter!("price_fallbacks_total", "kind" => "secondary").increment(1);
                        tracing::info!(symbol, coin_id, %date, rate = %rate, "Secondary price resolved");
                        return Ok(found(symbol, date, rate, RateSource::Secondary, issues));
                    }
                    Ok(None) => issues.push(LookupIssue::NoData {
                        source: PriceSourceKind::Secondary,
                    }),
                    Err(e) => {
                        tracing::warn!(symbol, coin_id, error = %e, "Secondary price lookup failed");
                        issues.push(LookupIssue::FetchFailed {
                            source: PriceSourceKind::Secondary,
                            error: e.to_string(),
                        });
                    }
                },
                None => issues.push(LookupIssue::NoSecondaryId),
            }
        }

        match policy {
            MissingPricePolicy::Fail => Err(PriceError::NoPriceData {
                symbol: symbol.to_string(),
                date,
                issues,
            }),
            MissingPricePolicy::Default(rate) => {
                counter!("price_fallbacks_total", "kind" => "policy_default").increment(1);
                tracing::warn!(symbol, %date, rate = %rate, "No price found, using configured default");
                Ok(found(symbol, date, rate, RateSource::PolicyDefault, issues))
            }
            MissingPricePolicy::ReturnNone => {
                counter!("price_fallbacks_total", "kind" => "unavailable").increment(1);
                tracing::warn!(symbol, %date, "No price found, rate unavailable");
                Ok(UsdRate {
                    symbol: symbol.to_string(),
                    date,
                    rate: None,
                    source: RateSource::Unavailable,
                    issues,
                })
            }
        }
    }
}

fn found(
    symbol: &str,
    date: NaiveDate,
    rate: Decimal,
    source: RateSource,
    issues: Vec<LookupIssue>,
) -> UsdRate {
    UsdRate {
        symbol: symbol.to_string(),
        date,
        rate: Some(rate),
        source,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_case_insensitive() {
        let tables = PriceTables::mainnet();
        assert!(tables.is_stablecoin("usdc"));
        assert!(tables.is_stablecoin("USX"));
        assert!(!tables.is_stablecoin("ETH"));
        assert_eq!(tables.secondary_id("JitoSOL"), Some("jito-staked-sol"));
        assert_eq!(tables.secondary_id("SOL"), None);
    }
}
