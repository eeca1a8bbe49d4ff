use rust_decimal::Decimal;
use serde_json::Value;

use super::retry::{RequestError, RetryingClient};
use crate::models::decimal_from_json;

/// Per-day USD price by coin id (secondary price source).
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    http: RetryingClient,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn with_base_url(http: RetryingClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// USD price of `coin_id` on `date` (`DD-MM-YYYY`). `Ok(None)` when the
    /// response carries no USD price for that day.
    pub async fn price_on_date(&self, coin_id: &str, date: &str) -> Result<Option<Decimal>, RequestError> {
        let url = format!("{}/coins/{}/history", self.base_url, coin_id);
        let resp: Value = self
            .http
            .get_json(
                &url,
                &[("date", date.to_string()), ("localization", "false".to_string())],
            )
            .await?;

        Ok(resp
            .pointer("/market_data/current_price/usd")
            .and_then(decimal_from_json))
    }
}
