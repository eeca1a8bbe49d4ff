use serde_json::{json, Value};

use super::retry::{RequestError, RetryingClient};

/// Historical token prices by symbol (primary price source).
#[derive(Debug, Clone)]
pub struct AlchemyPricesClient {
    http: RetryingClient,
    base_url: String,
    api_key: String,
}

impl AlchemyPricesClient {
    pub fn with_base_url(
        http: RetryingClient,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let api_key = api_key.into();
        Self {
            http: http.with_redacted(api_key.clone()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Raw payload for `symbol` between two ISO-8601 instants. The response
    /// shape varies, so it is returned untyped.
    pub async fn historical(
        &self,
        symbol: &str,
        start_iso: &str,
        end_iso: &str,
    ) -> Result<Value, RequestError> {
        let url = format!("{}/{}/tokens/historical", self.base_url, self.api_key);
        let body = json!({
            "symbol": symbol,
            "startTime": start_iso,
            "endTime": end_iso,
        });
        self.http.post_json(&url, &body).await
    }
}
