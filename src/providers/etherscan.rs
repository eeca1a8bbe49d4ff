use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::retry::{RequestError, RetryingClient};

#[derive(Debug, Error)]
pub enum BlockIndexError {
    #[error("ETHERSCAN_KEY is not set; it is required to resolve a block from a timestamp")]
    MissingApiKey,

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("block index rejected the lookup: {0}")]
    Rejected(Value),

    #[error("block index returned a non-numeric block: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct BlockNoByTime {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result: Value,
}

/// Timestamp → block number lookups.
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    http: RetryingClient,
    base_url: String,
    api_key: Option<String>,
    chain_id: u64,
}

impl EtherscanClient {
    pub fn with_base_url(
        http: RetryingClient,
        base_url: impl Into<String>,
        api_key: Option<String>,
        chain_id: u64,
    ) -> Self {
        let http = match &api_key {
            Some(key) => http.with_redacted(key.clone()),
            None => http,
        };
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            chain_id,
        }
    }

    /// Closest block at or before `timestamp` (unix seconds).
    pub async fn block_number_before(&self, timestamp: i64) -> Result<u64, BlockIndexError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(BlockIndexError::MissingApiKey)?;

        let resp: BlockNoByTime = self
            .http
            .get_json(
                &self.base_url,
                &[
                    ("chainid", self.chain_id.to_string()),
                    ("module", "block".to_string()),
                    ("action", "getblocknobytime".to_string()),
                    ("timestamp", timestamp.to_string()),
                    ("closest", "before".to_string()),
                    ("apikey", api_key.to_string()),
                ],
            )
            .await?;

        if resp.status.as_deref() != Some("1") {
            return Err(BlockIndexError::Rejected(resp.result));
        }

        let raw = match &resp.result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        raw.trim()
            .parse::<u64>()
            .map_err(|_| BlockIndexError::Malformed(raw))
    }
}
