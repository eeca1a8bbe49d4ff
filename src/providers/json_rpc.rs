use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::retry::{RequestError, RetryingClient};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("{method} returned error: {payload}")]
    Node { method: String, payload: Value },

    #[error("{method} response had no result")]
    MissingResult { method: String },

    #[error("{method} returned an invalid hex quantity: {raw}")]
    BadQuantity { method: String, raw: String },

    #[error("{method} result could not be decoded: {source}")]
    Malformed {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON-RPC 2.0 over the shared retrying client.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    http: RetryingClient,
    url: String,
}

impl JsonRpcClient {
    pub fn new(http: RetryingClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    /// Call `method` and decode its `result`. An `error` member in the
    /// envelope is fatal and carried back verbatim.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut envelope: Map<String, Value> = self.http.post_json(&self.url, &request).await?;

        if let Some(err) = envelope.remove("error") {
            if !err.is_null() {
                tracing::error!(method, error = %err, "RPC node returned an error");
                return Err(RpcError::Node {
                    method: method.to_string(),
                    payload: err,
                });
            }
        }

        let result = envelope.remove("result").ok_or_else(|| RpcError::MissingResult {
            method: method.to_string(),
        })?;

        serde_json::from_value(result).map_err(|e| RpcError::Malformed {
            method: method.to_string(),
            source: e,
        })
    }
}
