use alloy::primitives::{Address, U256};
use serde_json::json;

use super::json_rpc::{JsonRpcClient, RpcError};

/// `eth_getBalance` / `eth_call` pinned to a historical block.
#[derive(Debug, Clone)]
pub struct EvmRpc {
    rpc: JsonRpcClient,
}

impl EvmRpc {
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self { rpc }
    }

    /// Native balance in wei at `block`.
    pub async fn balance_at(&self, address: &Address, block: u64) -> Result<U256, RpcError> {
        let raw: String = self
            .rpc
            .call("eth_getBalance", json!([address.to_string(), block_tag(block)]))
            .await?;
        parse_quantity("eth_getBalance", &raw)
    }

    /// Read-only contract call at `block`; returns the raw hex return data.
    pub async fn call_at(&self, to: &Address, data: &str, block: u64) -> Result<String, RpcError> {
        self.rpc
            .call(
                "eth_call",
                json!([{ "to": to.to_string(), "data": data }, block_tag(block)]),
            )
            .await
    }
}

pub fn block_tag(block: u64) -> String {
    format!("{block:#x}")
}

/// Decode a hex quantity / 32-byte word. Empty return data (`0x`) is zero.
pub fn parse_quantity(method: &str, raw: &str) -> Result<U256, RpcError> {
    let trimmed = raw.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(hex, 16).map_err(|_| RpcError::BadQuantity {
        method: method.to_string(),
        raw: raw.to_string(),
    })
}
