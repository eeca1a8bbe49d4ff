use serde::{Deserialize, Serialize};

use super::retry::{RequestError, RetryingClient};

// ---------------------------------------------------------------------------
// Transaction (Esplora REST)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TxStatus {
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrevOut {
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
    #[serde(default)]
    pub value: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TxInput {
    /// Funding transaction of the spent output.
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    /// Absent for coinbase inputs.
    #[serde(default)]
    pub prevout: Option<PrevOut>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TxOutput {
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
    #[serde(default)]
    pub value: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EsploraTx {
    pub txid: String,
    #[serde(default)]
    pub status: TxStatus,
    #[serde(default)]
    pub vin: Vec<TxInput>,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

impl EsploraTx {
    /// Block time of a confirmed transaction; `None` while in the mempool.
    pub fn confirmed_at(&self) -> Option<i64> {
        if self.status.confirmed {
            self.status.block_time
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct EsploraClient {
    http: RetryingClient,
    base_url: String,
}

impl EsploraClient {
    pub fn with_base_url(http: RetryingClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// One page of an address's history, newest first. With `after_txid` the
    /// page continues with confirmed transactions older than that one.
    pub async fn address_txs(
        &self,
        address: &str,
        after_txid: Option<&str>,
    ) -> Result<Vec<EsploraTx>, RequestError> {
        let url = match after_txid {
            Some(txid) => format!("{}/address/{}/txs/chain/{}", self.base_url, address, txid),
            None => format!("{}/address/{}/txs", self.base_url, address),
        };
        self.http.get_json(&url, &[]).await
    }
}
