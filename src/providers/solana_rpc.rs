use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::json_rpc::{JsonRpcClient, RpcError};

/// Classic SPL Token program.
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Token-2022 program.
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

// ---------------------------------------------------------------------------
// getSignaturesForAddress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

// ---------------------------------------------------------------------------
// getTransaction (jsonParsed)
// ---------------------------------------------------------------------------

/// Account keys come back as bare strings or as `{pubkey, signer, writable}`
/// objects depending on encoding.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AccountKey {
    Plain(String),
    Parsed { pubkey: String },
}

impl AccountKey {
    pub fn pubkey(&self) -> &str {
        match self {
            AccountKey::Plain(k) => k,
            AccountKey::Parsed { pubkey } => pubkey,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxMessage {
    #[serde(default)]
    pub account_keys: Vec<AccountKey>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TxBody {
    pub message: TxMessage,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    /// Raw integer amount as a string.
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    #[serde(default)]
    pub account_index: Option<usize>,
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(default)]
    pub ui_token_amount: Option<UiTokenAmount>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxMeta {
    #[serde(default)]
    pub post_balances: Vec<u64>,
    #[serde(default)]
    pub pre_token_balances: Option<Vec<TokenBalance>>,
    #[serde(default)]
    pub post_token_balances: Option<Vec<TokenBalance>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaTransaction {
    #[serde(default)]
    pub block_time: Option<i64>,
    pub transaction: TxBody,
    #[serde(default)]
    pub meta: Option<TxMeta>,
}

impl SolanaTransaction {
    pub fn account_pubkeys(&self) -> Vec<&str> {
        self.transaction
            .message
            .account_keys
            .iter()
            .map(AccountKey::pubkey)
            .collect()
    }

    pub fn account_index(&self, pubkey: &str) -> Option<usize> {
        self.transaction
            .message
            .account_keys
            .iter()
            .position(|k| k.pubkey() == pubkey)
    }
}

// ---------------------------------------------------------------------------
// getTokenAccountsByOwner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenAccountData {
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenAccount {
    pub pubkey: String,
    pub account: TokenAccountData,
}

impl TokenAccount {
    pub fn mint(&self) -> Option<&str> {
        self.account
            .data
            .pointer("/parsed/info/mint")
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct RpcList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct SolanaRpc {
    rpc: JsonRpcClient,
}

impl SolanaRpc {
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self { rpc }
    }

    /// Signatures touching `address`, newest first.
    pub async fn signatures_for_address(
        &self,
        address: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<SignatureInfo>, RpcError> {
        let mut config = json!({ "limit": limit });
        if let Some(before) = before {
            config["before"] = json!(before);
        }
        self.rpc
            .call("getSignaturesForAddress", json!([address, config]))
            .await
    }

    /// `None` when the node no longer has the transaction.
    pub async fn transaction(&self, signature: &str) -> Result<Option<SolanaTransaction>, RpcError> {
        self.rpc
            .call(
                "getTransaction",
                json!([
                    signature,
                    { "encoding": "jsonParsed", "maxSupportedTransactionVersion": 0 }
                ]),
            )
            .await
    }

    pub async fn token_accounts_by_owner(
        &self,
        owner: &str,
        program_id: &str,
    ) -> Result<Vec<TokenAccount>, RpcError> {
        let list: RpcList<TokenAccount> = self
            .rpc
            .call(
                "getTokenAccountsByOwner",
                json!([owner, { "programId": program_id }, { "encoding": "jsonParsed" }]),
            )
            .await?;
        Ok(list.value)
    }
}
