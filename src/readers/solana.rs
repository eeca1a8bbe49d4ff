use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::errors::SnapshotError;
use crate::models::from_smallest_unit;
use crate::providers::json_rpc::RpcError;
use crate::providers::solana_rpc::{SignatureInfo, SolanaRpc, SolanaTransaction, TokenBalance};

/// Backward walk over an address's signature history.
pub struct SignaturePages<'a> {
    rpc: &'a SolanaRpc,
    address: &'a str,
    before: Option<String>,
    page_limit: usize,
    max_pages: u32,
    pages_fetched: u32,
    exhausted: bool,
}

impl<'a> SignaturePages<'a> {
    pub fn new(rpc: &'a SolanaRpc, address: &'a str, page_limit: usize, max_pages: u32) -> Self {
        Self {
            rpc,
            address,
            before: None,
            page_limit,
            max_pages,
            pages_fetched: 0,
            exhausted: false,
        }
    }

    /// Signature the next page starts before.
    pub fn before(&self) -> Option<&str> {
        self.before.as_deref()
    }

    pub fn hit_cap(&self) -> bool {
        !self.exhausted && self.pages_fetched >= self.max_pages
    }

    pub async fn next_page(&mut self) -> Result<Option<Vec<SignatureInfo>>, RpcError> {
        if self.exhausted || self.pages_fetched >= self.max_pages {
            return Ok(None);
        }

        let page = self
            .rpc
            .signatures_for_address(self.address, self.page_limit, self.before.as_deref())
            .await?;
        self.pages_fetched += 1;

        match page.last() {
            Some(oldest) => {
                self.before = Some(oldest.signature.clone());
                Ok(Some(page))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}

/// Post-transaction lamports of `wallet` in `tx`.
pub fn native_post_balance(tx: &SolanaTransaction, wallet: &str) -> Result<u64, SnapshotError> {
    let meta = tx
        .meta
        .as_ref()
        .ok_or_else(|| SnapshotError::Data("transaction has no meta".into()))?;
    let idx = tx.account_index(wallet).ok_or_else(|| {
        SnapshotError::Data(format!(
            "wallet {wallet} not found in transaction account keys"
        ))
    })?;
    meta.post_balances.get(idx).copied().ok_or_else(|| {
        SnapshotError::Data(format!(
            "postBalances has no entry at account index {idx}"
        ))
    })
}

/// Balance of `token_account` for `mint` recorded in `tx`: post-balances
/// first, pre-balances if the post list has no matching entry.
pub fn token_balance_from_tx(
    tx: &SolanaTransaction,
    token_account: &str,
    mint: &str,
) -> Result<Option<Decimal>, SnapshotError> {
    let Some(meta) = tx.meta.as_ref() else {
        return Ok(None);
    };
    let pubkeys = tx.account_pubkeys();

    let pick = |entries: Option<&Vec<TokenBalance>>| -> Result<Option<Decimal>, SnapshotError> {
        for entry in entries.map(Vec::as_slice).unwrap_or_default() {
            if entry.mint.as_deref() != Some(mint) {
                continue;
            }
            let Some(idx) = entry.account_index else {
                continue;
            };
            if pubkeys.get(idx).copied() != Some(token_account) {
                continue;
            }
            let Some(ui) = entry.ui_token_amount.as_ref() else {
                continue;
            };
            if let (Some(raw), Some(decimals)) = (ui.amount.as_deref(), ui.decimals) {
                let raw: u128 = raw.parse().map_err(|_| {
                    SnapshotError::Data(format!("token amount '{raw}' is not an integer"))
                })?;
                return from_smallest_unit(raw, decimals).map(Some);
            }
        }
        Ok(None)
    };

    match pick(meta.post_token_balances.as_ref())? {
        Some(balance) => Ok(Some(balance)),
        None => pick(meta.pre_token_balances.as_ref()),
    }
}

/// Last-transaction-before-cutoff reads for Solana.
#[derive(Debug, Clone)]
pub struct SolanaReader {
    rpc: SolanaRpc,
    page_limit: usize,
    max_pages: u32,
    token_programs: Vec<String>,
}

impl SolanaReader {
    pub fn new(rpc: SolanaRpc, page_limit: usize, max_pages: u32, token_programs: Vec<String>) -> Self {
        Self {
            rpc,
            page_limit,
            max_pages,
            token_programs,
        }
    }

    /// Newest signature of `address` confirmed at or before `cutoff`.
    pub async fn last_signature_at_or_before(
        &self,
        address: &str,
        cutoff: i64,
    ) -> Result<Option<String>, RpcError> {
        let mut pages = SignaturePages::new(&self.rpc, address, self.page_limit, self.max_pages);

        while let Some(page) = pages.next_page().await? {
            let hit = page
                .into_iter()
                .find(|s| s.block_time.is_some_and(|t| t <= cutoff));
            if let Some(sig) = hit {
                return Ok(Some(sig.signature));
            }
        }

        if pages.hit_cap() {
            tracing::warn!(
                address,
                max_pages = self.max_pages,
                before = ?pages.before(),
                "Signature page cap reached before the cutoff"
            );
        }
        Ok(None)
    }

    /// Lamports held by `wallet` right after its last transaction at or before
    /// `cutoff`. `None` when the wallet has no such transaction.
    pub async fn balance_at(&self, wallet: &str, cutoff: i64) -> Result<Option<u64>, SnapshotError> {
        let Some(signature) = self.last_signature_at_or_before(wallet, cutoff).await? else {
            tracing::info!(wallet, cutoff, "No transaction history at or before cutoff");
            return Ok(None);
        };

        let tx = self.rpc.transaction(&signature).await?.ok_or_else(|| {
            SnapshotError::Data(format!("could not fetch transaction details for {signature}"))
        })?;

        let lamports = native_post_balance(&tx, wallet)?;
        tracing::debug!(wallet, %signature, lamports, "Native balance from last transaction");
        Ok(Some(lamports))
    }

    /// Token accounts of `owner` across all configured token programs, grouped by mint.
    pub async fn token_accounts_by_mint(
        &self,
        owner: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, RpcError> {
        let mut by_mint: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for program in &self.token_programs {
            let accounts = self.rpc.token_accounts_by_owner(owner, program).await?;
            tracing::debug!(owner, program = %program, count = accounts.len(), "Token accounts discovered");
            for account in accounts {
                if let Some(mint) = account.mint() {
                    by_mint
                        .entry(mint.to_string())
                        .or_default()
                        .push(account.pubkey.clone());
                }
            }
        }

        Ok(by_mint)
    }

    /// Balance of one token account at `cutoff`, read from the last
    /// transaction touching it. `None` when no snapshot can be derived.
    pub async fn token_balance_at(
        &self,
        token_account: &str,
        mint: &str,
        cutoff: i64,
    ) -> Result<Option<Decimal>, SnapshotError> {
        let Some(signature) = self.last_signature_at_or_before(token_account, cutoff).await? else {
            return Ok(None);
        };

        let Some(tx) = self.rpc.transaction(&signature).await? else {
            tracing::warn!(token_account, %signature, "Transaction not available");
            return Ok(None);
        };

        token_balance_from_tx(&tx, token_account, mint)
    }

    /// Sum of per-account balances for `mint`. `None` when no account yields a snapshot.
    pub async fn mint_balance_at(
        &self,
        token_accounts: &[String],
        mint: &str,
        cutoff: i64,
    ) -> Result<Option<Decimal>, SnapshotError> {
        let mut total = Decimal::ZERO;
        let mut found_any = false;

        for account in token_accounts {
            if let Some(balance) = self.token_balance_at(account, mint, cutoff).await? {
                total += balance;
                found_any = true;
            }
        }

        Ok(found_any.then_some(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WALLET: &str = "Wa11et1111111111111111111111111111111111111";
    const TOKEN_ACCT: &str = "TokAcct111111111111111111111111111111111111";
    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn tx(value: serde_json::Value) -> SolanaTransaction {
        serde_json::from_value(value).unwrap()
    }

    fn token_balance(index: usize, mint: &str, amount: &str, decimals: u32) -> serde_json::Value {
        json!({
            "accountIndex": index,
            "mint": mint,
            "owner": WALLET,
            "uiTokenAmount": {"amount": amount, "decimals": decimals, "uiAmountString": "ignored"}
        })
    }

    #[test]
    fn test_native_post_balance_reads_wallet_index() {
        let t = tx(json!({
            "transaction": {"message": {"accountKeys": [
                {"pubkey": "Payer", "signer": true},
                {"pubkey": WALLET, "signer": false}
            ]}},
            "meta": {"postBalances": [10, 2_500_000_000u64]}
        }));
        assert_eq!(native_post_balance(&t, WALLET).unwrap(), 2_500_000_000);
    }

    #[test]
    fn test_native_post_balance_wallet_missing_is_error() {
        let t = tx(json!({
            "transaction": {"message": {"accountKeys": ["Payer"]}},
            "meta": {"postBalances": [10]}
        }));
        assert!(matches!(
            native_post_balance(&t, WALLET),
            Err(SnapshotError::Data(_))
        ));
    }

    #[test]
    fn test_token_balance_prefers_post_balances() {
        let t = tx(json!({
            "transaction": {"message": {"accountKeys": [WALLET, TOKEN_ACCT]}},
            "meta": {
                "postBalances": [0, 0],
                "preTokenBalances": [token_balance(1, USDC, "1000000", 6)],
                "postTokenBalances": [token_balance(1, USDC, "2500000", 6)]
            }
        }));
        assert_eq!(
            token_balance_from_tx(&t, TOKEN_ACCT, USDC).unwrap(),
            Some(Decimal::new(25, 1))
        );
    }

    #[test]
    fn test_token_balance_falls_back_to_pre_balances() {
        let t = tx(json!({
            "transaction": {"message": {"accountKeys": [WALLET, TOKEN_ACCT]}},
            "meta": {
                "postBalances": [0, 0],
                "preTokenBalances": [token_balance(1, USDC, "1000000", 6)],
                "postTokenBalances": null
            }
        }));
        assert_eq!(
            token_balance_from_tx(&t, TOKEN_ACCT, USDC).unwrap(),
            Some(Decimal::ONE)
        );
    }

    #[test]
    fn test_token_balance_requires_mint_and_account_match() {
        let t = tx(json!({
            "transaction": {"message": {"accountKeys": [WALLET, TOKEN_ACCT, "OtherAcct"]}},
            "meta": {
                "postBalances": [0, 0, 0],
                "postTokenBalances": [
                    token_balance(1, "OtherMint", "5", 0),
                    token_balance(2, USDC, "7000000", 6),
                    token_balance(9, USDC, "8000000", 6)
                ]
            }
        }));
        assert_eq!(token_balance_from_tx(&t, TOKEN_ACCT, USDC).unwrap(), None);
    }
}
