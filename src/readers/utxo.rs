use std::collections::BTreeMap;

use crate::providers::esplora::{EsploraClient, EsploraTx};
use crate::providers::retry::RequestError;

/// Where the next history page starts. `Start` is the newest page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageCursor {
    #[default]
    Start,
    /// Continue with transactions older than this txid.
    After(String),
}

impl PageCursor {
    fn txid(&self) -> Option<&str> {
        match self {
            PageCursor::Start => None,
            PageCursor::After(txid) => Some(txid),
        }
    }
}

/// Lazy, finite sequence of history pages for one address.
pub struct TxPages<'a> {
    client: &'a EsploraClient,
    address: &'a str,
    cursor: PageCursor,
    max_pages: u32,
    pages_fetched: u32,
    exhausted: bool,
}

impl<'a> TxPages<'a> {
    pub fn new(client: &'a EsploraClient, address: &'a str, max_pages: u32) -> Self {
        Self::resume(client, address, PageCursor::Start, max_pages)
    }

    /// Continue a previous walk from `cursor`.
    pub fn resume(
        client: &'a EsploraClient,
        address: &'a str,
        cursor: PageCursor,
        max_pages: u32,
    ) -> Self {
        Self {
            client,
            address,
            cursor,
            max_pages,
            pages_fetched: 0,
            exhausted: false,
        }
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// True when the page cap stopped the walk before an empty page was seen.
    pub fn hit_cap(&self) -> bool {
        !self.exhausted && self.pages_fetched >= self.max_pages
    }

    pub async fn next_page(&mut self) -> Result<Option<Vec<EsploraTx>>, RequestError> {
        if self.exhausted || self.pages_fetched >= self.max_pages {
            return Ok(None);
        }

        let page = self
            .client
            .address_txs(self.address, self.cursor.txid())
            .await?;
        self.pages_fetched += 1;

        match page.last() {
            Some(last) => {
                self.cursor = PageCursor::After(last.txid.clone());
                Ok(Some(page))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}

/// Full (or cap-truncated) history in page order, newest first.
#[derive(Debug, Clone)]
pub struct UtxoHistory {
    pub txs: Vec<EsploraTx>,
    pub pages_fetched: u32,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutPoint {
    pub txid: String,
    pub vout: u32,
}

/// Unspent outputs paying the tracked address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSet {
    unspent: BTreeMap<OutPoint, u64>,
}

impl UtxoSet {
    pub fn balance(&self) -> u64 {
        self.unspent.values().sum()
    }

    pub fn len(&self) -> usize {
        self.unspent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unspent.is_empty()
    }

    pub fn contains(&self, txid: &str, vout: u32) -> bool {
        self.unspent.contains_key(&OutPoint {
            txid: txid.to_string(),
            vout,
        })
    }
}

/// Rebuild the unspent set of `address` as of `cutoff` from its history.
///
/// Unconfirmed transactions and those confirmed after `cutoff` are skipped.
/// The rest are replayed in ascending block time; within one block time the
/// page order is reversed first so a parent replays before its child.
pub fn replay_utxos(address: &str, history: &[EsploraTx], cutoff: i64) -> UtxoSet {
    let mut eligible: Vec<(i64, &EsploraTx)> = history
        .iter()
        .rev()
        .filter_map(|tx| tx.confirmed_at().filter(|t| *t <= cutoff).map(|t| (t, tx)))
        .collect();
    eligible.sort_by_key(|(t, _)| *t);

    let mut set = UtxoSet::default();

    for (_, tx) in eligible {
        for input in &tx.vin {
            let spends_ours = input
                .prevout
                .as_ref()
                .and_then(|p| p.scriptpubkey_address.as_deref())
                == Some(address);
            if !spends_ours {
                continue;
            }
            if let (Some(txid), Some(vout)) = (&input.txid, input.vout) {
                let spent = OutPoint {
                    txid: txid.clone(),
                    vout,
                };
                if set.unspent.remove(&spent).is_none() {
                    tracing::debug!(
                        spending_tx = %tx.txid,
                        outpoint = %format!("{txid}:{vout}"),
                        "Spent output not in replayed set"
                    );
                }
            }
        }

        for (idx, output) in tx.vout.iter().enumerate() {
            if output.scriptpubkey_address.as_deref() == Some(address) {
                set.unspent.insert(
                    OutPoint {
                        txid: tx.txid.clone(),
                        vout: idx as u32,
                    },
                    output.value,
                );
            }
        }
    }

    set
}

/// Balance-at-time reconstruction for UTXO chains.
#[derive(Debug, Clone)]
pub struct UtxoReader {
    client: EsploraClient,
    max_pages: u32,
}

impl UtxoReader {
    pub fn new(client: EsploraClient, max_pages: u32) -> Self {
        Self { client, max_pages }
    }

    pub async fn fetch_history(&self, address: &str) -> Result<UtxoHistory, RequestError> {
        let mut pages = TxPages::new(&self.client, address, self.max_pages);
        let mut txs = Vec::new();

        while let Some(page) = pages.next_page().await? {
            txs.extend(page);
        }

        let truncated = pages.hit_cap();
        if truncated {
            tracing::warn!(
                address,
                pages = pages.pages_fetched(),
                txs = txs.len(),
                "Page cap reached, older history not fetched"
            );
        }

        Ok(UtxoHistory {
            txs,
            pages_fetched: pages.pages_fetched(),
            truncated,
        })
    }

    /// Balance of `address` at `cutoff` (unix seconds), in satoshis.
    pub async fn balance_at(&self, address: &str, cutoff: i64) -> Result<u64, RequestError> {
        let history = self.fetch_history(address).await?;
        let set = replay_utxos(address, &history.txs, cutoff);

        tracing::info!(
            address,
            cutoff,
            txs = history.txs.len(),
            pages = history.pages_fetched,
            unspent = set.len(),
            sats = set.balance(),
            "UTXO balance reconstructed"
        );

        Ok(set.balance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const A: &str = "bc1qtracked";
    const B: &str = "bc1qother";

    fn tx(value: serde_json::Value) -> EsploraTx {
        serde_json::from_value(value).unwrap()
    }

    fn receive(txid: &str, time: i64, outputs: &[(&str, u64)]) -> EsploraTx {
        let vout: Vec<_> = outputs
            .iter()
            .map(|(addr, value)| json!({"scriptpubkey_address": addr, "value": value}))
            .collect();
        tx(json!({
            "txid": txid,
            "status": {"confirmed": true, "block_time": time},
            "vin": [],
            "vout": vout,
        }))
    }

    fn spend(
        txid: &str,
        time: i64,
        spent: (&str, u32, &str, u64),
        outputs: &[(&str, u64)],
    ) -> EsploraTx {
        let (prev_txid, prev_vout, prev_addr, prev_value) = spent;
        let vout: Vec<_> = outputs
            .iter()
            .map(|(addr, value)| json!({"scriptpubkey_address": addr, "value": value}))
            .collect();
        tx(json!({
            "txid": txid,
            "status": {"confirmed": true, "block_time": time},
            "vin": [{
                "txid": prev_txid,
                "vout": prev_vout,
                "prevout": {"scriptpubkey_address": prev_addr, "value": prev_value}
            }],
            "vout": vout,
        }))
    }

    #[test]
    fn test_single_receipt_respects_cutoff() {
        let history = vec![receive("tx1", 100, &[(A, 500)])];

        assert_eq!(replay_utxos(A, &history, 100).balance(), 500);
        assert_eq!(replay_utxos(A, &history, 99).balance(), 0);
    }

    #[test]
    fn test_spend_with_change() {
        // Newest first, as pages arrive.
        let history = vec![
            spend("tx2", 200, ("tx1", 0, A, 500), &[(B, 290), (A, 200)]),
            receive("tx1", 100, &[(A, 500)]),
        ];

        assert_eq!(replay_utxos(A, &history, 150).balance(), 500);

        let after = replay_utxos(A, &history, 250);
        assert_eq!(after.balance(), 200);
        assert!(!after.contains("tx1", 0));
        assert!(after.contains("tx2", 1));
    }

    #[test]
    fn test_unconfirmed_transactions_excluded() {
        let history = vec![
            tx(json!({
                "txid": "mempool",
                "status": {"confirmed": false},
                "vout": [{"scriptpubkey_address": A, "value": 1_000}]
            })),
            receive("tx1", 100, &[(A, 500)]),
        ];
        assert_eq!(replay_utxos(A, &history, i64::MAX).balance(), 500);
    }

    #[test]
    fn test_same_block_parent_replays_before_child() {
        // Esplora lists the child first within a block.
        let history = vec![
            spend("child", 100, ("parent", 0, A, 500), &[(A, 450)]),
            receive("parent", 100, &[(A, 500)]),
        ];
        let set = replay_utxos(A, &history, 100);
        assert_eq!(set.balance(), 450);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_foreign_inputs_and_outputs_ignored() {
        let history = vec![
            spend("tx2", 200, ("txX", 0, B, 900), &[(B, 100), (A, 800)]),
            receive("tx1", 100, &[(B, 700), (A, 50)]),
        ];
        let set = replay_utxos(A, &history, 300);
        assert_eq!(set.balance(), 850);
        assert!(set.contains("tx1", 1));
        assert!(set.contains("tx2", 1));
    }

    #[test]
    fn test_coinbase_input_without_prevout() {
        let history = vec![tx(json!({
            "txid": "cb",
            "status": {"confirmed": true, "block_time": 10},
            "vin": [{"txid": "0000", "vout": 4294967295u32, "is_coinbase": true, "prevout": null}],
            "vout": [{"scriptpubkey_address": A, "value": 625_000_000}]
        }))];
        assert_eq!(replay_utxos(A, &history, 10).balance(), 625_000_000);
    }

    #[test]
    fn test_replay_is_idempotent() {
        let history = vec![
            spend("tx3", 300, ("tx2", 1, A, 200), &[(A, 150)]),
            spend("tx2", 200, ("tx1", 0, A, 500), &[(B, 290), (A, 200)]),
            receive("tx1", 100, &[(A, 500)]),
        ];
        let first = replay_utxos(A, &history, 1_000);
        let second = replay_utxos(A, &history, 1_000);
        assert_eq!(first, second);
        assert_eq!(first.balance(), 150);
    }

    #[test]
    fn test_cursor_default_is_start() {
        assert_eq!(PageCursor::default(), PageCursor::Start);
        assert_eq!(PageCursor::After("abc".into()).txid(), Some("abc"));
    }
}
