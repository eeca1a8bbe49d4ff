mod common;

use rust_decimal::Decimal;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

use walletsnap::errors::SnapshotError;
use walletsnap::providers::solana_rpc::{TOKEN_2022_PROGRAM_ID, TOKEN_PROGRAM_ID};
use walletsnap::providers::{JsonRpcClient, SolanaRpc};
use walletsnap::readers::SolanaReader;

const WALLET: &str = "Wa11et1111111111111111111111111111111111111";
const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
const CUTOFF: i64 = 1_767_225_599;

fn reader(server: &MockServer, page_limit: usize, max_pages: u32) -> SolanaReader {
    SolanaReader::new(
        SolanaRpc::new(JsonRpcClient::new(common::test_client(), server.uri())),
        page_limit,
        max_pages,
        vec![TOKEN_PROGRAM_ID.to_string(), TOKEN_2022_PROGRAM_ID.to_string()],
    )
}

fn sig(signature: &str, block_time: i64) -> Value {
    json!({"signature": signature, "slot": 300_000_000u64, "blockTime": block_time, "err": null})
}

async fn mount_first_page(server: &MockServer, address: &'static str, page: Value) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(common::rpc_param("getSignaturesForAddress", "/0", json!(address)))
        .and(common::rpc_param_absent("getSignaturesForAddress", "/1/before"))
        .respond_with(common::rpc_result(page))
        .mount(server)
        .await;
}

async fn mount_transaction(server: &MockServer, signature: &'static str, tx: Value) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(common::rpc_param("getTransaction", "/0", json!(signature)))
        .respond_with(common::rpc_result(tx))
        .expect(1)
        .mount(server)
        .await;
}

fn native_tx(lamports: u64) -> Value {
    json!({
        "blockTime": CUTOFF - 10,
        "transaction": {"message": {"accountKeys": [
            {"pubkey": "Payer1111111111111111111111111111111111111", "signer": true, "writable": true},
            {"pubkey": WALLET, "signer": false, "writable": true}
        ]}},
        "meta": {"err": null, "postBalances": [5_000u64, lamports], "preBalances": [0, 0]}
    })
}

#[tokio::test]
async fn test_native_balance_from_last_tx_before_cutoff() {
    let server = MockServer::start().await;
    mount_first_page(
        &server,
        WALLET,
        json!([sig("after", CUTOFF + 100), sig("before", CUTOFF - 10), sig("older", CUTOFF - 500)]),
    )
    .await;
    mount_transaction(&server, "before", native_tx(1_500_000_000)).await;

    let lamports = reader(&server, 1000, 10).balance_at(WALLET, CUTOFF).await.unwrap();

    assert_eq!(lamports, Some(1_500_000_000));
}

#[tokio::test]
async fn test_signature_search_pages_backwards() {
    let server = MockServer::start().await;
    mount_first_page(&server, WALLET, json!([sig("s4", CUTOFF + 20), sig("s3", CUTOFF + 10)])).await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(common::rpc_param("getSignaturesForAddress", "/1/before", json!("s3")))
        .and(common::rpc_param("getSignaturesForAddress", "/1/limit", json!(2)))
        .respond_with(common::rpc_result(json!([sig("s2", CUTOFF), sig("s1", CUTOFF - 50)])))
        .expect(1)
        .mount(&server)
        .await;

    let found = reader(&server, 2, 10)
        .last_signature_at_or_before(WALLET, CUTOFF)
        .await
        .unwrap();

    assert_eq!(found.as_deref(), Some("s2"));
}

#[tokio::test]
async fn test_page_cap_means_none_found() {
    let server = MockServer::start().await;
    mount_first_page(&server, WALLET, json!([sig("s4", CUTOFF + 20), sig("s3", CUTOFF + 10)])).await;

    let found = reader(&server, 2, 1)
        .last_signature_at_or_before(WALLET, CUTOFF)
        .await
        .unwrap();

    assert_eq!(found, None);
}

#[tokio::test]
async fn test_no_history_is_none() {
    let server = MockServer::start().await;
    mount_first_page(&server, WALLET, json!([])).await;

    let lamports = reader(&server, 1000, 10).balance_at(WALLET, CUTOFF).await.unwrap();
    assert_eq!(lamports, None);
}

#[tokio::test]
async fn test_missing_transaction_is_error() {
    let server = MockServer::start().await;
    mount_first_page(&server, WALLET, json!([sig("gone", CUTOFF - 1)])).await;
    mount_transaction(&server, "gone", Value::Null).await;

    let err = reader(&server, 1000, 10).balance_at(WALLET, CUTOFF).await.unwrap_err();
    assert!(matches!(err, SnapshotError::Data(_)));
}

fn token_account(pubkey: &str, mint: &str) -> Value {
    json!({
        "pubkey": pubkey,
        "account": {
            "lamports": 2_039_280u64,
            "owner": TOKEN_PROGRAM_ID,
            "data": {
                "program": "spl-token",
                "parsed": {"type": "account", "info": {"mint": mint, "owner": WALLET}}
            }
        }
    })
}

#[tokio::test]
async fn test_token_accounts_grouped_by_mint_across_programs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(common::rpc_param("getTokenAccountsByOwner", "/1/programId", json!(TOKEN_PROGRAM_ID)))
        .respond_with(common::rpc_result(json!({
            "context": {"slot": 1},
            "value": [token_account("AcctA", USDC), token_account("AcctB", "OtherMint")]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(common::rpc_param("getTokenAccountsByOwner", "/1/programId", json!(TOKEN_2022_PROGRAM_ID)))
        .respond_with(common::rpc_result(json!({
            "context": {"slot": 1},
            "value": [token_account("AcctC", USDC)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let by_mint = reader(&server, 1000, 10).token_accounts_by_mint(WALLET).await.unwrap();

    assert_eq!(by_mint.get(USDC).unwrap(), &vec!["AcctA".to_string(), "AcctC".to_string()]);
    assert_eq!(by_mint.get("OtherMint").unwrap().len(), 1);
}

fn token_tx(account: &str, post: Option<&str>, pre: &str) -> Value {
    let balance = |amount: &str| {
        json!([{
            "accountIndex": 1,
            "mint": USDC,
            "owner": WALLET,
            "uiTokenAmount": {"amount": amount, "decimals": 6, "uiAmount": null}
        }])
    };
    json!({
        "blockTime": CUTOFF - 100,
        "transaction": {"message": {"accountKeys": [WALLET, account]}},
        "meta": {
            "postBalances": [0, 0],
            "preTokenBalances": balance(pre),
            "postTokenBalances": post.map(balance).unwrap_or(json!([]))
        }
    })
}

#[tokio::test]
async fn test_mint_balance_sums_accounts() {
    let server = MockServer::start().await;
    mount_first_page(&server, "AcctA", json!([sig("ta", CUTOFF - 100)])).await;
    mount_first_page(&server, "AcctC", json!([sig("tc", CUTOFF - 100)])).await;
    mount_first_page(&server, "AcctEmpty", json!([])).await;
    mount_transaction(&server, "ta", token_tx("AcctA", Some("1500000"), "0")).await;
    // No post entry for the account: the pre balance is used.
    mount_transaction(&server, "tc", token_tx("AcctC", None, "250000")).await;

    let accounts = vec!["AcctA".to_string(), "AcctC".to_string(), "AcctEmpty".to_string()];
    let total = reader(&server, 1000, 10)
        .mint_balance_at(&accounts, USDC, CUTOFF)
        .await
        .unwrap();

    assert_eq!(total, Some(Decimal::new(175, 2)));
}

#[tokio::test]
async fn test_mint_balance_none_without_snapshots() {
    let server = MockServer::start().await;
    mount_first_page(&server, "AcctEmpty", json!([])).await;

    let total = reader(&server, 1000, 10)
        .mint_balance_at(&["AcctEmpty".to_string()], USDC, CUTOFF)
        .await
        .unwrap();

    assert_eq!(total, None);
}
