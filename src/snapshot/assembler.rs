use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::config::{AppConfig, ChainAssets, PricePolicies};
use crate::errors::SnapshotError;
use crate::models::{
    from_smallest_unit, AssetAmount, BalanceSnapshot, Chain, RateSource, SnapshotCutoff,
    ValuedAsset, ValuedSnapshotRow,
};
use crate::pricing::{MissingPricePolicy, PriceOracle, PriceTables, UsdRate};
use crate::providers::{
    AlchemyPricesClient, CoinGeckoClient, EsploraClient, EtherscanClient, EvmRpc, JsonRpcClient,
    RetryingClient, SolanaRpc,
};
use crate::readers::{EvmReader, SolanaReader, UtxoReader};

/// Turns one wallet on one chain into one valued row.
#[derive(Debug, Clone)]
pub struct Snapshotter {
    utxo: UtxoReader,
    evm: EvmReader,
    solana: SolanaReader,
    oracle: PriceOracle,
    assets: ChainAssets,
    policies: PricePolicies,
}

impl Snapshotter {
    pub fn new(
        utxo: UtxoReader,
        evm: EvmReader,
        solana: SolanaReader,
        oracle: PriceOracle,
        assets: ChainAssets,
        policies: PricePolicies,
    ) -> Self {
        Self {
            utxo,
            evm,
            solana,
            oracle,
            assets,
            policies,
        }
    }

    /// Wire every reader and price source through one retrying client.
    /// The default RPC URLs carry the price API key in their path, so it is
    /// masked for every client.
    pub fn from_config(config: &AppConfig, assets: ChainAssets) -> Result<Self, SnapshotError> {
        let mut http = RetryingClient::with_policy(config.retry.clone(), config.http_timeout)?
            .with_redacted(config.alchemy_key.clone());
        if let Some(key) = &config.etherscan_key {
            http = http.with_redacted(key.clone());
        }

        let utxo = UtxoReader::new(
            EsploraClient::with_base_url(http.clone(), &config.esplora_api),
            config.btc_max_pages,
        );
        let evm = EvmReader::new(
            EtherscanClient::with_base_url(
                http.clone(),
                &config.etherscan_api,
                config.etherscan_key.clone(),
                config.evm_chain_id,
            ),
            EvmRpc::new(JsonRpcClient::new(http.clone(), &config.eth_rpc_url)),
            assets.ethereum.native.clone(),
        );
        let solana = SolanaReader::new(
            SolanaRpc::new(JsonRpcClient::new(http.clone(), &config.solana_rpc_url)),
            config.sol_signature_page_limit,
            config.sol_max_signature_pages,
            assets.solana.token_programs.clone(),
        );
        let oracle = PriceOracle::new(
            AlchemyPricesClient::with_base_url(http.clone(), &config.prices_api, &config.alchemy_key),
            Some(CoinGeckoClient::with_base_url(http, &config.coingecko_api)),
            PriceTables::mainnet(),
        );

        Ok(Self::new(utxo, evm, solana, oracle, assets, config.price_policies))
    }

    /// Holdings of `wallet` on `chain` at the end of the cutoff day.
    pub async fn collect_balances(
        &self,
        chain: Chain,
        wallet: &str,
        cutoff: &SnapshotCutoff,
    ) -> Result<BalanceSnapshot, SnapshotError> {
        let ts = cutoff.timestamp();

        let (block_number, assets) = match chain {
            Chain::Bitcoin => {
                let native = &self.assets.bitcoin.native;
                let sats = self.utxo.balance_at(wallet, ts).await?;
                let amount = from_smallest_unit(u128::from(sats), native.decimals)?;
                (
                    None,
                    vec![AssetAmount::new(native.symbol.clone(), native.symbol.clone(), amount)],
                )
            }
            Chain::Ethereum => {
                let balances = self
                    .evm
                    .balances_at(wallet, ts, &self.assets.ethereum.tokens)
                    .await?;
                let mut assets = vec![balances.native];
                assets.extend(balances.tokens);
                (Some(balances.block_number), assets)
            }
            Chain::Solana => (None, self.solana_assets(wallet, ts).await?),
        };

        Ok(BalanceSnapshot {
            chain,
            wallet: wallet.to_string(),
            date: cutoff.date(),
            block_number,
            assets,
        })
    }

    async fn solana_assets(&self, wallet: &str, ts: i64) -> Result<Vec<AssetAmount>, SnapshotError> {
        let native = &self.assets.solana.native;
        let lamports = self.solana.balance_at(wallet, ts).await?.unwrap_or(0);
        let mut assets = vec![AssetAmount::new(
            native.symbol.clone(),
            native.symbol.clone(),
            from_smallest_unit(u128::from(lamports), native.decimals)?,
        )];

        let by_mint = self.solana.token_accounts_by_mint(wallet).await?;

        for tracked in &self.assets.solana.mints {
            let accounts = by_mint.get(&tracked.mint).map(Vec::as_slice).unwrap_or_default();
            let amount = if accounts.is_empty() {
                tracing::info!(wallet, token = %tracked.symbol, "No token accounts found");
                Decimal::ZERO
            } else {
                match self.solana.mint_balance_at(accounts, &tracked.mint, ts).await? {
                    Some(total) => total,
                    None => {
                        tracing::info!(
                            wallet,
                            token = %tracked.symbol,
                            accounts = accounts.len(),
                            "No transaction snapshot yields a balance"
                        );
                        Decimal::ZERO
                    }
                }
            };
            assets.push(AssetAmount::new(
                tracked.symbol.clone(),
                tracked.price_symbol.clone(),
                amount,
            ));
        }

        Ok(assets)
    }

    /// One oracle lookup per distinct price symbol in `snapshot`.
    pub async fn resolve_rates(
        &self,
        snapshot: &BalanceSnapshot,
        policy: MissingPricePolicy,
    ) -> Result<BTreeMap<String, UsdRate>, SnapshotError> {
        let mut rates = BTreeMap::new();

        for asset in &snapshot.assets {
            if rates.contains_key(&asset.price_symbol) {
                continue;
            }
            let rate = self
                .oracle
                .rate_usd(&asset.price_symbol, snapshot.date, policy)
                .await?;
            for issue in &rate.issues {
                tracing::info!(
                    wallet = %snapshot.wallet,
                    symbol = %rate.symbol,
                    source = %rate.source,
                    issue = %issue,
                    "Price lookup note"
                );
            }
            rates.insert(asset.price_symbol.clone(), rate);
        }

        Ok(rates)
    }

    /// Balances, rates and their product for one wallet.
    pub async fn snapshot(
        &self,
        chain: Chain,
        wallet: &str,
        cutoff: &SnapshotCutoff,
    ) -> Result<ValuedSnapshotRow, SnapshotError> {
        let balances = self.collect_balances(chain, wallet, cutoff).await?;
        let rates = self
            .resolve_rates(&balances, self.policies.for_chain(chain))
            .await?;
        combine(balances, &rates)
    }
}

/// Join a balance snapshot with resolved rates. Assets without a rate are
/// valued at zero.
pub fn combine(
    snapshot: BalanceSnapshot,
    rates: &BTreeMap<String, UsdRate>,
) -> Result<ValuedSnapshotRow, SnapshotError> {
    let mut total = Decimal::ZERO;
    let mut assets = Vec::with_capacity(snapshot.assets.len());

    for asset in snapshot.assets {
        let rate = rates.get(&asset.price_symbol);
        let usd_rate = rate.and_then(|r| r.rate);
        let usd_value = asset
            .amount
            .checked_mul(usd_rate.unwrap_or(Decimal::ZERO))
            .ok_or_else(|| {
                SnapshotError::Amount(format!("{} x {:?} overflows", asset.amount, usd_rate))
            })?
            .normalize();
        total = total
            .checked_add(usd_value)
            .ok_or_else(|| SnapshotError::Amount("total USD value overflows".into()))?;

        assets.push(ValuedAsset {
            symbol: asset.symbol,
            amount: asset.amount,
            usd_rate,
            usd_value,
            rate_source: rate.map_or(RateSource::Unavailable, |r| r.source),
        });
    }

    Ok(ValuedSnapshotRow {
        chain: snapshot.chain,
        wallet: snapshot.wallet,
        date: snapshot.date,
        block_number: snapshot.block_number,
        assets,
        total_usd_value: total.normalize(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
    }

    fn rate(symbol: &str, value: Option<Decimal>, source: RateSource) -> (String, UsdRate) {
        (
            symbol.to_string(),
            UsdRate {
                symbol: symbol.to_string(),
                date: date(),
                rate: value,
                source,
                issues: vec![],
            },
        )
    }

    #[test]
    fn test_combine_values_and_totals() {
        let snapshot = BalanceSnapshot {
            chain: Chain::Ethereum,
            wallet: "0xabc".into(),
            date: date(),
            block_number: Some(21_525_000),
            assets: vec![
                AssetAmount::new("ETH", "ETH", Decimal::new(15, 1)),
                AssetAmount::new("USDC", "USDC", Decimal::from(100)),
                AssetAmount::new("WETH", "ETH", Decimal::new(5, 1)),
            ],
        };
        let rates: BTreeMap<_, _> = [
            rate("ETH", Some(Decimal::from(3000)), RateSource::Primary),
            rate("USDC", Some(Decimal::ONE), RateSource::StablecoinPeg),
        ]
        .into_iter()
        .collect();

        let row = combine(snapshot, &rates).unwrap();

        assert_eq!(row.asset("ETH").unwrap().usd_value, Decimal::from(4500));
        assert_eq!(row.asset("WETH").unwrap().usd_rate, Some(Decimal::from(3000)));
        assert_eq!(row.asset("WETH").unwrap().usd_value, Decimal::from(1500));
        assert_eq!(row.asset("USDC").unwrap().rate_source, RateSource::StablecoinPeg);
        assert_eq!(row.total_usd_value, Decimal::from(6100));
        assert_eq!(row.block_number, Some(21_525_000));
    }

    #[test]
    fn test_combine_unavailable_rate_values_at_zero() {
        let snapshot = BalanceSnapshot {
            chain: Chain::Solana,
            wallet: "Wallet".into(),
            date: date(),
            block_number: None,
            assets: vec![
                AssetAmount::new("SOL", "SOL", Decimal::from(2)),
                AssetAmount::new("JITOSOL", "JITOSOL", Decimal::from(3)),
            ],
        };
        let rates: BTreeMap<_, _> = [
            rate("SOL", Some(Decimal::from(120)), RateSource::Primary),
            rate("JITOSOL", None, RateSource::Unavailable),
        ]
        .into_iter()
        .collect();

        let row = combine(snapshot, &rates).unwrap();

        let jito = row.asset("JITOSOL").unwrap();
        assert_eq!(jito.amount, Decimal::from(3));
        assert_eq!(jito.usd_rate, None);
        assert_eq!(jito.usd_value, Decimal::ZERO);
        assert_eq!(row.total_usd_value, Decimal::from(240));
    }
}
