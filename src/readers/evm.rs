use alloy::primitives::{hex, Address, U256};
use rust_decimal::Decimal;

use crate::config::{Erc20Token, NativeAsset};
use crate::errors::SnapshotError;
use crate::models::{from_smallest_unit, AssetAmount};
use crate::providers::evm_rpc::{parse_quantity, EvmRpc};
use crate::providers::EtherscanClient;

/// `balanceOf(address)` = keccak256("balanceOf(address)")[..4].
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Call data for `balanceOf(holder)`: selector, then the address left-padded
/// to one 32-byte word.
pub fn balance_of_calldata(holder: &Address) -> String {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(holder.as_slice());
    format!("0x{}", hex::encode(data))
}

pub fn parse_address(raw: &str) -> Result<Address, SnapshotError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| SnapshotError::Data(format!("invalid EVM address '{raw}': {e}")))
}

/// Convert a 256-bit smallest-unit amount to human units.
pub fn u256_to_decimal(raw: U256, decimals: u32) -> Result<Decimal, SnapshotError> {
    let narrow = u128::try_from(raw)
        .map_err(|_| SnapshotError::Amount(format!("{raw} exceeds 128 bits")))?;
    from_smallest_unit(narrow, decimals)
}

/// Balances of one holder at one historical block.
#[derive(Debug, Clone)]
pub struct EvmBalances {
    pub block_number: u64,
    pub native: AssetAmount,
    pub tokens: Vec<AssetAmount>,
}

/// Block-indexed balance reads for account-model EVM chains.
#[derive(Debug, Clone)]
pub struct EvmReader {
    block_index: EtherscanClient,
    rpc: EvmRpc,
    native: NativeAsset,
}

impl EvmReader {
    pub fn new(block_index: EtherscanClient, rpc: EvmRpc, native: NativeAsset) -> Self {
        Self {
            block_index,
            rpc,
            native,
        }
    }

    /// Closest block at or before `cutoff`.
    pub async fn resolve_block(&self, cutoff: i64) -> Result<u64, SnapshotError> {
        let block = self.block_index.block_number_before(cutoff).await?;
        tracing::debug!(cutoff, block, "Resolved historical block");
        Ok(block)
    }

    /// Raw `balanceOf(holder)` on `token` at `block`.
    pub async fn token_balance_raw(
        &self,
        holder: &Address,
        token: &Address,
        block: u64,
    ) -> Result<U256, SnapshotError> {
        let out = self
            .rpc
            .call_at(token, &balance_of_calldata(holder), block)
            .await?;
        if out.trim().trim_start_matches("0x").is_empty() {
            tracing::warn!(%token, block, "balanceOf returned no data, treating as zero");
        }
        Ok(parse_quantity("eth_call", &out)?)
    }

    /// Native and token balances of `address` at the last block at or before `cutoff`.
    pub async fn balances_at(
        &self,
        address: &str,
        cutoff: i64,
        tokens: &[Erc20Token],
    ) -> Result<EvmBalances, SnapshotError> {
        let holder = parse_address(address)?;
        let block = self.resolve_block(cutoff).await?;

        let wei = self.rpc.balance_at(&holder, block).await?;
        let native = AssetAmount::new(
            self.native.symbol.clone(),
            self.native.symbol.clone(),
            u256_to_decimal(wei, self.native.decimals)?,
        );

        let mut amounts = Vec::with_capacity(tokens.len());
        for token in tokens {
            let contract = parse_address(&token.contract)?;
            let raw = self.token_balance_raw(&holder, &contract, block).await?;
            let amount = u256_to_decimal(raw, token.decimals)?;
            tracing::debug!(
                wallet = address,
                token = %token.symbol,
                block,
                amount = %amount,
                "Token balance read"
            );
            amounts.push(AssetAmount::new(
                token.symbol.clone(),
                token.price_symbol.clone(),
                amount,
            ));
        }

        tracing::info!(
            wallet = address,
            block,
            native = %native.amount,
            tokens = amounts.len(),
            "EVM balances read at historical block"
        );

        Ok(EvmBalances {
            block_number: block,
            native,
            tokens: amounts,
        })
    }
}
