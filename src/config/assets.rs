use serde::{Deserialize, Serialize};

use crate::providers::solana_rpc::{TOKEN_2022_PROGRAM_ID, TOKEN_PROGRAM_ID};

/// Native coin of a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeAsset {
    pub symbol: String,
    pub decimals: u32,
}

impl NativeAsset {
    fn new(symbol: &str, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
        }
    }
}

/// An ERC-20 contract tracked on the EVM chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Erc20Token {
    pub symbol: String,
    pub contract: String,
    pub decimals: u32,
    pub price_symbol: String,
}

impl Erc20Token {
    fn new(symbol: &str, contract: &str, decimals: u32, price_symbol: &str) -> Self {
        Self {
            symbol: symbol.into(),
            contract: contract.into(),
            decimals,
            price_symbol: price_symbol.into(),
        }
    }
}

/// An SPL mint tracked on Solana. Decimals come from the transaction itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplMint {
    pub symbol: String,
    pub mint: String,
    pub price_symbol: String,
}

impl SplMint {
    fn new(symbol: &str, mint: &str) -> Self {
        Self {
            symbol: symbol.into(),
            mint: mint.into(),
            price_symbol: symbol.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinAssets {
    pub native: NativeAsset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmAssets {
    pub native: NativeAsset,
    pub tokens: Vec<Erc20Token>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaAssets {
    pub native: NativeAsset,
    pub mints: Vec<SplMint>,
    /// Token programs whose accounts are discovered for a wallet.
    pub token_programs: Vec<String>,
}

/// Everything tracked per chain, built once and handed to the readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainAssets {
    pub bitcoin: BitcoinAssets,
    pub ethereum: EvmAssets,
    pub solana: SolanaAssets,
}

impl ChainAssets {
    pub fn mainnet() -> Self {
        Self {
            bitcoin: BitcoinAssets {
                native: NativeAsset::new("BTC", 8),
            },
            ethereum: EvmAssets {
                native: NativeAsset::new("ETH", 18),
                tokens: vec![
                    Erc20Token::new("USDC", "0xA0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", 6, "USDC"),
                    Erc20Token::new("USDT", "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6, "USDT"),
                    // 1:1 with ETH
                    Erc20Token::new("WETH", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", 18, "ETH"),
                ],
            },
            solana: SolanaAssets {
                native: NativeAsset::new("SOL", 9),
                mints: vec![
                    SplMint::new("USDC", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
                    SplMint::new("USDT", "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"),
                    SplMint::new("USX", "6FrrzDk5mQARGc1TDYoyVnSyRdds1t4PbtohCD6p3tgG"),
                    SplMint::new("JITOSOL", "J1toso1uCk3RLmjorhTtrVwY9HJ7X8V9yYac6Y7kGCPn"),
                ],
                token_programs: vec![TOKEN_PROGRAM_ID.into(), TOKEN_2022_PROGRAM_ID.into()],
            },
        }
    }
}
