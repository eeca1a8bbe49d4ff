pub mod assets;

pub use assets::{ChainAssets, Erc20Token, EvmAssets, NativeAsset, SolanaAssets, SplMint};

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::models::Chain;
use crate::pricing::MissingPricePolicy;
use crate::providers::RetryPolicy;

const DEFAULT_ESPLORA_API: &str = "https://blockstream.info/api";
const DEFAULT_PRICES_API: &str = "https://api.g.alchemy.com/prices/v1";
const DEFAULT_COINGECKO_API: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_ETHERSCAN_API: &str = "https://api.etherscan.io/v2/api";

/// Missing-price behaviour per chain.
#[derive(Debug, Clone, Copy)]
pub struct PricePolicies {
    pub bitcoin: MissingPricePolicy,
    pub ethereum: MissingPricePolicy,
    pub solana: MissingPricePolicy,
}

impl Default for PricePolicies {
    fn default() -> Self {
        Self {
            bitcoin: MissingPricePolicy::Fail,
            ethereum: MissingPricePolicy::Fail,
            solana: MissingPricePolicy::ReturnNone,
        }
    }
}

impl PricePolicies {
    pub fn for_chain(&self, chain: Chain) -> MissingPricePolicy {
        match chain {
            Chain::Bitcoin => self.bitcoin,
            Chain::Ethereum => self.ethereum,
            Chain::Solana => self.solana,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Credentials
    pub alchemy_key: String,
    pub etherscan_key: Option<String>,

    // Endpoints
    pub esplora_api: String,
    pub prices_api: String,
    pub coingecko_api: String,
    pub etherscan_api: String,
    pub eth_rpc_url: String,
    pub solana_rpc_url: String,
    pub evm_chain_id: u64,

    // Transport
    pub http_timeout: Duration,
    pub retry: RetryPolicy,

    // Pagination limits
    pub btc_max_pages: u32,
    pub sol_signature_page_limit: usize,
    pub sol_max_signature_pages: u32,

    pub price_policies: PricePolicies,
    pub metrics_textfile: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let alchemy_key = env::var("ALCHEMY_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("ALCHEMY_KEY must be set"))?;

        let defaults = PricePolicies::default();
        let retry_defaults = RetryPolicy::default();

        Ok(Self {
            etherscan_key: env::var("ETHERSCAN_KEY").ok().filter(|k| !k.trim().is_empty()),

            esplora_api: env::var("ESPLORA_API").unwrap_or_else(|_| DEFAULT_ESPLORA_API.into()),
            prices_api: env::var("ALCHEMY_PRICES_API")
                .unwrap_or_else(|_| DEFAULT_PRICES_API.into()),
            coingecko_api: env::var("COINGECKO_API")
                .unwrap_or_else(|_| DEFAULT_COINGECKO_API.into()),
            etherscan_api: env::var("ETHERSCAN_API")
                .unwrap_or_else(|_| DEFAULT_ETHERSCAN_API.into()),
            eth_rpc_url: env::var("ETH_RPC_URL")
                .unwrap_or_else(|_| format!("https://eth-mainnet.g.alchemy.com/v2/{alchemy_key}")),
            solana_rpc_url: env::var("SOLANA_RPC_URL").unwrap_or_else(|_| {
                format!("https://solana-mainnet.g.alchemy.com/v2/{alchemy_key}")
            }),
            evm_chain_id: parse_or("EVM_CHAIN_ID", 1)?,

            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 30)?),
            retry: RetryPolicy {
                max_attempts: parse_or("RETRY_MAX_ATTEMPTS", retry_defaults.max_attempts)?,
                base_backoff: Duration::from_millis(parse_or(
                    "RETRY_BASE_BACKOFF_MS",
                    retry_defaults.base_backoff.as_millis() as u64,
                )?),
                jitter: Duration::from_millis(parse_or(
                    "RETRY_JITTER_MS",
                    retry_defaults.jitter.as_millis() as u64,
                )?),
            },

            btc_max_pages: parse_or("BTC_MAX_PAGES", 200)?,
            sol_signature_page_limit: parse_or("SOL_SIGNATURE_PAGE_LIMIT", 1000)?,
            sol_max_signature_pages: parse_or("SOL_MAX_SIGNATURE_PAGES", 500)?,

            price_policies: PricePolicies {
                bitcoin: parse_or("MISSING_PRICE_POLICY_BTC", defaults.bitcoin)?,
                ethereum: parse_or("MISSING_PRICE_POLICY_ETH", defaults.ethereum)?,
                solana: parse_or("MISSING_PRICE_POLICY_SOL", defaults.solana)?,
            },
            metrics_textfile: env::var("METRICS_TEXTFILE").ok().map(PathBuf::from),

            alchemy_key,
        })
    }

    /// Returns true if the block-index credential needed by the EVM reader is present.
    pub fn has_etherscan_key(&self) -> bool {
        self.etherscan_key.is_some()
    }
}

/// Parse an optional env var, falling back to `default` when unset.
fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}='{raw}': {e}")),
        _ => Ok(default),
    }
}
