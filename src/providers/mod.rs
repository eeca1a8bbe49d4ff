pub mod alchemy_prices;
pub mod coingecko;
pub mod esplora;
pub mod etherscan;
pub mod evm_rpc;
pub mod json_rpc;
pub mod retry;
pub mod solana_rpc;

pub use alchemy_prices::AlchemyPricesClient;
pub use coingecko::CoinGeckoClient;
pub use esplora::{EsploraClient, EsploraTx};
pub use etherscan::EtherscanClient;
pub use evm_rpc::EvmRpc;
pub use json_rpc::JsonRpcClient;
pub use retry::{RetryPolicy, RetryingClient};
pub use solana_rpc::SolanaRpc;
