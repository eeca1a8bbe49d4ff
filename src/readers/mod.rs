pub mod evm;
pub mod solana;
pub mod utxo;

pub use evm::{EvmBalances, EvmReader};
pub use solana::SolanaReader;
pub use utxo::{replay_utxos, PageCursor, TxPages, UtxoReader, UtxoSet};
