use crate::pricing::PriceError;
use crate::providers::etherscan::BlockIndexError;
use crate::providers::json_rpc::RpcError;
use crate::providers::retry::RequestError;

/// Anything that aborts a single wallet's snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    BlockIndex(#[from] BlockIndexError),

    #[error(transparent)]
    Price(#[from] PriceError),

    #[error("unexpected data: {0}")]
    Data(String),

    #[error("amount out of range: {0}")]
    Amount(String),
}

impl SnapshotError {
    /// Missing credentials surface as configuration errors wherever they are hit.
    pub fn is_config(&self) -> bool {
        matches!(self, SnapshotError::BlockIndex(BlockIndexError::MissingApiKey))
    }
}
