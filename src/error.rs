//! Client error taxonomy.
//!
//! Every workflow entry point returns `ClientError`. Partial-load failures
//! during a bulk market fetch are not errors; they are logged and listed in
//! the load report instead.

use alloy::primitives::{Address, TxHash};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    // ─── Connectivity ────────────────────────────────────────────────────
    #[error("read client not available")]
    NoReadClient,
    #[error("wallet client not available, please connect your wallet")]
    NoWriteClient,
    #[error("no wallet provider found, install or configure a wallet")]
    NoWalletProvider,

    // ─── Contract absence ────────────────────────────────────────────────
    #[error("no contract found at address {address}, verify the deployment network")]
    ContractNotFound { address: Address },

    // ─── Preconditions ───────────────────────────────────────────────────
    #[error("wallet not connected")]
    WalletNotConnected,
    #[error("market {0} is already resolved")]
    MarketResolved(u64),
    #[error("no account connected, please connect your wallet")]
    NoAccount,
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("market question must not be empty")]
    EmptyQuestion,
    #[error("{0} is already in progress")]
    ActionPending(String),
    #[error("market load already in progress")]
    LoadInProgress,

    // ─── On-chain ────────────────────────────────────────────────────────
    #[error("{0}")]
    Rpc(String),
    #[error("transaction {0} reverted")]
    TransactionReverted(TxHash),
}

impl ClientError {
    /// True for errors raised before any network call was attempted.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::WalletNotConnected
                | Self::MarketResolved(_)
                | Self::NoAccount
                | Self::ZeroAmount
                | Self::InvalidAmount(_)
                | Self::EmptyQuestion
                | Self::ActionPending(_)
                | Self::LoadInProgress
        )
    }
}

impl From<alloy::contract::Error> for ClientError {
    fn from(e: alloy::contract::Error) -> Self {
        Self::Rpc(e.to_string())
    }
}

impl From<alloy::transports::TransportError> for ClientError {
    fn from(e: alloy::transports::TransportError) -> Self {
        Self::Rpc(e.to_string())
    }
}

impl From<alloy::providers::PendingTransactionError> for ClientError {
    fn from(e: alloy::providers::PendingTransactionError) -> Self {
        Self::Rpc(e.to_string())
    }
}
