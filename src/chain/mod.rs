//! Chain client adapter.
//!
//! Two connections sit behind traits so workflows never touch a transport
//! directly:
//! - `ChainReader`: read-only queries against the node (market records,
//!   balances, allowances) plus confirmation waits
//! - `ChainWriter`: transactions signed by the user's wallet
//!
//! `WalletProvider` is the account-authorization boundary (request access,
//! list authorized accounts, account-change notifications). It is passed in
//! explicitly rather than discovered from ambient state.
//!
//! `rpc` holds the alloy-backed implementations; `local` a private-key
//! wallet provider.

pub mod abi;
pub mod local;
pub mod rpc;

pub use local::LocalWallet;
pub use rpc::{RpcReader, RpcWriter};

use crate::error::ClientError;
use crate::market::{Market, Outcome};
use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Read-only contract and balance queries.
#[async_trait]
pub trait ChainReader: Send + Sync + 'static {
    /// Address of the prediction market contract this reader targets.
    fn market_address(&self) -> Address;

    /// True if there is deployed code at `address`.
    async fn code_exists(&self, address: Address) -> Result<bool, ClientError>;

    async fn markets_count(&self) -> Result<u64, ClientError>;

    async fn market_by_id(&self, market_id: u64) -> Result<Market, ClientError>;

    async fn user_shares(
        &self,
        market_id: u64,
        user: Address,
        outcome: Outcome,
    ) -> Result<U256, ClientError>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ClientError>;

    async fn token_balance(&self, token: Address, account: Address) -> Result<U256, ClientError>;

    async fn native_balance(&self, account: Address) -> Result<U256, ClientError>;

    /// Wait until `hash` is mined. A reverted receipt is an error.
    /// No client-side timeout is applied.
    async fn wait_for_transaction(&self, hash: TxHash) -> Result<(), ClientError>;
}

/// Transactions signed on behalf of `from`. Each call returns as soon as the
/// transaction is broadcast; confirmation goes through `ChainReader`.
#[async_trait]
pub trait ChainWriter: Send + Sync + 'static {
    async fn create_market(
        &self,
        from: Address,
        question: &str,
        collateral: Address,
    ) -> Result<TxHash, ClientError>;

    async fn place_bet(
        &self,
        from: Address,
        market_id: u64,
        outcome: Outcome,
        amount: U256,
    ) -> Result<TxHash, ClientError>;

    async fn solve_market(
        &self,
        from: Address,
        market_id: u64,
        outcome: Outcome,
    ) -> Result<TxHash, ClientError>;

    async fn settle(&self, from: Address, market_id: u64) -> Result<TxHash, ClientError>;

    async fn approve(
        &self,
        from: Address,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, ClientError>;
}

/// Account-authorization boundary of a wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    /// Ask the user to authorize account access.
    async fn request_accounts(&self) -> Result<Vec<Address>, ClientError>;

    /// Accounts already authorized, without prompting.
    async fn accounts(&self) -> Result<Vec<Address>, ClientError>;

    /// Stream of account-list changes. Dropping the stream unsubscribes.
    fn account_changes(&self) -> BoxStream<'static, Vec<Address>>;
}

/// The pair of connections a workflow may need. Either side may be absent:
/// no RPC configured means no reader, no signer means no writer.
#[derive(Clone, Default)]
pub struct ChainClients {
    reader: Option<Arc<dyn ChainReader>>,
    writer: Option<Arc<dyn ChainWriter>>,
}

impl ChainClients {
    pub fn new(
        reader: Option<Arc<dyn ChainReader>>,
        writer: Option<Arc<dyn ChainWriter>>,
    ) -> Self {
        Self { reader, writer }
    }

    pub fn reader(&self) -> Result<&Arc<dyn ChainReader>, ClientError> {
        self.reader.as_ref().ok_or(ClientError::NoReadClient)
    }

    pub fn writer(&self) -> Result<&Arc<dyn ChainWriter>, ClientError> {
        self.writer.as_ref().ok_or(ClientError::NoWriteClient)
    }

    pub fn is_ready(&self) -> bool {
        self.reader.is_some()
    }

    pub fn has_writer(&self) -> bool {
        self.writer.is_some()
    }
}

/// Adapt a broadcast receiver into an account-change stream. Lagged
/// receivers skip ahead to the newest value.
pub(crate) fn broadcast_stream(
    rx: broadcast::Receiver<Vec<Address>>,
) -> BoxStream<'static, Vec<Address>> {
    futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(accounts) => return Some((accounts, rx)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}
