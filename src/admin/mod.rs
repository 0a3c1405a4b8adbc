//! Market administration: create, resolve and settle markets.
//!
//! Each action follows the same shape: check the wallet, submit, wait for
//! confirmation, then reload the market list and the wallet balances.
//! Resolution is owner-only, but that rule belongs to the contract; a
//! non-owner's attempt comes back as an ordinary on-chain rejection.

use crate::chain::{ChainClients, ChainWriter};
use crate::error::ClientError;
use crate::events::Notifier;
use crate::market::{MarketRepository, Outcome};
use crate::pending::{ActionKey, InFlight};
use crate::wallet::WalletSession;
use alloy::primitives::{Address, TxHash};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct AdminWorkflow {
    clients: ChainClients,
    session: Arc<WalletSession>,
    markets: Arc<MarketRepository>,
    notifier: Notifier,
    in_flight: InFlight,
}

impl AdminWorkflow {
    pub fn new(
        clients: ChainClients,
        session: Arc<WalletSession>,
        markets: Arc<MarketRepository>,
        notifier: Notifier,
    ) -> Self {
        Self {
            clients,
            session,
            markets,
            notifier,
            in_flight: InFlight::new(),
        }
    }

    pub fn is_creating(&self) -> bool {
        self.in_flight.contains(ActionKey::CreateMarket)
    }

    /// Ids of markets with a resolution in flight.
    pub fn resolving(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .in_flight
            .keys()
            .into_iter()
            .filter_map(|k| match k {
                ActionKey::Resolve(id) => Some(id),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        ids
    }

    pub async fn create_market(
        &self,
        question: &str,
        collateral: Address,
    ) -> Result<TxHash, ClientError> {
        let question = question.trim();
        let key = ActionKey::CreateMarket;
        let result = if question.is_empty() {
            Err(ClientError::EmptyQuestion)
        } else {
            self.run(key, "Creating market...", |writer, account| async move {
                writer.create_market(account, question, collateral).await
            })
            .await
        };
        self.report(key, &result, "Market created successfully!");
        result
    }

    pub async fn resolve_market(
        &self,
        market_id: u64,
        outcome: Outcome,
    ) -> Result<TxHash, ClientError> {
        let key = ActionKey::Resolve(market_id);
        let result = self
            .run(key, "Resolving market...", |writer, account| async move {
                writer.solve_market(account, market_id, outcome).await
            })
            .await;
        self.report(key, &result, "Market resolved successfully!");
        result
    }

    /// Claim winnings from a resolved market.
    pub async fn settle(&self, market_id: u64) -> Result<TxHash, ClientError> {
        let key = ActionKey::Settle(market_id);
        let result = self
            .run(key, "Settling market...", |writer, account| async move {
                writer.settle(account, market_id).await
            })
            .await;
        self.report(key, &result, "Winnings claimed!");
        result
    }

    /// Shared submit / confirm / refresh sequence.
    async fn run<F, Fut>(
        &self,
        key: ActionKey,
        loading: &str,
        submit: F,
    ) -> Result<TxHash, ClientError>
    where
        F: FnOnce(Arc<dyn ChainWriter>, Address) -> Fut,
        Fut: std::future::Future<Output = Result<TxHash, ClientError>>,
    {
        if !self.session.is_connected() {
            return Err(ClientError::WalletNotConnected);
        }
        let account = self.session.active_account().await?;
        let writer = self.clients.writer()?.clone();
        let _guard = self
            .in_flight
            .try_begin(key)
            .ok_or_else(|| ClientError::ActionPending(key.to_string()))?;
        let reader = self.clients.reader()?.clone();

        let hash = submit(writer, account).await?;
        let notice_key = key.to_string();
        self.notifier.submitted(&notice_key, hash);
        self.notifier.loading(&notice_key, loading);
        reader.wait_for_transaction(hash).await?;
        info!(action = %key, tx = %hash, "transaction confirmed");

        // The refresh reports its own failures.
        if let Err(e) = self.markets.refresh().await {
            warn!(action = %key, error = %e, "market refresh after transaction failed");
        }
        self.session.refresh_balances().await;
        self.notifier.markets_changed();
        Ok(hash)
    }

    fn report(&self, key: ActionKey, result: &Result<TxHash, ClientError>, success: &str) {
        match result {
            Ok(_) => self.notifier.success(&key.to_string(), success),
            Err(e) => {
                error!(action = %key, error = %e, "admin action failed");
                self.notifier.error(&key.to_string(), e.to_string());
            }
        }
    }
}
