//! Wagering workflow: buy yes/no shares in a market.
//!
//! Sequence for one bet, each step awaited before the next:
//! 1. read the token allowance granted to the market contract
//! 2. if it does not cover the amount, approve and wait for confirmation
//! 3. place the bet and wait for confirmation
//! 4. refresh wallet balances and the account's position in the market
//! 5. signal `MarketsChanged`
//!
//! A failure stops the sequence where it happened. Earlier confirmed steps
//! (an approval, say) stay in effect.

use crate::chain::ChainClients;
use crate::error::ClientError;
use crate::events::Notifier;
use crate::market::{MarketRepository, Outcome};
use crate::pending::{ActionKey, InFlight};
use crate::units;
use crate::wallet::WalletSession;
use alloy::primitives::{Address, TxHash, U256};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shares the connected account holds in one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserPosition {
    pub market_id: u64,
    pub yes_shares: U256,
    pub no_shares: U256,
}

impl UserPosition {
    pub fn shares(&self, outcome: Outcome) -> U256 {
        match outcome {
            Outcome::Yes => self.yes_shares,
            Outcome::No => self.no_shares,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetReceipt {
    pub market_id: u64,
    pub outcome: Outcome,
    pub amount: U256,
    /// Approval transaction, if the allowance had to be raised.
    pub approval: Option<TxHash>,
    pub bet: TxHash,
    /// Position after the bet; `None` if the post-bet query failed.
    pub position: Option<UserPosition>,
}

pub struct WageringWorkflow {
    clients: ChainClients,
    session: Arc<WalletSession>,
    markets: Arc<MarketRepository>,
    /// Collateral used when the market is not in the repository snapshot.
    default_token: Address,
    notifier: Notifier,
    in_flight: InFlight,
}

impl WageringWorkflow {
    pub fn new(
        clients: ChainClients,
        session: Arc<WalletSession>,
        markets: Arc<MarketRepository>,
        default_token: Address,
        notifier: Notifier,
    ) -> Self {
        Self {
            clients,
            session,
            markets,
            default_token,
            notifier,
            in_flight: InFlight::new(),
        }
    }

    /// True while a bet on `market_id` is being processed.
    pub fn is_pending(&self, market_id: u64) -> bool {
        self.in_flight.contains(ActionKey::Bet(market_id))
    }

    /// Buy `amount` raw token units of `outcome` in `market_id`.
    pub async fn place_bet(
        &self,
        market_id: u64,
        outcome: Outcome,
        amount: U256,
    ) -> Result<BetReceipt, ClientError> {
        let key = ActionKey::Bet(market_id);
        let result = self.try_place_bet(key, market_id, outcome, amount).await;
        match &result {
            Ok(receipt) => {
                info!(
                    market_id,
                    outcome = %outcome,
                    amount = %units::format_token(amount),
                    tx = %receipt.bet,
                    approved = receipt.approval.is_some(),
                    "bet placed"
                );
                self.notifier.success(
                    &key.to_string(),
                    format!(
                        "Bought {} {} on market {market_id}",
                        units::format_token(amount),
                        outcome
                    ),
                );
            }
            Err(e) => {
                error!(market_id, outcome = %outcome, error = %e, "bet failed");
                self.notifier.error(&key.to_string(), e.to_string());
            }
        }
        result
    }

    async fn try_place_bet(
        &self,
        key: ActionKey,
        market_id: u64,
        outcome: Outcome,
        amount: U256,
    ) -> Result<BetReceipt, ClientError> {
        // Preconditions, checked before any network call.
        if !self.session.is_connected() {
            return Err(ClientError::WalletNotConnected);
        }
        let market = self.markets.market(market_id);
        if market.as_ref().is_some_and(|m| m.resolved) {
            return Err(ClientError::MarketResolved(market_id));
        }
        let account = self.session.active_account().await?;
        let writer = self.clients.writer()?.clone();
        if amount.is_zero() {
            return Err(ClientError::ZeroAmount);
        }
        let _guard = self
            .in_flight
            .try_begin(key)
            .ok_or_else(|| ClientError::ActionPending(key.to_string()))?;
        let reader = self.clients.reader()?.clone();

        let token = market.map(|m| m.collateral).unwrap_or(self.default_token);
        let spender = reader.market_address();
        let notice_key = key.to_string();

        // 1-2. Allowance, then approval if short.
        let allowance = reader.allowance(token, account, spender).await?;
        let approval = if allowance < amount {
            debug!(market_id, allowance = %allowance, amount = %amount, "allowance short, approving");
            self.notifier.loading(&notice_key, "Approving token spend...");
            let hash = writer.approve(account, token, spender, amount).await?;
            self.notifier.submitted(&notice_key, hash);
            reader.wait_for_transaction(hash).await?;
            info!(market_id, tx = %hash, "approval confirmed");
            Some(hash)
        } else {
            None
        };

        // 3. Bet.
        self.notifier.loading(&notice_key, "Placing bet...");
        let bet = writer.place_bet(account, market_id, outcome, amount).await?;
        self.notifier.submitted(&notice_key, bet);
        reader.wait_for_transaction(bet).await?;

        // 4. Local refresh.
        self.session.refresh_balances().await;
        let position = match self.position_for(account, market_id).await {
            Ok(p) => Some(p),
            Err(e) => {
                debug!(market_id, error = %e, "position refresh failed");
                None
            }
        };

        // 5. Only now, after confirmation.
        self.notifier.markets_changed();

        Ok(BetReceipt {
            market_id,
            outcome,
            amount,
            approval,
            bet,
            position,
        })
    }

    /// Query the connected account's shares in `market_id`.
    pub async fn position(&self, market_id: u64) -> Result<UserPosition, ClientError> {
        let account = self.session.account().ok_or(ClientError::WalletNotConnected)?;
        self.position_for(account, market_id).await
    }

    async fn position_for(
        &self,
        account: Address,
        market_id: u64,
    ) -> Result<UserPosition, ClientError> {
        let reader = self.clients.reader()?;
        let yes_shares = reader.user_shares(market_id, account, Outcome::Yes).await?;
        let no_shares = reader.user_shares(market_id, account, Outcome::No).await?;
        Ok(UserPosition {
            market_id,
            yes_shares,
            no_shares,
        })
    }
}
