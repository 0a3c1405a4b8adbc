//! Wallet session: the connected account and its balances.
//!
//! At most one account is connected at a time. Balances are re-read after
//! connecting, on demand, and after every state-changing transaction.
//! Account switches reported by the wallet provider are picked up by
//! `watch_accounts`, which resynchronizes the session (or clears it when the
//! provider reports no accounts).

use crate::chain::{ChainClients, WalletProvider};
use crate::error::ClientError;
use crate::events::Notifier;
use crate::units;
use alloy::primitives::{Address, U256};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const CONNECT_KEY: &str = "connect-wallet";

/// Point-in-time view of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub account: Option<Address>,
    pub native_balance: Option<U256>,
    pub token_balance: Option<U256>,
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }

    /// Native balance to four places, `0.00` when unknown.
    pub fn formatted_native_balance(&self) -> String {
        self.native_balance
            .map(units::format_native)
            .unwrap_or_else(|| "0.00".to_string())
    }

    /// Token balance to two places, `0.00` when unknown.
    pub fn formatted_token_balance(&self) -> String {
        self.token_balance
            .map(units::format_token)
            .unwrap_or_else(|| "0.00".to_string())
    }
}

pub struct WalletSession {
    provider: Option<Arc<dyn WalletProvider>>,
    clients: ChainClients,
    /// Token whose balance is tracked alongside the native balance.
    token: Address,
    notifier: Notifier,
    state: Mutex<SessionSnapshot>,
    connecting: AtomicBool,
}

/// Background account-change subscription. Dropping it unsubscribes.
pub struct AccountWatch {
    handle: JoinHandle<()>,
}

impl AccountWatch {
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for AccountWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Clears the `connecting` flag when the request ends or is abandoned.
struct ConnectingGuard<'a>(&'a AtomicBool);

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl WalletSession {
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        clients: ChainClients,
        token: Address,
        notifier: Notifier,
    ) -> Self {
        Self {
            provider,
            clients,
            token,
            notifier,
            state: Mutex::new(SessionSnapshot::default()),
            connecting: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().clone()
    }

    pub fn account(&self) -> Option<Address> {
        self.lock().account
    }

    pub fn is_connected(&self) -> bool {
        self.account().is_some()
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::SeqCst)
    }

    fn provider(&self) -> Result<&Arc<dyn WalletProvider>, ClientError> {
        self.provider.as_ref().ok_or(ClientError::NoWalletProvider)
    }

    /// Ask the wallet for account access and adopt the first account.
    pub async fn connect(&self) -> Result<Address, ClientError> {
        let result = self.try_connect().await;
        match &result {
            Ok(account) => {
                info!(account = %account, "wallet connected");
                self.notifier
                    .success(CONNECT_KEY, "Wallet connected successfully!");
            }
            Err(e) => {
                warn!(error = %e, "wallet connection failed");
                self.notifier.error(CONNECT_KEY, e.to_string());
            }
        }
        result
    }

    async fn try_connect(&self) -> Result<Address, ClientError> {
        let provider = self.provider()?.clone();
        if self.connecting.swap(true, Ordering::SeqCst) {
            return Err(ClientError::ActionPending(CONNECT_KEY.to_string()));
        }
        let accounts = {
            let _connecting = ConnectingGuard(&self.connecting);
            provider.request_accounts().await
        };

        let account = accounts?.first().copied().ok_or(ClientError::NoAccount)?;
        self.set_account(Some(account));
        self.refresh_balances().await;
        Ok(account)
    }

    /// Adopt an already-authorized account without prompting. Returns the
    /// account, if any.
    pub async fn restore(&self) -> Result<Option<Address>, ClientError> {
        let accounts = self.provider()?.accounts().await?;
        let Some(account) = accounts.first().copied() else {
            return Ok(None);
        };
        debug!(account = %account, "restored wallet session");
        self.set_account(Some(account));
        self.refresh_balances().await;
        Ok(Some(account))
    }

    /// Forget the account locally. Nothing happens on-chain.
    pub fn disconnect(&self) {
        if let Some(account) = self.account() {
            info!(account = %account, "wallet disconnected");
        }
        self.set_account(None);
    }

    /// The account the wallet currently authorizes for signing.
    pub async fn active_account(&self) -> Result<Address, ClientError> {
        self.provider()?
            .accounts()
            .await?
            .first()
            .copied()
            .ok_or(ClientError::NoAccount)
    }

    /// Re-read native and token balances. No-op when disconnected; failures
    /// are logged and leave the previous values in place.
    pub async fn refresh_balances(&self) {
        let Some(account) = self.account() else {
            return;
        };
        let reader = match self.clients.reader() {
            Ok(r) => r.clone(),
            Err(e) => {
                warn!(error = %e, "cannot refresh balances");
                return;
            }
        };

        let native = reader.native_balance(account).await;
        let token = reader.token_balance(self.token, account).await;

        let mut state = self.lock();
        // The account may have switched while the queries were in flight.
        if state.account != Some(account) {
            debug!(account = %account, "discarding balances for stale account");
            return;
        }
        match native {
            Ok(b) => state.native_balance = Some(b),
            Err(e) => warn!(account = %account, error = %e, "native balance fetch failed"),
        }
        match token {
            Ok(b) => state.token_balance = Some(b),
            Err(e) => warn!(account = %account, error = %e, "token balance fetch failed"),
        }
    }

    /// Apply an account-list change reported by the wallet.
    pub async fn handle_accounts_changed(&self, accounts: &[Address]) {
        match accounts.first().copied() {
            None => {
                info!("wallet reported no accounts, clearing session");
                self.set_account(None);
            }
            Some(account) => {
                info!(account = %account, "wallet account changed");
                self.set_account(Some(account));
                self.refresh_balances().await;
            }
        }
    }

    /// Follow the wallet's account-change notifications in a background task.
    pub fn watch_accounts(self: &Arc<Self>) -> Result<AccountWatch, ClientError> {
        let mut changes = self.provider()?.account_changes();
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(accounts) = changes.next().await {
                session.handle_accounts_changed(&accounts).await;
            }
            debug!("account change stream ended");
        });
        Ok(AccountWatch { handle })
    }

    fn set_account(&self, account: Option<Address>) {
        let mut state = self.lock();
        if state.account != account {
            *state = SessionSnapshot {
                account,
                ..Default::default()
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeChain, FakeWallet, ALICE, BOB, TOKEN};
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Wallet whose access prompt is never answered.
    #[derive(Default)]
    struct StalledWallet {
        requests: AtomicUsize,
    }

    #[async_trait]
    impl WalletProvider for StalledWallet {
        async fn request_accounts(&self) -> Result<Vec<Address>, ClientError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            futures::future::pending().await
        }

        async fn accounts(&self) -> Result<Vec<Address>, ClientError> {
            Ok(Vec::new())
        }

        fn account_changes(&self) -> BoxStream<'static, Vec<Address>> {
            futures::stream::empty().boxed()
        }
    }

    fn session(chain: &Arc<FakeChain>, wallet: Arc<FakeWallet>) -> Arc<WalletSession> {
        Arc::new(WalletSession::new(
            Some(wallet as Arc<dyn WalletProvider>),
            chain.read_only_clients(),
            TOKEN,
            Notifier::silent(),
        ))
    }

    async fn settle_tasks() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_connect_adopts_first_account_and_fetches_balances() {
        let chain = FakeChain::new();
        chain.set_balances(ALICE, 2_000_000_000_000_000_000, 7_250_000);
        let s = session(&chain, FakeWallet::new(vec![ALICE, BOB]));

        assert_eq!(s.connect().await.unwrap(), ALICE);
        let snap = s.snapshot();
        assert_eq!(snap.account, Some(ALICE));
        assert_eq!(snap.formatted_token_balance(), "7.25");
        assert_eq!(snap.formatted_native_balance(), "2.0000");
        assert!(!s.is_connecting());
    }

    #[tokio::test]
    async fn test_connect_without_provider_fails() {
        let chain = FakeChain::new();
        let s = WalletSession::new(None, chain.read_only_clients(), TOKEN, Notifier::silent());
        assert_eq!(s.connect().await, Err(ClientError::NoWalletProvider));
        assert!(chain.calls().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_clears_local_state_only() {
        let chain = FakeChain::new();
        chain.set_balances(ALICE, 1, 1);
        let wallet = FakeWallet::new(vec![ALICE]);
        let s = session(&chain, wallet.clone());
        s.connect().await.unwrap();
        chain.clear_calls();

        s.disconnect();
        assert_eq!(s.snapshot(), SessionSnapshot::default());
        assert!(chain.calls().is_empty());
        // The wallet still authorizes the account.
        assert_eq!(wallet.accounts().await.unwrap(), vec![ALICE]);
    }

    #[tokio::test]
    async fn test_refresh_balances_noop_when_disconnected() {
        let chain = FakeChain::new();
        let s = session(&chain, FakeWallet::new(vec![ALICE]));
        s.refresh_balances().await;
        assert!(chain.calls().is_empty());
    }

    #[tokio::test]
    async fn test_restore_uses_authorized_accounts() {
        let chain = FakeChain::new();
        let s = session(&chain, FakeWallet::new(vec![ALICE]));
        assert_eq!(s.restore().await.unwrap(), None);

        let s = session(&chain, FakeWallet::authorized(vec![BOB]));
        assert_eq!(s.restore().await.unwrap(), Some(BOB));
        assert!(chain.calls().contains(&Call::NativeBalance(BOB)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_connect_can_be_retried() {
        let chain = FakeChain::new();
        let wallet = Arc::new(StalledWallet::default());
        let s = WalletSession::new(
            Some(wallet.clone() as Arc<dyn WalletProvider>),
            chain.read_only_clients(),
            TOKEN,
            Notifier::silent(),
        );

        let first = tokio::time::timeout(Duration::from_secs(30), s.connect()).await;
        assert!(first.is_err());
        assert!(!s.is_connecting());

        // The retry reaches the wallet instead of failing as already pending.
        let second = tokio::time::timeout(Duration::from_secs(30), s.connect()).await;
        assert!(second.is_err());
        assert_eq!(wallet.requests.load(Ordering::SeqCst), 2);
        assert!(!s.is_connected());
    }

    #[tokio::test]
    async fn test_account_switch_resyncs_and_empty_clears() {
        let chain = FakeChain::new();
        chain.set_balances(BOB, 0, 3_000_000);
        let wallet = FakeWallet::new(vec![ALICE]);
        let s = session(&chain, wallet.clone());
        s.connect().await.unwrap();

        let watch = s.watch_accounts().unwrap();
        wallet.set_accounts(vec![BOB]);
        settle_tasks().await;
        assert_eq!(s.account(), Some(BOB));
        assert_eq!(s.snapshot().formatted_token_balance(), "3.00");

        wallet.set_accounts(Vec::new());
        settle_tasks().await;
        assert!(!s.is_connected());

        drop(watch);
        settle_tasks().await;
        assert_eq!(wallet.subscribers(), 0);
    }
}
