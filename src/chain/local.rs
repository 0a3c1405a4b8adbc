//! Private-key wallet provider.
//!
//! Holds one or more local signers. Account access must be requested before
//! `accounts()` reports anything, mirroring an injected browser wallet. The
//! active account can be switched or access revoked at runtime; both emit an
//! account-change notification.

use crate::chain::{broadcast_stream, WalletProvider};
use crate::error::ClientError;
use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::info;

#[derive(Debug)]
struct LocalState {
    active: usize,
    authorized: bool,
}

pub struct LocalWallet {
    signers: Vec<PrivateKeySigner>,
    state: Mutex<LocalState>,
    changes: broadcast::Sender<Vec<Address>>,
}

impl LocalWallet {
    /// Build from one or more hex private keys (comma separated).
    pub fn from_keys(keys: &str) -> Result<Self, ClientError> {
        let signers = keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| {
                PrivateKeySigner::from_str(k)
                    .map_err(|e| ClientError::Rpc(format!("invalid private key: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(signers)
    }

    pub fn new(signers: Vec<PrivateKeySigner>) -> Result<Self, ClientError> {
        if signers.is_empty() {
            return Err(ClientError::NoWalletProvider);
        }
        let (changes, _) = broadcast::channel(16);
        Ok(Self {
            signers,
            state: Mutex::new(LocalState {
                active: 0,
                authorized: false,
            }),
            changes,
        })
    }

    /// Signing wallet covering every local key, for the write client.
    pub fn ethereum_wallet(&self) -> EthereumWallet {
        let mut wallet = EthereumWallet::from(self.signers[0].clone());
        for signer in &self.signers[1..] {
            wallet.register_signer(signer.clone());
        }
        wallet
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.signers.iter().map(|s| s.address()).collect()
    }

    /// Make `address` the active account. Notifies subscribers if access has
    /// been authorized.
    pub fn switch_account(&self, address: Address) -> Result<(), ClientError> {
        let index = self
            .signers
            .iter()
            .position(|s| s.address() == address)
            .ok_or(ClientError::NoAccount)?;
        let notify = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.active = index;
            state.authorized
        };
        info!(account = %address, "local wallet switched account");
        if notify {
            let _ = self.changes.send(vec![address]);
        }
        Ok(())
    }

    /// Withdraw account access. Subscribers see an empty account list.
    pub fn revoke(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .authorized = false;
        info!("local wallet access revoked");
        let _ = self.changes.send(Vec::new());
    }

    fn active_accounts(&self, authorize: bool) -> Vec<Address> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if authorize {
            state.authorized = true;
        }
        if state.authorized {
            vec![self.signers[state.active].address()]
        } else {
            Vec::new()
        }
    }
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ClientError> {
        Ok(self.active_accounts(true))
    }

    async fn accounts(&self) -> Result<Vec<Address>, ClientError> {
        Ok(self.active_accounts(false))
    }

    fn account_changes(&self) -> BoxStream<'static, Vec<Address>> {
        broadcast_stream(self.changes.subscribe())
    }
}
