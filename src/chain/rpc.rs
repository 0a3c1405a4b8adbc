//! alloy-backed chain clients over HTTP JSON-RPC.

use crate::chain::abi::{IMarket, IERC20};
use crate::chain::{ChainReader, ChainWriter};
use crate::error::ClientError;
use crate::market::{Market, Outcome};
use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use async_trait::async_trait;
use tracing::{debug, info};

/// Read-only connection to the node.
#[derive(Clone)]
pub struct RpcReader {
    provider: DynProvider,
    market: Address,
}

impl RpcReader {
    pub async fn connect(rpc_url: &str, market: Address) -> Result<Self, ClientError> {
        let provider = ProviderBuilder::new().connect(rpc_url).await?.erased();
        info!(url = %rpc_url, market = %market, "read client connected");
        Ok(Self { provider, market })
    }

    fn market_contract(&self) -> IMarket::IMarketInstance<DynProvider> {
        IMarket::new(self.market, self.provider.clone())
    }

    fn token_contract(&self, token: Address) -> IERC20::IERC20Instance<DynProvider> {
        IERC20::new(token, self.provider.clone())
    }
}

#[async_trait]
impl ChainReader for RpcReader {
    fn market_address(&self) -> Address {
        self.market
    }

    async fn code_exists(&self, address: Address) -> Result<bool, ClientError> {
        let code = self.provider.get_code_at(address).await?;
        Ok(!code.is_empty())
    }

    async fn markets_count(&self) -> Result<u64, ClientError> {
        let count = self.market_contract().getMarketsCount().call().await?;
        u64::try_from(count).map_err(|_| ClientError::Rpc(format!("market count {count} out of range")))
    }

    async fn market_by_id(&self, market_id: u64) -> Result<Market, ClientError> {
        let r = self
            .market_contract()
            .getMarketById(U256::from(market_id))
            .call()
            .await?;
        let result = Outcome::try_from(r.result)?;
        Ok(Market {
            id: market_id,
            owner: r.owner,
            question: r.question,
            collateral: r.collateral,
            total_yes_shares: r.totalYesShares,
            total_no_shares: r.totalNoShares,
            total_balance: r.totalBalance,
            result,
            resolved: r.resolved,
        })
    }

    async fn user_shares(
        &self,
        market_id: u64,
        user: Address,
        outcome: Outcome,
    ) -> Result<U256, ClientError> {
        Ok(self
            .market_contract()
            .getUserShares(U256::from(market_id), user, outcome.is_yes())
            .call()
            .await?)
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ClientError> {
        Ok(self.token_contract(token).allowance(owner, spender).call().await?)
    }

    async fn token_balance(&self, token: Address, account: Address) -> Result<U256, ClientError> {
        Ok(self.token_contract(token).balanceOf(account).call().await?)
    }

    async fn native_balance(&self, account: Address) -> Result<U256, ClientError> {
        Ok(self.provider.get_balance(account).await?)
    }

    async fn wait_for_transaction(&self, hash: TxHash) -> Result<(), ClientError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), hash)
            .get_receipt()
            .await?;
        debug!(tx = %hash, block = ?receipt.block_number(), "transaction mined");
        if receipt.status() {
            Ok(())
        } else {
            Err(ClientError::TransactionReverted(hash))
        }
    }
}

/// Write connection bound to the user's signers.
#[derive(Clone)]
pub struct RpcWriter {
    provider: DynProvider,
    market: Address,
}

impl RpcWriter {
    pub async fn connect(
        rpc_url: &str,
        market: Address,
        wallet: EthereumWallet,
    ) -> Result<Self, ClientError> {
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect(rpc_url)
            .await?
            .erased();
        info!(url = %rpc_url, "write client connected");
        Ok(Self { provider, market })
    }

    fn market_contract(&self) -> IMarket::IMarketInstance<DynProvider> {
        IMarket::new(self.market, self.provider.clone())
    }
}

#[async_trait]
impl ChainWriter for RpcWriter {
    async fn create_market(
        &self,
        from: Address,
        question: &str,
        collateral: Address,
    ) -> Result<TxHash, ClientError> {
        let pending = self
            .market_contract()
            .createMarket(question.to_string(), collateral)
            .from(from)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn place_bet(
        &self,
        from: Address,
        market_id: u64,
        outcome: Outcome,
        amount: U256,
    ) -> Result<TxHash, ClientError> {
        let pending = self
            .market_contract()
            .placeBet(U256::from(market_id), outcome.is_yes(), amount)
            .from(from)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn solve_market(
        &self,
        from: Address,
        market_id: u64,
        outcome: Outcome,
    ) -> Result<TxHash, ClientError> {
        let pending = self
            .market_contract()
            .solveMarket(U256::from(market_id), outcome.as_u8())
            .from(from)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn settle(&self, from: Address, market_id: u64) -> Result<TxHash, ClientError> {
        let pending = self
            .market_contract()
            .settle(U256::from(market_id))
            .from(from)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn approve(
        &self,
        from: Address,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, ClientError> {
        let pending = IERC20::new(token, self.provider.clone())
            .approve(spender, amount)
            .from(from)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }
}
