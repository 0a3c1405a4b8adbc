//! In-memory chain and wallet used by the unit tests.
//!
//! `FakeChain` implements both `ChainReader` and `ChainWriter` over a simple
//! model of the market and token contracts, and records every call so tests
//! can assert on counts and ordering. Writes are validated on submission and
//! applied when the transaction is waited on.

use crate::chain::{broadcast_stream, ChainClients, ChainReader, ChainWriter, WalletProvider};
use crate::error::ClientError;
use crate::market::{Market, Outcome};
use alloy::primitives::{Address, TxHash, B256, U256};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub const MARKET: Address = Address::repeat_byte(0xaa);
pub const TOKEN: Address = Address::repeat_byte(0xbb);
pub const OTHER_TOKEN: Address = Address::repeat_byte(0xcc);
pub const OWNER: Address = Address::repeat_byte(0x01);
pub const ALICE: Address = Address::repeat_byte(0x02);
pub const BOB: Address = Address::repeat_byte(0x03);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CodeExists(Address),
    MarketsCount,
    MarketById(u64),
    UserShares(u64, Outcome),
    /// Token, owner.
    Allowance(Address, Address),
    TokenBalance(Address),
    NativeBalance(Address),
    Wait(TxHash),
    CreateMarket(String),
    PlaceBet(u64, Outcome, U256),
    SolveMarket(u64, Outcome),
    Settle(u64),
    /// Token, amount.
    Approve(Address, U256),
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Call::CreateMarket(_)
                | Call::PlaceBet(..)
                | Call::SolveMarket(..)
                | Call::Settle(_)
                | Call::Approve(..)
        )
    }
}

#[derive(Debug, Clone)]
enum Op {
    Create { from: Address, question: String, collateral: Address },
    Bet { from: Address, market_id: u64, outcome: Outcome, amount: U256 },
    Solve { market_id: u64, outcome: Outcome },
    Settle,
    Approve { from: Address, token: Address, amount: U256 },
}

#[derive(Default)]
struct FakeState {
    deployed: bool,
    markets: Vec<Market>,
    failing: HashSet<u64>,
    /// Keyed by (token, owner); the spender is always the market.
    allowances: HashMap<(Address, Address), U256>,
    token_balances: HashMap<Address, U256>,
    native_balances: HashMap<Address, U256>,
    shares: HashMap<(u64, Address, Outcome), U256>,
    pending: HashMap<TxHash, Op>,
    nonce: u64,
    calls: Vec<Call>,
}

pub struct FakeChain {
    state: Mutex<FakeState>,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                deployed: true,
                ..Default::default()
            }),
        })
    }

    pub fn clients(self: &Arc<Self>) -> ChainClients {
        ChainClients::new(
            Some(self.clone() as Arc<dyn ChainReader>),
            Some(self.clone() as Arc<dyn ChainWriter>),
        )
    }

    pub fn read_only_clients(self: &Arc<Self>) -> ChainClients {
        ChainClients::new(Some(self.clone() as Arc<dyn ChainReader>), None)
    }

    pub fn push_market(&self, question: &str, yes: u64, no: u64, resolved: Option<Outcome>) {
        let mut s = self.state.lock().unwrap();
        let id = s.markets.len() as u64;
        s.markets.push(Market {
            id,
            owner: OWNER,
            question: question.to_string(),
            collateral: TOKEN,
            total_yes_shares: U256::from(yes),
            total_no_shares: U256::from(no),
            total_balance: U256::from(yes + no),
            result: resolved.unwrap_or(Outcome::Yes),
            resolved: resolved.is_some(),
        });
    }

    pub fn fail_market(&self, id: u64) {
        self.state.lock().unwrap().failing.insert(id);
    }

    pub fn undeploy(&self) {
        self.state.lock().unwrap().deployed = false;
    }

    pub fn set_allowance(&self, token: Address, owner: Address, amount: u64) {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((token, owner), U256::from(amount));
    }

    pub fn set_collateral(&self, market_id: u64, token: Address) {
        self.state.lock().unwrap().markets[market_id as usize].collateral = token;
    }

    pub fn set_balances(&self, account: Address, native: u64, token: u64) {
        let mut s = self.state.lock().unwrap();
        s.native_balances.insert(account, U256::from(native));
        s.token_balances.insert(account, U256::from(token));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn submit(&self, op: Op) -> TxHash {
        let mut s = self.state.lock().unwrap();
        s.nonce += 1;
        let hash = B256::from(U256::from(s.nonce));
        s.pending.insert(hash, op);
        hash
    }
}

fn revert(reason: &str) -> ClientError {
    ClientError::Rpc(format!("execution reverted: {reason}"))
}

#[async_trait]
impl ChainReader for FakeChain {
    fn market_address(&self) -> Address {
        MARKET
    }

    async fn code_exists(&self, address: Address) -> Result<bool, ClientError> {
        self.record(Call::CodeExists(address));
        let s = self.state.lock().unwrap();
        Ok(s.deployed && address == MARKET)
    }

    async fn markets_count(&self) -> Result<u64, ClientError> {
        self.record(Call::MarketsCount);
        // Suspend like a real network call so overlapping loads interleave.
        tokio::task::yield_now().await;
        Ok(self.state.lock().unwrap().markets.len() as u64)
    }

    async fn market_by_id(&self, market_id: u64) -> Result<Market, ClientError> {
        self.record(Call::MarketById(market_id));
        let s = self.state.lock().unwrap();
        if s.failing.contains(&market_id) {
            return Err(ClientError::Rpc(format!("timeout reading market {market_id}")));
        }
        s.markets
            .get(market_id as usize)
            .cloned()
            .ok_or_else(|| revert("market does not exist"))
    }

    async fn user_shares(
        &self,
        market_id: u64,
        user: Address,
        outcome: Outcome,
    ) -> Result<U256, ClientError> {
        self.record(Call::UserShares(market_id, outcome));
        let s = self.state.lock().unwrap();
        Ok(s.shares
            .get(&(market_id, user, outcome))
            .copied()
            .unwrap_or_default())
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        _spender: Address,
    ) -> Result<U256, ClientError> {
        self.record(Call::Allowance(token, owner));
        Ok(self
            .state
            .lock()
            .unwrap()
            .allowances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn token_balance(&self, _token: Address, account: Address) -> Result<U256, ClientError> {
        self.record(Call::TokenBalance(account));
        Ok(self
            .state
            .lock()
            .unwrap()
            .token_balances
            .get(&account)
            .copied()
            .unwrap_or_default())
    }

    async fn native_balance(&self, account: Address) -> Result<U256, ClientError> {
        self.record(Call::NativeBalance(account));
        Ok(self
            .state
            .lock()
            .unwrap()
            .native_balances
            .get(&account)
            .copied()
            .unwrap_or_default())
    }

    async fn wait_for_transaction(&self, hash: TxHash) -> Result<(), ClientError> {
        self.record(Call::Wait(hash));
        tokio::task::yield_now().await;
        let mut s = self.state.lock().unwrap();
        let op = s
            .pending
            .remove(&hash)
            .ok_or_else(|| ClientError::Rpc(format!("unknown transaction {hash}")))?;
        match op {
            Op::Create { from, question, collateral } => {
                let id = s.markets.len() as u64;
                s.markets.push(Market {
                    id,
                    owner: from,
                    question,
                    collateral,
                    total_yes_shares: U256::ZERO,
                    total_no_shares: U256::ZERO,
                    total_balance: U256::ZERO,
                    result: Outcome::Yes,
                    resolved: false,
                });
            }
            Op::Bet { from, market_id, outcome, amount } => {
                let token = s.markets[market_id as usize].collateral;
                let allowance = s.allowances.get(&(token, from)).copied().unwrap_or_default();
                if allowance < amount {
                    return Err(ClientError::TransactionReverted(hash));
                }
                s.allowances.insert((token, from), allowance - amount);
                let balance = s.token_balances.get(&from).copied().unwrap_or_default();
                s.token_balances.insert(from, balance.saturating_sub(amount));
                *s.shares.entry((market_id, from, outcome)).or_default() += amount;
                let m = &mut s.markets[market_id as usize];
                match outcome {
                    Outcome::Yes => m.total_yes_shares += amount,
                    Outcome::No => m.total_no_shares += amount,
                }
                m.total_balance += amount;
            }
            Op::Solve { market_id, outcome } => {
                let m = &mut s.markets[market_id as usize];
                m.resolved = true;
                m.result = outcome;
            }
            Op::Settle => {}
            Op::Approve { from, token, amount } => {
                s.allowances.insert((token, from), amount);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChainWriter for FakeChain {
    async fn create_market(
        &self,
        from: Address,
        question: &str,
        collateral: Address,
    ) -> Result<TxHash, ClientError> {
        self.record(Call::CreateMarket(question.to_string()));
        Ok(self.submit(Op::Create {
            from,
            question: question.to_string(),
            collateral,
        }))
    }

    async fn place_bet(
        &self,
        from: Address,
        market_id: u64,
        outcome: Outcome,
        amount: U256,
    ) -> Result<TxHash, ClientError> {
        self.record(Call::PlaceBet(market_id, outcome, amount));
        {
            let s = self.state.lock().unwrap();
            match s.markets.get(market_id as usize) {
                None => return Err(revert("market does not exist")),
                Some(m) if m.resolved => return Err(revert("market resolved")),
                Some(_) => {}
            }
        }
        Ok(self.submit(Op::Bet {
            from,
            market_id,
            outcome,
            amount,
        }))
    }

    async fn solve_market(
        &self,
        from: Address,
        market_id: u64,
        outcome: Outcome,
    ) -> Result<TxHash, ClientError> {
        self.record(Call::SolveMarket(market_id, outcome));
        {
            let s = self.state.lock().unwrap();
            match s.markets.get(market_id as usize) {
                None => return Err(revert("market does not exist")),
                Some(m) if m.owner != from => return Err(revert("only owner")),
                Some(m) if m.resolved => return Err(revert("already resolved")),
                Some(_) => {}
            }
        }
        Ok(self.submit(Op::Solve { market_id, outcome }))
    }

    async fn settle(&self, _from: Address, market_id: u64) -> Result<TxHash, ClientError> {
        self.record(Call::Settle(market_id));
        {
            let s = self.state.lock().unwrap();
            match s.markets.get(market_id as usize) {
                Some(m) if m.resolved => {}
                _ => return Err(revert("market not resolved")),
            }
        }
        Ok(self.submit(Op::Settle))
    }

    async fn approve(
        &self,
        from: Address,
        token: Address,
        _spender: Address,
        amount: U256,
    ) -> Result<TxHash, ClientError> {
        self.record(Call::Approve(token, amount));
        Ok(self.submit(Op::Approve {
            from,
            token,
            amount,
        }))
    }
}

/// Wallet provider whose account list is set directly by the test.
pub struct FakeWallet {
    accounts: Mutex<Vec<Address>>,
    authorized: Mutex<bool>,
    changes: broadcast::Sender<Vec<Address>>,
}

impl FakeWallet {
    pub fn new(accounts: Vec<Address>) -> Arc<Self> {
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            accounts: Mutex::new(accounts),
            authorized: Mutex::new(false),
            changes,
        })
    }

    /// Wallet that already authorized this origin.
    pub fn authorized(accounts: Vec<Address>) -> Arc<Self> {
        let wallet = Self::new(accounts);
        *wallet.authorized.lock().unwrap() = true;
        wallet
    }

    /// Replace the account list and notify subscribers.
    pub fn set_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.lock().unwrap() = accounts.clone();
        let _ = self.changes.send(accounts);
    }

    pub fn subscribers(&self) -> usize {
        self.changes.receiver_count()
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ClientError> {
        *self.authorized.lock().unwrap() = true;
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn accounts(&self) -> Result<Vec<Address>, ClientError> {
        if *self.authorized.lock().unwrap() {
            Ok(self.accounts.lock().unwrap().clone())
        } else {
            Ok(Vec::new())
        }
    }

    fn account_changes(&self) -> BoxStream<'static, Vec<Address>> {
        broadcast_stream(self.changes.subscribe())
    }
}
