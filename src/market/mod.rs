//! Market records and their derived display values.
//!
//! A market is identified by its index in the contract's append-only list.
//! Stake totals are raw 6-decimal token integers; probabilities and odds are
//! derived from them here and never stored.

pub mod repository;

pub use repository::{LoadReport, LoadState, MarketRepository};

use crate::error::ClientError;
use crate::units;
use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::Serialize;

/// Binary outcome. Discriminants match the contract's `uint8` encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    Yes = 0,
    No = 1,
}

impl Outcome {
    pub fn from_is_yes(is_yes: bool) -> Self {
        if is_yes {
            Outcome::Yes
        } else {
            Outcome::No
        }
    }

    pub fn is_yes(self) -> bool {
        self == Outcome::Yes
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Yes => "Yes",
            Outcome::No => "No",
        }
    }
}

impl TryFrom<u8> for Outcome {
    type Error = ClientError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Outcome::Yes),
            1 => Ok(Outcome::No),
            other => Err(ClientError::Rpc(format!("unknown outcome value {other}"))),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One market as returned by `getMarketById`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Market {
    /// Index in the contract's market list.
    pub id: u64,
    pub owner: Address,
    pub question: String,
    pub collateral: Address,
    pub total_yes_shares: U256,
    pub total_no_shares: U256,
    pub total_balance: U256,
    /// Meaningful only when `resolved`.
    pub result: Outcome,
    pub resolved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    Active,
    Resolved(Outcome),
}

impl MarketStatus {
    /// Buy controls are shown only for unresolved markets.
    pub fn accepts_bets(self) -> bool {
        matches!(self, MarketStatus::Active)
    }
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketStatus::Active => write!(f, "active"),
            MarketStatus::Resolved(o) => write!(f, "resolved: {o}"),
        }
    }
}

impl Market {
    pub fn status(&self) -> MarketStatus {
        if self.resolved {
            MarketStatus::Resolved(self.result)
        } else {
            MarketStatus::Active
        }
    }

    pub fn stake(&self, outcome: Outcome) -> U256 {
        match outcome {
            Outcome::Yes => self.total_yes_shares,
            Outcome::No => self.total_no_shares,
        }
    }

    /// Combined yes and no stake. `None` if the sum does not fit a `Decimal`.
    fn pool(&self) -> Option<Decimal> {
        units::to_decimal(self.total_yes_shares, units::TOKEN_DECIMALS)
            .checked_add(units::to_decimal(self.total_no_shares, units::TOKEN_DECIMALS))
    }

    /// Implied probability of `outcome` from stake totals, in `[0, 1]`.
    /// `None` while nothing has been staked, or if the totals overflow.
    pub fn implied_probability(&self, outcome: Outcome) -> Option<Decimal> {
        let side = units::to_decimal(self.stake(outcome), units::TOKEN_DECIMALS);
        let pool = self.pool()?;
        if pool.is_zero() {
            return None;
        }
        side.checked_div(pool)
    }

    /// Decimal odds for `outcome`: pool over side stake. `None` if the side
    /// has no stake or the totals overflow.
    pub fn decimal_odds(&self, outcome: Outcome) -> Option<Decimal> {
        let side = units::to_decimal(self.stake(outcome), units::TOKEN_DECIMALS);
        if side.is_zero() {
            return None;
        }
        Some(self.pool()?.checked_div(side)?.round_dp(2))
    }

    pub fn row(&self) -> MarketRow {
        MarketRow {
            id: self.id,
            question: self.question.clone(),
            yes_stake: units::format_token(self.total_yes_shares),
            no_stake: units::format_token(self.total_no_shares),
            total: units::format_token(self.total_balance),
            yes_percent: self
                .implied_probability(Outcome::Yes)
                .and_then(|p| p.checked_mul(Decimal::ONE_HUNDRED))
                .map(|p| p.round_dp(0)),
            status: self.status(),
        }
    }
}

/// Display-ready summary of one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketRow {
    pub id: u64,
    pub question: String,
    pub yes_stake: String,
    pub no_stake: String,
    pub total: String,
    pub yes_percent: Option<Decimal>,
    pub status: MarketStatus,
}

impl std::fmt::Display for MarketRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} | yes {} | no {} | total {}",
            self.id, self.question, self.yes_stake, self.no_stake, self.total
        )?;
        if let Some(p) = self.yes_percent {
            write!(f, " | {p}% yes")?;
        }
        write!(f, " | {}", self.status)
    }
}
