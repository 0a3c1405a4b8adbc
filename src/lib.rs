//! Client library for a binary (yes/no) prediction-market contract.
//!
//! The contract owns all accounting; this crate orchestrates reads and
//! transactions against it:
//! - `chain`: read/write connections and the wallet-provider boundary
//! - `wallet`: the connected account and its balances
//! - `market`: market records and the bulk-loading repository
//! - `wager`: the approve-then-bet workflow
//! - `admin`: market creation, resolution and settlement
//! - `events`: user-visible notifications

pub mod admin;
pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod market;
pub mod pending;
pub mod units;
pub mod wager;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use error::ClientError;
