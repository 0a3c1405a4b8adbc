//! Per-action in-flight markers.
//!
//! A workflow claims the key for the action it is about to run (a specific
//! market's bet, resolve or settle, or market creation) and holds the guard
//! until the action finishes. A second claim on the same key fails, so the
//! front-end only needs to disable the one control whose key is pending.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKey {
    CreateMarket,
    Bet(u64),
    Resolve(u64),
    Settle(u64),
}

impl std::fmt::Display for ActionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKey::CreateMarket => write!(f, "create-market"),
            ActionKey::Bet(id) => write!(f, "bet-{id}"),
            ActionKey::Resolve(id) => write!(f, "resolve-{id}"),
            ActionKey::Settle(id) => write!(f, "settle-{id}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct InFlight {
    keys: Mutex<HashSet<ActionKey>>,
}

/// Releases its key on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key: ActionKey,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<ActionKey>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `key`, or `None` if it is already in flight.
    pub fn try_begin(&self, key: ActionKey) -> Option<InFlightGuard<'_>> {
        if self.lock().insert(key) {
            Some(InFlightGuard { owner: self, key })
        } else {
            None
        }
    }

    pub fn contains(&self, key: ActionKey) -> bool {
        self.lock().contains(&key)
    }

    pub fn keys(&self) -> Vec<ActionKey> {
        self.lock().iter().copied().collect()
    }
}

impl InFlightGuard<'_> {
    pub fn key(&self) -> ActionKey {
        self.key
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.key);
    }
}
