//! Market repository: bulk load of every market in the contract.
//!
//! Load state transitions:
//!
//! ```text
//! Idle ──load──▶ Loading ──ok──▶ Loaded ──load──▶ Loading ...
//!                        └─err─▶ Failed ──load──▶ Loading ...
//! ```
//!
//! A load that starts while another is `Loading` is rejected with
//! `LoadInProgress` before any network call. A load future dropped mid-flight
//! returns the state to where it was.
//!
//! Markets are fetched one index at a time. A failed index is logged and
//! skipped; the surviving markets keep their on-chain index as `Market::id`.

use crate::chain::{ChainClients, ChainReader};
use crate::error::ClientError;
use crate::events::{Notice, Notifier};
use crate::market::Market;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

const NOTICE_KEY: &str = "load-markets";
const MAX_PREALLOCATED: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Outcome of one bulk load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Market count reported by the contract.
    pub count: u64,
    pub loaded: usize,
    /// Indices whose fetch failed and were omitted.
    pub skipped: Vec<u64>,
}

/// Who asked for the load, which decides whether failures reach the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// First load or explicit refresh: errors are shown.
    Explicit,
    /// Periodic refresh: errors are shown only until a load has succeeded.
    Background,
}

#[derive(Debug)]
struct RepoState {
    load: LoadState,
    /// Set after the first successful load, never cleared.
    has_loaded: bool,
    markets: Vec<Market>,
    last_error: Option<ClientError>,
}

pub struct MarketRepository {
    clients: ChainClients,
    notifier: Notifier,
    state: Mutex<RepoState>,
}

/// Returns the state to its pre-load value if the load is abandoned.
struct LoadGuard<'a> {
    repo: &'a MarketRepository,
    previous: LoadState,
    done: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            let mut state = self.repo.lock();
            if state.load == LoadState::Loading {
                state.load = self.previous;
            }
        }
    }
}

impl MarketRepository {
    pub fn new(clients: ChainClients, notifier: Notifier) -> Self {
        Self {
            clients,
            notifier,
            state: Mutex::new(RepoState {
                load: LoadState::Idle,
                has_loaded: false,
                markets: Vec::new(),
                last_error: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RepoState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> LoadState {
        self.lock().load
    }

    pub fn is_loading(&self) -> bool {
        self.state() == LoadState::Loading
    }

    pub fn has_loaded(&self) -> bool {
        self.lock().has_loaded
    }

    pub fn last_error(&self) -> Option<ClientError> {
        self.lock().last_error.clone()
    }

    /// Snapshot of the markets from the latest successful load.
    pub fn markets(&self) -> Vec<Market> {
        self.lock().markets.clone()
    }

    pub fn market(&self, market_id: u64) -> Option<Market> {
        self.lock().markets.iter().find(|m| m.id == market_id).cloned()
    }

    /// Load every market. Does not notify; callers decide what to surface.
    pub async fn load_all(&self) -> Result<LoadReport, ClientError> {
        let reader = self.clients.reader()?.clone();
        let mut guard = self.begin_load()?;

        let result = fetch_all(reader.as_ref()).await;
        guard.done = true;

        let mut state = self.lock();
        match result {
            Ok((markets, report)) => {
                state.markets = markets;
                state.load = LoadState::Loaded;
                state.has_loaded = true;
                state.last_error = None;
                Ok(report)
            }
            Err(e) => {
                state.load = LoadState::Failed;
                state.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Initial load. Skipped once any load has succeeded.
    pub async fn ensure_loaded(&self) -> Result<Option<LoadReport>, ClientError> {
        if self.has_loaded() {
            return Ok(None);
        }
        self.load_notified(Trigger::Explicit).await.map(Some)
    }

    /// Forced reload, ignoring whether a load has already succeeded.
    pub async fn refresh(&self) -> Result<LoadReport, ClientError> {
        self.load_notified(Trigger::Explicit).await
    }

    /// Periodic reload. Once a load has succeeded, failures are logged but
    /// not surfaced, so a flaky node does not produce repeated error notices.
    pub async fn background_refresh(&self) -> Result<LoadReport, ClientError> {
        self.load_notified(Trigger::Background).await
    }

    /// React to a workflow notice: `MarketsChanged` triggers a background
    /// reload. Returns true if the snapshot was reloaded.
    pub async fn handle_notice(&self, notice: &Notice) -> bool {
        if *notice != Notice::MarketsChanged {
            return false;
        }
        match self.background_refresh().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "reload after market change did not complete");
                false
            }
        }
    }

    fn begin_load(&self) -> Result<LoadGuard<'_>, ClientError> {
        let mut state = self.lock();
        if state.load == LoadState::Loading {
            debug!("market load already in flight, rejecting");
            return Err(ClientError::LoadInProgress);
        }
        let previous = state.load;
        state.load = LoadState::Loading;
        Ok(LoadGuard {
            repo: self,
            previous,
            done: false,
        })
    }

    async fn load_notified(&self, trigger: Trigger) -> Result<LoadReport, ClientError> {
        let had_loaded = self.has_loaded();
        let result = self.load_all().await;
        match &result {
            Ok(report) => {
                info!(
                    count = report.count,
                    loaded = report.loaded,
                    skipped = report.skipped.len(),
                    "markets loaded"
                );
            }
            Err(ClientError::LoadInProgress) => {}
            Err(e) if trigger == Trigger::Background && had_loaded => {
                warn!(error = %e, "background market refresh failed");
            }
            Err(e) => {
                warn!(error = %e, "failed to load markets");
                self.notifier
                    .error(NOTICE_KEY, format!("Failed to load markets: {e}"));
            }
        }
        result
    }
}

async fn fetch_all(reader: &dyn ChainReader) -> Result<(Vec<Market>, LoadReport), ClientError> {
    let address = reader.market_address();
    if !reader.code_exists(address).await? {
        return Err(ClientError::ContractNotFound { address });
    }

    let count = reader.markets_count().await?;
    if count == 0 {
        return Ok((
            Vec::new(),
            LoadReport {
                count,
                loaded: 0,
                skipped: Vec::new(),
            },
        ));
    }

    // Chain-reported count; cap the up-front allocation.
    let mut markets = Vec::with_capacity(count.min(MAX_PREALLOCATED) as usize);
    let mut skipped = Vec::new();
    for market_id in 0..count {
        match reader.market_by_id(market_id).await {
            Ok(market) => markets.push(market),
            Err(e) => {
                warn!(market_id, error = %e, "failed to load market, skipping");
                skipped.push(market_id);
            }
        }
    }

    let report = LoadReport {
        count,
        loaded: markets.len(),
        skipped,
    };
    Ok((markets, report))
}
