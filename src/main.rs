use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use yesno::chain::{ChainClients, ChainReader, ChainWriter, LocalWallet, RpcReader, RpcWriter, WalletProvider};
use yesno::config::Config;
use yesno::events::{Notice, Notifier};
use yesno::market::MarketRepository;
use yesno::wallet::WalletSession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Load config
    let config = if Path::new("yesno.toml").exists() {
        Config::load(Path::new("yesno.toml"))?
    } else {
        info!("no yesno.toml found, using env-only config");
        Config::from_env()?
    };

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    info!("yesno v{} starting", env!("CARGO_PKG_VERSION"));
    info!(
        chain_id = config.chain.chain_id,
        market = %config.chain.market_address,
        token = %config.chain.token_address,
        "configuration loaded"
    );

    // --- Chain clients ---
    let reader: Option<Arc<dyn ChainReader>> =
        match RpcReader::connect(&config.chain.rpc_url, config.chain.market_address).await {
            Ok(r) => Some(Arc::new(r)),
            Err(e) => {
                error!(error = %e, "read client unavailable, market data will not load");
                None
            }
        };

    let local_wallet = match config.wallet.private_key.as_deref() {
        Some(keys) => Some(Arc::new(LocalWallet::from_keys(keys)?)),
        None => None,
    };
    if !config.has_wallet() {
        info!("no YESNO_PRIVATE_KEY set, running read-only");
    }

    let writer: Option<Arc<dyn ChainWriter>> = match &local_wallet {
        Some(wallet) => {
            match RpcWriter::connect(
                &config.chain.rpc_url,
                config.chain.market_address,
                wallet.ethereum_wallet(),
            )
            .await
            {
                Ok(w) => Some(Arc::new(w)),
                Err(e) => {
                    error!(error = %e, "write client unavailable");
                    None
                }
            }
        }
        None => None,
    };

    let clients = ChainClients::new(reader, writer);
    let (notifier, mut notices) = Notifier::channel();

    // --- Wallet session ---
    let provider = local_wallet
        .clone()
        .map(|w| w as Arc<dyn WalletProvider>);
    let session = Arc::new(WalletSession::new(
        provider,
        clients.clone(),
        config.chain.token_address,
        notifier.clone(),
    ));

    if local_wallet.is_some() {
        let connected = if config.wallet.auto_connect {
            session.connect().await.map(Some)
        } else {
            session.restore().await
        };
        match connected {
            Ok(Some(account)) => {
                let snap = session.snapshot();
                info!(
                    account = %account,
                    native = %snap.formatted_native_balance(),
                    token = %snap.formatted_token_balance(),
                    "wallet session ready"
                );
            }
            Ok(None) => info!("wallet available but not connected"),
            Err(e) => warn!(error = %e, "wallet session not established"),
        }
    }
    let _account_watch = match session.watch_accounts() {
        Ok(watch) => Some(watch),
        Err(e) => {
            debug!(error = %e, "not watching account changes");
            None
        }
    };

    // --- Market list ---
    let markets = Arc::new(MarketRepository::new(clients.clone(), notifier.clone()));
    match markets.ensure_loaded().await {
        Ok(Some(report)) => {
            info!(
                count = report.count,
                loaded = report.loaded,
                skipped = report.skipped.len(),
                "markets loaded"
            );
            log_markets(&markets, config.logging.json);
        }
        Ok(None) => {}
        Err(e) => error!(error = %e, "initial market load failed"),
    }

    // --- Main Event Loop ---
    let refresh_secs = config.sync.refresh_interval_secs;
    if refresh_secs == 0 {
        info!("background refresh disabled");
    }
    let mut refresh = tokio::time::interval(Duration::from_secs(refresh_secs.max(1)));
    // The first tick completes immediately; the initial load already ran.
    refresh.tick().await;

    info!("entering main event loop - press Ctrl+C to stop");

    loop {
        tokio::select! {
            Some(notice) = notices.recv() => {
                match &notice {
                    Notice::Error { .. } => warn!(notice = %notice, "notice"),
                    Notice::MarketsChanged => {
                        markets.handle_notice(&notice).await;
                        log_markets(&markets, config.logging.json);
                    }
                    Notice::Submitted { hash, .. } => {
                        info!(notice = %notice, link = %config.tx_url(hash), "notice")
                    }
                    _ => info!(notice = %notice, "notice"),
                }
            }

            _ = refresh.tick(), if refresh_secs > 0 => {
                match markets.background_refresh().await {
                    Ok(report) => {
                        debug!(loaded = report.loaded, skipped = report.skipped.len(), "background refresh");
                        log_markets(&markets, config.logging.json);
                    }
                    Err(e) => debug!(error = %e, "background refresh did not complete"),
                }
                if session.is_connected() {
                    session.refresh_balances().await;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("shutting down...");
                break;
            }
        }
    }

    Ok(())
}

/// Log one display row per cached market. In JSON mode the full record is
/// attached as well.
fn log_markets(markets: &MarketRepository, json: bool) {
    for market in markets.markets() {
        let row = market.row();
        if json {
            match serde_json::to_string(&market) {
                Ok(record) => info!(market = %record, "{}", row),
                Err(e) => warn!(id = market.id, error = %e, "failed to serialize market"),
            }
        } else {
            info!("{}", row);
        }
    }
}
