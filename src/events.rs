//! User-visible notifications emitted by the workflows.
//!
//! Each notice carries a key identifying the action (`create-market`,
//! `resolve-3`, `bet-7`, ...) so a front-end can replace a pending "loading"
//! toast with the matching success or error. Delivered over a
//! `tokio::sync::mpsc` channel; a dropped receiver is not an error.

use alloy::primitives::TxHash;
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// An action is waiting on the network.
    Loading { key: String, message: String },
    Success { key: String, message: String },
    Error { key: String, message: String },
    /// A transaction was broadcast.
    Submitted { key: String, hash: TxHash },
    /// On-chain market state changed; the market list should be reloaded.
    MarketsChanged,
}

impl Notice {
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Loading { key, .. }
            | Self::Success { key, .. }
            | Self::Error { key, .. }
            | Self::Submitted { key, .. } => Some(key),
            Self::MarketsChanged => None,
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading { key, message } => write!(f, "[{key}] … {message}"),
            Self::Success { key, message } => write!(f, "[{key}] ok: {message}"),
            Self::Error { key, message } => write!(f, "[{key}] error: {message}"),
            Self::Submitted { key, hash } => write!(f, "[{key}] submitted {hash}"),
            Self::MarketsChanged => write!(f, "markets changed"),
        }
    }
}

/// Sending half shared by the workflows. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl Notifier {
    pub fn new(tx: mpsc::UnboundedSender<Notice>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Notifier paired with a fresh receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// A notifier that drops everything.
    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, notice: Notice) {
        trace!(%notice, "notice");
        if let Some(tx) = &self.tx {
            let _ = tx.send(notice);
        }
    }

    pub fn loading(&self, key: &str, message: impl Into<String>) {
        self.send(Notice::Loading {
            key: key.to_string(),
            message: message.into(),
        });
    }

    pub fn success(&self, key: &str, message: impl Into<String>) {
        self.send(Notice::Success {
            key: key.to_string(),
            message: message.into(),
        });
    }

    pub fn error(&self, key: &str, message: impl Into<String>) {
        self.send(Notice::Error {
            key: key.to_string(),
            message: message.into(),
        });
    }

    pub fn submitted(&self, key: &str, hash: TxHash) {
        self.send(Notice::Submitted {
            key: key.to_string(),
            hash,
        });
    }

    pub fn markets_changed(&self) {
        self.send(Notice::MarketsChanged);
    }
}
