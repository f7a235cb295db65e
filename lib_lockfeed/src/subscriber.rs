//! # Subscriber Surface
//!
//! `LiveFeed` is what presentation code holds on to. Creating one mounts the
//! push channel and starts the poller; dropping it (or calling `shutdown`)
//! unmounts both. State is published through a `watch` channel, so reads are
//! cheap, never block, and are valid before any data has arrived.

use std::fmt;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::configs::FeedConfig;
use crate::core::connection::ConnectionState;
use crate::core::dispatcher::FrameDiagnostics;
use crate::core::engine::{EngineCommand, FeedEngine};
use crate::core::reconciler::{ReconciledView, SnapshotOrigin};
use crate::error::FeedError;
use crate::ingestors::hot_accounts_polling::{HttpPollSource, PollSource};
use crate::ingestors::hot_accounts_wss::{Connector, WsConnector};
use crate::model::{DashboardStats, HotAccountRecord};
use crate::retrieve::{ApiClientOptions, LockApi};

/// Status indicator shown next to the hot-account table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkStatus {
    Live,
    Connecting,
    /// Covers both idle and waiting-to-retry; offers a manual reconnect.
    Disconnected,
}

impl LinkStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Live => "Live",
            Self::Connecting => "Connecting",
            Self::Disconnected => "Disconnected",
        }
    }

    /// Whether the manual retry affordance should be offered.
    pub fn offers_retry(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<ConnectionState> for LinkStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Open => Self::Live,
            ConnectionState::Connecting => Self::Connecting,
            ConnectionState::Disconnected | ConnectionState::Reconnecting => Self::Disconnected,
        }
    }
}

/// # Feed State
///
/// Everything a consumer can observe about the feed at one instant.
/// The default value is what is visible before the engine has run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedState {
    /// Push channel lifecycle state.
    pub connection: ConnectionState,
    /// Last transport or server-declared error on the push channel.
    pub last_error: Option<String>,
    /// The reconciled view, once either channel has delivered.
    pub view: Option<ReconciledView>,
    /// Latest dashboard totals from the poll channel.
    pub stats: Option<DashboardStats>,
    /// Error of the most recent hot-accounts poll, cleared on success.
    pub hot_accounts_error: Option<String>,
    /// Error of the most recent stats poll, cleared on success.
    pub stats_error: Option<String>,
    pub diagnostics: FrameDiagnostics,
}

impl FeedState {
    pub fn connected(&self) -> bool {
        self.connection == ConnectionState::Open
    }

    pub fn connecting(&self) -> bool {
        self.connection == ConnectionState::Connecting
    }

    pub fn status(&self) -> LinkStatus {
        self.connection.into()
    }

    /// Current ranked records; empty before any data has arrived.
    pub fn hot_accounts(&self) -> &[HotAccountRecord] {
        self.view.as_ref().map(|v| v.snapshot.records()).unwrap_or(&[])
    }

    /// Which channel produced the current view.
    pub fn origin(&self) -> Option<SnapshotOrigin> {
        self.view.as_ref().map(|v| v.origin)
    }
}

/// # Live Feed
///
/// Handle to one running feed. Owns the engine task.
pub struct LiveFeed {
    commands: mpsc::UnboundedSender<EngineCommand>,
    state: watch::Receiver<FeedState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LiveFeed {
    /// Starts a feed against the configured WebSocket and REST endpoints.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the HTTP client cannot
    /// be built. Connection failures are not errors; they show up in state.
    pub fn start(config: FeedConfig) -> Result<Self, FeedError> {
        config.validate()?;
        let api = LockApi::new(
            &config.api_url,
            ApiClientOptions {
                auth_token: None,
                timeout: config.request_timeout,
                max_retries: config.http_retries,
            },
        )?;
        let source = HttpPollSource::new(api, config.hot_accounts_limit, config.window_minutes);
        Self::start_with(config, WsConnector, source)
    }

    /// Starts a feed over the given transport and poll source.
    ///
    /// # Errors
    /// Returns an error if the config does not pass `FeedConfig::validate`.
    pub fn start_with<C: Connector, P: PollSource>(
        config: FeedConfig,
        connector: C,
        source: P,
    ) -> Result<Self, FeedError> {
        config.validate()?;
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(FeedState::default());
        let cancel = CancellationToken::new();

        let engine = FeedEngine::new(config, connector, source, commands_rx, state_tx, cancel.clone());
        let task = tokio::spawn(engine.run());

        Ok(Self {
            commands,
            state,
            cancel,
            task: Some(task),
        })
    }

    /// A copy of the current state.
    pub fn state(&self) -> FeedState {
        self.state.borrow().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.borrow().connection
    }

    pub fn connected(&self) -> bool {
        self.state.borrow().connected()
    }

    pub fn connecting(&self) -> bool {
        self.state.borrow().connecting()
    }

    pub fn status(&self) -> LinkStatus {
        self.state.borrow().status()
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().last_error.clone()
    }

    pub fn hot_accounts(&self) -> Vec<HotAccountRecord> {
        self.state.borrow().hot_accounts().to_vec()
    }

    /// Cancels any pending retry, drops the current transport and connects
    /// again immediately. Safe in every state.
    pub fn reconnect(&self) {
        if self.commands.send(EngineCommand::Reconnect).is_err() {
            warn!("reconnect requested after the feed stopped");
        }
    }

    /// A receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }

    /// Waits for the next published state.
    pub async fn changed(&mut self) -> Result<(), FeedError> {
        self.state.changed().await.map_err(|_| FeedError::Closed)
    }

    /// Unmounts the feed and waits for the engine to finish.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(EngineCommand::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "live feed task ended abnormally");
            }
        }
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
