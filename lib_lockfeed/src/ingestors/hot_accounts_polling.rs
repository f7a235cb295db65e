//! # Hot Accounts Polling Ingestor
//!
//! A self-scheduling REST poller that keeps the view populated when the push
//! channel is down and refreshes the dashboard totals, which are never pushed.
//!
//! ## Key Design Principles:
//! - **Independent**: runs on its own task and never looks at the connection
//!   state of the push channel.
//! - **Fixed interval**: one cycle every `interval`. A failed request is not
//!   retried early; the failure is reported and the next tick retries.
//! - **Timestamped**: the retrieval instant is captured just before the
//!   request is issued, so out-of-order poll responses can be ordered by
//!   when they were asked for.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::model::{DashboardStats, HotAccountRecord, RankedSnapshot};
use crate::retrieve::LockApi;

/// Results of one poll cycle, delivered to the engine.
#[derive(Debug)]
pub enum PollEvent {
    HotAccounts(Result<RankedSnapshot, FetchError>),
    Stats(Result<DashboardStats, FetchError>),
}

/// Where the poll channel gets its data.
pub trait PollSource: Send + Sync + 'static {
    fn fetch_hot_accounts(&self) -> impl Future<Output = Result<Vec<HotAccountRecord>, FetchError>> + Send;
    fn fetch_dashboard_stats(&self) -> impl Future<Output = Result<DashboardStats, FetchError>> + Send;
}

/// Poll source backed by the REST API.
#[derive(Clone)]
pub struct HttpPollSource {
    api: LockApi,
    limit: u32,
    window_minutes: u32,
}

impl HttpPollSource {
    pub fn new(api: LockApi, limit: u32, window_minutes: u32) -> Self {
        Self {
            api,
            limit,
            window_minutes,
        }
    }
}

impl PollSource for HttpPollSource {
    fn fetch_hot_accounts(&self) -> impl Future<Output = Result<Vec<HotAccountRecord>, FetchError>> + Send {
        self.api.hot_accounts(self.limit, self.window_minutes)
    }

    fn fetch_dashboard_stats(&self) -> impl Future<Output = Result<DashboardStats, FetchError>> + Send {
        self.api.dashboard_stats(self.window_minutes)
    }
}

/// # Main Execution Loop
///
/// Ticks immediately, then every `interval`, until `cancel` fires or the
/// engine stops listening. Both requests of a cycle run concurrently.
pub async fn run_poll_loop<P: PollSource>(
    source: Arc<P>,
    interval: Duration,
    sink: mpsc::UnboundedSender<PollEvent>,
    cancel: CancellationToken,
) {
    info!(interval_ms = interval.as_millis() as u64, "hot-accounts poller started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let ts_in = Instant::now();
        let (accounts, stats) = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            results = async { tokio::join!(source.fetch_hot_accounts(), source.fetch_dashboard_stats()) } => results,
        };

        let accounts = accounts.map(|records| RankedSnapshot::new(records, ts_in));
        match &accounts {
            Ok(snapshot) => debug!(records = snapshot.len(), "polled hot accounts"),
            Err(e) => warn!(error = %e, "hot-accounts poll failed"),
        }
        if let Err(e) = &stats {
            warn!(error = %e, "dashboard stats poll failed");
        }

        if sink.send(PollEvent::HotAccounts(accounts)).is_err() || sink.send(PollEvent::Stats(stats)).is_err() {
            break;
        }
    }

    info!("hot-accounts poller stopped");
}
