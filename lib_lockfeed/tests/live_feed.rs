//! End-to-end behavior of `LiveFeed` over a scripted transport and poll
//! source. Time is paused, so reconnect and poll delays run instantly.

use std::collections::VecDeque;
use std::future::{self, Future};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lib_lockfeed::ingestors::TransportMessage;
use lib_lockfeed::{
    ConnectionState, Connector, DashboardStats, FeedConfig, FeedError, FeedState, FetchError, HotAccountRecord,
    LinkStatus, LiveFeed, PollSource, SnapshotOrigin, TransportEvent, TransportLink,
};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout, Instant};

const UPDATE_FRAME: &str = r#"{"type":"hot-accounts-update","data":[{"pubkey":"A","contention_score":12.5,"lock_attempts":40,"avg_priority_fee":5000}]}"#;
const WAIT: Duration = Duration::from_secs(60);

/// Hands every opened link to the test.
struct ScriptedConnector {
    links: mpsc::UnboundedSender<TransportLink>,
}

impl ScriptedConnector {
    fn new() -> (Self, mpsc::UnboundedReceiver<TransportLink>) {
        let (links, rx) = mpsc::unbounded_channel();
        (Self { links }, rx)
    }
}

impl Connector for ScriptedConnector {
    fn open(&self, link: TransportLink) {
        let _ = self.links.send(link);
    }
}

/// Answers hot-account polls from a queue, each after `latency`; once the
/// queue is empty the request never completes, which parks the poller.
#[derive(Clone, Default)]
struct ScriptedPoll {
    hot: Arc<Mutex<VecDeque<Result<Vec<HotAccountRecord>, FetchError>>>>,
    calls: Arc<AtomicUsize>,
    latency: Duration,
}

impl ScriptedPoll {
    fn with(responses: Vec<Result<Vec<HotAccountRecord>, FetchError>>) -> Self {
        Self {
            hot: Arc::new(Mutex::new(responses.into())),
            ..Self::default()
        }
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PollSource for ScriptedPoll {
    fn fetch_hot_accounts(&self) -> impl Future<Output = Result<Vec<HotAccountRecord>, FetchError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.hot.lock().unwrap().pop_front();
        let latency = self.latency;
        async move {
            match next {
                Some(result) => {
                    if !latency.is_zero() {
                        sleep(latency).await;
                    }
                    result
                }
                None => future::pending().await,
            }
        }
    }

    fn fetch_dashboard_stats(&self) -> impl Future<Output = Result<DashboardStats, FetchError>> + Send {
        future::ready(Ok(DashboardStats {
            unique_accounts: 3,
            total_events: 120,
            high_contention_accounts: 1,
            avg_success_rate: 87.5,
        }))
    }
}

fn record(pubkey: &str, contention: f64) -> HotAccountRecord {
    HotAccountRecord {
        pubkey: pubkey.to_string(),
        lock_attempts: 10,
        successful_locks: Some(9),
        success_rate: Some(90.0),
        avg_contention: contention,
        max_contention: Some(contention),
        avg_priority_fee: 1000,
        max_priority_fee: Some(2000),
    }
}

async fn next_link(links: &mut mpsc::UnboundedReceiver<TransportLink>) -> TransportLink {
    timeout(WAIT, links.recv())
        .await
        .expect("timed out waiting for a transport")
        .expect("connector dropped")
}

async fn wait_state(rx: &mut watch::Receiver<FeedState>, pred: impl FnMut(&FeedState) -> bool) -> FeedState {
    timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for feed state")
        .expect("feed closed")
        .clone()
}

/// Starts a feed and completes the first handshake.
async fn open_feed(
    config: FeedConfig,
    poll: ScriptedPoll,
) -> (LiveFeed, watch::Receiver<FeedState>, mpsc::UnboundedReceiver<TransportLink>, TransportLink) {
    let (connector, mut links) = ScriptedConnector::new();
    let feed = LiveFeed::start_with(config, connector, poll).unwrap();
    let mut rx = feed.subscribe();

    let link = next_link(&mut links).await;
    assert_eq!(link.generation, 1);
    assert_eq!(link.url, "ws://localhost:3001/ws");
    link.emit(TransportEvent::Opened);
    wait_state(&mut rx, |s| s.connected()).await;

    (feed, rx, links, link)
}

#[tokio::test(start_paused = true)]
async fn test_update_frame_becomes_the_view() {
    let (feed, mut rx, _links, mut link) = open_feed(FeedConfig::default(), ScriptedPoll::default()).await;

    let subscription = timeout(WAIT, link.outbound.recv()).await.unwrap().unwrap();
    assert_eq!(subscription, r#"{"type":"subscribe","channel":"hot-accounts"}"#);

    link.emit(TransportEvent::Frame(UPDATE_FRAME.to_string()));
    let state = wait_state(&mut rx, |s| !s.hot_accounts().is_empty()).await;

    assert_eq!(state.connection, ConnectionState::Open);
    assert_eq!(state.status(), LinkStatus::Live);
    assert_eq!(state.origin(), Some(SnapshotOrigin::Push));
    let records = state.hot_accounts();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pubkey, "A");
    assert_eq!(records[0].avg_contention, 12.5);
    assert_eq!(records[0].lock_attempts, 40);
    assert_eq!(records[0].avg_priority_fee, 5000);
    assert_eq!(feed.hot_accounts(), records.to_vec());
}

#[tokio::test(start_paused = true)]
async fn test_close_reconnects_after_fixed_delay() {
    let (feed, mut rx, mut links, link) = open_feed(FeedConfig::default(), ScriptedPoll::default()).await;

    let closed_at = Instant::now();
    link.emit(TransportEvent::Closed);
    let state = wait_state(&mut rx, |s| s.connection == ConnectionState::Reconnecting).await;
    assert_eq!(state.status(), LinkStatus::Disconnected);
    assert!(link.cancel.is_cancelled());

    sleep(Duration::from_secs(4)).await;
    assert_eq!(feed.connection_state(), ConnectionState::Reconnecting);
    assert!(links.try_recv().is_err());

    wait_state(&mut rx, |s| s.connection == ConnectionState::Connecting).await;
    assert!(closed_at.elapsed() >= Duration::from_secs(5));
    assert!(feed.connecting());

    let second = next_link(&mut links).await;
    assert_eq!(second.generation, 2);
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_cancels_pending_timer() {
    let (feed, mut rx, mut links, link) = open_feed(FeedConfig::default(), ScriptedPoll::default()).await;

    let closed_at = Instant::now();
    link.emit(TransportEvent::Closed);
    wait_state(&mut rx, |s| s.connection == ConnectionState::Reconnecting).await;

    feed.reconnect();
    wait_state(&mut rx, |s| s.connection == ConnectionState::Connecting).await;
    assert!(closed_at.elapsed() < Duration::from_secs(5));
    let second = next_link(&mut links).await;
    assert_eq!(second.generation, 2);

    // The old timer would have fired at 5s and opened a third transport.
    sleep(Duration::from_secs(30)).await;
    assert!(links.try_recv().is_err());
    assert_eq!(feed.connection_state(), ConnectionState::Connecting);
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_replaces_open_transport() {
    let (feed, mut rx, mut links, first) = open_feed(FeedConfig::default(), ScriptedPoll::default()).await;

    feed.reconnect();
    let second = next_link(&mut links).await;
    assert!(first.cancel.is_cancelled());
    assert!(!second.cancel.is_cancelled());

    second.emit(TransportEvent::Opened);
    wait_state(&mut rx, |s| s.connected()).await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_leave_state_untouched() {
    let (_feed, mut rx, _links, link) = open_feed(FeedConfig::default(), ScriptedPoll::default()).await;

    for frame in ["", "not json", "{", r#"{"data":[]}"#, r#"{"type":"hot-accounts-update","data":"x"}"#] {
        link.emit(TransportEvent::Frame(frame.to_string()));
    }
    link.emit(TransportEvent::Frame(UPDATE_FRAME.to_string()));

    let state = wait_state(&mut rx, |s| !s.hot_accounts().is_empty()).await;
    assert_eq!(state.connection, ConnectionState::Open);
    assert_eq!(state.last_error, None);
    assert_eq!(state.diagnostics.malformed, 5);
    assert_eq!(state.diagnostics.updates, 1);
    assert!(!link.cancel.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_server_error_is_recorded_not_fatal() {
    let (feed, mut rx, mut links, link) = open_feed(FeedConfig::default(), ScriptedPoll::default()).await;

    link.emit(TransportEvent::Frame(r#"{"type":"error","message":"rate limited"}"#.to_string()));
    let state = wait_state(&mut rx, |s| s.last_error.is_some()).await;
    assert_eq!(state.last_error.as_deref(), Some("rate limited"));
    assert_eq!(state.connection, ConnectionState::Open);
    assert!(!link.cancel.is_cancelled());

    link.emit(TransportEvent::Frame(r#"{"type":"connected","message":"welcome"}"#.to_string()));
    wait_state(&mut rx, |s| s.last_error.is_none()).await;
    assert_eq!(feed.error(), None);
    assert!(links.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_retries_and_recovers() {
    let (connector, mut links) = ScriptedConnector::new();
    let feed = LiveFeed::start_with(FeedConfig::default(), connector, ScriptedPoll::default()).unwrap();
    let mut rx = feed.subscribe();

    let first = next_link(&mut links).await;
    first.emit(TransportEvent::Failed("connection refused".to_string()));
    let state = wait_state(&mut rx, |s| s.connection == ConnectionState::Reconnecting).await;
    assert_eq!(state.last_error.as_deref(), Some("Connection error: connection refused"));

    let second = next_link(&mut links).await;
    assert_eq!(second.generation, 2);
    second.emit(TransportEvent::Opened);
    let state = wait_state(&mut rx, |s| s.connected()).await;
    assert_eq!(state.last_error, None);
    assert_eq!(feed.status(), LinkStatus::Live);
}

#[tokio::test(start_paused = true)]
async fn test_poll_keeps_view_fresh_while_push_is_down() {
    let config = FeedConfig {
        reconnect_delay: Duration::from_secs(60),
        ..FeedConfig::default()
    };
    let poll = ScriptedPoll::with(vec![
        Ok(vec![record("P0", 1.0)]),
        Ok(vec![record("P1", 1.0)]),
        Ok(vec![record("P2", 1.0)]),
    ]);
    let (_feed, mut rx, _links, link) = open_feed(config, poll).await;

    link.emit(TransportEvent::Frame(UPDATE_FRAME.to_string()));
    wait_state(&mut rx, |s| s.origin() == Some(SnapshotOrigin::Push)).await;
    link.emit(TransportEvent::Closed);

    let mut seen = Vec::new();
    let state = wait_state(&mut rx, |s| {
        let head = s.hot_accounts().first().map(|r| r.pubkey.clone());
        if let Some(pubkey) = &head {
            seen.push(pubkey.clone());
        }
        head.as_deref() == Some("P2")
    })
    .await;

    assert_eq!(state.connection, ConnectionState::Reconnecting);
    assert_eq!(state.origin(), Some(SnapshotOrigin::Poll));
    // Exactly one interval after the push update is not stale yet.
    assert!(!seen.iter().any(|p| p == "P1"));
    assert_eq!(state.stats.as_ref().map(|s| s.unique_accounts), Some(3));
    assert_eq!(state.hot_accounts_error, None);
}

#[tokio::test(start_paused = true)]
async fn test_slow_poll_replaces_push_view_that_aged_while_in_flight() {
    let config = FeedConfig {
        reconnect_delay: Duration::from_secs(600),
        ..FeedConfig::default()
    };
    // Requests go out at 0s and 5s and each takes 3s to answer.
    let poll = ScriptedPoll::with(vec![Ok(vec![record("P0", 1.0)]), Ok(vec![record("P1", 1.0)])])
        .with_latency(Duration::from_secs(3));
    let (_feed, mut rx, _links, link) = open_feed(config, poll).await;
    let mounted_at = Instant::now();

    sleep(Duration::from_secs(1)).await;
    link.emit(TransportEvent::Frame(UPDATE_FRAME.to_string()));
    wait_state(&mut rx, |s| s.origin() == Some(SnapshotOrigin::Push)).await;
    link.emit(TransportEvent::Closed);
    wait_state(&mut rx, |s| s.connection == ConnectionState::Reconnecting).await;

    // P0 lands at 3s onto a 2s-old push view and is rejected. P1 was
    // requested 4s after the push but lands at 8s, when the view is 7s old.
    let state = wait_state(&mut rx, |s| s.origin() == Some(SnapshotOrigin::Poll)).await;
    assert_eq!(state.hot_accounts()[0].pubkey, "P1");
    assert_eq!(state.connection, ConnectionState::Reconnecting);
    assert!(mounted_at.elapsed() < Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn test_zero_poll_interval_is_rejected_at_start() {
    let (connector, mut links) = ScriptedConnector::new();
    let poll = ScriptedPoll::default();
    let config = FeedConfig {
        poll_interval: Duration::ZERO,
        ..FeedConfig::default()
    };

    assert!(matches!(
        LiveFeed::start_with(config, connector, poll.clone()),
        Err(FeedError::ZeroPollInterval)
    ));
    assert!(links.try_recv().is_err());
    assert_eq!(poll.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_keeps_previous_view() {
    let (connector, _links) = ScriptedConnector::new();
    let poll = ScriptedPoll::with(vec![
        Ok(vec![record("B", 2.0), record("A", 9.0)]),
        Err(FetchError::Status { status: 502, body: None }),
        Ok(vec![record("C", 1.0)]),
    ]);
    let feed = LiveFeed::start_with(FeedConfig::default(), connector, poll).unwrap();
    let mut rx = feed.subscribe();

    let state = wait_state(&mut rx, |s| !s.hot_accounts().is_empty()).await;
    let ranked: Vec<_> = state.hot_accounts().iter().map(|r| r.pubkey.as_str()).collect();
    assert_eq!(ranked, ["A", "B"]);

    let state = wait_state(&mut rx, |s| s.hot_accounts_error.is_some()).await;
    assert_eq!(state.hot_accounts_error.as_deref(), Some("server responded with status 502"));
    assert_eq!(state.hot_accounts()[0].pubkey, "A");

    let state = wait_state(&mut rx, |s| s.hot_accounts_error.is_none()).await;
    assert_eq!(state.hot_accounts()[0].pubkey, "C");
}

#[tokio::test(start_paused = true)]
async fn test_stale_transport_events_are_ignored() {
    let (feed, mut rx, mut links, first) = open_feed(FeedConfig::default(), ScriptedPoll::default()).await;

    feed.reconnect();
    let second = next_link(&mut links).await;

    // A late close from the replaced transport, bypassing its cancelled link.
    first
        .events
        .send(TransportMessage {
            generation: first.generation,
            event: TransportEvent::Closed,
        })
        .unwrap();
    second.emit(TransportEvent::Opened);
    wait_state(&mut rx, |s| s.connected()).await;

    sleep(Duration::from_secs(30)).await;
    assert!(feed.connected());
    assert!(links.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_all_activity() {
    let poll = ScriptedPoll::default();
    let (feed, rx, mut links, link) = open_feed(FeedConfig::default(), poll.clone()).await;
    let polls_before = poll.calls();

    link.emit(TransportEvent::Closed);
    feed.shutdown().await;

    assert!(link.cancel.is_cancelled());
    assert_eq!(rx.borrow().connection, ConnectionState::Disconnected);

    sleep(Duration::from_secs(60)).await;
    assert!(links.try_recv().is_err());
    assert_eq!(poll.calls(), polls_before);
    assert!(rx.has_changed().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_feed_closes_transport() {
    let (feed, mut rx, _links, link) = open_feed(FeedConfig::default(), ScriptedPoll::default()).await;

    drop(feed);
    timeout(WAIT, link.cancel.cancelled()).await.unwrap();
    assert!(timeout(WAIT, rx.changed()).await.is_ok());
}
