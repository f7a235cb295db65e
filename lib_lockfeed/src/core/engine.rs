//! # Feed Engine
//!
//! The single event loop behind a `LiveFeed`. It owns the transport handle,
//! the reconnect timer, the poll task and the reconciler, and is the only
//! place where feed state is mutated. Every input (user command, transport
//! event, timer expiry, poll result) is handled to completion on one loop
//! turn, then the resulting `FeedState` is published if anything changed.

use std::future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::configs::FeedConfig;
use crate::core::connection::{ConnectionEvent, ConnectionMachine, ConnectionState, Effect};
use crate::core::dispatcher::{Dispatch, Dispatcher};
use crate::core::reconciler::{Reconciler, SnapshotOrigin};
use crate::ingestors::hot_accounts_polling::{run_poll_loop, PollEvent, PollSource};
use crate::ingestors::hot_accounts_wss::{Connector, TransportEvent, TransportHandle, TransportMessage};
use crate::model::protocol::ClientMessage;
use crate::model::{DashboardStats, RankedSnapshot};
use crate::subscriber::FeedState;

/// Requests from the `LiveFeed` handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineCommand {
    Reconnect,
    Shutdown,
}

/// One loop turn's input, detached from the borrows of `select!`.
enum Step {
    Command(EngineCommand),
    Transport(TransportMessage),
    ReconnectElapsed,
    Poll(PollEvent),
}

pub(crate) struct FeedEngine<C: Connector, P: PollSource> {
    config: FeedConfig,
    connector: C,
    source: Arc<P>,

    machine: ConnectionMachine,
    transport: Option<TransportHandle>,
    generation: u64,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    link_tx: mpsc::UnboundedSender<TransportMessage>,
    link_rx: mpsc::UnboundedReceiver<TransportMessage>,

    poll_tx: Option<mpsc::UnboundedSender<PollEvent>>,
    poll_rx: mpsc::UnboundedReceiver<PollEvent>,
    poll_cancel: CancellationToken,
    poll_task: Option<JoinHandle<()>>,

    dispatcher: Dispatcher,
    reconciler: Reconciler,
    last_error: Option<String>,
    stats: Option<DashboardStats>,
    hot_accounts_error: Option<String>,
    stats_error: Option<String>,

    commands: mpsc::UnboundedReceiver<EngineCommand>,
    state_tx: watch::Sender<FeedState>,
    cancel: CancellationToken,
}

impl<C: Connector, P: PollSource> FeedEngine<C, P> {
    pub(crate) fn new(
        config: FeedConfig,
        connector: C,
        source: P,
        commands: mpsc::UnboundedReceiver<EngineCommand>,
        state_tx: watch::Sender<FeedState>,
        cancel: CancellationToken,
    ) -> Self {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (poll_tx, poll_rx) = mpsc::unbounded_channel();
        Self {
            machine: ConnectionMachine::new(config.reconnect_delay),
            reconciler: Reconciler::new(config.poll_interval),
            poll_cancel: cancel.child_token(),
            config,
            connector,
            source: Arc::new(source),
            transport: None,
            generation: 0,
            reconnect_timer: None,
            link_tx,
            link_rx,
            poll_tx: Some(poll_tx),
            poll_rx,
            poll_task: None,
            dispatcher: Dispatcher::new(),
            last_error: None,
            stats: None,
            hot_accounts_error: None,
            stats_error: None,
            commands,
            state_tx,
            cancel,
        }
    }

    /// # Main Execution Loop
    ///
    /// Mounts the push channel, starts the poller, and runs until the feed
    /// is cancelled, told to shut down, or its handle is dropped.
    pub(crate) async fn run(mut self) {
        info!(ws_url = %self.config.ws_url, api_url = %self.config.api_url, "live feed starting");

        // 1. Start the poller; it runs independently of the push channel
        if let Some(poll_tx) = self.poll_tx.take() {
            self.poll_task = Some(tokio::spawn(run_poll_loop(
                Arc::clone(&self.source),
                self.config.poll_interval,
                poll_tx,
                self.poll_cancel.clone(),
            )));
        }

        // 2. Mount the push channel
        self.apply(ConnectionEvent::Mount);
        self.publish();

        loop {
            // 3. Wait for the next input; cancellation and commands take priority
            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Step::Command(EngineCommand::Shutdown),
                cmd = self.commands.recv() => Step::Command(cmd.unwrap_or(EngineCommand::Shutdown)),
                Some(msg) = self.link_rx.recv() => Step::Transport(msg),
                _ = reconnect_elapsed(&mut self.reconnect_timer) => Step::ReconnectElapsed,
                Some(event) = self.poll_rx.recv() => Step::Poll(event),
            };

            // 4. Handle it to completion, then publish once
            match step {
                Step::Command(EngineCommand::Shutdown) => break,
                Step::Command(EngineCommand::Reconnect) => {
                    info!("manual reconnect requested");
                    self.apply(ConnectionEvent::ManualReconnect);
                }
                Step::Transport(msg) => self.on_transport(msg),
                Step::ReconnectElapsed => {
                    self.reconnect_timer = None;
                    self.apply(ConnectionEvent::ReconnectElapsed);
                }
                Step::Poll(event) => self.on_poll(event),
            }
            self.publish();
        }

        // 5. Tear down the transport, timer and poller
        self.unmount();
        info!("live feed stopped");
    }

    fn unmount(&mut self) {
        self.poll_cancel.cancel();
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        self.apply(ConnectionEvent::Unmount);
        self.publish();
    }

    /// Feeds one event to the state machine and carries out its effects.
    fn apply(&mut self, event: ConnectionEvent) {
        let before = self.machine.state();
        for effect in self.machine.handle(event) {
            self.execute(effect);
        }
        let after = self.machine.state();
        if before != after {
            info!(from = %before, to = %after, ?event, "connection state changed");
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::OpenTransport => {
                self.generation += 1;
                let (handle, link) = TransportHandle::pair(&self.config.ws_url, self.generation, self.link_tx.clone());
                debug!(generation = self.generation, "opening transport");
                self.transport = Some(handle);
                self.connector.open(link);
            }
            Effect::CloseTransport => {
                if let Some(transport) = self.transport.take() {
                    debug!(generation = transport.generation(), "closing transport");
                    transport.close();
                }
            }
            Effect::SendSubscription => {
                let Some(transport) = &self.transport else {
                    return;
                };
                match serde_json::to_string(&ClientMessage::subscribe_hot_accounts()) {
                    Ok(frame) => {
                        if !transport.send(frame) {
                            warn!(generation = transport.generation(), "transport gone before subscription was sent");
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to encode subscription"),
                }
            }
            Effect::ScheduleReconnect(delay) => {
                debug!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");
                self.reconnect_timer = Some(Box::pin(time::sleep(delay)));
            }
            Effect::CancelReconnect => {
                self.reconnect_timer = None;
            }
        }
    }

    fn on_transport(&mut self, msg: TransportMessage) {
        let current = self.transport.as_ref().map(TransportHandle::generation);
        if current != Some(msg.generation) {
            debug!(generation = msg.generation, ?current, "ignoring event from replaced transport");
            return;
        }

        match msg.event {
            TransportEvent::Opened => {
                self.last_error = None;
                self.apply(ConnectionEvent::TransportOpened);
            }
            TransportEvent::Frame(text) => {
                if self.machine.state() == ConnectionState::Open {
                    self.on_frame(&text);
                }
            }
            TransportEvent::Closed => self.apply(ConnectionEvent::TransportClosed),
            TransportEvent::Failed(reason) => {
                self.last_error = Some(format!("Connection error: {reason}"));
                self.apply(ConnectionEvent::TransportFailed);
            }
        }
    }

    fn on_frame(&mut self, text: &str) {
        match self.dispatcher.dispatch(text) {
            Dispatch::Connected(_) => self.last_error = None,
            Dispatch::HotAccounts(records) => {
                let now = Instant::now();
                self.reconciler.offer(SnapshotOrigin::Push, RankedSnapshot::new(records, now), now);
            }
            Dispatch::ServerError(message) => self.last_error = Some(message),
            Dispatch::Ignored | Dispatch::Malformed => {}
        }
    }

    fn on_poll(&mut self, event: PollEvent) {
        match event {
            PollEvent::HotAccounts(Ok(snapshot)) => {
                self.hot_accounts_error = None;
                self.reconciler.offer(SnapshotOrigin::Poll, snapshot, Instant::now());
            }
            PollEvent::HotAccounts(Err(e)) => self.hot_accounts_error = Some(e.to_string()),
            PollEvent::Stats(Ok(stats)) => {
                self.stats = Some(stats);
                self.stats_error = None;
            }
            PollEvent::Stats(Err(e)) => self.stats_error = Some(e.to_string()),
        }
    }

    fn snapshot_state(&self) -> FeedState {
        FeedState {
            connection: self.machine.state(),
            last_error: self.last_error.clone(),
            view: self.reconciler.view().cloned(),
            stats: self.stats.clone(),
            hot_accounts_error: self.hot_accounts_error.clone(),
            stats_error: self.stats_error.clone(),
            diagnostics: self.dispatcher.diagnostics(),
        }
    }

    /// Publishes the current state; subscribers are only woken on change.
    fn publish(&self) {
        let next = self.snapshot_state();
        self.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
    }
}

/// Resolves when the armed reconnect timer fires; never resolves when unarmed.
async fn reconnect_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}
