//! # Hot Accounts WSS Transport
//!
//! The push channel's transport seam. The engine never holds a socket: it
//! asks a `Connector` to open a transport for a `TransportLink` and from then
//! on talks to it only through channels.
//!
//! Each link carries a generation number. Every event the transport emits is
//! tagged with it so the engine can discard events from a transport it has
//! already replaced.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a transport reports back to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened,
    /// One inbound text frame.
    Frame(String),
    /// The connection ended (remote close or end of stream).
    Closed,
    /// The connection could not be established or broke.
    Failed(String),
}

/// A `TransportEvent` stamped with the generation of its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub generation: u64,
    pub event: TransportEvent,
}

/// Everything a transport needs to run: where to connect, where to report,
/// what to send, and when to stop.
#[derive(Debug)]
pub struct TransportLink {
    pub url: String,
    pub generation: u64,
    pub events: mpsc::UnboundedSender<TransportMessage>,
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub cancel: CancellationToken,
}

impl TransportLink {
    /// Reports an event unless the link was already cancelled.
    pub fn emit(&self, event: TransportEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        let _ = self.events.send(TransportMessage {
            generation: self.generation,
            event,
        });
    }
}

/// Opens push transports. Implementations must return promptly and do the
/// actual I/O on their own task.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, link: TransportLink);
}

/// The engine's handle on the transport it currently owns.
#[derive(Debug)]
pub struct TransportHandle {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl TransportHandle {
    /// Creates a link/handle pair for a new transport.
    pub fn pair(url: &str, generation: u64, events: mpsc::UnboundedSender<TransportMessage>) -> (Self, TransportLink) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = Self {
            generation,
            outbound: out_tx,
            cancel: cancel.clone(),
        };
        let link = TransportLink {
            url: url.to_string(),
            generation,
            events,
            outbound: out_rx,
            cancel,
        };
        (handle, link)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queues a text frame. Returns `false` if the transport is gone.
    pub fn send(&self, frame: String) -> bool {
        self.outbound.send(frame).is_ok()
    }

    /// Asks the transport to close. Safe to call repeatedly.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Real transport over `tokio-tungstenite`.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(&self, link: TransportLink) {
        tokio::spawn(run_socket(link));
    }
}

async fn run_socket(mut link: TransportLink) {
    let generation = link.generation;
    info!(url = %link.url, generation, "connecting to hot-accounts stream");

    // 1. Connect, unless the link is dropped first
    let connected = tokio::select! {
        _ = link.cancel.cancelled() => return,
        res = connect_async(link.url.as_str()) => res,
    };

    let (mut write, mut read) = match connected {
        Ok((stream, _)) => stream.split(),
        Err(e) => {
            warn!(generation, error = %e, "failed to connect to hot-accounts stream");
            link.emit(TransportEvent::Failed(e.to_string()));
            return;
        }
    };
    link.emit(TransportEvent::Opened);

    // 2. Pump outbound frames and forward inbound ones until either side ends
    loop {
        tokio::select! {
            _ = link.cancel.cancelled() => {
                debug!(generation, "closing transport");
                let _ = write.close().await;
                return;
            }
            Some(frame) = link.outbound.recv() => {
                if let Err(e) = write.send(Message::Text(frame.into())).await {
                    warn!(generation, error = %e, "failed to send frame");
                    link.emit(TransportEvent::Failed(e.to_string()));
                    return;
                }
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => link.emit(TransportEvent::Frame(text.to_string())),
                Some(Ok(Message::Close(frame))) => {
                    info!(generation, ?frame, "stream closed by server");
                    link.emit(TransportEvent::Closed);
                    return;
                }
                // Pings are answered by tungstenite; binary frames are not part of the protocol.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(generation, error = %e, "stream read error");
                    link.emit(TransportEvent::Failed(e.to_string()));
                    return;
                }
                None => {
                    info!(generation, "stream ended");
                    link.emit(TransportEvent::Closed);
                    return;
                }
            }
        }
    }
}
