//! # Push Channel State Machine
//!
//! Pure connection lifecycle for the hot-accounts WebSocket. The machine
//! never touches a socket or a timer itself: every transition returns the
//! list of side effects the engine must perform, in order. This keeps the
//! reconnect policy testable without a network.
//!
//! ```text
//!  Disconnected --mount/reconnect--> Connecting --opened--> Open
//!       ^                               |  ^                  |
//!       |                     failed/closed  elapsed           | closed/failed
//!   unmount (any)                       v  |                  v
//!                                    Reconnecting <-----------+
//! ```
//!
//! Backoff is a fixed delay with no attempt limit.

use std::fmt;
use std::time::Duration;

/// Lifecycle state of one push channel instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Open => write!(f, "OPEN"),
            Self::Reconnecting => write!(f, "RECONNECTING"),
        }
    }
}

/// Inputs to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The owning subscriber was created.
    Mount,
    /// Explicit user request to reconnect now.
    ManualReconnect,
    /// The transport finished its handshake.
    TransportOpened,
    /// The transport closed, expectedly or not.
    TransportClosed,
    /// The transport reported a fatal error (before or after opening).
    TransportFailed,
    /// The pending reconnect delay elapsed.
    ReconnectElapsed,
    /// The owning subscriber is going away. Terminal.
    Unmount,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Start a fresh transport.
    OpenTransport,
    /// Close and release the current transport, if any.
    CloseTransport,
    /// Send the hot-accounts subscription on the current transport.
    SendSubscription,
    /// Arm the reconnect timer.
    ScheduleReconnect(Duration),
    /// Disarm the reconnect timer, if armed.
    CancelReconnect,
}

/// # Connection Machine
///
/// Holds the single current `ConnectionState` of a push channel and applies
/// the transition table. Once `Unmount` is seen the machine is terminated and
/// ignores every further event.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    reconnect_delay: Duration,
    terminated: bool,
}

impl ConnectionMachine {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconnect_delay,
            terminated: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Applies one event and returns the effects to execute, in order.
    pub fn handle(&mut self, event: ConnectionEvent) -> Vec<Effect> {
        use ConnectionEvent as Ev;
        use ConnectionState as St;

        if self.terminated {
            return Vec::new();
        }

        match (self.state, event) {
            (_, Ev::Unmount) => {
                self.terminated = true;
                self.state = St::Disconnected;
                vec![Effect::CancelReconnect, Effect::CloseTransport]
            }
            (_, Ev::ManualReconnect) => {
                self.state = St::Connecting;
                vec![Effect::CancelReconnect, Effect::CloseTransport, Effect::OpenTransport]
            }
            (St::Disconnected, Ev::Mount) => {
                self.state = St::Connecting;
                vec![Effect::OpenTransport]
            }
            (St::Connecting, Ev::TransportOpened) => {
                self.state = St::Open;
                vec![Effect::SendSubscription]
            }
            (St::Connecting | St::Open, Ev::TransportClosed | Ev::TransportFailed) => {
                self.state = St::Reconnecting;
                vec![Effect::CloseTransport, Effect::ScheduleReconnect(self.reconnect_delay)]
            }
            (St::Reconnecting, Ev::ReconnectElapsed) => {
                self.state = St::Connecting;
                vec![Effect::OpenTransport]
            }
            // Late or duplicate signals (a second close, a timer racing a
            // manual reconnect, mount while already connecting).
            _ => Vec::new(),
        }
    }
}
