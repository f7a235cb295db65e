//! # Frame Dispatcher
//!
//! Parses inbound push frames and decides where each one goes: record
//! updates to the reconciliation layer, everything else to diagnostics.
//!
//! A frame that fails to parse is dropped. It is never a connection error
//! and never changes the connection state.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::model::protocol::ServerMessage;
use crate::model::HotAccountRecord;

/// Routing decision for one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Server greeting. Clears any recorded channel error.
    Connected(Option<String>),
    /// A new ranked record set, to be reconciled as push-sourced.
    HotAccounts(Vec<HotAccountRecord>),
    /// Server-declared error. Recorded, not fatal.
    ServerError(String),
    /// Well-formed frame of a type this client does not handle.
    Ignored,
    /// Not a valid envelope. Dropped.
    Malformed,
}

/// Counters for frames seen on the current feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameDiagnostics {
    pub frames: u64,
    pub updates: u64,
    pub malformed: u64,
    pub ignored: u64,
    pub server_errors: u64,
}

/// Stateless apart from its diagnostics counters.
#[derive(Debug, Default)]
pub struct Dispatcher {
    diagnostics: FrameDiagnostics,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> FrameDiagnostics {
        self.diagnostics
    }

    /// Classifies a raw text frame.
    pub fn dispatch(&mut self, frame: &str) -> Dispatch {
        self.diagnostics.frames += 1;

        let message = match serde_json::from_str::<ServerMessage>(frame) {
            Ok(message) => message,
            Err(e) => {
                self.diagnostics.malformed += 1;
                debug!(error = %e, len = frame.len(), "dropping malformed frame");
                return Dispatch::Malformed;
            }
        };

        match message {
            ServerMessage::Connected { message } => {
                info!(message = message.as_deref().unwrap_or(""), "server confirmed connection");
                Dispatch::Connected(message)
            }
            ServerMessage::HotAccountsUpdate { data } => {
                self.diagnostics.updates += 1;
                debug!(records = data.len(), "hot-accounts update");
                Dispatch::HotAccounts(data)
            }
            ServerMessage::Error { message } => {
                self.diagnostics.server_errors += 1;
                let message = message.unwrap_or_else(|| "Unknown error".to_string());
                warn!(%message, "server error");
                Dispatch::ServerError(message)
            }
            ServerMessage::Unknown => {
                self.diagnostics.ignored += 1;
                debug!("ignoring frame with unhandled type");
                Dispatch::Ignored
            }
        }
    }
}
