//! # Core Engine Module
//!
//! The synchronization core of the live feed.
//!
//! ## Core Components:
//!
//! - **`connection`**: the push channel's lifecycle as a pure state machine.
//!   Each transition yields the side effects the engine must perform.
//!
//! - **`dispatcher`**: parses inbound push frames and routes them by type,
//!   keeping counters for diagnostics.
//!
//! - **`reconciler`**: arbitrates between push and poll snapshots and holds
//!   the single current view.
//!
//! - **`engine`**: the event loop that drives all of the above and publishes
//!   the resulting feed state.

#![forbid(unsafe_code)]

/// Push channel lifecycle state machine.
pub mod connection;
/// Inbound frame parsing and routing.
pub mod dispatcher;
/// Push/poll precedence and the current view.
pub mod reconciler;
pub(crate) mod engine;

// --- Public API Re-exports ---
pub use connection::{ConnectionEvent, ConnectionMachine, ConnectionState, Effect};
pub use dispatcher::{Dispatch, Dispatcher, FrameDiagnostics};
pub use reconciler::{arbitrate, ReconciledView, Reconciler, SnapshotOrigin};
