//! # Data Ingestors Module
//!
//! The two independent channels that feed the reconciliation layer.
//!
//! - **`hot_accounts_wss`**: the push transport. A `Connector` opens one
//!   WebSocket per connection attempt and reports tagged events back.
//! - **`hot_accounts_polling`**: a fixed-interval REST poller for the ranked
//!   snapshot and the dashboard totals. It keeps running regardless of the
//!   push channel's state.

/// WebSocket transport for the hot-accounts stream.
pub mod hot_accounts_wss;
/// Fixed-interval REST polling of hot accounts and dashboard totals.
pub mod hot_accounts_polling;

pub use hot_accounts_polling::{HttpPollSource, PollEvent, PollSource};
pub use hot_accounts_wss::{Connector, TransportEvent, TransportLink, TransportMessage, WsConnector};
