//! # lib_lockfeed
//!
//! Self-healing live feed of hot-account write-lock contention.
//!
//! A `LiveFeed` keeps one reconciled, ranked view of the hottest accounts by
//! combining a long-lived WebSocket push channel (with fixed-delay automatic
//! reconnect) and a fixed-interval REST poller that keeps working while the
//! socket is down.
//!
//! ```no_run
//! # async fn run() -> Result<(), lib_lockfeed::FeedError> {
//! use lib_lockfeed::{FeedConfig, LiveFeed};
//!
//! let mut feed = LiveFeed::start(FeedConfig::from_env())?;
//! while feed.changed().await.is_ok() {
//!     let state = feed.state();
//!     println!("{} - {} accounts", state.status(), state.hot_accounts().len());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod configs;
pub mod core;
pub mod error;
pub mod ingestors;
pub mod model;
pub mod retrieve;
pub mod subscriber;

pub use configs::FeedConfig;
pub use self::core::{ConnectionState, FrameDiagnostics, ReconciledView, SnapshotOrigin};
pub use error::{FeedError, FetchError};
pub use ingestors::{Connector, PollSource, TransportEvent, TransportLink};
pub use model::{DashboardStats, HotAccountRecord, RankedSnapshot};
pub use retrieve::LockApi;
pub use subscriber::{FeedState, LinkStatus, LiveFeed};
