//! # Configuration Modules
//!
//! Runtime settings for the live feed: endpoints, timings and request limits.

/// Feed endpoints and timings, with environment overrides.
pub mod config_feed;

pub use config_feed::FeedConfig;
