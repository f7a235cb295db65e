//! # Hot Accounts Monitor
//!
//! Mounts one `LiveFeed` and prints a summary of the hottest accounts every
//! time the feed state changes. Stops on Ctrl-C or SIGTERM.

use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};

use lib_lockfeed::LiveFeed;

mod monitor_logic;
use monitor_logic::{config, logger, render};

async fn shutdown_signal() {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        warn!(error = %e, "SIGTERM handler unavailable");
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;
    let _guard = logger::setup_logging(config.log_dir(), config.log_level())?;

    let feed_config = config.feed_config();
    info!(
        api_url = %feed_config.api_url,
        ws_url = %feed_config.ws_url,
        poll_interval_ms = feed_config.poll_interval.as_millis() as u64,
        reconnect_delay_ms = feed_config.reconnect_delay.as_millis() as u64,
        "Starting hot accounts monitor"
    );

    let top = config.top();
    let mut feed = LiveFeed::start(feed_config)?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = feed.changed() => {
                if changed.is_err() {
                    warn!("Live feed stopped unexpectedly.");
                    break;
                }
                println!("{}\n", render::render_summary(&feed.state(), top));
            }
        }
    }

    feed.shutdown().await;
    info!("Shutdown complete.");
    Ok(())
}
