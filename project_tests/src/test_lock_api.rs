//! # Lock Contention API Live Checks
//!
//! Runs every endpoint of a live API through `lib_lockfeed::LockApi`, then
//! subscribes to the push stream and waits for the first frame. Prints one
//! line per check and exits non-zero if any check failed.
//!
//! ```text
//! LOCK_API_URL=http://localhost:3001 cargo run -p project_tests --bin test_lock_api
//! ```

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{protocol::Message, Error as WsError};

use lib_lockfeed::model::protocol::{ClientMessage, ServerMessage};
use lib_lockfeed::retrieve::lock_api::DEFAULT_ACCOUNT_STATS_WINDOW_HOURS;
use lib_lockfeed::retrieve::ApiClientOptions;
use lib_lockfeed::{FeedConfig, LockApi};

#[derive(Parser, Debug)]
#[clap(about = "Live checks against a running lock contention API")]
struct Args {
    #[clap(long, env = "LOCK_API_URL")]
    api_url: Option<String>,

    #[clap(long, env = "LOCK_WS_URL")]
    ws_url: Option<String>,

    /// Account used for the per-account checks; defaults to the hottest one.
    #[clap(long)]
    pubkey: Option<String>,

    /// Seconds to wait for the first stream frame.
    #[clap(long, default_value_t = 15)]
    stream_timeout_secs: u64,
}

/// Tally of passed and failed checks.
#[derive(Default)]
struct Report {
    failed: usize,
    passed: usize,
}

impl Report {
    fn check<T, E: std::fmt::Display>(&mut self, name: &str, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => {
                self.passed += 1;
                println!("✅ {name}");
                Some(value)
            }
            Err(e) => {
                self.failed += 1;
                println!("❌ {name}: {e}");
                None
            }
        }
    }
}

async fn next_text<S>(read: &mut S) -> Result<String>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg) = read.next().await {
        if let Message::Text(text) = msg? {
            return Ok(text.to_string());
        }
    }
    bail!("stream closed before the first frame")
}

async fn first_stream_frame(ws_url: &str, wait: Duration) -> Result<ServerMessage> {
    let (stream, _) = connect_async(ws_url).await?;
    let (mut write, mut read) = stream.split();

    let subscribe = serde_json::to_string(&ClientMessage::subscribe_hot_accounts())?;
    write.send(Message::Text(subscribe.into())).await?;

    let frame = timeout(wait, next_text(&mut read)).await??;

    let _ = write.close().await;
    Ok(serde_json::from_str(&frame)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let defaults = FeedConfig::default();
    let api_url = args.api_url.unwrap_or(defaults.api_url);
    let ws_url = args.ws_url.unwrap_or(defaults.ws_url);

    println!("--- Lock API checks against {api_url} ---");
    let api = LockApi::new(&api_url, ApiClientOptions::default())?;
    let mut report = Report::default();

    if let Some(stats) = report.check("GET /api/stats", api.dashboard_stats(defaults.window_minutes).await) {
        println!(
            "   {} accounts, {} events, {} high contention, {:.1}% avg success",
            stats.unique_accounts, stats.total_events, stats.high_contention_accounts, stats.avg_success_rate
        );
    }

    let hot = report
        .check(
            "GET /api/hot-accounts",
            api.hot_accounts(defaults.hot_accounts_limit, defaults.window_minutes).await,
        )
        .unwrap_or_default();
    for record in hot.iter().take(5) {
        println!(
            "   {} contention {:.2} attempts {} fee {}",
            record.pubkey, record.avg_contention, record.lock_attempts, record.avg_priority_fee
        );
    }

    match args.pubkey.or_else(|| hot.first().map(|r| r.pubkey.clone())) {
        Some(pubkey) => {
            if let Some(stats) = report.check(
                "GET /api/accounts/{pubkey}/stats",
                api.account_stats(&pubkey, DEFAULT_ACCOUNT_STATS_WINDOW_HOURS).await,
            ) {
                println!("   {pubkey}: {} attempts, {:.1}% success", stats.total_lock_attempts, stats.success_rate);
            }
            if let Some(fee) = report.check("GET /api/accounts/{pubkey}/fee-now", api.live_fee(&pubkey).await) {
                println!(
                    "   recommended {} lamports (p90 {}, queue {})",
                    fee.recommended_fee_lamports, fee.p90_fee_lamports, fee.queue_depth
                );
            }
            if let Some(estimate) = report.check(
                "POST /api/priority-fees/estimate",
                api.estimate_priority_fee(&[pubkey.clone()]).await,
            ) {
                println!(
                    "   recommended {} lamports ({} SOL)",
                    estimate.recommended_fee_lamports, estimate.recommended_fee_sol
                );
            }
        }
        None => println!("[*] No hot accounts and no --pubkey given; skipping per-account checks."),
    }

    let wait = Duration::from_secs(args.stream_timeout_secs);
    if let Some(message) = report.check(&format!("WS {ws_url}"), first_stream_frame(&ws_url, wait).await) {
        println!("   first frame: {message:?}");
    }

    println!("--- {} passed, {} failed ---", report.passed, report.failed);
    if report.failed > 0 {
        bail!("{} check(s) failed", report.failed);
    }
    Ok(())
}
