use chrono::Local;
use lib_lockfeed::{ConnectionState, FeedState, HotAccountRecord};

/// Shortens a base58 key to `ABCD...WXYZ`.
fn short_key(pubkey: &str) -> String {
    let chars: Vec<char> = pubkey.chars().collect();
    if chars.len() <= 12 {
        return pubkey.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

fn success_cell(record: &HotAccountRecord) -> String {
    record
        .effective_success_rate()
        .map(|rate| format!("{rate:.1}%"))
        .unwrap_or_else(|| "-".to_string())
}

/// One console frame: status line, errors, totals and the top accounts.
pub fn render_summary(state: &FeedState, top: usize) -> String {
    let mut lines = Vec::new();

    let source = match &state.view {
        Some(view) => format!(
            "{} @ {}",
            view.origin,
            view.snapshot.received_at().with_timezone(&Local).format("%H:%M:%S")
        ),
        None => "no data".to_string(),
    };
    let retry = if state.connection == ConnectionState::Reconnecting { " (retrying)" } else { "" };
    lines.push(format!(
        "[{}]{} {} | {} accounts | {} frames",
        state.status(),
        retry,
        source,
        state.hot_accounts().len(),
        state.diagnostics.frames
    ));

    if let Some(error) = &state.last_error {
        lines.push(format!("  stream error: {error}"));
    }
    if let Some(error) = &state.hot_accounts_error {
        lines.push(format!("  hot-accounts poll failed: {error}"));
    }
    if let Some(error) = &state.stats_error {
        lines.push(format!("  stats poll failed: {error}"));
    }

    if let Some(stats) = &state.stats {
        lines.push(format!(
            "  accounts {} | events {} | high contention {} | avg success {:.1}%",
            stats.unique_accounts, stats.total_events, stats.high_contention_accounts, stats.avg_success_rate
        ));
    }

    let records = state.hot_accounts();
    if records.is_empty() {
        lines.push("  waiting for hot accounts...".to_string());
        return lines.join("\n");
    }

    lines.push(format!(
        "  {:>3}  {:<15} {:>10} {:>9} {:>8} {:>12}",
        "#", "account", "contention", "attempts", "success", "avg fee"
    ));
    for (rank, record) in records.iter().take(top).enumerate() {
        lines.push(format!(
            "  {:>3}  {:<15} {:>10.2} {:>9} {:>8} {:>12}",
            rank + 1,
            short_key(&record.pubkey),
            record.avg_contention,
            record.lock_attempts,
            success_cell(record),
            record.avg_priority_fee
        ));
    }

    lines.join("\n")
}
