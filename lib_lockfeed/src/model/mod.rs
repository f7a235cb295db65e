//! # Data Model
//!
//! Records delivered by both channels of the feed, plus the response bodies
//! of the per-account detail endpoints.
//!
//! The poll endpoint and the push stream describe the same hot account with
//! different field names and different levels of detail. `HotAccountRecord`
//! accepts both shapes; fields that only the poll endpoint provides are
//! `Option`s.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Wire types exchanged over the push channel.
pub mod protocol;

/// # Hot Account Record
///
/// Lock contention figures for one account within the requested window.
/// Immutable once received; a newer snapshot replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotAccountRecord {
    /// Account key (base58, treated as opaque).
    #[serde(alias = "account_pubkey")]
    pub pubkey: String,
    /// Number of write-lock attempts observed.
    pub lock_attempts: u64,
    /// Number of attempts that acquired the lock. Poll only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_locks: Option<u64>,
    /// Percentage of successful attempts (0-100). Poll only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
    /// Average contention score. Named `contention_score` on the push stream.
    #[serde(alias = "contention_score")]
    pub avg_contention: f64,
    /// Peak contention score. Poll only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_contention: Option<f64>,
    /// Average priority fee in lamports.
    pub avg_priority_fee: u64,
    /// Highest priority fee in lamports. Poll only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee: Option<u64>,
}

impl HotAccountRecord {
    /// Success rate as reported, or derived from the lock counters when the
    /// server omitted it. `None` when neither is available.
    pub fn effective_success_rate(&self) -> Option<f64> {
        if let Some(rate) = self.success_rate {
            return Some(rate);
        }
        let successful = self.successful_locks?;
        if self.lock_attempts == 0 {
            return Some(0.0);
        }
        Some((successful as f64 / self.lock_attempts as f64) * 100.0)
    }
}

/// # Ranked Snapshot
///
/// An atomically produced, ordered set of hot accounts together with the
/// moment it was retrieved.
///
/// `retrieved_at` is a monotonic instant and is what the reconciliation
/// rule compares. `received_at` is the wall-clock time for display.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSnapshot {
    records: Arc<[HotAccountRecord]>,
    retrieved_at: Instant,
    received_at: DateTime<Utc>,
}

impl RankedSnapshot {
    /// Builds a snapshot, ranking records by contention (descending) with
    /// lock attempts as the tie breaker. When a key appears more than once
    /// the last occurrence wins.
    pub fn new(records: Vec<HotAccountRecord>, retrieved_at: Instant) -> Self {
        let mut seen = HashSet::with_capacity(records.len());
        let mut unique: Vec<HotAccountRecord> = records
            .into_iter()
            .rev()
            .filter(|record| seen.insert(record.pubkey.clone()))
            .collect();
        unique.reverse();

        unique.sort_by(|a, b| {
            b.avg_contention
                .total_cmp(&a.avg_contention)
                .then_with(|| b.lock_attempts.cmp(&a.lock_attempts))
        });

        Self {
            records: unique.into(),
            retrieved_at,
            received_at: Utc::now(),
        }
    }

    /// Ranked records, hottest first.
    pub fn records(&self) -> &[HotAccountRecord] {
        &self.records
    }

    /// Monotonic retrieval time used for arbitration.
    pub fn retrieved_at(&self) -> Instant {
        self.retrieved_at
    }

    /// Wall-clock time the snapshot was built.
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Looks up a record by account key.
    pub fn get(&self, pubkey: &str) -> Option<&HotAccountRecord> {
        self.records.iter().find(|record| record.pubkey == pubkey)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Aggregate totals shown above the hot-account table (`GET /api/stats`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub unique_accounts: u64,
    pub total_events: u64,
    pub high_contention_accounts: u64,
    pub avg_success_rate: f64,
}

/// Per-account totals (`GET /api/accounts/{pubkey}/stats`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStats {
    pub pubkey: String,
    pub total_lock_attempts: u64,
    pub successful_locks: u64,
    pub failed_locks: u64,
    pub success_rate: f64,
    pub avg_contention: f64,
    pub avg_priority_fee: u64,
    pub max_priority_fee: u64,
}

/// Short-horizon fee recommendation (`GET /api/accounts/{pubkey}/fee-now`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveFeeEstimate {
    pub account: String,
    pub queue_depth: u64,
    pub p90_fee_lamports: u64,
    pub recommended_fee_lamports: u64,
    pub recommended_fee_sol: f64,
    pub avg_contention: f64,
    pub slots_observed: u64,
    #[serde(default)]
    pub freshness_seconds: f64,
}

/// Body of `POST /api/priority-fees/estimate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityFeeRequest {
    pub accounts: Vec<String>,
}

/// Response of `POST /api/priority-fees/estimate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityFeeEstimate {
    pub recommended_fee_lamports: u64,
    pub recommended_fee_sol: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pubkey: &str, contention: f64, attempts: u64) -> HotAccountRecord {
        HotAccountRecord {
            pubkey: pubkey.to_string(),
            lock_attempts: attempts,
            successful_locks: None,
            success_rate: None,
            avg_contention: contention,
            max_contention: None,
            avg_priority_fee: 0,
            max_priority_fee: None,
        }
    }

    #[test]
    fn test_poll_shape_deserializes() {
        let json = r#"{
            "account_pubkey": "Vote111111111111111111111111111111111111111",
            "lock_attempts": 120,
            "successful_locks": 90,
            "success_rate": 75.0,
            "avg_contention": 8.5,
            "max_contention": 14.0,
            "avg_priority_fee": 2500,
            "max_priority_fee": 90000
        }"#;
        let rec: HotAccountRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.pubkey, "Vote111111111111111111111111111111111111111");
        assert_eq!(rec.successful_locks, Some(90));
        assert_eq!(rec.max_contention, Some(14.0));
        assert_eq!(rec.max_priority_fee, Some(90000));
    }

    #[test]
    fn test_push_shape_deserializes() {
        let json = r#"{"pubkey":"A","contention_score":12.5,"lock_attempts":40,"avg_priority_fee":5000}"#;
        let rec: HotAccountRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec, HotAccountRecord { avg_priority_fee: 5000, ..record("A", 12.5, 40) });
        assert_eq!(rec.effective_success_rate(), None);
    }

    #[test]
    fn test_effective_success_rate_derives_from_counters() {
        let mut rec = record("A", 1.0, 40);
        rec.successful_locks = Some(10);
        assert_eq!(rec.effective_success_rate(), Some(25.0));

        rec.lock_attempts = 0;
        assert_eq!(rec.effective_success_rate(), Some(0.0));

        rec.success_rate = Some(99.0);
        assert_eq!(rec.effective_success_rate(), Some(99.0));
    }

    #[test]
    fn test_snapshot_ranks_by_contention_then_attempts() {
        let snapshot = RankedSnapshot::new(
            vec![record("low", 1.0, 500), record("tie-a", 7.0, 10), record("high", 9.0, 1), record("tie-b", 7.0, 30)],
            Instant::now(),
        );
        let order: Vec<&str> = snapshot.records().iter().map(|r| r.pubkey.as_str()).collect();
        assert_eq!(order, vec!["high", "tie-b", "tie-a", "low"]);
    }

    #[test]
    fn test_snapshot_keeps_last_duplicate() {
        let snapshot = RankedSnapshot::new(vec![record("A", 1.0, 1), record("B", 2.0, 1), record("A", 5.0, 9)], Instant::now());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("A").map(|r| r.lock_attempts), Some(9));
        assert_eq!(snapshot.records()[0].pubkey, "A");
    }
}
