//! # Reconciliation Layer
//!
//! Merges push-sourced and poll-sourced snapshots into one current view.
//!
//! Arrival order across the two channels is not controlled, so acceptance is
//! decided by `arbitrate`, a pure function of the current view, the
//! candidate's origin and retrieval time, the arrival instant and the poll
//! interval:
//!
//! - push snapshots are always accepted;
//! - poll snapshots are accepted when there is no view yet, when the view is
//!   itself poll-sourced (and not newer than the candidate), or when the
//!   push-sourced view is older than one poll interval at arrival.
//!
//! Only the latest accepted snapshot is retained.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::model::RankedSnapshot;

/// Which channel produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotOrigin {
    Push,
    Poll,
}

impl fmt::Display for SnapshotOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::Poll => write!(f, "poll"),
        }
    }
}

/// The authoritative current snapshot and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledView {
    pub snapshot: RankedSnapshot,
    pub origin: SnapshotOrigin,
}

/// Decides whether a candidate snapshot arriving at `now` replaces the
/// current view.
pub fn arbitrate(
    current: Option<&ReconciledView>,
    candidate_origin: SnapshotOrigin,
    candidate: &RankedSnapshot,
    now: Instant,
    poll_interval: Duration,
) -> bool {
    let Some(current) = current else {
        return true;
    };

    match (candidate_origin, current.origin) {
        (SnapshotOrigin::Push, _) => true,
        (SnapshotOrigin::Poll, SnapshotOrigin::Poll) => {
            candidate.retrieved_at() >= current.snapshot.retrieved_at()
        }
        // Age of the push view is measured when the poll result lands, not
        // when its request went out.
        (SnapshotOrigin::Poll, SnapshotOrigin::Push) => {
            now.saturating_duration_since(current.snapshot.retrieved_at()) > poll_interval
        }
    }
}

/// Owner of the single current-view cell.
#[derive(Debug)]
pub struct Reconciler {
    view: Option<ReconciledView>,
    poll_interval: Duration,
}

impl Reconciler {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            view: None,
            poll_interval,
        }
    }

    pub fn view(&self) -> Option<&ReconciledView> {
        self.view.as_ref()
    }

    /// Applies the update rule for a snapshot arriving at `now`. Returns
    /// `true` when the view was replaced.
    pub fn offer(&mut self, origin: SnapshotOrigin, snapshot: RankedSnapshot, now: Instant) -> bool {
        if !arbitrate(self.view.as_ref(), origin, &snapshot, now, self.poll_interval) {
            debug!(%origin, records = snapshot.len(), "snapshot superseded by fresher view");
            return false;
        }
        debug!(%origin, records = snapshot.len(), "snapshot accepted");
        self.view = Some(ReconciledView { snapshot, origin });
        true
    }
}
