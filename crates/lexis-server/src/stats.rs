//! Process-wide counters reported by `SERVER_STATS_REQUEST`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct ServerStats {
    connections_accepted: AtomicU64,
    connections_rejected: AtomicU64,
    connections_closed: AtomicU64,
    requests: AtomicU64,
    request_errors: AtomicU64,
    oversized_frames: AtomicU64,
    pushes_delivered: AtomicU64,
    pushes_dropped: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub connections_accepted: u64,
    pub connections_rejected: u64,
    pub connections_closed: u64,
    pub requests: u64,
    pub request_errors: u64,
    pub oversized_frames: u64,
    pub pushes_delivered: u64,
    pub pushes_dropped: u64,
}

fn bump(counter: &AtomicU64) {
    let _ = counter.fetch_add(1, Ordering::Relaxed);
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_accepted(&self) {
        bump(&self.connections_accepted);
    }

    pub fn connection_rejected(&self) {
        bump(&self.connections_rejected);
    }

    pub fn connection_closed(&self) {
        bump(&self.connections_closed);
    }

    pub fn request(&self, ok: bool) {
        bump(&self.requests);
        if !ok {
            bump(&self.request_errors);
        }
    }

    pub fn oversized_frame(&self) {
        bump(&self.oversized_frames);
    }

    pub fn push(&self, delivered: bool) {
        if delivered {
            bump(&self.pushes_delivered);
        } else {
            bump(&self.pushes_dropped);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            request_errors: self.request_errors.load(Ordering::Relaxed),
            oversized_frames: self.oversized_frames.load(Ordering::Relaxed),
            pushes_delivered: self.pushes_delivered.load(Ordering::Relaxed),
            pushes_dropped: self.pushes_dropped.load(Ordering::Relaxed),
        }
    }
}
