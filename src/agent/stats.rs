//! Per-task counters shared between the worker and diagnostics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::PollOutcome;
use crate::tasks::TaskKind;

#[derive(Debug, Default)]
pub struct TaskStats {
    polls: AtomicU64,
    alerts: AtomicU64,
    errors: AtomicU64,
    consecutive_errors: AtomicU64,
    /// Unix millis, 0 = never polled
    last_poll_ms: AtomicI64,
}

impl TaskStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the consecutive error count after recording.
    pub fn record(&self, outcome: &PollOutcome) -> u64 {
        self.polls.fetch_add(1, Ordering::Relaxed);
        self.last_poll_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        match outcome {
            PollOutcome::NoSignal => {
                self.consecutive_errors.store(0, Ordering::Relaxed);
                0
            }
            PollOutcome::Alert(signals) => {
                self.alerts
                    .fetch_add(signals.len() as u64, Ordering::Relaxed);
                self.consecutive_errors.store(0, Ordering::Relaxed);
                0
            }
            PollOutcome::Error { .. } => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1
            }
        }
    }

    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    pub fn alerts(&self) -> u64 {
        self.alerts.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn consecutive_errors(&self) -> u64 {
        self.consecutive_errors.load(Ordering::Relaxed)
    }

    pub fn last_poll_at(&self) -> Option<DateTime<Utc>> {
        match self.last_poll_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    pub fn snapshot(&self) -> TaskStatsSnapshot {
        TaskStatsSnapshot {
            polls: self.polls(),
            alerts: self.alerts(),
            errors: self.errors(),
            consecutive_errors: self.consecutive_errors(),
            last_poll_at: self.last_poll_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatsSnapshot {
    pub polls: u64,
    pub alerts: u64,
    pub errors: u64,
    pub consecutive_errors: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
}

/// Identity of an assigned task; stays readable while the worker runs
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub id: Uuid,
    pub kind: TaskKind,
    pub label: String,
    pub stats: Arc<TaskStats>,
}

impl TaskInfo {
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            kind: self.kind,
            label: self.label.clone(),
            stats: self.stats.snapshot(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub kind: TaskKind,
    pub label: String,
    pub stats: TaskStatsSnapshot,
}
