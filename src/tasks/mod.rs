//! Polled task variants
//!
//! Each variant owns its configuration and the state carried between polls.
//! Only the agent worker polls a task, one poll at a time.

pub mod arbitrage;
pub mod contract_events;
pub mod price_threshold;
pub mod seen_set;
pub mod sentiment;

pub use arbitrage::{ArbitrageSpreadConfig, ArbitrageSpreadTask, SpreadLegs};
pub use contract_events::{is_event_signature, ContractEventScanConfig, ContractEventScanTask};
pub use price_threshold::{PriceThresholdConfig, PriceThresholdTask};
pub use seen_set::{SeenSet, DEFAULT_SEEN_CAPACITY};
pub use sentiment::{SentimentShiftConfig, SentimentShiftTask};

use serde::{Deserialize, Serialize};

use crate::domain::PollReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    PriceThreshold,
    ArbitrageSpread,
    SentimentShift,
    ContractEventScan,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::PriceThreshold => "price_threshold",
            TaskKind::ArbitrageSpread => "arbitrage_spread",
            TaskKind::SentimentShift => "sentiment_shift",
            TaskKind::ContractEventScan => "contract_event_scan",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub enum Task {
    PriceThreshold(PriceThresholdTask),
    ArbitrageSpread(ArbitrageSpreadTask),
    SentimentShift(SentimentShiftTask),
    ContractEventScan(ContractEventScanTask),
}

impl Task {
    pub async fn poll(&mut self) -> PollReport {
        match self {
            Task::PriceThreshold(t) => t.poll().await,
            Task::ArbitrageSpread(t) => t.poll().await,
            Task::SentimentShift(t) => t.poll().await,
            Task::ContractEventScan(t) => t.poll().await,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Task::PriceThreshold(_) => TaskKind::PriceThreshold,
            Task::ArbitrageSpread(_) => TaskKind::ArbitrageSpread,
            Task::SentimentShift(_) => TaskKind::SentimentShift,
            Task::ContractEventScan(_) => TaskKind::ContractEventScan,
        }
    }

    /// Short human-readable identity used in logs and alerts
    pub fn label(&self) -> String {
        match self {
            Task::PriceThreshold(t) => t.label(),
            Task::ArbitrageSpread(t) => t.label(),
            Task::SentimentShift(t) => t.label(),
            Task::ContractEventScan(t) => t.label(),
        }
    }

    pub fn as_price_threshold(&self) -> Option<&PriceThresholdTask> {
        match self {
            Task::PriceThreshold(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_sentiment_shift(&self) -> Option<&SentimentShiftTask> {
        match self {
            Task::SentimentShift(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_contract_event_scan(&self) -> Option<&ContractEventScanTask> {
        match self {
            Task::ContractEventScan(t) => Some(t),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("kind", &self.kind())
            .field("label", &self.label())
            .finish()
    }
}

impl From<PriceThresholdTask> for Task {
    fn from(task: PriceThresholdTask) -> Self {
        Task::PriceThreshold(task)
    }
}

impl From<ArbitrageSpreadTask> for Task {
    fn from(task: ArbitrageSpreadTask) -> Self {
        Task::ArbitrageSpread(task)
    }
}

impl From<SentimentShiftTask> for Task {
    fn from(task: SentimentShiftTask) -> Self {
        Task::SentimentShift(task)
    }
}

impl From<ContractEventScanTask> for Task {
    fn from(task: ContractEventScanTask) -> Self {
        Task::ContractEventScan(task)
    }
}
