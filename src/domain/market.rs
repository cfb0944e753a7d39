use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;
use std::ops::RangeInclusive;

/// Which side of the threshold triggers a price alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Above,
    Below,
}

impl Direction {
    /// Strict comparison: a price equal to the threshold never crosses it.
    pub fn crossed(&self, current: Decimal, threshold: Decimal) -> bool {
        match self {
            Direction::Above => current > threshold,
            Direction::Below => current < threshold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Above => "above",
            Direction::Below => "below",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive block range `[from, to]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    pub fn len(&self) -> u64 {
        if self.to < self.from {
            0
        } else {
            self.to - self.from + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, block: u64) -> bool {
        self.as_range().contains(&block)
    }

    pub fn as_range(&self) -> RangeInclusive<u64> {
        self.from..=self.to
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

/// A contract log matched by one of the watched signatures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub block_number: u64,
    pub tx_hash: String,
    pub log_index: u64,
    /// Human-readable signature, e.g. `Transfer(address,address,uint256)`
    pub signature: String,
}

/// Outcome of the transaction that emitted an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Success => "success",
            TxStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate engagement over a window, plus the derived score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SentimentMetrics {
    pub tweet_count: u64,
    pub total_likes: u64,
    pub total_retweets: u64,
    pub score: Decimal,
}

impl SentimentMetrics {
    pub fn total_engagement(&self) -> u64 {
        self.total_likes + self.total_retweets
    }
}
