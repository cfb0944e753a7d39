//! Provider capabilities consumed by tasks
//!
//! Tasks only see these traits. Concrete providers live next to this module;
//! tests substitute mocks or in-memory fakes.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;

use crate::domain::{BlockRange, ChainEvent, SentimentMetrics, TxStatus};
use crate::error::Result;

/// Current USD price for a token identifier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn price(&self, token: &str) -> Result<Decimal>;
}

/// Chain height, contract logs and transaction receipts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainEventFeed: Send + Sync {
    async fn block_height(&self) -> Result<u64>;

    /// Logs emitted by `contract` in the inclusive `range` whose first topic
    /// matches one of `signatures`.
    async fn events(
        &self,
        contract: &str,
        range: BlockRange,
        signatures: &[String],
    ) -> Result<Vec<ChainEvent>>;

    async fn receipt_status(&self, tx_hash: &str) -> Result<TxStatus>;
}

/// Aggregated engagement for a symbol over a trailing window.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SentimentFeed: Send + Sync {
    async fn metrics(&self, symbol: &str, window: Duration) -> Result<SentimentMetrics>;
}
