//! Price threshold watcher
//!
//! Alerts while the token price sits strictly above (or below) a fixed
//! threshold, and notes moves larger than 1% between consecutive polls.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::adapters::PriceFeed;
use crate::domain::numeric::{display, pct_change};
use crate::domain::{Direction, PollOutcome, PollReport, Severity, Signal};
use crate::error::{Result, WatchError};

/// Moves above this percentage between polls are noted
const NOTE_CHANGE_PCT: Decimal = dec!(1.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceThresholdConfig {
    pub token: String,
    pub threshold: Decimal,
    #[serde(default)]
    pub direction: Direction,
}

pub struct PriceThresholdTask {
    config: PriceThresholdConfig,
    feed: Arc<dyn PriceFeed>,
    last_price: Option<Decimal>,
}

impl PriceThresholdTask {
    pub fn new(config: PriceThresholdConfig, feed: Arc<dyn PriceFeed>) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(WatchError::configuration("price threshold: token is empty"));
        }
        if config.threshold <= Decimal::ZERO {
            return Err(WatchError::configuration(format!(
                "price threshold: threshold must be positive, got {}",
                config.threshold
            )));
        }
        Ok(Self {
            config,
            feed,
            last_price: None,
        })
    }

    pub fn config(&self) -> &PriceThresholdConfig {
        &self.config
    }

    pub fn last_price(&self) -> Option<Decimal> {
        self.last_price
    }

    pub fn label(&self) -> String {
        format!(
            "price:{}:{}:{}",
            self.config.token, self.config.direction, self.config.threshold
        )
    }

    pub async fn poll(&mut self) -> PollReport {
        let current = match self.feed.price(&self.config.token).await {
            Ok(price) if price > Decimal::ZERO => price,
            Ok(price) => {
                return WatchError::inconsistent(format!(
                    "non-positive price {} for {}",
                    price, self.config.token
                ))
                .into()
            }
            // last price is kept for the next attempt
            Err(e) => return e.into(),
        };

        let mut notes = Vec::new();
        if let Some(previous) = self.last_price {
            if let Some(change) = pct_change(previous, current) {
                if change > NOTE_CHANGE_PCT {
                    notes.push(format!(
                        "Price change {}: {} -> {} ({}%)",
                        self.config.token,
                        display(previous, 2),
                        display(current, 2),
                        display(change, 2)
                    ));
                }
            }
        }

        self.last_price = Some(current);

        let outcome = if self.config.direction.crossed(current, self.config.threshold) {
            PollOutcome::alert(
                Signal::new(
                    Severity::Warning,
                    "Price Alert",
                    format!(
                        "{} is {} threshold {} (current: {})",
                        self.config.token, self.config.direction, self.config.threshold, current
                    ),
                )
                .with_metadata(json!({
                    "token": self.config.token,
                    "direction": self.config.direction,
                    "threshold": self.config.threshold.to_string(),
                    "price": current.to_string(),
                })),
            )
        } else {
            PollOutcome::NoSignal
        };

        PollReport::new(outcome).with_notes(notes)
    }
}
