//! Sentiment shift watcher
//!
//! Tracks the score reported by a `SentimentFeed` and alerts when it moves by
//! at least the configured threshold between two polls.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::SentimentFeed;
use crate::domain::numeric::display;
use crate::domain::{PollOutcome, PollReport, Severity, Signal};
use crate::error::{Result, WatchError};

fn default_window_hours() -> u32 {
    24
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentShiftConfig {
    pub symbol: String,
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
    pub threshold: Decimal,
}

impl SentimentShiftConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.window_hours) * 3600)
    }
}

pub struct SentimentShiftTask {
    config: SentimentShiftConfig,
    feed: Arc<dyn SentimentFeed>,
    last_score: Option<Decimal>,
}

impl SentimentShiftTask {
    pub fn new(config: SentimentShiftConfig, feed: Arc<dyn SentimentFeed>) -> Result<Self> {
        if config.symbol.trim().is_empty() {
            return Err(WatchError::configuration("sentiment: symbol is empty"));
        }
        if config.window_hours == 0 {
            return Err(WatchError::configuration("sentiment: window_hours must be > 0"));
        }
        if config.threshold <= Decimal::ZERO {
            return Err(WatchError::configuration(format!(
                "sentiment: threshold must be positive, got {}",
                config.threshold
            )));
        }
        Ok(Self {
            config,
            feed,
            last_score: None,
        })
    }

    pub fn config(&self) -> &SentimentShiftConfig {
        &self.config
    }

    pub fn last_score(&self) -> Option<Decimal> {
        self.last_score
    }

    pub fn label(&self) -> String {
        format!(
            "sentiment:{}:{}h",
            self.config.symbol, self.config.window_hours
        )
    }

    pub async fn poll(&mut self) -> PollReport {
        let metrics = match self
            .feed
            .metrics(&self.config.symbol, self.config.window())
            .await
        {
            Ok(m) => m,
            Err(e) => return e.into(),
        };
        let current = metrics.score;

        let Some(previous) = self.last_score.replace(current) else {
            // cold start: remember the score, nothing to compare against
            return PollReport::no_signal().with_notes(vec![format!(
                "Sentiment baseline {}: score {} over {} tweets",
                self.config.symbol,
                display(current, 4),
                metrics.tweet_count
            )]);
        };

        let Some(delta) = current.checked_sub(previous) else {
            return WatchError::inconsistent(format!(
                "sentiment delta for {} out of range: {} -> {}",
                self.config.symbol, previous, current
            ))
            .into();
        };
        if delta.abs() < self.config.threshold {
            return PollReport::no_signal();
        }

        let direction = if delta.is_sign_negative() {
            "negative"
        } else {
            "positive"
        };

        let signal = Signal::new(
            Severity::Warning,
            "Sentiment Shift",
            format!(
                "Significant {} sentiment shift for {}: {:+} (previous {}, current {}, {} tweets, {} engagement)",
                direction,
                self.config.symbol,
                display(delta, 4),
                display(previous, 4),
                display(current, 4),
                metrics.tweet_count,
                metrics.total_engagement()
            ),
        )
        .with_metadata(json!({
            "symbol": self.config.symbol,
            "direction": direction,
            "delta": delta.to_string(),
            "previous": previous.to_string(),
            "current": current.to_string(),
            "tweet_count": metrics.tweet_count,
        }));

        PollReport::new(PollOutcome::alert(signal))
    }
}
