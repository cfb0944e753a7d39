//! Cross-venue spread detection
//!
//! Quotes the same token on two routes and alerts when the midpoint-relative
//! spread reaches the configured minimum. Stateless between polls.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::adapters::PriceFeed;
use crate::domain::numeric::{display, spread_pct};
use crate::domain::{PollOutcome, PollReport, Severity, Signal};
use crate::error::{Result, WatchError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageSpreadConfig {
    pub token: String,
    /// Minimum spread in percent, e.g. 0.5 = 0.5%
    pub min_profit_pct: Decimal,
    pub route_a: String,
    pub route_b: String,
}

/// Buy/sell legs of a detected spread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadLegs<'a> {
    pub buy: &'a str,
    pub sell: &'a str,
}

pub struct ArbitrageSpreadTask {
    config: ArbitrageSpreadConfig,
    route_a: Arc<dyn PriceFeed>,
    route_b: Arc<dyn PriceFeed>,
}

impl ArbitrageSpreadTask {
    pub fn new(
        config: ArbitrageSpreadConfig,
        route_a: Arc<dyn PriceFeed>,
        route_b: Arc<dyn PriceFeed>,
    ) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(WatchError::configuration("arbitrage: token is empty"));
        }
        if config.min_profit_pct < Decimal::ZERO {
            return Err(WatchError::configuration(format!(
                "arbitrage: min_profit_pct must not be negative, got {}",
                config.min_profit_pct
            )));
        }
        if config.route_a.trim().is_empty() || config.route_b.trim().is_empty() {
            return Err(WatchError::configuration("arbitrage: route names are required"));
        }
        if config.route_a == config.route_b {
            return Err(WatchError::configuration(format!(
                "arbitrage: both routes are {}",
                config.route_a
            )));
        }
        Ok(Self {
            config,
            route_a,
            route_b,
        })
    }

    pub fn config(&self) -> &ArbitrageSpreadConfig {
        &self.config
    }

    pub fn label(&self) -> String {
        format!(
            "arbitrage:{}:{}/{}",
            self.config.token, self.config.route_a, self.config.route_b
        )
    }

    /// Cheaper route buys, dearer route sells. `None` when the prices match.
    pub fn legs(&self, price_a: Decimal, price_b: Decimal) -> Option<SpreadLegs<'_>> {
        let (a, b) = (self.config.route_a.as_str(), self.config.route_b.as_str());
        if price_a < price_b {
            Some(SpreadLegs { buy: a, sell: b })
        } else if price_b < price_a {
            Some(SpreadLegs { buy: b, sell: a })
        } else {
            None
        }
    }

    pub async fn poll(&mut self) -> PollReport {
        let token = self.config.token.as_str();
        let (quote_a, quote_b) =
            tokio::join!(self.route_a.price(token), self.route_b.price(token));

        // Never report a spread from a single quote
        let price_a = match quote_a {
            Ok(p) => p,
            Err(e) => return route_failure(&self.config.route_a, e),
        };
        let price_b = match quote_b {
            Ok(p) => p,
            Err(e) => return route_failure(&self.config.route_b, e),
        };
        if price_a <= Decimal::ZERO || price_b <= Decimal::ZERO {
            return WatchError::inconsistent(format!(
                "one-sided quote for {}: {}={} {}={}",
                token, self.config.route_a, price_a, self.config.route_b, price_b
            ))
            .into();
        }

        let Some(diff_pct) = spread_pct(price_a, price_b) else {
            return WatchError::inconsistent(format!(
                "spread for {} out of range: {}={} {}={}",
                token, self.config.route_a, price_a, self.config.route_b, price_b
            ))
            .into();
        };

        let rounded_pct = display(diff_pct, 4);
        debug!(
            %token,
            route_a = %self.config.route_a,
            %price_a,
            route_b = %self.config.route_b,
            %price_b,
            diff_pct = %rounded_pct,
            "Spread comparison"
        );

        if diff_pct.is_zero() || diff_pct < self.config.min_profit_pct {
            return PollReport::no_signal();
        }
        let Some(legs) = self.legs(price_a, price_b) else {
            return PollReport::no_signal();
        };

        let signal = Signal::new(
            Severity::Warning,
            "Arbitrage Opportunity",
            format!(
                "{}: buy on {}, sell on {} ({}: {}, {}: {}, spread {}%)",
                token,
                legs.buy,
                legs.sell,
                self.config.route_a,
                display(price_a, 6),
                self.config.route_b,
                display(price_b, 6),
                rounded_pct
            ),
        )
        .with_metadata(json!({
            "token": token,
            "buy": legs.buy,
            "sell": legs.sell,
            "price_a": price_a.to_string(),
            "price_b": price_b.to_string(),
            "diff_pct": diff_pct.to_string(),
        }));

        PollReport::new(PollOutcome::alert(signal))
    }
}

fn route_failure(route: &str, err: WatchError) -> PollReport {
    PollReport::new(PollOutcome::Error {
        kind: err.kind(),
        detail: format!("route {}: {}", route, err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockPriceFeed;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn fixed(price: Result<Decimal>) -> Arc<dyn PriceFeed> {
        let mut feed = MockPriceFeed::new();
        let mut price = Some(price);
        feed.expect_price()
            .times(1)
            .returning(move |_| price.take().expect("polled twice"));
        Arc::new(feed)
    }

    fn task(min_profit_pct: Decimal, a: Result<Decimal>, b: Result<Decimal>) -> ArbitrageSpreadTask {
        ArbitrageSpreadTask::new(
            ArbitrageSpreadConfig {
                token: "LINK".into(),
                min_profit_pct,
                route_a: "uniswap".into(),
                route_b: "sushiswap".into(),
            },
            fixed(a),
            fixed(b),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_spread_above_minimum_names_cheaper_route_as_buy() {
        let mut task = task(dec!(0.5), Ok(dec!(100)), Ok(dec!(100.6)));
        let report = task.poll().await;

        let signal = &report.outcome.signals()[0];
        let metadata = signal.metadata.as_ref().unwrap();
        assert_eq!(metadata["buy"], "uniswap");
        assert_eq!(metadata["sell"], "sushiswap");
        assert!(signal.message.contains("buy on uniswap"));
    }

    #[tokio::test]
    async fn test_buy_side_follows_cheaper_price() {
        let mut task = task(dec!(0.5), Ok(dec!(101)), Ok(dec!(100)));
        let report = task.poll().await;
        let metadata = report.outcome.signals()[0].metadata.clone().unwrap();
        assert_eq!(metadata["buy"], "sushiswap");
    }

    #[tokio::test]
    async fn test_equal_prices_never_alert_even_at_zero_minimum() {
        let mut task = task(Decimal::ZERO, Ok(dec!(100)), Ok(dec!(100)));
        assert_eq!(task.poll().await.outcome, PollOutcome::NoSignal);
    }

    #[tokio::test]
    async fn test_spread_below_minimum() {
        let mut task = task(dec!(1), Ok(dec!(100)), Ok(dec!(100.6)));
        assert_eq!(task.poll().await.outcome, PollOutcome::NoSignal);
    }

    #[tokio::test]
    async fn test_one_failed_route_never_alerts() {
        let mut task = task(
            dec!(0.5),
            Ok(dec!(100)),
            Err(WatchError::provider("execution reverted")),
        );
        let report = task.poll().await;
        assert_eq!(report.outcome.error_kind(), Some(ErrorKind::ProviderFailure));
        match report.outcome {
            PollOutcome::Error { detail, .. } => assert!(detail.contains("sushiswap")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_quote_is_inconsistent() {
        let mut task = task(dec!(0.5), Ok(dec!(100)), Ok(Decimal::ZERO));
        assert_eq!(
            task.poll().await.outcome.error_kind(),
            Some(ErrorKind::DataInconsistency)
        );
    }

    #[test]
    fn test_rejects_same_route_twice() {
        let result = ArbitrageSpreadTask::new(
            ArbitrageSpreadConfig {
                token: "LINK".into(),
                min_profit_pct: dec!(0.5),
                route_a: "uniswap".into(),
                route_b: "uniswap".into(),
            },
            Arc::new(MockPriceFeed::new()),
            Arc::new(MockPriceFeed::new()),
        );
        assert!(matches!(result, Err(WatchError::Configuration(_))));
    }
}
