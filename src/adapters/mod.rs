pub mod dex_router;
pub mod evm_logs;
pub mod traits;
pub mod twitter;
pub mod webhook;

pub use dex_router::{parse_address, DexRouterFeed, QuoteAssets};
pub use evm_logs::{event_topic, EvmEventFeed};
pub use traits::{ChainEventFeed, PriceFeed, SentimentFeed};
pub use twitter::{EngagementScorer, SentimentScorer, Tweet, TwitterSentimentFeed};
pub use webhook::WebhookNotifier;

#[cfg(test)]
pub use traits::{MockChainEventFeed, MockPriceFeed, MockSentimentFeed};
