//! Twitter/X recent-search client and pluggable sentiment scoring

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::traits::SentimentFeed;
use crate::domain::SentimentMetrics;
use crate::error::{Result, WatchError};

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com/2";

/// Recent-search hard limit per request
const MAX_RESULTS_LIMIT: u32 = 100;
const MIN_RESULTS_LIMIT: u32 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub quote_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub public_metrics: PublicMetrics,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Tweet>,
}

/// Turns a batch of tweets into a single score.
pub trait SentimentScorer: Send + Sync {
    fn score(&self, tweets: &[Tweet]) -> Decimal;
}

/// Engagement heuristic: average likes+retweets per tweet, divided by 100.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementScorer;

impl SentimentScorer for EngagementScorer {
    fn score(&self, tweets: &[Tweet]) -> Decimal {
        if tweets.is_empty() {
            return Decimal::ZERO;
        }
        let engagement: u64 = tweets
            .iter()
            .map(|t| t.public_metrics.like_count + t.public_metrics.retweet_count)
            .sum();
        Decimal::from(engagement) / Decimal::from(tweets.len() as u64) / dec!(100)
    }
}

/// Search query for a cashtag/hashtag symbol
pub fn search_query(symbol: &str) -> String {
    format!("#{symbol} OR ${symbol} lang:en -is:retweet")
}

/// `SentimentFeed` backed by the v2 recent-search endpoint
pub struct TwitterSentimentFeed {
    client: Client,
    base_url: String,
    bearer_token: String,
    max_results: u32,
    scorer: Arc<dyn SentimentScorer>,
}

impl TwitterSentimentFeed {
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Result<Self> {
        let bearer_token = bearer_token.into();
        if bearer_token.trim().is_empty() {
            return Err(WatchError::configuration("twitter bearer token is empty"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token,
            max_results: MAX_RESULTS_LIMIT,
            scorer: Arc::new(EngagementScorer),
        })
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.clamp(MIN_RESULTS_LIMIT, MAX_RESULTS_LIMIT);
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn SentimentScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    async fn search_recent(&self, query: &str, window: Duration) -> Result<Vec<Tweet>> {
        let window = chrono::Duration::from_std(window)
            .map_err(|e| WatchError::configuration(format!("invalid window: {}", e)))?;
        let start_time = (Utc::now() - window).to_rfc3339_opts(SecondsFormat::Secs, true);
        let url = format!("{}/tweets/search/recent", self.base_url);
        let max_results = self.max_results.to_string();

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("query", query),
                ("max_results", max_results.as_str()),
                ("tweet.fields", "created_at,public_metrics,lang"),
                ("start_time", start_time.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WatchError::provider(format!(
                "twitter search HTTP {}: {}",
                status, body
            )));
        }

        let parsed: SearchResponse = resp.json().await?;
        Ok(parsed.data)
    }
}

#[async_trait]
impl SentimentFeed for TwitterSentimentFeed {
    async fn metrics(&self, symbol: &str, window: Duration) -> Result<SentimentMetrics> {
        let tweets = self.search_recent(&search_query(symbol), window).await?;
        let metrics = summarize(&tweets, self.scorer.as_ref());
        debug!(
            %symbol,
            tweets = metrics.tweet_count,
            score = %metrics.score,
            "Sentiment metrics"
        );
        Ok(metrics)
    }
}

/// Aggregate counts and score a batch of tweets.
pub fn summarize(tweets: &[Tweet], scorer: &dyn SentimentScorer) -> SentimentMetrics {
    SentimentMetrics {
        tweet_count: tweets.len() as u64,
        total_likes: tweets.iter().map(|t| t.public_metrics.like_count).sum(),
        total_retweets: tweets.iter().map(|t| t.public_metrics.retweet_count).sum(),
        score: scorer.score(tweets),
    }
}
