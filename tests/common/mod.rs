#![allow(dead_code)]

use async_trait::async_trait;
use chainwatch::adapters::{ChainEventFeed, PriceFeed, SentimentFeed};
use chainwatch::domain::{BlockRange, ChainEvent, SentimentMetrics, TxStatus};
use chainwatch::error::{Result, WatchError};
use rust_decimal::Decimal;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// URL of a local endpoint that accepts connections and never responds.
pub async fn silent_webhook() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}/hook", addr)
}

/// Prices served in order; `None` is a provider failure. The last entry repeats.
pub struct ScriptedPrices {
    script: Mutex<VecDeque<Option<Decimal>>>,
    calls: AtomicUsize,
    log: Option<(Arc<Mutex<Vec<String>>>, String)>,
}

impl ScriptedPrices {
    pub fn new(script: Vec<Option<Decimal>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            log: None,
        }
    }

    /// Append `name` to `log` on every call
    pub fn logging_to(mut self, log: Arc<Mutex<Vec<String>>>, name: &str) -> Self {
        self.log = Some((log, name.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceFeed for ScriptedPrices {
    async fn price(&self, token: &str) -> Result<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((log, name)) = &self.log {
            log.lock().unwrap().push(name.clone());
        }
        let next = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().flatten()
            } else {
                script.front().copied().flatten()
            }
        };
        next.ok_or_else(|| WatchError::provider(format!("no quote for {token}")))
    }
}

/// Takes `delay` per call and counts started and finished calls.
pub struct SlowPrices {
    pub delay: Duration,
    pub price: Decimal,
    pub started: AtomicUsize,
    pub finished: AtomicUsize,
}

impl SlowPrices {
    pub fn new(delay: Duration, price: Decimal) -> Self {
        Self {
            delay,
            price,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PriceFeed for SlowPrices {
    async fn price(&self, _token: &str) -> Result<Decimal> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(self.price)
    }
}

pub struct PanickingPrices;

#[async_trait]
impl PriceFeed for PanickingPrices {
    async fn price(&self, _token: &str) -> Result<Decimal> {
        panic!("decoder bug")
    }
}

/// Scores served in order; the last entry repeats.
pub struct ScriptedSentiment {
    script: Mutex<VecDeque<Decimal>>,
}

impl ScriptedSentiment {
    pub fn new(scores: Vec<Decimal>) -> Self {
        Self {
            script: Mutex::new(scores.into()),
        }
    }
}

#[async_trait]
impl SentimentFeed for ScriptedSentiment {
    async fn metrics(&self, _symbol: &str, _window: Duration) -> Result<SentimentMetrics> {
        let mut script = self.script.lock().unwrap();
        let score = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().copied()
        }
        .unwrap_or_default();
        Ok(SentimentMetrics {
            tweet_count: 12,
            total_likes: 300,
            total_retweets: 60,
            score,
        })
    }
}

/// In-memory chain: scripted heights, a fixed event log and receipts.
#[derive(Default)]
pub struct FakeChain {
    heights: Mutex<VecDeque<u64>>,
    events: Mutex<Vec<ChainEvent>>,
    failed_txs: Mutex<HashSet<String>>,
    missing_receipts: Mutex<HashSet<String>>,
    pub scanned: Mutex<Vec<BlockRange>>,
}

impl FakeChain {
    pub fn with_heights(heights: Vec<u64>) -> Self {
        Self {
            heights: Mutex::new(heights.into()),
            ..Default::default()
        }
    }

    pub fn add_event(&self, block: u64, tx_hash: &str, signature: &str) {
        let mut events = self.events.lock().unwrap();
        let log_index = events.len() as u64;
        events.push(ChainEvent {
            block_number: block,
            tx_hash: tx_hash.to_string(),
            log_index,
            signature: signature.to_string(),
        });
    }

    pub fn fail_tx(&self, tx_hash: &str) {
        self.failed_txs.lock().unwrap().insert(tx_hash.to_string());
    }

    pub fn drop_receipt(&self, tx_hash: &str) {
        self.missing_receipts
            .lock()
            .unwrap()
            .insert(tx_hash.to_string());
    }

    pub fn scanned(&self) -> Vec<BlockRange> {
        self.scanned.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainEventFeed for FakeChain {
    async fn block_height(&self) -> Result<u64> {
        let mut heights = self.heights.lock().unwrap();
        let height = if heights.len() > 1 {
            heights.pop_front()
        } else {
            heights.front().copied()
        };
        height.ok_or_else(|| WatchError::provider("node unavailable"))
    }

    async fn events(
        &self,
        _contract: &str,
        range: BlockRange,
        signatures: &[String],
    ) -> Result<Vec<ChainEvent>> {
        self.scanned.lock().unwrap().push(range);
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| range.contains(e.block_number) && signatures.contains(&e.signature))
            .cloned()
            .collect())
    }

    async fn receipt_status(&self, tx_hash: &str) -> Result<TxStatus> {
        if self.missing_receipts.lock().unwrap().contains(tx_hash) {
            return Err(WatchError::inconsistent(format!("no receipt for {tx_hash}")));
        }
        if self.failed_txs.lock().unwrap().contains(tx_hash) {
            Ok(TxStatus::Failed)
        } else {
            Ok(TxStatus::Success)
        }
    }
}
