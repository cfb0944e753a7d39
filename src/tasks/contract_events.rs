//! Contract event scanner
//!
//! Follows the chain head with a block watermark, reports each new
//! transaction that emitted a watched event, and never replays history.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use super::seen_set::{SeenSet, DEFAULT_SEEN_CAPACITY};
use crate::adapters::ChainEventFeed;
use crate::domain::{BlockRange, PollReport, PollOutcome, Severity, Signal};
use crate::error::{Result, WatchError};

pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";
pub const APPROVAL_EVENT: &str = "Approval(address,address,uint256)";
pub const SWAP_EVENT: &str = "Swap(address,uint256,uint256,uint256,uint256,address)";

fn default_max_lookback() -> u64 {
    100
}

fn default_seen_capacity() -> usize {
    DEFAULT_SEEN_CAPACITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractEventScanConfig {
    pub contract: String,
    /// Event signatures, e.g. `Transfer(address,address,uint256)`
    pub events: Vec<String>,
    /// Never scan more than this many blocks behind the head
    #[serde(default = "default_max_lookback")]
    pub max_lookback: u64,
    #[serde(default = "default_seen_capacity")]
    pub seen_capacity: usize,
}

/// Loose shape check for `Name(type,...)`.
pub fn is_event_signature(value: &str) -> bool {
    let Some((name, rest)) = value.split_once('(') else {
        return false;
    };
    let mut chars = name.chars();
    let valid_name = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    let Some(args) = rest.strip_suffix(')') else {
        return false;
    };
    valid_name
        && !args.contains(['(', ')'])
        && !value.chars().any(char::is_whitespace)
}

pub struct ContractEventScanTask {
    config: ContractEventScanConfig,
    feed: Arc<dyn ChainEventFeed>,
    /// `None` until the first successful poll
    last_processed_block: Option<u64>,
    seen: SeenSet,
}

impl ContractEventScanTask {
    pub fn new(mut config: ContractEventScanConfig, feed: Arc<dyn ChainEventFeed>) -> Result<Self> {
        if config.contract.trim().is_empty() {
            return Err(WatchError::configuration("contract scan: contract is empty"));
        }
        if config.events.is_empty() {
            return Err(WatchError::configuration("contract scan: no events to watch"));
        }
        if let Some(bad) = config.events.iter().find(|s| !is_event_signature(s)) {
            return Err(WatchError::configuration(format!(
                "contract scan: malformed event signature {:?}",
                bad
            )));
        }
        if config.max_lookback == 0 {
            return Err(WatchError::configuration("contract scan: max_lookback must be > 0"));
        }
        if config.seen_capacity < 2 {
            return Err(WatchError::configuration("contract scan: seen_capacity must be >= 2"));
        }

        let mut unique = HashSet::new();
        config.events.retain(|s| unique.insert(s.clone()));

        let seen = SeenSet::new(config.seen_capacity);
        Ok(Self {
            config,
            feed,
            last_processed_block: None,
            seen,
        })
    }

    pub fn config(&self) -> &ContractEventScanConfig {
        &self.config
    }

    /// Watermark; 0 until initialized.
    pub fn last_processed_block(&self) -> u64 {
        self.last_processed_block.unwrap_or(0)
    }

    pub fn is_initialized(&self) -> bool {
        self.last_processed_block.is_some()
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn label(&self) -> String {
        format!("events:{}", self.config.contract)
    }

    /// Range to scan at `height`, or `None` when there is nothing new.
    pub fn scan_range(&self, height: u64) -> Option<BlockRange> {
        let last = self.last_processed_block?;
        let start = (last + 1).max(height.saturating_sub(self.config.max_lookback));
        if start >= height {
            return None;
        }
        Some(BlockRange::new(start, height))
    }

    pub async fn poll(&mut self) -> PollReport {
        let height = match self.feed.block_height().await {
            Ok(h) => h,
            Err(e) => return e.into(),
        };

        let Some(last) = self.last_processed_block else {
            // skip the historical backlog
            let start = height.saturating_sub(1);
            self.last_processed_block = Some(start);
            return PollReport::no_signal().with_notes(vec![format!(
                "Watching {} from block {}",
                self.config.contract, start
            )]);
        };

        let Some(range) = self.scan_range(height) else {
            return PollReport::no_signal();
        };

        let mut notes = Vec::new();
        if range.from > last + 1 {
            notes.push(format!(
                "Skipped blocks {}..{} beyond lookback of {}",
                last + 1,
                range.from - 1,
                self.config.max_lookback
            ));
        }

        let mut events = match self
            .feed
            .events(&self.config.contract, range, &self.config.events)
            .await
        {
            Ok(events) => events,
            // watermark stays put so the range is retried
            Err(e) => return e.into(),
        };
        events.sort_by_key(|e| (e.block_number, e.log_index));

        let mut signals = Vec::new();
        for event in events {
            if self.seen.contains(&event.tx_hash) {
                continue;
            }

            let status = match self.feed.receipt_status(&event.tx_hash).await {
                Ok(status) => status,
                Err(e) => {
                    // best effort: one bad event never holds back the watermark
                    warn!(
                        contract = %self.config.contract,
                        tx = %event.tx_hash,
                        error = %e,
                        "Skipping event"
                    );
                    notes.push(format!("Skipped event in tx {}: {}", event.tx_hash, e));
                    continue;
                }
            };

            self.seen.insert(&event.tx_hash);
            // every matched event is an alert; the receipt status only annotates it
            signals.push(
                Signal::new(
                    Severity::Warning,
                    "Contract Event",
                    format!(
                        "{} on {} at block {}: tx {} ({})",
                        event.signature,
                        self.config.contract,
                        event.block_number,
                        event.tx_hash,
                        status
                    ),
                )
                .with_metadata(json!({
                    "contract": self.config.contract,
                    "event": event.signature,
                    "block": event.block_number,
                    "tx_hash": event.tx_hash,
                    "status": status,
                })),
            );
        }

        self.last_processed_block = Some(height);
        PollReport::new(PollOutcome::from_signals(signals)).with_notes(notes)
    }
}
