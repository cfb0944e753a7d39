//! Contract log scanning over JSON-RPC

use alloy::network::ReceiptResponse;
use alloy::primitives::{keccak256, B256};
use alloy::providers::Provider;
use alloy::rpc::types::Filter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

use super::dex_router::parse_address;
use super::traits::ChainEventFeed;
use crate::domain::{BlockRange, ChainEvent, TxStatus};
use crate::error::{Result, WatchError};

/// topic0 for a human-readable event signature
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// `ChainEventFeed` over any alloy provider
pub struct EvmEventFeed<P> {
    provider: P,
}

impl<P> EvmEventFeed<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> ChainEventFeed for EvmEventFeed<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    async fn block_height(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| WatchError::provider(format!("eth_blockNumber failed: {}", e)))
    }

    async fn events(
        &self,
        contract: &str,
        range: BlockRange,
        signatures: &[String],
    ) -> Result<Vec<ChainEvent>> {
        let address = parse_address(contract)?;
        let by_topic: HashMap<B256, &String> =
            signatures.iter().map(|s| (event_topic(s), s)).collect();
        let topics: Vec<B256> = by_topic.keys().copied().collect();

        let filter = Filter::new()
            .address(address)
            .from_block(range.from)
            .to_block(range.to)
            .event_signature(topics);

        let logs = self.provider.get_logs(&filter).await.map_err(|e| {
            WatchError::provider(format!("eth_getLogs {} {} failed: {}", contract, range, e))
        })?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            let (Some(block_number), Some(tx_hash)) = (log.block_number, log.transaction_hash)
            else {
                // pending logs carry no position yet
                continue;
            };
            let signature = log
                .topics()
                .first()
                .and_then(|t| by_topic.get(t))
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string());

            events.push(ChainEvent {
                block_number,
                tx_hash: format!("{:?}", tx_hash),
                log_index: log.log_index.unwrap_or_default(),
                signature,
            });
        }

        debug!(%contract, %range, count = events.len(), "Fetched contract logs");
        Ok(events)
    }

    async fn receipt_status(&self, tx_hash: &str) -> Result<TxStatus> {
        let hash = B256::from_str(tx_hash)
            .map_err(|e| WatchError::inconsistent(format!("bad tx hash {}: {}", tx_hash, e)))?;

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| WatchError::provider(format!("receipt {} failed: {}", tx_hash, e)))?
            .ok_or_else(|| WatchError::inconsistent(format!("no receipt for {}", tx_hash)))?;

        Ok(if ReceiptResponse::status(&receipt) {
            TxStatus::Success
        } else {
            TxStatus::Failed
        })
    }
}
