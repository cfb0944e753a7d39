//! Alert Manager
//!
//! Logs every alert event, re-broadcasts it to local subscribers and forwards
//! warnings to the webhook. Includes rate limiting to prevent alert storms.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use super::sink::{AlertEvent, AlertSink};
use crate::adapters::WebhookNotifier;
use crate::domain::Severity;

fn emoji(level: Severity) -> &'static str {
    match level {
        Severity::Info => "\u{2139}\u{fe0f}",
        Severity::Warning => "\u{26a0}\u{fe0f}",
        Severity::Error => "\u{274c}",
    }
}

/// Format an event for the webhook message body
pub fn format_message(event: &AlertEvent) -> String {
    format!(
        "{} **{}**\n\n**Source:** {}\n**Time:** {}\n\n{}",
        emoji(event.level),
        event.title,
        event.source(),
        event.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        event.message
    )
}

/// Configuration for alert manager
#[derive(Debug, Clone)]
pub struct AlertManagerConfig {
    /// Minimum interval between duplicate alerts (default: 60s)
    pub rate_limit_secs: u64,
    /// Whether to forward info events (default: false)
    pub notify_info: bool,
    /// Maximum alerts per minute before throttling (default: 10)
    pub max_alerts_per_minute: u32,
}

impl Default for AlertManagerConfig {
    fn default() -> Self {
        Self {
            rate_limit_secs: 60,
            notify_info: false,
            max_alerts_per_minute: 10,
        }
    }
}

/// Rate limiter state for an alert key
#[derive(Debug)]
struct RateLimitState {
    last_sent: DateTime<Utc>,
    suppressed_count: u32,
}

pub struct AlertManager {
    config: AlertManagerConfig,
    webhook: Option<Arc<WebhookNotifier>>,
    rate_limits: Arc<RwLock<HashMap<String, RateLimitState>>>,
    alerts_this_minute: Arc<RwLock<Vec<DateTime<Utc>>>>,
    event_tx: broadcast::Sender<AlertEvent>,
}

impl AlertManager {
    pub fn new(config: AlertManagerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            webhook: None,
            rate_limits: Arc::new(RwLock::new(HashMap::new())),
            alerts_this_minute: Arc::new(RwLock::new(Vec::new())),
            event_tx,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(AlertManagerConfig::default())
    }

    pub fn with_webhook(mut self, webhook: Arc<WebhookNotifier>) -> Self {
        self.webhook = Some(webhook);
        self
    }

    pub fn has_webhook(&self) -> bool {
        self.webhook.is_some()
    }

    /// Subscribe to every emitted event
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.event_tx.subscribe()
    }

    /// Errors stay in the logs; they never reach the webhook.
    pub fn should_forward(&self, level: Severity) -> bool {
        match level {
            Severity::Info => self.config.notify_info,
            Severity::Warning => true,
            Severity::Error => false,
        }
    }

    fn rate_limit_key(event: &AlertEvent) -> String {
        format!(
            "{}:{}:{}",
            event.agent,
            event.task.as_deref().unwrap_or("-"),
            event.title
        )
    }

    async fn should_rate_limit(&self, event: &AlertEvent) -> bool {
        let key = Self::rate_limit_key(event);
        let now = Utc::now();

        let mut limits = self.rate_limits.write().await;

        if let Some(state) = limits.get_mut(&key) {
            let elapsed = now.signed_duration_since(state.last_sent).num_seconds().max(0) as u64;
            if elapsed < self.config.rate_limit_secs {
                state.suppressed_count += 1;
                debug!(
                    "Rate limiting alert '{}' ({} suppressed)",
                    event.title, state.suppressed_count
                );
                return true;
            }

            state.last_sent = now;
            state.suppressed_count = 0;
        } else {
            limits.insert(
                key,
                RateLimitState {
                    last_sent: now,
                    suppressed_count: 0,
                },
            );
        }

        false
    }

    /// Global cap on forwarded alerts per minute
    async fn is_throttled(&self) -> bool {
        let now = Utc::now();
        let minute_ago = now - chrono::Duration::minutes(1);

        let mut alerts = self.alerts_this_minute.write().await;
        alerts.retain(|t| *t > minute_ago);

        if alerts.len() >= self.config.max_alerts_per_minute as usize {
            warn!(
                "Alert throttling: {} alerts in last minute (max: {})",
                alerts.len(),
                self.config.max_alerts_per_minute
            );
            return true;
        }

        alerts.push(now);
        false
    }

    pub async fn get_suppressed_counts(&self) -> HashMap<String, u32> {
        let limits = self.rate_limits.read().await;
        limits
            .iter()
            .filter(|(_, state)| state.suppressed_count > 0)
            .map(|(key, state)| (key.clone(), state.suppressed_count))
            .collect()
    }

    pub async fn reset_rate_limits(&self) {
        self.rate_limits.write().await.clear();
        debug!("Alert rate limits reset");
    }
}

#[async_trait]
impl AlertSink for AlertManager {
    async fn emit(&self, event: AlertEvent) {
        let _ = self.event_tx.send(event.clone());

        let source = event.source();
        match event.level {
            Severity::Info => info!(source = %source, "{}: {}", event.title, event.message),
            Severity::Warning => warn!(source = %source, "{}: {}", event.title, event.message),
            Severity::Error => error!(source = %source, "{}: {}", event.title, event.message),
        }

        let Some(webhook) = &self.webhook else {
            return;
        };
        if !self.should_forward(event.level) {
            return;
        }
        if self.should_rate_limit(&event).await || self.is_throttled().await {
            return;
        }

        // forwarded off the caller's task so a slow receiver never stalls a poll loop
        let webhook = Arc::clone(webhook);
        let text = format_message(&event);
        tokio::spawn(async move {
            if let Err(e) = webhook.send_message(&text).await {
                error!("Failed to send webhook alert: {}", e);
            }
        });
    }
}
