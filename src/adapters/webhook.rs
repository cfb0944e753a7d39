//! Outbound alert webhook
//!
//! Posts plain-text alert messages to a chat webhook.

use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::{Result, WatchError};

/// Upper bound on a single webhook POST
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Webhook notification client
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    msg_type: &'static str,
    content: WebhookContent<'a>,
    /// Same text at top level for Slack-style receivers
    text: &'a str,
}

#[derive(Serialize)]
struct WebhookContent<'a> {
    text: &'a str,
}

impl WebhookNotifier {
    /// Create a notifier from `CHAINWATCH_WEBHOOK_URL`, if set
    pub fn from_env() -> Option<Arc<Self>> {
        std::env::var("CHAINWATCH_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .and_then(|url| match Self::new(url) {
                Ok(notifier) => {
                    info!("Webhook notifications enabled");
                    Some(notifier)
                }
                Err(e) => {
                    error!("Webhook client setup failed: {}", e);
                    None
                }
            })
    }

    /// Create a notifier with explicit URL
    pub fn new(webhook_url: String) -> Result<Arc<Self>> {
        Self::with_timeout(webhook_url, WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(webhook_url: String, timeout: Duration) -> Result<Arc<Self>> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Arc::new(Self {
            client,
            webhook_url,
        }))
    }

    /// Send a text message
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let message = WebhookMessage {
            msg_type: "text",
            content: WebhookContent { text },
            text,
        };

        match self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await
        {
            Ok(resp) => {
                if resp.status().is_success() {
                    debug!("Webhook notification sent");
                    Ok(())
                } else {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    error!("Webhook notification failed: {} - {}", status, body);
                    Err(WatchError::provider(format!("HTTP {}: {}", status, body)))
                }
            }
            Err(e) => {
                error!("Webhook request failed: {}", e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_shape() {
        let message = WebhookMessage {
            msg_type: "text",
            content: WebhookContent { text: "hello" },
            text: "hello",
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["msg_type"], "text");
        assert_eq!(json["content"]["text"], "hello");
        assert_eq!(json["text"], "hello");
    }

    #[tokio::test]
    async fn test_send_gives_up_after_timeout() {
        // accepts the connection but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let notifier =
            WebhookNotifier::with_timeout(format!("http://{}/hook", addr), Duration::from_millis(200))
                .unwrap();
        let result =
            tokio::time::timeout(Duration::from_secs(5), notifier.send_message("hello")).await;

        let err = result.expect("send must not hang").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ProviderFailure);
    }
}
