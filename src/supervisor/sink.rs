//! Alert sink capability
//!
//! Runners and agents report every outcome through an injected `AlertSink`
//! instead of a global logger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::Severity;

/// Structured alert carrying the originating task's identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub level: Severity,
    pub agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(
        level: Severity,
        agent: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            agent: agent.into(),
            task_id: None,
            task: None,
            title: title.into(),
            message: message.into(),
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_task(mut self, task_id: Uuid, task: impl Into<String>) -> Self {
        self.task_id = Some(task_id);
        self.task = Some(task.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Option<serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// `agent/task` or just `agent` for agent-level events
    pub fn source(&self) -> String {
        match &self.task {
            Some(task) => format!("{}/{}", self.agent, task),
            None => self.agent.clone(),
        }
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn emit(&self, event: AlertEvent);
}

/// Keeps every event in memory. Used by diagnostics and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AlertEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, level: Severity) -> usize {
        self.events
            .lock()
            .map(|e| e.iter().filter(|ev| ev.level == level).count())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl AlertSink for MemorySink {
    async fn emit(&self, event: AlertEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
