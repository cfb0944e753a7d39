use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, WatchError};

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// State-change notes, log only
    Info,
    /// Threshold, spread, sentiment and contract-event alerts
    Warning,
    /// Provider failures
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One alert raised by a poll
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
}

impl Signal {
    pub fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Tri-state result of one task poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    NoSignal,
    /// One or more alerts; never empty
    Alert(Vec<Signal>),
    Error { kind: ErrorKind, detail: String },
}

impl PollOutcome {
    pub fn alert(signal: Signal) -> Self {
        PollOutcome::Alert(vec![signal])
    }

    /// Collapse a possibly-empty signal list into an outcome.
    pub fn from_signals(signals: Vec<Signal>) -> Self {
        if signals.is_empty() {
            PollOutcome::NoSignal
        } else {
            PollOutcome::Alert(signals)
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, PollOutcome::Alert(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PollOutcome::Error { .. })
    }

    pub fn signals(&self) -> &[Signal] {
        match self {
            PollOutcome::Alert(signals) => signals,
            _ => &[],
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            PollOutcome::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::NoSignal => "no_signal",
            PollOutcome::Alert(_) => "alert",
            PollOutcome::Error { .. } => "error",
        }
    }
}

impl From<WatchError> for PollOutcome {
    fn from(err: WatchError) -> Self {
        PollOutcome::Error {
            kind: err.kind(),
            detail: err.to_string(),
        }
    }
}

/// What one poll produced: the outcome plus informational notes that are
/// logged but never count as alerts.
#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    pub outcome: PollOutcome,
    pub notes: Vec<String>,
}

impl PollReport {
    pub fn new(outcome: PollOutcome) -> Self {
        Self {
            outcome,
            notes: Vec::new(),
        }
    }

    pub fn no_signal() -> Self {
        Self::new(PollOutcome::NoSignal)
    }

    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }
}

impl From<PollOutcome> for PollReport {
    fn from(outcome: PollOutcome) -> Self {
        PollReport::new(outcome)
    }
}

impl From<WatchError> for PollReport {
    fn from(err: WatchError) -> Self {
        PollReport::new(err.into())
    }
}
