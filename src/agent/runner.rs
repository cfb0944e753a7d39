//! Runs one task poll and reports the outcome
//!
//! The runner is the failure boundary: errors and panics from a task become
//! `PollOutcome::Error` and never reach the scheduling loop.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::stats::{TaskInfo, TaskStats};
use crate::domain::{PollOutcome, PollReport, Severity};
use crate::error::ErrorKind;
use crate::supervisor::{AlertEvent, AlertSink};
use crate::tasks::Task;

pub struct TaskRunner {
    info: TaskInfo,
    task: Task,
    agent: Arc<str>,
    sink: Arc<dyn AlertSink>,
}

impl TaskRunner {
    pub fn new(agent: Arc<str>, task: Task, sink: Arc<dyn AlertSink>) -> Self {
        let info = TaskInfo {
            id: Uuid::new_v4(),
            kind: task.kind(),
            label: task.label(),
            stats: Arc::new(TaskStats::new()),
        };
        Self {
            info,
            task,
            agent,
            sink,
        }
    }

    pub fn info(&self) -> &TaskInfo {
        &self.info
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Poll the task once, record stats and emit everything it produced.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let span = info_span!(
            "poll",
            agent = %self.agent,
            task_id = %self.info.id,
            task = %self.info.label
        );

        let report = match AssertUnwindSafe(self.task.poll().instrument(span))
            .catch_unwind()
            .await
        {
            Ok(report) => report,
            Err(panic) => PollReport::new(PollOutcome::Error {
                kind: ErrorKind::Internal,
                detail: format!("poll panicked: {}", panic_message(panic.as_ref())),
            }),
        };

        let consecutive = self.info.stats.record(&report.outcome);

        for note in &report.notes {
            info!(agent = %self.agent, task = %self.info.label, "{}", note);
            self.sink
                .emit(self.event(Severity::Info, "Task Note", note.clone()))
                .await;
        }

        match &report.outcome {
            PollOutcome::NoSignal => {
                debug!(agent = %self.agent, task = %self.info.label, "No signal");
            }
            PollOutcome::Alert(signals) => {
                for signal in signals {
                    let event = self
                        .event(signal.severity, signal.title.clone(), signal.message.clone())
                        .with_metadata(signal.metadata.clone());
                    self.sink.emit(event).await;
                }
            }
            PollOutcome::Error { kind, detail } => {
                warn!(
                    agent = %self.agent,
                    task_id = %self.info.id,
                    task = %self.info.label,
                    kind = %kind,
                    consecutive_errors = consecutive,
                    "Poll failed: {}",
                    detail
                );
                let event = self
                    .event(Severity::Error, "Task Error", detail.clone())
                    .with_metadata(Some(serde_json::json!({
                        "kind": kind,
                        "consecutive_errors": consecutive,
                    })));
                self.sink.emit(event).await;
            }
        }

        report.outcome
    }

    fn event(&self, level: Severity, title: impl Into<String>, message: impl Into<String>) -> AlertEvent {
        AlertEvent::new(level, self.agent.as_ref(), title, message)
            .for_task(self.info.id, self.info.label.clone())
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
