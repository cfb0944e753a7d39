//! Agent scheduler
//!
//! An agent owns an ordered list of tasks and one background worker that
//! polls them sequentially, then sleeps for a fixed interval. The worker owns
//! the runners while it runs and hands them back when it stops, so task state
//! survives a stop/start cycle.

pub mod runner;
pub mod stats;

pub use runner::TaskRunner;
pub use stats::{TaskInfo, TaskSnapshot, TaskStats, TaskStatsSnapshot};

use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Result, WatchError};
use crate::supervisor::AlertSink;
use crate::tasks::Task;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Idle,
    Running,
    Stopping,
    Stopped,
    /// Worker died outside a task poll; its tasks are gone
    Failed,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::Running => "running",
            AgentState::Stopping => "stopping",
            AgentState::Stopped => "stopped",
            AgentState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub struct Agent {
    id: Uuid,
    name: Arc<str>,
    interval: Duration,
    sink: Arc<dyn AlertSink>,
    /// Empty while the worker owns them
    runners: Vec<TaskRunner>,
    infos: Vec<TaskInfo>,
    state_tx: Arc<watch::Sender<AgentState>>,
    stop_tx: Option<watch::Sender<bool>>,
    /// Yields the runners back, or `None` if the worker panicked
    worker: Option<JoinHandle<Option<Vec<TaskRunner>>>>,
}

impl Agent {
    pub fn new(name: impl Into<String>, sink: Arc<dyn AlertSink>) -> Self {
        let (state_tx, _) = watch::channel(AgentState::Idle);
        Self {
            id: Uuid::new_v4(),
            name: Arc::from(name.into()),
            interval: DEFAULT_INTERVAL,
            sink,
            runners: Vec::new(),
            infos: Vec::new(),
            state_tx: Arc::new(state_tx),
            stop_tx: None,
            worker: None,
        }
    }

    /// Pause between full passes over the task list
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> AgentState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AgentState> {
        self.state_tx.subscribe()
    }

    pub fn task_count(&self) -> usize {
        self.infos.len()
    }

    /// Assigned tasks in execution order
    pub fn task_infos(&self) -> &[TaskInfo] {
        &self.infos
    }

    /// Borrow the tasks for inspection. Empty while running.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.runners.iter().map(TaskRunner::task)
    }

    /// Append a task. Only allowed before the first `start()`.
    pub fn assign_task(&mut self, task: impl Into<Task>) -> Result<TaskInfo> {
        let state = self.state();
        if state != AgentState::Idle {
            return Err(WatchError::InvalidState(format!(
                "cannot assign task to agent {} in state {}",
                self.name, state
            )));
        }

        let runner = TaskRunner::new(self.name.clone(), task.into(), self.sink.clone());
        let info = runner.info().clone();
        debug!(agent = %self.name, task_id = %info.id, task = %info.label, "Task assigned");
        self.runners.push(runner);
        self.infos.push(info.clone());
        Ok(info)
    }

    /// Spawn the worker. No-op with a warning if already running.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            warn!(agent = %self.name, state = %self.state(), "Agent already running");
            return Ok(());
        }
        if self.state() == AgentState::Failed {
            return Err(WatchError::InvalidState(format!(
                "agent {} failed and lost its tasks",
                self.name
            )));
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| WatchError::InvalidState(format!("no tokio runtime: {}", e)))?;

        if self.runners.is_empty() {
            warn!(agent = %self.name, "Starting agent with no tasks");
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let runners = std::mem::take(&mut self.runners);
        self.worker = Some(handle.spawn(supervise(
            self.name.clone(),
            runners,
            self.interval,
            stop_rx,
            Arc::clone(&self.state_tx),
        )));
        self.stop_tx = Some(stop_tx);
        self.state_tx.send_replace(AgentState::Running);

        info!(
            agent = %self.name,
            tasks = self.infos.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Agent started"
        );
        Ok(())
    }

    /// Signal the worker and wait for its current pass to finish.
    /// No-op if the agent is not running.
    pub async fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            debug!(agent = %self.name, state = %self.state(), "Agent not running");
            return;
        };

        self.state_tx.send_if_modified(|state| {
            let running = *state == AgentState::Running;
            if running {
                *state = AgentState::Stopping;
            }
            running
        });
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }

        match worker.await {
            Ok(Some(runners)) => {
                self.runners = runners;
                self.state_tx.send_replace(AgentState::Stopped);
                info!(agent = %self.name, "Agent stopped");
            }
            Ok(None) => {
                self.infos.clear();
                self.state_tx.send_replace(AgentState::Failed);
            }
            Err(e) => {
                error!(agent = %self.name, error = %e, "Agent worker failed");
                self.infos.clear();
                self.state_tx.send_replace(AgentState::Failed);
            }
        }
    }

    /// Cheap handle for diagnostics that outlives borrows of the agent
    pub fn view(&self) -> AgentView {
        AgentView {
            id: self.id,
            name: self.name.to_string(),
            state: self.state_tx.subscribe(),
            tasks: self.infos.clone(),
        }
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("tasks", &self.infos.len())
            .finish()
    }
}

/// Run the loop and publish `Failed` as soon as it panics.
async fn supervise(
    agent: Arc<str>,
    runners: Vec<TaskRunner>,
    interval: Duration,
    stop_rx: watch::Receiver<bool>,
    state_tx: Arc<watch::Sender<AgentState>>,
) -> Option<Vec<TaskRunner>> {
    let run = run_loop(agent.clone(), runners, interval, stop_rx);
    match AssertUnwindSafe(run).catch_unwind().await {
        Ok(runners) => Some(runners),
        Err(panic) => {
            let reason = runner::panic_message(panic.as_ref());
            error!(agent = %agent, %reason, "Agent worker failed");
            state_tx.send_replace(AgentState::Failed);
            None
        }
    }
}

async fn run_loop(
    agent: Arc<str>,
    mut runners: Vec<TaskRunner>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) -> Vec<TaskRunner> {
    let mut pass: u64 = 0;
    loop {
        if *stop_rx.borrow_and_update() {
            break;
        }

        pass += 1;
        for runner in runners.iter_mut() {
            runner.poll_once().await;
        }
        debug!(agent = %agent, pass, "Pass complete");

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    // agent dropped without stop()
                    break;
                }
            }
        }
    }
    debug!(agent = %agent, passes = pass, "Worker exiting");
    runners
}

#[derive(Debug, Clone)]
pub struct AgentView {
    pub id: Uuid,
    pub name: String,
    state: watch::Receiver<AgentState>,
    pub tasks: Vec<TaskInfo>,
}

impl AgentView {
    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            name: self.name.clone(),
            state: self.state(),
            tasks: self.tasks.iter().map(TaskInfo::snapshot).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    pub id: Uuid,
    pub name: String,
    pub state: AgentState,
    pub tasks: Vec<TaskSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockPriceFeed;
    use crate::domain::Direction;
    use crate::supervisor::MemorySink;
    use crate::tasks::{PriceThresholdConfig, PriceThresholdTask};
    use rust_decimal_macros::dec;

    fn price_task(threshold: rust_decimal::Decimal) -> PriceThresholdTask {
        let mut feed = MockPriceFeed::new();
        feed.expect_price().returning(|_| Ok(dec!(100)));
        PriceThresholdTask::new(
            PriceThresholdConfig {
                token: "WETH".into(),
                threshold,
                direction: Direction::Above,
            },
            Arc::new(feed),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_states() {
        let sink = Arc::new(MemorySink::new());
        let mut agent = Agent::new("watcher", sink).with_interval(Duration::from_millis(10));
        agent.assign_task(price_task(dec!(50))).unwrap();

        assert_eq!(agent.state(), AgentState::Idle);
        agent.start().unwrap();
        assert_eq!(agent.state(), AgentState::Running);
        assert_eq!(agent.tasks().count(), 0);
        assert_eq!(agent.task_count(), 1);

        agent.stop().await;
        assert_eq!(agent.state(), AgentState::Stopped);
        assert_eq!(agent.tasks().count(), 1);

        // second stop is a no-op
        agent.stop().await;
        assert_eq!(agent.state(), AgentState::Stopped);
    }

    #[tokio::test]
    async fn test_assign_after_start_is_rejected() {
        let sink = Arc::new(MemorySink::new());
        let mut agent = Agent::new("watcher", sink).with_interval(Duration::from_millis(10));
        agent.start().unwrap();

        let err = agent.assign_task(price_task(dec!(50))).unwrap_err();
        assert!(matches!(err, WatchError::InvalidState(_)));

        agent.stop().await;
        assert!(agent.assign_task(price_task(dec!(50))).is_err());
    }

    #[tokio::test]
    async fn test_double_start_keeps_one_worker() {
        let sink = Arc::new(MemorySink::new());
        let mut agent = Agent::new("watcher", sink.clone()).with_interval(Duration::from_secs(60));
        let info = agent.assign_task(price_task(dec!(50))).unwrap();

        agent.start().unwrap();
        agent.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        agent.stop().await;

        // one pass before the long sleep was interrupted
        assert_eq!(info.stats.polls(), 1);
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let sink = Arc::new(MemorySink::new());
        let mut agent = Agent::new("watcher", sink);
        assert!(agent.start().is_err());
        assert_eq!(agent.state(), AgentState::Idle);
    }

    #[tokio::test]
    async fn test_view_tracks_state() {
        let sink = Arc::new(MemorySink::new());
        let mut agent = Agent::new("watcher", sink).with_interval(Duration::from_millis(10));
        agent.assign_task(price_task(dec!(500))).unwrap();
        let view = agent.view();

        assert_eq!(view.state(), AgentState::Idle);
        agent.start().unwrap();
        assert_eq!(view.state(), AgentState::Running);
        tokio::time::sleep(Duration::from_millis(30)).await;
        agent.stop().await;

        let snapshot = view.snapshot();
        assert_eq!(snapshot.state, AgentState::Stopped);
        assert_eq!(snapshot.tasks.len(), 1);
        assert!(snapshot.tasks[0].stats.polls >= 1);
    }

    struct PanickingSink;

    #[async_trait::async_trait]
    impl AlertSink for PanickingSink {
        async fn emit(&self, _event: crate::supervisor::AlertEvent) {
            panic!("sink exploded");
        }
    }

    #[tokio::test]
    async fn test_worker_panic_marks_agent_failed() {
        let mut agent = Agent::new("doomed", Arc::new(PanickingSink))
            .with_interval(Duration::from_millis(10));
        agent.assign_task(price_task(dec!(50))).unwrap();
        let mut state = agent.subscribe_state();

        agent.start().unwrap();
        tokio::time::timeout(
            Duration::from_secs(2),
            state.wait_for(|s| *s == AgentState::Failed),
        )
        .await
        .expect("agent never reported failure")
        .unwrap();

        agent.stop().await;
        assert_eq!(agent.state(), AgentState::Failed);
        assert_eq!(agent.task_count(), 0);
        assert!(agent.tasks().next().is_none());
        assert!(matches!(agent.start(), Err(WatchError::InvalidState(_))));
    }
}
