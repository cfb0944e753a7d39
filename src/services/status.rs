//! Status HTTP server for process supervision
//!
//! Liveness endpoint, a JSON view of every agent and its tasks, and a
//! Prometheus text endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::agent::{AgentSnapshot, AgentState, AgentView};
use crate::error::{Result, WatchError};

/// Shared state for the status server
pub struct StatusState {
    pub started_at: DateTime<Utc>,
    agents: Vec<AgentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub healthy: bool,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub agents: Vec<AgentSnapshot>,
}

impl StatusState {
    pub fn new(agents: Vec<AgentView>) -> Self {
        Self {
            started_at: Utc::now(),
            agents,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }

    /// Healthy while every agent is running
    pub fn status(&self) -> StatusResponse {
        let agents: Vec<AgentSnapshot> = self.agents.iter().map(AgentView::snapshot).collect();
        StatusResponse {
            healthy: agents.iter().all(|a| a.state == AgentState::Running),
            timestamp: Utc::now(),
            uptime_seconds: self.uptime_seconds(),
            agents,
        }
    }

    pub fn render_metrics(&self) -> String {
        let status = self.status();
        let mut out = String::new();

        let _ = writeln!(out, "# HELP chainwatch_uptime_seconds Uptime in seconds");
        let _ = writeln!(out, "# TYPE chainwatch_uptime_seconds counter");
        let _ = writeln!(out, "chainwatch_uptime_seconds {}", status.uptime_seconds);

        let _ = writeln!(out, "\n# HELP chainwatch_agent_running Agent running (1) or not (0)");
        let _ = writeln!(out, "# TYPE chainwatch_agent_running gauge");
        for agent in &status.agents {
            let running = u8::from(agent.state == AgentState::Running);
            let _ = writeln!(
                out,
                "chainwatch_agent_running{{agent=\"{}\"}} {}",
                escape_label(&agent.name),
                running
            );
        }

        let counters: [(&str, &str, fn(&crate::agent::TaskStatsSnapshot) -> u64); 4] = [
            ("chainwatch_task_polls_total", "Task polls", |s| s.polls),
            ("chainwatch_task_alerts_total", "Alerts raised by tasks", |s| s.alerts),
            ("chainwatch_task_errors_total", "Failed task polls", |s| s.errors),
            (
                "chainwatch_task_consecutive_errors",
                "Current run of failed polls",
                |s| s.consecutive_errors,
            ),
        ];
        for (name, help, value) in counters {
            let kind = if name.ends_with("_total") { "counter" } else { "gauge" };
            let _ = writeln!(out, "\n# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} {}", name, kind);
            for agent in &status.agents {
                for task in &agent.tasks {
                    let _ = writeln!(
                        out,
                        "{}{{agent=\"{}\",task=\"{}\",kind=\"{}\"}} {}",
                        name,
                        escape_label(&agent.name),
                        escape_label(&task.label),
                        task.kind,
                        value(&task.stats)
                    );
                }
            }
        }
        out
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

pub fn router(state: Arc<StatusState>) -> Router {
    Router::new()
        .route("/healthz", get(liveness_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

pub struct StatusServer {
    state: Arc<StatusState>,
    port: u16,
}

impl StatusServer {
    pub fn new(state: Arc<StatusState>, port: u16) -> Self {
        Self { state, port }
    }

    pub async fn run(&self) -> Result<()> {
        let app = router(Arc::clone(&self.state));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting status server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .await
            .map_err(|e| WatchError::Internal(format!("Status server error: {}", e)))?;

        Ok(())
    }
}

async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn status_handler(State(state): State<Arc<StatusState>>) -> impl IntoResponse {
    let status = state.status();
    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

async fn metrics_handler(State(state): State<Arc<StatusState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.render_metrics(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockPriceFeed;
    use crate::agent::Agent;
    use crate::domain::Direction;
    use crate::supervisor::MemorySink;
    use crate::tasks::{PriceThresholdConfig, PriceThresholdTask};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn agent() -> Agent {
        let mut feed = MockPriceFeed::new();
        feed.expect_price().returning(|_| Ok(dec!(1)));
        let mut agent = Agent::new("watcher \"eth\"", Arc::new(MemorySink::new()))
            .with_interval(Duration::from_millis(10));
        agent
            .assign_task(
                PriceThresholdTask::new(
                    PriceThresholdConfig {
                        token: "WETH".into(),
                        threshold: dec!(2000),
                        direction: Direction::Above,
                    },
                    Arc::new(feed),
                )
                .unwrap(),
            )
            .unwrap();
        agent
    }

    #[tokio::test]
    async fn test_unhealthy_until_running() {
        let mut agent = agent();
        let state = StatusState::new(vec![agent.view()]);
        assert!(!state.status().healthy);

        agent.start().unwrap();
        assert!(state.status().healthy);

        agent.stop().await;
        let status = state.status();
        assert!(!status.healthy);
        assert_eq!(status.agents[0].state, AgentState::Stopped);
    }

    #[tokio::test]
    async fn test_metrics_text() {
        let agent = agent();
        let state = StatusState::new(vec![agent.view()]);
        let text = state.render_metrics();

        assert!(text.contains("# TYPE chainwatch_task_polls_total counter"));
        assert!(text.contains("chainwatch_agent_running{agent=\"watcher \\\"eth\\\"\"} 0"));
        assert!(text.contains("kind=\"price_threshold\"} 0"));
    }

    #[test]
    fn test_empty_status_is_healthy() {
        let state = StatusState::new(Vec::new());
        assert!(state.status().healthy);
        assert!(state.render_metrics().contains("chainwatch_uptime_seconds"));
    }
}
