//! Agent start/stop behaviour and fault isolation between tasks.

mod common;

use chainwatch::domain::Direction;
use chainwatch::tasks::{PriceThresholdConfig, PriceThresholdTask};
use async_trait::async_trait;
use chainwatch::adapters::WebhookNotifier;
use chainwatch::services::StatusState;
use chainwatch::{Agent, AgentState, AlertEvent, AlertManager, AlertSink, MemorySink, Severity};
use common::{silent_webhook, PanickingPrices, ScriptedPrices, SlowPrices};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(10);

fn price_task(
    token: &str,
    threshold: Decimal,
    feed: Arc<dyn chainwatch::adapters::PriceFeed>,
) -> PriceThresholdTask {
    PriceThresholdTask::new(
        PriceThresholdConfig {
            token: token.into(),
            threshold,
            direction: Direction::Above,
        },
        feed,
    )
    .unwrap()
}

fn agent_with_sink(name: &str) -> (Agent, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let dyn_sink: Arc<dyn AlertSink> = sink.clone();
    (Agent::new(name, dyn_sink).with_interval(TICK), sink)
}

/// Idle -> Running -> Stopped, with tasks polled in between.
#[tokio::test]
async fn agent_runs_until_stopped() {
    let (mut agent, sink) = agent_with_sink("watcher");
    let feed = Arc::new(ScriptedPrices::new(vec![Some(dec!(2500))]));
    agent
        .assign_task(price_task("WETH", dec!(2000), feed.clone()))
        .unwrap();
    assert_eq!(agent.state(), AgentState::Idle);

    agent.start().unwrap();
    assert_eq!(agent.state(), AgentState::Running);
    tokio::time::sleep(TICK * 5).await;
    agent.stop().await;

    assert_eq!(agent.state(), AgentState::Stopped);
    assert!(feed.calls() >= 2, "expected repeated polls, got {}", feed.calls());
    assert_eq!(
        sink.count(Severity::Warning),
        feed.calls(),
        "every poll above the threshold alerts"
    );
}

/// Stopping twice, or stopping an agent that never started, does nothing.
#[tokio::test]
async fn stop_is_idempotent() {
    let (mut idle, _) = agent_with_sink("idle");
    idle.stop().await;
    assert_eq!(idle.state(), AgentState::Idle);

    let (mut agent, _) = agent_with_sink("twice");
    agent
        .assign_task(price_task(
            "WETH",
            dec!(1),
            Arc::new(ScriptedPrices::new(vec![Some(dec!(1))])),
        ))
        .unwrap();
    agent.start().unwrap();
    agent.stop().await;
    agent.stop().await;
    assert_eq!(agent.state(), AgentState::Stopped);
}

/// Tasks are polled one after another in assignment order.
#[tokio::test]
async fn tasks_poll_sequentially_in_assignment_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (mut agent, _) = agent_with_sink("ordered");
    for name in ["first", "second", "third"] {
        let feed = ScriptedPrices::new(vec![Some(dec!(1))]).logging_to(log.clone(), name);
        agent
            .assign_task(price_task(name, dec!(10), Arc::new(feed)))
            .unwrap();
    }

    agent.start().unwrap();
    tokio::time::sleep(TICK * 4).await;
    agent.stop().await;

    let log = log.lock().unwrap().clone();
    assert!(log.len() >= 3 && log.len() % 3 == 0, "whole passes only: {:?}", log);
    for pass in log.chunks(3) {
        assert_eq!(pass, ["first", "second", "third"]);
    }
}

/// A task that keeps failing does not stop its siblings from polling.
#[tokio::test]
async fn failing_task_does_not_block_siblings() {
    let (mut agent, sink) = agent_with_sink("mixed");
    let broken = Arc::new(ScriptedPrices::new(vec![None]));
    let healthy = Arc::new(ScriptedPrices::new(vec![Some(dec!(50))]));
    let broken_info = agent
        .assign_task(price_task("DEAD", dec!(1), broken))
        .unwrap();
    let healthy_info = agent
        .assign_task(price_task("LINK", dec!(10), healthy.clone()))
        .unwrap();

    agent.start().unwrap();
    tokio::time::sleep(TICK * 5).await;
    agent.stop().await;

    let passes = healthy_info.stats.polls();
    assert!(passes >= 2);
    assert_eq!(healthy_info.stats.errors(), 0);
    assert_eq!(healthy_info.stats.alerts(), passes);
    assert_eq!(broken_info.stats.errors(), passes);
    assert_eq!(broken_info.stats.consecutive_errors(), passes);
    assert_eq!(sink.count(Severity::Error) as u64, passes);
}

/// A panicking poll is reported as an error and the agent keeps running.
#[tokio::test]
async fn panicking_task_is_isolated() {
    let (mut agent, sink) = agent_with_sink("fragile");
    let panicky = agent
        .assign_task(price_task("BOOM", dec!(1), Arc::new(PanickingPrices)))
        .unwrap();
    let healthy = Arc::new(ScriptedPrices::new(vec![Some(dec!(1))]));
    agent
        .assign_task(price_task("LINK", dec!(10), healthy.clone()))
        .unwrap();

    agent.start().unwrap();
    tokio::time::sleep(TICK * 4).await;
    assert_eq!(agent.state(), AgentState::Running);
    agent.stop().await;

    assert!(panicky.stats.errors() >= 1);
    assert!(healthy.calls() >= 1, "sibling keeps polling after a panic");
    let panics = sink
        .events()
        .into_iter()
        .filter(|e| e.level == Severity::Error && e.message.contains("decoder bug"))
        .count();
    assert!(panics >= 1);
}

/// stop() lets an in-flight poll finish instead of cancelling it.
#[tokio::test]
async fn stop_waits_for_in_flight_poll() {
    let (mut agent, _) = agent_with_sink("slow");
    let feed = Arc::new(SlowPrices::new(Duration::from_millis(80), dec!(1)));
    agent
        .assign_task(price_task("WETH", dec!(10), feed.clone()))
        .unwrap();

    agent.start().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(feed.started.load(Ordering::SeqCst), 1);

    agent.stop().await;
    assert_eq!(agent.state(), AgentState::Stopped);
    assert_eq!(
        feed.finished.load(Ordering::SeqCst),
        feed.started.load(Ordering::SeqCst),
        "poll was cut short"
    );
}

/// Task state survives stop() and carries into the next run.
#[tokio::test]
async fn restart_keeps_task_state() {
    let (mut agent, _) = agent_with_sink("restart");
    let feed = Arc::new(ScriptedPrices::new(vec![Some(dec!(1800)), Some(dec!(1900))]));
    agent
        .assign_task(price_task("WETH", dec!(2000), feed.clone()))
        .unwrap();

    agent.start().unwrap();
    tokio::time::sleep(TICK * 3).await;
    agent.stop().await;

    let remembered = agent
        .tasks()
        .find_map(|t| t.as_price_threshold())
        .and_then(|t| t.last_price());
    assert!(remembered.is_some(), "last price kept after stop");

    agent.start().unwrap();
    assert_eq!(agent.state(), AgentState::Running);
    tokio::time::sleep(TICK * 3).await;
    agent.stop().await;

    let info = &agent.task_infos()[0];
    assert_eq!(info.stats.polls() as usize, feed.calls());
    assert_eq!(
        agent
            .tasks()
            .find_map(|t| t.as_price_threshold())
            .and_then(|t| t.last_price()),
        Some(dec!(1900))
    );
}

/// Dropping a running agent signals its worker to exit.
#[tokio::test]
async fn dropping_agent_stops_worker() {
    let (mut agent, _) = agent_with_sink("dropped");
    let feed = Arc::new(ScriptedPrices::new(vec![Some(dec!(1))]));
    agent
        .assign_task(price_task("WETH", dec!(10), feed.clone()))
        .unwrap();
    agent.start().unwrap();
    tokio::time::sleep(TICK * 3).await;
    drop(agent);

    tokio::time::sleep(TICK * 2).await;
    let settled = feed.calls();
    tokio::time::sleep(TICK * 5).await;
    assert_eq!(feed.calls(), settled, "worker kept polling after drop");
}

/// Each agent has its own worker; stopping one leaves the other running.
#[tokio::test]
async fn agents_run_independently() {
    let (mut a, _) = agent_with_sink("a");
    let (mut b, _) = agent_with_sink("b");
    let feed_a = Arc::new(ScriptedPrices::new(vec![Some(dec!(1))]));
    let feed_b = Arc::new(ScriptedPrices::new(vec![Some(dec!(1))]));
    a.assign_task(price_task("A", dec!(10), feed_a.clone())).unwrap();
    b.assign_task(price_task("B", dec!(10), feed_b.clone())).unwrap();

    a.start().unwrap();
    b.start().unwrap();
    tokio::time::sleep(TICK * 3).await;
    a.stop().await;

    let b_before = feed_b.calls();
    tokio::time::sleep(TICK * 4).await;
    assert!(feed_b.calls() > b_before, "agent b stalled when a stopped");
    assert_eq!(b.state(), AgentState::Running);
    assert_eq!(a.state(), AgentState::Stopped);

    b.stop().await;
}

/// An unresponsive webhook neither stalls polling nor holds up stop().
#[tokio::test]
async fn hung_webhook_does_not_block_agent() {
    let webhook = WebhookNotifier::new(silent_webhook().await).unwrap();
    let manager: Arc<dyn AlertSink> = Arc::new(AlertManager::with_defaults().with_webhook(webhook));
    let mut agent = Agent::new("hooked", manager).with_interval(TICK);
    let feed = Arc::new(ScriptedPrices::new(vec![Some(dec!(2500))]));
    agent
        .assign_task(price_task("WETH", dec!(2000), feed.clone()))
        .unwrap();

    agent.start().unwrap();
    tokio::time::sleep(TICK * 5).await;
    assert!(feed.calls() >= 2, "loop stalled after the first alert");

    let stopped = tokio::time::timeout(Duration::from_secs(2), agent.stop()).await;
    assert!(stopped.is_ok(), "stop() waited on the webhook");
    assert_eq!(agent.state(), AgentState::Stopped);
}

struct BrokenSink;

#[async_trait]
impl AlertSink for BrokenSink {
    async fn emit(&self, _event: AlertEvent) {
        panic!("sink exploded")
    }
}

/// A worker that dies outside a task poll shows up as Failed and unhealthy.
#[tokio::test]
async fn worker_crash_is_reported_as_failed() {
    let mut agent = Agent::new("crashing", Arc::new(BrokenSink)).with_interval(TICK);
    agent
        .assign_task(price_task(
            "WETH",
            dec!(1),
            Arc::new(ScriptedPrices::new(vec![Some(dec!(5))])),
        ))
        .unwrap();
    let status = StatusState::new(vec![agent.view()]);
    let mut state = agent.subscribe_state();

    agent.start().unwrap();
    let failed = tokio::time::timeout(
        Duration::from_secs(2),
        state.wait_for(|s| *s == AgentState::Failed),
    )
    .await
    .map(|seen| seen.is_ok());
    assert!(matches!(failed, Ok(true)), "state stayed {}", agent.state());
    assert!(!status.status().healthy);
    assert!(status.render_metrics().contains("chainwatch_agent_running{agent=\"crashing\"} 0"));

    agent.stop().await;
    assert_eq!(agent.state(), AgentState::Failed);
}
