use anyhow::Context;
use chainwatch::bootstrap::{build_agents, build_alert_manager, Providers};
use chainwatch::config::{AppConfig, TaskSpec};
use chainwatch::services::{StatusServer, StatusState};
use chainwatch::{Agent, AlertSink};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple, shutdown_signal};

/// On-chain and social signal watcher
#[derive(Parser, Debug)]
#[command(name = "chainwatch")]
#[command(author, version, about = "Polls price, event and sentiment sources and raises alerts")]
struct Cli {
    /// Directory holding default.toml and per-environment overrides
    #[arg(long, env = "CHAINWATCH_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start every configured agent until SIGINT/SIGTERM
    Run,
    /// Validate the configuration and list agents and tasks
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&cli.config_dir).await,
        Commands::Check => {
            init_logging_simple();
            check(&cli.config_dir)
        }
    }
}

fn load(config_dir: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load_from(config_dir)
        .with_context(|| format!("failed to load config from {}", config_dir.display()))
}

async fn run(config_dir: &Path) -> anyhow::Result<()> {
    let config = load(config_dir)?;
    init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Config: {}", e);
        }
        anyhow::bail!("invalid configuration ({} problems)", errors.len());
    }

    let providers = Providers::from_config(&config)?;
    let alerts = Arc::new(build_alert_manager(&config.notifier)?);
    if !alerts.has_webhook() {
        info!("No webhook configured, alerts go to logs only");
    }
    let sink: Arc<dyn AlertSink> = alerts.clone();
    let mut agents = build_agents(&config, &providers, sink)?;

    for agent in agents.iter_mut() {
        agent.start()?;
    }

    let status_server = config.status.port.map(|port| {
        let state = Arc::new(StatusState::new(agents.iter().map(Agent::view).collect()));
        tokio::spawn(async move {
            if let Err(e) = StatusServer::new(state, port).run().await {
                error!("Status server stopped: {}", e);
            }
        })
    });

    info!(agents = agents.len(), "chainwatch running");
    shutdown_signal().await;
    info!("Shutdown signal received, stopping agents");

    for agent in agents.iter_mut() {
        agent.stop().await;
    }
    if let Some(handle) = status_server {
        handle.abort();
    }

    let suppressed = alerts.get_suppressed_counts().await;
    if !suppressed.is_empty() {
        info!(?suppressed, "Rate-limited alerts this session");
    }
    info!("Shutdown complete");
    Ok(())
}

fn check(config_dir: &Path) -> anyhow::Result<()> {
    let config = load(config_dir)?;

    if let Err(errors) = config.validate() {
        println!("\x1b[31m✗ Configuration has {} problem(s):\x1b[0m", errors.len());
        for e in &errors {
            println!("  - {}", e);
        }
        anyhow::bail!("invalid configuration");
    }

    println!("\x1b[32m✓ Configuration OK\x1b[0m");
    for agent in &config.agents {
        println!(
            "\n{} (every {} ms, {} tasks)",
            agent.name,
            agent.interval_ms,
            agent.tasks.len()
        );
        for (i, task) in agent.tasks.iter().enumerate() {
            println!("  {}. {}", i + 1, describe(&config, task));
        }
    }
    Ok(())
}

fn describe(config: &AppConfig, task: &TaskSpec) -> String {
    match task {
        TaskSpec::PriceThreshold(spec) => format!(
            "price_threshold {} {} {} via {}",
            spec.token,
            spec.direction,
            spec.threshold,
            config.route_for(spec).unwrap_or("?")
        ),
        TaskSpec::ArbitrageSpread(spec) => format!(
            "arbitrage_spread {} {} vs {} (min {}%)",
            spec.token, spec.route_a, spec.route_b, spec.min_profit_pct
        ),
        TaskSpec::SentimentShift(spec) => format!(
            "sentiment_shift {} over {}h (threshold {})",
            spec.symbol, spec.window_hours, spec.threshold
        ),
        TaskSpec::ContractEventScan(spec) => format!(
            "contract_event_scan {} [{}] lookback {}",
            spec.contract,
            spec.events.join(", "),
            spec.max_lookback
        ),
    }
}
