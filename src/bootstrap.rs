//! Wires providers, tasks and agents from `AppConfig`

use alloy::providers::ProviderBuilder;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::adapters::{
    parse_address, ChainEventFeed, DexRouterFeed, EvmEventFeed, PriceFeed, QuoteAssets,
    SentimentFeed, TwitterSentimentFeed, WebhookNotifier,
};
use crate::agent::Agent;
use crate::config::{AppConfig, NotifierConfig, TaskSpec};
use crate::error::{Result, WatchError};
use crate::supervisor::{AlertManager, AlertManagerConfig, AlertSink};
use crate::tasks::{
    ArbitrageSpreadTask, ContractEventScanTask, PriceThresholdTask, SentimentShiftTask, Task,
};

/// Data providers shared by every task
#[derive(Default, Clone)]
pub struct Providers {
    /// Price feeds by route name
    pub routes: HashMap<String, Arc<dyn PriceFeed>>,
    pub chain: Option<Arc<dyn ChainEventFeed>>,
    pub sentiment: Option<Arc<dyn SentimentFeed>>,
}

impl Providers {
    /// Connect the providers the configured tasks need.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut providers = Providers::default();

        if config.has_chain_tasks() {
            let eth = config
                .ethereum
                .as_ref()
                .ok_or_else(|| WatchError::configuration("missing [ethereum] section"))?;
            let rpc_url: url::Url = eth.rpc_url.parse().map_err(|e| {
                WatchError::configuration(format!("invalid RPC URL {}: {}", eth.rpc_url, e))
            })?;
            let provider = ProviderBuilder::new().connect_http(rpc_url);

            let assets = QuoteAssets {
                weth: parse_address(&eth.weth)?,
                usdc: parse_address(&eth.usdc)?,
                usdc_decimals: eth.usdc_decimals,
            };
            for (name, route) in &config.routes {
                let router = parse_address(&route.router)?;
                let feed = DexRouterFeed::new(name.clone(), router, assets, provider.clone());
                debug!(route = %name, %router, "Price route ready");
                providers.routes.insert(name.clone(), Arc::new(feed));
            }
            providers.chain = Some(Arc::new(EvmEventFeed::new(provider)));
            info!(rpc = %eth.rpc_url, routes = config.routes.len(), "Connected chain providers");
        }

        if config.has_sentiment_tasks() {
            let token = config.twitter.resolved_bearer_token().ok_or_else(|| {
                WatchError::configuration("sentiment tasks need a twitter bearer token")
            })?;
            let feed = TwitterSentimentFeed::new(&config.twitter.base_url, token)?
                .with_max_results(config.twitter.max_results);
            providers.sentiment = Some(Arc::new(feed));
            info!(base_url = %config.twitter.base_url, "Twitter sentiment feed ready");
        }

        Ok(providers)
    }

    fn route(&self, name: &str) -> Result<Arc<dyn PriceFeed>> {
        self.routes
            .get(name)
            .cloned()
            .ok_or_else(|| WatchError::configuration(format!("unknown route {}", name)))
    }
}

pub fn build_alert_manager(notifier: &NotifierConfig) -> Result<AlertManager> {
    let manager = AlertManager::new(AlertManagerConfig {
        rate_limit_secs: notifier.rate_limit_secs,
        notify_info: notifier.notify_info,
        max_alerts_per_minute: notifier.max_alerts_per_minute,
    });

    let webhook = notifier
        .webhook_url
        .clone()
        .filter(|url| !url.trim().is_empty())
        .map(WebhookNotifier::new)
        .transpose()?
        .or_else(WebhookNotifier::from_env);

    Ok(match webhook {
        Some(webhook) => manager.with_webhook(webhook),
        None => manager,
    })
}

/// Build one task from its spec, failing fast on bad parameters.
pub fn build_task(config: &AppConfig, spec: &TaskSpec, providers: &Providers) -> Result<Task> {
    let task = match spec {
        TaskSpec::PriceThreshold(spec) => {
            let route = config
                .route_for(spec)
                .ok_or_else(|| WatchError::configuration("price_threshold: no route configured"))?;
            PriceThresholdTask::new(spec.to_config(), providers.route(route)?)?.into()
        }
        TaskSpec::ArbitrageSpread(spec) => ArbitrageSpreadTask::new(
            spec.clone(),
            providers.route(&spec.route_a)?,
            providers.route(&spec.route_b)?,
        )?
        .into(),
        TaskSpec::SentimentShift(spec) => {
            let feed = providers
                .sentiment
                .clone()
                .ok_or_else(|| WatchError::configuration("no sentiment provider configured"))?;
            SentimentShiftTask::new(spec.clone(), feed)?.into()
        }
        TaskSpec::ContractEventScan(spec) => {
            let feed = providers
                .chain
                .clone()
                .ok_or_else(|| WatchError::configuration("no chain provider configured"))?;
            ContractEventScanTask::new(spec.clone(), feed)?.into()
        }
    };
    Ok(task)
}

/// Build every configured agent with its tasks assigned, not yet started.
pub fn build_agents(
    config: &AppConfig,
    providers: &Providers,
    sink: Arc<dyn AlertSink>,
) -> Result<Vec<Agent>> {
    let mut agents = Vec::with_capacity(config.agents.len());
    for agent_config in &config.agents {
        let mut agent = Agent::new(agent_config.name.clone(), Arc::clone(&sink))
            .with_interval(Duration::from_millis(agent_config.interval_ms));

        for spec in &agent_config.tasks {
            let task = build_task(config, spec, providers).map_err(|e| {
                WatchError::configuration(format!("agent {}: {}", agent_config.name, e))
            })?;
            agent.assign_task(task)?;
        }

        info!(
            agent = %agent.name(),
            tasks = agent.task_count(),
            interval_ms = agent_config.interval_ms,
            "Agent configured"
        );
        agents.push(agent);
    }
    Ok(agents)
}
