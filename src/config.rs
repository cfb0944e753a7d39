use config::{Config, ConfigError, Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::adapters::parse_address;
use crate::domain::numeric::MAX_DECIMAL_SCALE;
use crate::domain::Direction;
use crate::tasks::{
    is_event_signature, ArbitrageSpreadConfig, ContractEventScanConfig, PriceThresholdConfig,
    SentimentShiftConfig,
};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub ethereum: Option<EthereumConfig>,
    /// Uniswap-V2-compatible routers by name
    #[serde(default)]
    pub routes: BTreeMap<String, RouteConfig>,
    #[serde(default)]
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info,chainwatch=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StatusConfig {
    /// Status server port; disabled when unset
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_rate_limit_secs")]
    pub rate_limit_secs: u64,
    #[serde(default)]
    pub notify_info: bool,
    #[serde(default = "default_max_alerts_per_minute")]
    pub max_alerts_per_minute: u32,
}

fn default_rate_limit_secs() -> u64 {
    60
}

fn default_max_alerts_per_minute() -> u32 {
    10
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            rate_limit_secs: default_rate_limit_secs(),
            notify_info: false,
            max_alerts_per_minute: default_max_alerts_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EthereumConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Intermediate asset for price paths
    pub weth: String,
    /// Quote asset
    pub usdc: String,
    #[serde(default = "default_usdc_decimals")]
    pub usdc_decimals: u8,
}

fn default_usdc_decimals() -> u8 {
    6
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    /// Router contract address
    pub router: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwitterConfig {
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_twitter_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_twitter_base_url() -> String {
    crate::adapters::twitter::DEFAULT_BASE_URL.to_string()
}

fn default_max_results() -> u32 {
    100
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            base_url: default_twitter_base_url(),
            max_results: default_max_results(),
        }
    }
}

impl TwitterConfig {
    /// Configured token, falling back to `TWITTER_BEARER_TOKEN`
    pub fn resolved_bearer_token(&self) -> Option<String> {
        self.bearer_token
            .clone()
            .or_else(|| std::env::var("TWITTER_BEARER_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}

fn default_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskSpec {
    PriceThreshold(PriceThresholdSpec),
    ArbitrageSpread(ArbitrageSpreadConfig),
    SentimentShift(SentimentShiftConfig),
    ContractEventScan(ContractEventScanConfig),
}

impl TaskSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskSpec::PriceThreshold(_) => "price_threshold",
            TaskSpec::ArbitrageSpread(_) => "arbitrage_spread",
            TaskSpec::SentimentShift(_) => "sentiment_shift",
            TaskSpec::ContractEventScan(_) => "contract_event_scan",
        }
    }

    pub fn needs_chain(&self) -> bool {
        !matches!(self, TaskSpec::SentimentShift(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceThresholdSpec {
    pub token: String,
    pub threshold: Decimal,
    #[serde(default)]
    pub direction: Direction,
    /// Route to quote on; defaults to the first configured route
    #[serde(default)]
    pub route: Option<String>,
}

impl PriceThresholdSpec {
    pub fn to_config(&self) -> PriceThresholdConfig {
        PriceThresholdConfig {
            token: self.token.clone(),
            threshold: self.threshold,
            direction: self.direction,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overrides (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("CHAINWATCH_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // CHAINWATCH_ETHEREUM__RPC_URL, CHAINWATCH_TWITTER__BEARER_TOKEN, ...
            .add_source(
                Environment::with_prefix("CHAINWATCH")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Route used by a price task: the named one, else the first configured
    pub fn route_for<'a>(&'a self, spec: &'a PriceThresholdSpec) -> Option<&'a str> {
        match &spec.route {
            Some(route) => Some(route.as_str()),
            None => self.routes.keys().next().map(String::as_str),
        }
    }

    pub fn has_sentiment_tasks(&self) -> bool {
        self.agents
            .iter()
            .flat_map(|a| a.tasks.iter())
            .any(|t| matches!(t, TaskSpec::SentimentShift(_)))
    }

    pub fn has_chain_tasks(&self) -> bool {
        self.agents
            .iter()
            .flat_map(|a| a.tasks.iter())
            .any(TaskSpec::needs_chain)
    }

    /// Validate configuration values, collecting every problem
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.agents.is_empty() {
            errors.push("no agents configured".to_string());
        }

        let mut names = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                errors.push("agent name must not be empty".to_string());
            } else if !names.insert(agent.name.as_str()) {
                errors.push(format!("duplicate agent name: {}", agent.name));
            }
            if agent.interval_ms == 0 {
                errors.push(format!("agent {}: interval_ms must be > 0", agent.name));
            }
            if agent.tasks.is_empty() {
                errors.push(format!("agent {}: no tasks", agent.name));
            }
            for (i, task) in agent.tasks.iter().enumerate() {
                let at = format!("agent {} task #{} ({})", agent.name, i + 1, task.kind());
                self.validate_task(&at, task, &mut errors);
            }
        }

        if self.has_chain_tasks() {
            match &self.ethereum {
                None => errors.push("ethereum section is required for on-chain tasks".to_string()),
                Some(eth) => {
                    if url::Url::parse(&eth.rpc_url).is_err() {
                        errors.push(format!("ethereum.rpc_url is not a valid URL: {}", eth.rpc_url));
                    }
                    for (field, value) in [("weth", &eth.weth), ("usdc", &eth.usdc)] {
                        if parse_address(value).is_err() {
                            errors.push(format!("ethereum.{} is not an address: {}", field, value));
                        }
                    }
                    if u32::from(eth.usdc_decimals) > MAX_DECIMAL_SCALE {
                        errors.push(format!(
                            "ethereum.usdc_decimals must be <= {}",
                            MAX_DECIMAL_SCALE
                        ));
                    }
                }
            }
        }
        for (name, route) in &self.routes {
            if parse_address(&route.router).is_err() {
                errors.push(format!("routes.{}.router is not an address: {}", name, route.router));
            }
        }

        if self.has_sentiment_tasks() && self.twitter.resolved_bearer_token().is_none() {
            errors.push(
                "sentiment tasks need twitter.bearer_token or TWITTER_BEARER_TOKEN".to_string(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_task(&self, at: &str, task: &TaskSpec, errors: &mut Vec<String>) {
        let known_route = |route: &str| self.routes.contains_key(route);
        match task {
            TaskSpec::PriceThreshold(spec) => {
                if parse_address(&spec.token).is_err() {
                    errors.push(format!("{}: token is not an address: {}", at, spec.token));
                }
                if spec.threshold <= Decimal::ZERO {
                    errors.push(format!("{}: threshold must be positive", at));
                }
                match self.route_for(spec) {
                    None => errors.push(format!("{}: no route configured", at)),
                    Some(route) if !known_route(route) => {
                        errors.push(format!("{}: unknown route {}", at, route))
                    }
                    Some(_) => {}
                }
            }
            TaskSpec::ArbitrageSpread(spec) => {
                if parse_address(&spec.token).is_err() {
                    errors.push(format!("{}: token is not an address: {}", at, spec.token));
                }
                if spec.min_profit_pct < Decimal::ZERO {
                    errors.push(format!("{}: min_profit_pct must not be negative", at));
                }
                if spec.route_a == spec.route_b {
                    errors.push(format!("{}: route_a and route_b must differ", at));
                }
                for route in [&spec.route_a, &spec.route_b] {
                    if !known_route(route) {
                        errors.push(format!("{}: unknown route {}", at, route));
                    }
                }
            }
            TaskSpec::SentimentShift(spec) => {
                if spec.threshold <= Decimal::ZERO {
                    errors.push(format!("{}: threshold must be positive", at));
                }
                if spec.window_hours == 0 {
                    errors.push(format!("{}: window_hours must be > 0", at));
                }
            }
            TaskSpec::ContractEventScan(spec) => {
                if parse_address(&spec.contract).is_err() {
                    errors.push(format!("{}: contract is not an address: {}", at, spec.contract));
                }
                if spec.events.is_empty() {
                    errors.push(format!("{}: no events listed", at));
                }
                for sig in spec.events.iter().filter(|s| !is_event_signature(s)) {
                    errors.push(format!("{}: malformed event signature {:?}", at, sig));
                }
                if spec.max_lookback == 0 {
                    errors.push(format!("{}: max_lookback must be > 0", at));
                }
                if spec.seen_capacity < 2 {
                    errors.push(format!("{}: seen_capacity must be >= 2", at));
                }
            }
        }
    }
}
