pub mod adapters;
pub mod agent;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod supervisor;
pub mod tasks;

pub use agent::{Agent, AgentState, AgentView, TaskInfo, TaskRunner};
pub use config::AppConfig;
pub use domain::{PollOutcome, PollReport, Severity, Signal};
pub use error::{ErrorKind, Result, WatchError};
pub use supervisor::{AlertEvent, AlertManager, AlertManagerConfig, AlertSink, MemorySink};
pub use tasks::{Task, TaskKind};
