use thiserror::Error;

/// Main error type for chainwatch
#[derive(Error, Debug)]
pub enum WatchError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider failure: {0}")]
    ProviderFailure(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Data errors
    #[error("Data inconsistency: {0}")]
    DataInconsistency(String),

    // State machine errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for WatchError
pub type Result<T> = std::result::Result<T, WatchError>;

/// Failure classes a poll can end in.
///
/// Provider failures are transient and retried on the next cycle; data
/// inconsistencies suppress the alert for that poll; configuration errors are
/// raised when a task is built and should never be seen at poll time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ProviderFailure,
    DataInconsistency,
    Configuration,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ProviderFailure => "provider_failure",
            ErrorKind::DataInconsistency => "data_inconsistency",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl WatchError {
    /// Classify this error for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WatchError::Http(_) | WatchError::ProviderFailure(_) => ErrorKind::ProviderFailure,
            WatchError::Json(_) | WatchError::DataInconsistency(_) => {
                ErrorKind::DataInconsistency
            }
            WatchError::Config(_) | WatchError::Configuration(_) => ErrorKind::Configuration,
            WatchError::InvalidState(_)
            | WatchError::Io(_)
            | WatchError::Internal(_)
            | WatchError::Other(_) => ErrorKind::Internal,
        }
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        WatchError::ProviderFailure(msg.into())
    }

    pub fn inconsistent(msg: impl Into<String>) -> Self {
        WatchError::DataInconsistency(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        WatchError::Configuration(msg.into())
    }
}
