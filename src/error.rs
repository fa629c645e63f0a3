// Error types for the geo traceroute service

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Reasons a trace target is refused before it reaches the trace utility
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("target is empty")]
    Empty,

    #[error("target is {0} characters long, the limit is 253")]
    TooLong(usize),

    #[error("target contains illegal character {0:?}")]
    IllegalCharacter(char),

    #[error("target must not start with '-'")]
    LeadingHyphen,
}

/// Why a single hop could not be geolocated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    #[error("lookup timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("lookup service answered HTTP {0}")]
    Status(u16),

    #[error("malformed lookup response: {0}")]
    Malformed(String),

    #[error("lookup service rejected the address: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for LookupFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LookupFailure::Timeout
        } else if e.is_decode() {
            LookupFailure::Malformed(e.to_string())
        } else {
            LookupFailure::Transport(e.to_string())
        }
    }
}

impl AppError {
    /// Convert error to user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidTarget(e) => {
                format!("Invalid target ({}). Please provide a hostname or IPv4 address.", e)
            }
            AppError::Config(_) => {
                "Configuration error. Check your config file or command-line arguments.".to_string()
            }
            AppError::Io(_) => "File system error. Check permissions and disk space.".to_string(),
            AppError::Serialization(_) => {
                "Data format error. This might be a bug, please report it.".to_string()
            }
        }
    }
}
