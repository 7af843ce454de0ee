use std::io;
use thiserror::Error;

/// Custom error type for procwatch
#[derive(Error, Debug)]
pub enum ProcwatchError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to enumerate processes: {0}")]
    Enumeration(String),

    #[error("Process {0} not found")]
    ProcessNotFound(u32),

    #[error("Failed to terminate process {pid}: {reason}")]
    TerminationFailed { pid: u32, reason: String },

    #[error("Field read failed: {0}")]
    Field(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for procwatch
pub type Result<T> = std::result::Result<T, ProcwatchError>;

impl ProcwatchError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        ProcwatchError::Config(msg.into())
    }

    /// Create an enumeration error
    pub fn enumeration<S: Into<String>>(msg: S) -> Self {
        ProcwatchError::Enumeration(msg.into())
    }

    /// Create a termination error for `pid`
    pub fn termination_failed<S: Into<String>>(pid: u32, reason: S) -> Self {
        ProcwatchError::TerminationFailed {
            pid,
            reason: reason.into(),
        }
    }

    pub fn field<S: Into<String>>(msg: S) -> Self {
        ProcwatchError::Field(msg.into())
    }

    pub fn runtime<S: Into<String>>(msg: S) -> Self {
        ProcwatchError::Runtime(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        ProcwatchError::Other(msg.into())
    }

    /// True when the error means the process no longer exists
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProcwatchError::ProcessNotFound(_))
    }
}
