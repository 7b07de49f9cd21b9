//! Error kinds surfaced by session operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Invalid settings from the config file or environment
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The Claude CLI could not be reached at all
    #[error("Claude CLI is not available or not working")]
    ToolUnavailable,

    /// The Claude CLI answered badly, timed out or reported an error
    #[error("{0}")]
    Tool(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Expired(String),
}

impl SessionError {
    /// Process exit code for this error kind (sysexits values)
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 78,
            Self::ToolUnavailable => 69,
            Self::Tool(_) => 70,
            Self::Storage(_) => 74,
            Self::NotFound(_) => 66,
            Self::Expired(_) => 65,
        }
    }
}
