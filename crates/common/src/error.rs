//! Error types for Boardroom.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoardroomError {
    #[error("Agent error: {0}")]
    Agent(String),

    #[error("LLM error: {0}")]
    Llm(String),

    /// Non-success HTTP status from the model provider.
    #[error("LLM error: provider returned {status}: {message}")]
    Provider {
        status: u16,
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// The provider did not answer in time.
    #[error("LLM error: request timed out: {0}")]
    Timeout(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BoardroomError>;
