//! Crate-wide error taxonomy
//!
//! One `AgentError` enum covers the boundary between components; each
//! component still has its own local error type (`ProviderError`,
//! `rusqlite::Error`) which gets folded in via `#[from]`.

use thiserror::Error;

use crate::llm::provider::ProviderError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("history store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("tool dispatch error: {0}")]
    Dispatch(String),

    #[error("tool '{0}' is not registered")]
    UnknownTool(String),

    #[error("required argument '{arg}' missing for tool '{tool}'")]
    MissingArgument { tool: String, arg: String },

    #[error("part codec error: {0}")]
    Codec(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("step budget of {0} rounds exceeded")]
    StepBudgetExceeded(usize),

    #[error("agent loop terminated: {0}")]
    LoopTerminated(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;
