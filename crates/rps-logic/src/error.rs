//! Error type shared by every fallible arena operation

use thiserror::Error;

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ArenaError>;

#[derive(Debug, Error)]
pub enum ArenaError {
    /// A value that does not name one of the three moves
    #[error("invalid move: {0:?}")]
    InvalidMove(String),

    /// Rejected before any game is played
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Two roster entries share a name; their statistics would merge
    #[error("duplicate strategy name in roster: {0}")]
    DuplicateStrategy(String),

    /// A controller was asked to prefer an action it never registered
    #[error("unknown sub-policy: {0}")]
    UnknownAction(String),

    #[error("meta controller needs at least one sub-policy")]
    EmptyRegistry,

    #[error("worker pool: {0}")]
    WorkerPool(String),

    #[error("malformed arena description: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ArenaError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig { field, reason: reason.into() }
    }
}
