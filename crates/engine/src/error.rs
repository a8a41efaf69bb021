//! Error types for the query engine

use einsum::{EvalError, SubscriptError};

/// Errors that can occur while preparing or running a query
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The surface parser rejected the query text
    #[error("unparsable query: {0}")]
    Unparsable(String),

    /// The deadline passed while the join was still evaluating
    #[error("query processing deadline exceeded")]
    ProcessingTimeout,

    /// The deadline passed while results were being drained
    #[error("response serialization deadline exceeded")]
    SerializationTimeout,

    /// Internal invariant violation (should not happen in normal use)
    #[error("internal error: {0}")]
    Unexpected(String),
}

impl From<crate::query::ParseError> for EngineError {
    fn from(err: crate::query::ParseError) -> Self {
        EngineError::Unparsable(err.reason)
    }
}

impl From<SubscriptError> for EngineError {
    fn from(err: SubscriptError) -> Self {
        EngineError::Unexpected(err.to_string())
    }
}

impl From<EvalError> for EngineError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::ProcessingTimeout => EngineError::ProcessingTimeout,
        }
    }
}
