//! Error types for the Dune client.
//!
//! Defines the error enum returned by every client operation.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::types::{ExecutionId, ExecutionState, QueryId};

/// Main error type for Dune client operations.
#[derive(Error, Debug)]
pub enum DuneError {
    /// The API rejected an execution request (unknown query, bad parameters, quota).
    #[error("Submission error: {0}")]
    Submission(String),

    /// Polling reached a terminal state other than COMPLETED.
    #[error("Execution {execution_id}{} yields incomplete terminal state {state}", of_query(.query_id))]
    IncompleteExecution {
        query_id: Option<QueryId>,
        execution_id: ExecutionId,
        state: ExecutionState,
    },

    /// Network or protocol failure on any request, including page continuations.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response body or header could not be interpreted.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Query parameters were rejected before any request was made.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Configuration errors (missing API key, invalid base URL, bad config file).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The optional polling deadline passed before a terminal state was seen.
    #[error("Execution {execution_id}{} still running after {waited:?}", of_query(.query_id))]
    PollTimeout {
        query_id: Option<QueryId>,
        execution_id: ExecutionId,
        waited: Duration,
    },

    /// The caller's cancellation token fired while polling.
    #[error("Polling of execution {execution_id}{} was aborted", of_query(.query_id))]
    Aborted {
        query_id: Option<QueryId>,
        execution_id: ExecutionId,
    },
}

fn of_query(query_id: &Option<QueryId>) -> String {
    query_id.map(|id| format!(" of query {id}")).unwrap_or_default()
}

impl DuneError {
    /// Creates a submission error with the given message.
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    /// Creates a transport error with the given message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a malformed-response error with the given message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Creates an invalid-parameters error with the given message.
    pub fn invalid_parameters(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Prefixes the error message with `ctx`, keeping the variant.
    ///
    /// Structured variants already name their execution and are returned as is;
    /// use [`DuneError::for_query`] to attach the query to them.
    pub fn context(self, ctx: impl fmt::Display) -> Self {
        match self {
            Self::Submission(msg) => Self::Submission(format!("{ctx}: {msg}")),
            Self::Transport(msg) => Self::Transport(format!("{ctx}: {msg}")),
            Self::MalformedResponse(msg) => Self::MalformedResponse(format!("{ctx}: {msg}")),
            Self::InvalidParameters(msg) => Self::InvalidParameters(format!("{ctx}: {msg}")),
            Self::Config(msg) => Self::Config(format!("{ctx}: {msg}")),
            other => other,
        }
    }

    /// Attributes the error to `query_id`.
    ///
    /// Execution variants record the id in their `query_id` field unless one is
    /// already set; message variants get a `query {id}` prefix.
    pub fn for_query(self, query_id: QueryId) -> Self {
        match self {
            Self::IncompleteExecution {
                query_id: None,
                execution_id,
                state,
            } => Self::IncompleteExecution {
                query_id: Some(query_id),
                execution_id,
                state,
            },
            Self::PollTimeout {
                query_id: None,
                execution_id,
                waited,
            } => Self::PollTimeout {
                query_id: Some(query_id),
                execution_id,
                waited,
            },
            Self::Aborted {
                query_id: None,
                execution_id,
            } => Self::Aborted {
                query_id: Some(query_id),
                execution_id,
            },
            Self::IncompleteExecution { .. } | Self::PollTimeout { .. } | Self::Aborted { .. } => {
                self
            }
            other => other.context(format!("query {query_id}")),
        }
    }

    /// Returns the query an execution error belongs to, when known.
    pub fn query_id(&self) -> Option<QueryId> {
        match self {
            Self::IncompleteExecution { query_id, .. }
            | Self::PollTimeout { query_id, .. }
            | Self::Aborted { query_id, .. } => *query_id,
            _ => None,
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Submission(_) => "Submission Error",
            Self::IncompleteExecution { .. } => "Incomplete Execution",
            Self::Transport(_) => "Transport Error",
            Self::MalformedResponse(_) => "Malformed Response",
            Self::InvalidParameters(_) => "Invalid Parameters",
            Self::Config(_) => "Configuration Error",
            Self::PollTimeout { .. } => "Poll Timeout",
            Self::Aborted { .. } => "Aborted",
        }
    }
}

/// Extension for attaching context to fallible results.
pub trait ResultExt<T> {
    /// Wraps the error, if any, with `ctx`.
    fn context(self, ctx: impl fmt::Display) -> Result<T>;

    /// Attributes the error, if any, to `query_id`.
    fn for_query(self, query_id: QueryId) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, ctx: impl fmt::Display) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }

    fn for_query(self, query_id: QueryId) -> Result<T> {
        self.map_err(|e| e.for_query(query_id))
    }
}

/// Result type alias using DuneError.
pub type Result<T> = std::result::Result<T, DuneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_submission() {
        let err = DuneError::submission("Query not found");
        assert_eq!(err.to_string(), "Submission error: Query not found");
        assert_eq!(err.category(), "Submission Error");
    }

    #[test]
    fn test_error_display_incomplete_execution() {
        let err = DuneError::IncompleteExecution {
            query_id: None,
            execution_id: ExecutionId::new("01HXYZ"),
            state: ExecutionState::Failed,
        };
        assert_eq!(
            err.to_string(),
            "Execution 01HXYZ yields incomplete terminal state QUERY_STATE_FAILED"
        );
        assert_eq!(err.category(), "Incomplete Execution");
    }

    #[test]
    fn test_error_display_transport() {
        let err = DuneError::transport("connection refused");
        assert_eq!(err.to_string(), "Transport error: connection refused");
        assert_eq!(err.category(), "Transport Error");
    }

    #[test]
    fn test_error_display_config() {
        let err = DuneError::config("DUNE_API_KEY is not set");
        assert_eq!(err.to_string(), "Configuration error: DUNE_API_KEY is not set");
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_context_keeps_variant() {
        let err = DuneError::malformed("missing field `rows`").context("execution 01HXYZ");
        assert!(matches!(err, DuneError::MalformedResponse(_)));
        assert_eq!(
            err.to_string(),
            "Malformed response: execution 01HXYZ: missing field `rows`"
        );
    }

    #[test]
    fn test_context_leaves_structured_variants_alone() {
        let err = DuneError::Aborted {
            query_id: None,
            execution_id: ExecutionId::new("01HXYZ"),
        }
        .context("query 123");
        assert_eq!(err.to_string(), "Polling of execution 01HXYZ was aborted");
    }

    #[test]
    fn test_for_query_names_query_on_execution_errors() {
        let err = DuneError::IncompleteExecution {
            query_id: None,
            execution_id: ExecutionId::new("01HXYZ"),
            state: ExecutionState::Cancelled,
        }
        .for_query(123);
        assert_eq!(err.query_id(), Some(123));
        assert_eq!(
            err.to_string(),
            "Execution 01HXYZ of query 123 yields incomplete terminal state QUERY_STATE_CANCELLED"
        );

        let err = DuneError::PollTimeout {
            query_id: None,
            execution_id: ExecutionId::new("01HXYZ"),
            waited: Duration::from_secs(3),
        }
        .for_query(7);
        assert_eq!(err.to_string(), "Execution 01HXYZ of query 7 still running after 3s");
    }

    #[test]
    fn test_for_query_keeps_existing_query() {
        let err = DuneError::Aborted {
            query_id: Some(1),
            execution_id: ExecutionId::new("01HXYZ"),
        }
        .for_query(2);
        assert_eq!(err.query_id(), Some(1));
    }

    #[test]
    fn test_for_query_prefixes_message_variants() {
        let result: Result<()> = Err(DuneError::transport("timed out"));
        let err = result.for_query(42).unwrap_err();
        assert!(matches!(err, DuneError::Transport(_)));
        assert_eq!(err.to_string(), "Transport error: query 42: timed out");
        assert_eq!(err.query_id(), None);
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<()> = Err(DuneError::transport("timed out"));
        let err = result.context("query 42").unwrap_err();
        assert_eq!(err.to_string(), "Transport error: query 42: timed out");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DuneError>();
    }
}
