//! Error types for the reconciliation engine and its ports.

use thiserror::Error;

/// Errors returned by an alert-silencing or ticketing backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The requested silence or ticket does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend answered with an unexpected HTTP status.
    #[error("unexpected status code {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The backend cannot perform the operation (e.g. no matching workflow transition).
    #[error("{0}")]
    Invalid(String),

    /// A failure annotated with the step that produced it.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<BackendError>,
    },
}

impl BackendError {
    /// Prefix the error with the step that failed.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap any error as a transport failure.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(err))
    }
}

/// Errors returned by a metrics publisher.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Publisher configuration is incomplete.
    #[error("invalid metrics configuration: {0}")]
    Config(String),

    /// Metrics could not be delivered to the backend.
    #[error("failed to push metrics: {0}")]
    Push(String),

    /// Publisher could not be shut down cleanly.
    #[error("failed to close metrics publisher: {0}")]
    Close(String),
}

/// Failure of the primary step while processing one silence.
#[derive(Debug, Error)]
pub enum SilenceError {
    #[error("failed to get ticket {ticket}: {source}")]
    FetchTicket {
        ticket: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to delete silence: {0}")]
    Delete(#[source] BackendError),

    #[error("failed to extend silence: {0}")]
    Extend(#[source] BackendError),

    #[error("failed to extend expired silence: {0}")]
    ExtendExpired(#[source] BackendError),
}

/// Errors produced during a reconciliation run.
///
/// `ListSilences` aborts the run. Every other variant is collected in
/// [`RunResult::errors`](crate::RunResult::errors) while the run continues.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to list silences: {0}")]
    ListSilences(#[source] BackendError),

    #[error("silence {silence_id}: {source}")]
    Silence {
        silence_id: String,
        #[source]
        source: SilenceError,
    },

    #[error("check refired alerts: failed to get alerts: {0}")]
    QueryAlerts(#[source] BackendError),

    #[error("reopen ticket {ticket}: {source}")]
    ReopenTicket {
        ticket: String,
        #[source]
        source: BackendError,
    },

    #[error("create silence for {ticket}: {source}")]
    CreateSilence {
        ticket: String,
        #[source]
        source: BackendError,
    },

    #[error("push metrics: {0}")]
    PushMetrics(#[source] MetricsError),
}
