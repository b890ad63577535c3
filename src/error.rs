use std::fmt;
use std::time::Duration;

/// Errors that abort a send instead of resolving to a per-recipient
/// failure marker.
///
/// Per-recipient delivery failures are represented as [`SendOutcome`]
/// values and never surface here; only store unavailability and a
/// malformed input job reach the caller.
#[derive(Debug)]
pub enum FanoutError {
    /// The shared proxy/unsubscribe store is unreachable.
    /// Unrecoverable for the current process: running degraded would
    /// keep sending to unsubscribed or rate-limited endpoints.
    Store(StoreError),

    /// The input job failed validation before any delivery began.
    InvalidJob { message: String },
}

impl fmt::Display for FanoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanoutError::Store(err) =>
                write!(f, "shared store unavailable: {err}"),
            FanoutError::InvalidJob { message } =>
                write!(f, "invalid job: {message}"),
        }
    }
}

impl std::error::Error for FanoutError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FanoutError::Store(err) => Some(err),
            FanoutError::InvalidJob { .. } => None,
        }
    }
}

impl From<StoreError> for FanoutError {
    fn from(err: StoreError) -> Self {
        FanoutError::Store(err)
    }
}

/// Failure talking to the shared proxy/unsubscribe store.
#[derive(Debug)]
pub enum StoreError {
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(message) =>
                write!(f, "{message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Outcome of one delivery attempt for one (recipient, attempt) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Receiver accepted the payload (204).
    Delivered,

    /// Receiver signalled "stop sending" (401/403/404). Terminal, never
    /// retried. Carries the recipient identifier extracted from the
    /// response URL when it still matched the endpoint pattern.
    Unsubscribed(Option<String>),

    /// Receiver rate-limited the request (429) and asked for a cooldown.
    RateLimited { retry_after: Duration },

    /// No classifiable response was obtained (connect error, timeout).
    TransientFailure,

    /// Any other status. Logged with diagnostics and retried under the
    /// same bounded budget as transient failures.
    PermanentFailure { status: u16, body: String },
}
