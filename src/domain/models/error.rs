use thiserror::Error;

/// Failure classes for everything that crosses the wire. Transport errors on
/// idempotent reads may be retried; the rest surface directly in session
/// state.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out")]
    Timeout,

    #[error("server error {status}: {detail}")]
    ServerError { status: u16, detail: String },

    #[error("request rejected {status}: {detail}")]
    ClientError { status: u16, detail: String },

    #[error("stream failed: {0}")]
    StreamFailed(String),

    #[error("history unavailable: {0}")]
    HistoryUnavailable(String),
}
