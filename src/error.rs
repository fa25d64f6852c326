//! Error types surfaced by this crate.

use http::StatusCode;

/// An error that occurred while opening or running a single stream connection.
///
/// This is the error type returned by [`crate::opener`]'s one-shot functions and fed to
/// [`crate::monitor::Monitor`]'s backoff-category dispatch (see `src/monitor.rs`). It is never
/// surfaced to a `Monitor` caller directly -- only [`UserError`] crosses that boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A non-2xx response from the Streaming API.
    #[error("unexpected HTTP status: {0}")]
    Http(StatusCode),

    /// A transport-level failure (connect/DNS/reset) opening or reading the stream.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The stream's inactivity timeout elapsed.
    #[error("stream timed out")]
    TimedOut,

    /// Any other failure while opening a stream, routed to the `other` backoff curve.
    #[error("stream error: {0}")]
    Custom(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn custom<E>(error: E) -> Self
    where
        Box<dyn std::error::Error + Send + Sync>: From<E>,
    {
        Error::Custom(From::from(error))
    }

    pub fn transport<E>(error: E) -> Self
    where
        Box<dyn std::error::Error + Send + Sync>: From<E>,
    {
        Error::Transport(From::from(error))
    }

    /// Which backoff category this error routes to.
    pub fn category(&self) -> crate::backoff::Category {
        use crate::backoff::Category;
        match self {
            Error::Transport(_) | Error::TimedOut => Category::Transport,
            Error::Http(_) => Category::Http,
            Error::Custom(_) => Category::Other,
        }
    }
}

/// The only two errors ever surfaced synchronously to a [`crate::monitor::Monitor`] caller.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum UserError {
    /// `connect()` was called while the service is not running.
    #[error("service not running")]
    NotRunning,
    /// `connect()` was called while idle with no delegate configured.
    #[error("no delegate configured")]
    NoDelegate,
}

/// The reason the stream's underlying response body ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The body completed normally.
    Clean,
    /// The body length was not known in advance and the connection closed after data was sent;
    /// treated the same as `Clean`.
    PotentialDataLoss,
}
