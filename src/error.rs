//! Error taxonomy for the server lifecycle.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`Server`](crate::Server) construction and lifecycle calls.
///
/// Construction errors (`EmptyAddress`, `MissingHandler`) never leave a bound
/// socket behind. The remaining variants are only produced once a server has
/// been asked to start.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address was empty.
    #[error("server address cannot be empty")]
    EmptyAddress,

    /// No request handler was supplied.
    #[error("server handler cannot be missing")]
    MissingHandler,

    /// Binding or accepting on the listener failed.
    #[error("server failed to start: {0}")]
    Start(#[source] io::Error),

    /// Graceful shutdown did not complete.
    #[error("server failed to stop: {0}")]
    Stop(#[source] StopFailure),

    /// The last-resort close could not release every connection.
    #[error("server force close failed: {remaining} connection(s) still open")]
    ForceClose { remaining: u64 },
}

impl ServerError {
    /// True for errors raised before any network resource was acquired.
    pub fn is_construction(&self) -> bool {
        matches!(self, ServerError::EmptyAddress | ServerError::MissingHandler)
    }

    /// The underlying I/O error kind for start failures.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            ServerError::Start(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Why a graceful stop gave up.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StopFailure {
    /// In-flight connections outlived the grace period.
    #[error("graceful shutdown timed out after {0:?}")]
    TimedOut(Duration),

    /// The stop was aborted by its caller before connections drained.
    #[error("graceful shutdown was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_errors_are_distinct_from_runtime_errors() {
        assert!(ServerError::EmptyAddress.is_construction());
        assert!(ServerError::MissingHandler.is_construction());
        assert!(!ServerError::Stop(StopFailure::Cancelled).is_construction());
        assert!(!ServerError::ForceClose { remaining: 1 }.is_construction());
    }

    #[test]
    fn start_error_keeps_io_kind() {
        let err = ServerError::Start(io::Error::new(io::ErrorKind::AddrInUse, "taken"));
        assert_eq!(err.io_kind(), Some(io::ErrorKind::AddrInUse));
        assert!(err.to_string().starts_with("server failed to start"));
    }

    #[test]
    fn stop_failure_message_names_timeout() {
        let err = ServerError::Stop(StopFailure::TimedOut(Duration::from_secs(5)));
        assert_eq!(err.to_string(), "server failed to stop: graceful shutdown timed out after 5s");
    }
}
