//! Shutdown triggers for a running server.

use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::lifecycle::signals::{self, Signal};

/// What asked the server to shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// The caller's token (or the shared start scope) was cancelled.
    Cancelled,
    /// The process received a termination signal.
    Signal(Signal),
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::Cancelled => f.write_str("cancelled"),
            ShutdownTrigger::Signal(signal) => write!(f, "signal {signal}"),
        }
    }
}

/// Resolve on the first of: `scope` cancelled, SIGINT, SIGTERM.
///
/// Cancellation is checked first so an already-cancelled scope never waits
/// on signal installation.
pub async fn wait_for_trigger(scope: &CancellationToken) -> ShutdownTrigger {
    tokio::select! {
        biased;
        _ = scope.cancelled() => ShutdownTrigger::Cancelled,
        signal = signals::termination() => ShutdownTrigger::Signal(signal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancelled_scope_triggers_immediately() {
        let scope = CancellationToken::new();
        scope.cancel();
        assert_eq!(wait_for_trigger(&scope).await, ShutdownTrigger::Cancelled);
    }

    #[tokio::test]
    async fn child_scope_follows_parent() {
        let parent = CancellationToken::new();
        let scope = parent.child_token();
        let waiter = tokio::spawn(async move { wait_for_trigger(&scope).await });

        parent.cancel();
        let trigger = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(trigger, ShutdownTrigger::Cancelled);
    }

    #[test]
    fn triggers_display_their_cause() {
        assert_eq!(ShutdownTrigger::Signal(Signal::Terminate).to_string(), "signal terminated");
        assert_eq!(ShutdownTrigger::Cancelled.to_string(), "cancelled");
    }
}
