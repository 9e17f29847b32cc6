//! Server lifecycle states.

use std::fmt;

/// Observable lifecycle of a server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Constructed, nothing bound yet.
    NotStarted,
    /// Listener bound and accepting.
    Running,
    /// No longer accepting; in-flight requests are draining.
    ShuttingDown,
    /// Terminal.
    Stopped,
}

impl Lifecycle {
    /// Whether `self → next` is a legal move.
    pub fn can_transition_to(self, next: Lifecycle) -> bool {
        use Lifecycle::*;
        matches!(
            (self, next),
            (NotStarted, Running)
                | (NotStarted, Stopped)
                | (Running, ShuttingDown)
                | (Running, Stopped)
                | (ShuttingDown, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == Lifecycle::Stopped
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::NotStarted => "not-started",
            Lifecycle::Running => "running",
            Lifecycle::ShuttingDown => "shutting-down",
            Lifecycle::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
