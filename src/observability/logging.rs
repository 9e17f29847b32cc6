//! Structured logging.
//!
//! # Responsibilities
//! - Define the lifecycle logging collaborator
//! - Forward lifecycle events to tracing by default
//! - Initialize the subscriber for binaries
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Log level configurable via config and `RUST_LOG`

use std::fmt;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sink for server lifecycle events.
///
/// Fields are free-form key-value pairs attached to the message.
pub trait Logger: Send + Sync + 'static {
    /// Log an informational event.
    fn info(&self, msg: &str, fields: &[(&str, String)]);

    /// Log an error event.
    fn error(&self, msg: &str, fields: &[(&str, String)]);
}

/// Default [`Logger`] that emits tracing events tagged with a component name.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    component: &'static str,
}

impl TracingLogger {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("httpserver")
    }
}

impl Logger for TracingLogger {
    fn info(&self, msg: &str, fields: &[(&str, String)]) {
        tracing::info!(component = self.component, fields = %Fields(fields), "{msg}");
    }

    fn error(&self, msg: &str, fields: &[(&str, String)]) {
        tracing::error!(component = self.component, fields = %Fields(fields), "{msg}");
    }
}

/// Renders `key=value` pairs separated by spaces.
struct Fields<'a>(&'a [(&'a str, String)]);

impl fmt::Display for Fields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_level` when set.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("httpserver={default_level},tower_http={default_level}").into()
    });

    // A subscriber may already be installed (tests, embedding applications).
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
