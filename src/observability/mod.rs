//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Server lifecycle events
//!     → Logger trait (info / error with key-value fields)
//!     → TracingLogger (default) → tracing events → tracing-subscriber
//!
//! Per-request events
//!     → tower_http TraceLayer spans
//! ```
//!
//! # Design Decisions
//! - Structured logging through the tracing crate
//! - The lifecycle logger is a trait so callers can route events elsewhere
//! - Log level configurable via config and environment

pub mod logging;

pub use logging::{Logger, TracingLogger};
