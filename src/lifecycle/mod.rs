//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! State (state.rs):
//!     NotStarted → Running → ShuttingDown → Stopped
//!                  Running ─────────────→ Stopped   (force close)
//!
//! Shutdown (shutdown.rs):
//!     Caller cancellation or signal → Stop accepting → Drain connections → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: forced close after deadline
//! - Nothing leaves Stopped; a server instance runs once

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::ShutdownTrigger;
pub use state::Lifecycle;
