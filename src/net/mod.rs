//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept error classification)
//!     → tls.rs (optional rustls handshake + next-protocol hook)
//!     → connection.rs (tracking, hyper serving, drain / kill / idle)
//!     → application Router
//!
//! Connection States:
//!     Active → Draining → Closed
//! ```
//!
//! # Design Decisions
//! - Each connection is tracked so shutdown can wait for it
//! - Draining lets the in-flight request finish; killing drops it
//! - TLS is optional and handled transparently

pub mod connection;
pub mod listener;
pub mod tls;
