//! TCP listener binding and accept error handling.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept `:port` shorthand for all interfaces
//! - Classify accept errors as transient or fatal

use std::io;
use std::time::Duration;

use tokio::net::TcpListener;

/// Pause after running out of file descriptors before accepting again.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Resolve `addr` and bind a listener on it.
pub async fn bind(addr: &str) -> io::Result<TcpListener> {
    let addr = normalize_address(addr);
    let listener = TcpListener::bind(&*addr).await?;

    tracing::info!(
        address = %listener.local_addr()?,
        "Listener bound"
    );

    Ok(listener)
}

/// `":8080"` binds every interface, as `"0.0.0.0:8080"`.
pub fn normalize_address(addr: &str) -> std::borrow::Cow<'_, str> {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}").into()
    } else {
        addr.into()
    }
}

/// How the accept loop should react to an accept error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptFailure {
    /// The peer went away before the handshake completed; try the next one.
    Retry,
    /// Out of descriptors; back off, then retry.
    Backoff,
    /// The listener is unusable.
    Fatal,
}

pub fn classify_accept_error(e: &io::Error) -> AcceptFailure {
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => AcceptFailure::Retry,
        // ENFILE / EMFILE
        _ if matches!(e.raw_os_error(), Some(23) | Some(24)) => AcceptFailure::Backoff,
        _ => AcceptFailure::Fatal,
    }
}
