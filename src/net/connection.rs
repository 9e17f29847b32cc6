//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Track open connections (and the listener) for graceful shutdown
//! - Generate unique connection IDs for tracing
//! - Serve one connection with hyper, reacting to drain, kill and idle signals
//!
//! # Design Decisions
//! - Draining asks hyper to finish the in-flight request, then close
//! - Killing drops the connection future, closing the socket at once
//! - Idle connections are drained, never killed

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::ConnectInfo, http::Request, Router};
use axum_server::accept::Accept;
use axum_server::tls_rustls::RustlsAcceptor;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::net::tls::NextProtoHook;
use crate::observability::Logger;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts live connections so shutdown can wait for them.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<watch::Sender<u64>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { active: Arc::new(tx) }
    }

    /// Record a new live resource. Returns a guard that releases it on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active.send_modify(|n| *n += 1);
        ConnectionGuard {
            active: Arc::clone(&self.active),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        *self.active.borrow()
    }

    /// Resolve once every guard has been dropped.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        // The sender lives in `self`, so this only ends when the count hits zero.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<watch::Sender<u64>>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Request activity on one connection, for keep-alive idle detection.
#[derive(Debug, Clone)]
struct Activity {
    inner: Arc<ActivityInner>,
}

#[derive(Debug)]
struct ActivityInner {
    origin: Instant,
    last_millis: AtomicU64,
    in_flight: AtomicUsize,
}

impl Activity {
    fn new() -> Self {
        Self {
            inner: Arc::new(ActivityInner {
                origin: Instant::now(),
                last_millis: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    fn begin(&self) -> Busy {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        self.touch();
        Busy(self.clone())
    }

    fn touch(&self) {
        let now = self.inner.origin.elapsed().as_millis() as u64;
        self.inner.last_millis.store(now, Ordering::SeqCst);
    }

    fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.inner.last_millis.load(Ordering::SeqCst));
        self.inner.origin.elapsed().saturating_sub(last)
    }

    /// Resolve once no request has been active for `timeout`; never without one.
    async fn idle(&self, timeout: Option<Duration>) {
        let Some(timeout) = timeout else {
            return std::future::pending().await;
        };
        loop {
            let busy = self.inner.in_flight.load(Ordering::SeqCst) > 0;
            let idle_for = self.idle_for();
            if !busy && idle_for >= timeout {
                return;
            }
            let wait = if busy { timeout } else { timeout - idle_for };
            tokio::time::sleep(wait).await;
        }
    }
}

/// Marks one request in flight.
struct Busy(Activity);

impl Drop for Busy {
    fn drop(&mut self) {
        self.0.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.0.touch();
    }
}

/// Everything a connection task needs, shared by all connections of a server.
#[derive(Clone)]
pub struct ConnectionContext {
    pub app: Router,
    pub builder: Builder<TokioExecutor>,
    pub drain: CancellationToken,
    pub kill: CancellationToken,
    pub idle_timeout: Option<Duration>,
    pub error_log: Arc<dyn Logger>,
}

impl ConnectionContext {
    /// Complete a TLS handshake, then serve the connection.
    ///
    /// A connection still in its handshake when the server drains is dropped;
    /// it has no request in flight. The acceptor bounds the handshake itself.
    pub async fn serve_tls(
        self,
        acceptor: RustlsAcceptor,
        next_proto: Option<NextProtoHook>,
        stream: TcpStream,
        peer: SocketAddr,
        guard: ConnectionGuard,
    ) {
        let handshake = tokio::select! {
            _ = self.kill.cancelled() => return,
            _ = self.drain.cancelled() => {
                tracing::debug!(connection_id = %guard.id(), "Dropping connection mid-handshake");
                return;
            }
            result = acceptor.accept(stream, ()) => result,
        };

        match handshake {
            Ok((tls, ())) => {
                if let Some(hook) = &next_proto {
                    hook(tls.get_ref().1.alpn_protocol(), peer);
                }
                self.serve(tls, peer, guard).await;
            }
            Err(e) => {
                self.error_log.error(
                    "TLS handshake failed",
                    &[("peer", peer.to_string()), ("error", e.to_string())],
                );
            }
        }
    }

    /// Serve HTTP/1 or HTTP/2 on `io` until the peer leaves or the server
    /// drains or kills it.
    pub async fn serve<I>(self, io: I, peer: SocketAddr, guard: ConnectionGuard)
    where
        I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        tracing::trace!(connection_id = %guard.id(), peer_addr = %peer, "Connection accepted");

        let activity = Activity::new();
        let service = {
            let app = self.app.clone();
            let activity = activity.clone();
            hyper::service::service_fn(move |mut request: Request<Incoming>| {
                let busy = activity.begin();
                request.extensions_mut().insert(ConnectInfo(peer));
                let app = app.clone();
                async move {
                    let response = app.oneshot(request).await;
                    drop(busy);
                    response
                }
            })
        };

        let conn = self.builder.serve_connection_with_upgrades(TokioIo::new(io), service);
        tokio::pin!(conn);
        let mut draining = false;

        loop {
            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(e) = result {
                        self.error_log.error(
                            "error serving connection",
                            &[("peer", peer.to_string()), ("error", e.to_string())],
                        );
                    }
                    break;
                }
                _ = self.kill.cancelled() => {
                    tracing::debug!(connection_id = %guard.id(), "Connection force closed");
                    break;
                }
                _ = self.drain.cancelled(), if !draining => {
                    draining = true;
                    conn.as_mut().graceful_shutdown();
                }
                _ = activity.idle(self.idle_timeout), if !draining => {
                    tracing::debug!(connection_id = %guard.id(), "Closing idle connection");
                    draining = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        }

        drop(guard);
    }
}
