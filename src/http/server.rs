//! HTTP server lifecycle coordination.
//!
//! # Responsibilities
//! - Bind the configured address and accept connections
//! - Wire transport middleware (read/write timeouts, tracing) around the handler
//! - Race the accept loop against the shutdown watcher
//! - Graceful stop with a bounded grace period, force close as fallback
//!
//! # Design Decisions
//! - Start joins both tasks before returning; the first error wins
//! - Cancellation alone is a clean exit, not an error
//! - The graceful stop runs under its own timeout, never the caller's token
//! - A server instance runs once; nothing leaves `Stopped`

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use axum::{http::StatusCode, Router};
use axum_server::tls_rustls::RustlsAcceptor;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::{
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

use crate::error::{ServerError, StopFailure};
use crate::http::options::{ServerBuilder, ServerOption, ServerParts};
use crate::lifecycle::shutdown::wait_for_trigger;
use crate::lifecycle::{Lifecycle, ShutdownTrigger};
use crate::net::connection::{ConnectionContext, ConnectionTracker};
use crate::net::listener::{self, classify_accept_error, AcceptFailure, ACCEPT_BACKOFF};

/// How long a force close waits for connection tasks to let go.
pub const FORCE_CLOSE_WAIT: Duration = Duration::from_secs(1);

/// Handles that exist once the listener is bound.
#[derive(Debug)]
struct Runtime {
    local_addr: SocketAddr,
    /// Stop accepting; ask connections to finish and close.
    drain: CancellationToken,
    /// Drop every connection now.
    kill: CancellationToken,
    /// Live connections plus the listener itself.
    tracker: ConnectionTracker,
}

/// A single listening HTTP endpoint and its lifecycle.
///
/// `start` borrows the server for as long as it runs, so share it through an
/// `Arc` to call `stop` or `close` from elsewhere.
pub struct Server {
    address: String,
    handler: Router,
    parts: ServerParts,
    lifecycle: watch::Sender<Lifecycle>,
    started: AtomicBool,
    runtime: OnceLock<Runtime>,
}

impl Server {
    /// Create a server for `address` and `handler`, applying `options` in order.
    pub fn new(
        address: impl Into<String>,
        handler: Router,
        options: impl IntoIterator<Item = ServerOption>,
    ) -> Result<Self, ServerError> {
        ServerBuilder::new().address(address).handler(handler).options(options).build()
    }

    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub(crate) fn from_parts(address: String, handler: Router, parts: ServerParts) -> Self {
        let (lifecycle, _) = watch::channel(Lifecycle::NotStarted);
        Self {
            address,
            handler,
            parts,
            lifecycle,
            started: AtomicBool::new(false),
            runtime: OnceLock::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn grace_period(&self) -> Duration {
        self.parts.grace_period
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    /// Observe lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }

    /// The bound address, once `start` has bound the listener.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.runtime.get().map(|rt| rt.local_addr)
    }

    /// Wait until `start` has either bound the listener or given up.
    pub async fn listening(&self) -> Option<SocketAddr> {
        let mut rx = self.lifecycle.subscribe();
        let _ = rx.wait_for(|state| *state != Lifecycle::NotStarted).await;
        self.local_addr()
    }

    /// Serve until `ctx` is cancelled or a termination signal arrives, then
    /// shut down gracefully.
    pub async fn start(&self, ctx: CancellationToken) -> Result<(), ServerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            let err = ServerError::Start(io::Error::new(io::ErrorKind::AddrInUse, "server already started"));
            self.parts.logger.error("server failed to start", &[("error", err.to_string())]);
            return Err(err);
        }

        let settings = &self.parts.settings;
        self.parts.logger.info(
            "starting HTTP server",
            &[
                ("addr", self.address.clone()),
                ("read_timeout", format!("{:?}", settings.read_timeout)),
                ("write_timeout", format!("{:?}", settings.write_timeout)),
                ("idle_timeout", format!("{:?}", settings.idle_timeout)),
            ],
        );

        let (listener, local_addr) = match bind(&self.address).await {
            Ok(bound) => bound,
            Err(e) => {
                self.transition(Lifecycle::Stopped);
                let err = ServerError::Start(e);
                self.parts.logger.error("server failed to start", &[("error", err.to_string())]);
                return Err(err);
            }
        };

        let runtime = self.runtime.get_or_init(|| Runtime {
            local_addr,
            drain: CancellationToken::new(),
            kill: CancellationToken::new(),
            tracker: ConnectionTracker::new(),
        });
        self.transition(Lifecycle::Running);

        let scope = ctx.child_token();
        let first_error = OnceLock::new();

        let accept = async {
            if let Err(e) = self.accept_loop(listener, runtime).await {
                let _ = first_error.set(e);
            }
            // An external stop ends the loop too; the watcher must still finish.
            scope.cancel();
        };
        let watcher = async {
            if let Err(e) = self.watch_shutdown(&scope).await {
                let _ = first_error.set(e);
                scope.cancel();
            }
        };
        tokio::join!(accept, watcher);

        match first_error.into_inner() {
            Some(err) => {
                self.parts.logger.error("server stopped with error", &[("error", err.to_string())]);
                Err(err)
            }
            None => {
                self.parts.logger.info("server stopped gracefully", &[]);
                Ok(())
            }
        }
    }

    /// Stop accepting and give in-flight requests up to `timeout` to finish.
    ///
    /// On timeout, or if `abort` is cancelled first, connections are force
    /// closed and the stop failure is returned.
    pub async fn stop(&self, abort: &CancellationToken, timeout: Duration) -> Result<(), ServerError> {
        self.parts.logger.info("stopping HTTP server", &[("timeout", format!("{timeout:?}"))]);

        let Some(runtime) = self.runtime.get() else {
            return Ok(());
        };
        if self.lifecycle().is_terminal() {
            return Ok(());
        }

        self.transition(Lifecycle::ShuttingDown);
        runtime.drain.cancel();

        let outcome = tokio::select! {
            biased;
            _ = runtime.tracker.wait_idle() => Ok(()),
            _ = abort.cancelled() => Err(StopFailure::Cancelled),
            _ = tokio::time::sleep(timeout) => Err(StopFailure::TimedOut(timeout)),
        };

        match outcome {
            Ok(()) => {
                self.transition(Lifecycle::Stopped);
                self.parts.logger.info("HTTP server shutdown complete", &[]);
                Ok(())
            }
            Err(failure) => {
                let err = ServerError::Stop(failure);
                self.parts.logger.error("error during server shutdown", &[("error", err.to_string())]);
                // `close` logs its own failure; the stop error stays the one reported.
                let _ = self.close().await;
                Err(err)
            }
        }
    }

    /// Drop every connection without waiting for in-flight requests.
    ///
    /// A server that never started closes successfully.
    pub async fn close(&self) -> Result<(), ServerError> {
        self.parts.logger.info("force closing HTTP server", &[]);

        let Some(runtime) = self.runtime.get() else {
            return Ok(());
        };

        runtime.drain.cancel();
        runtime.kill.cancel();
        self.transition(Lifecycle::Stopped);

        if tokio::time::timeout(FORCE_CLOSE_WAIT, runtime.tracker.wait_idle()).await.is_err() {
            let err = ServerError::ForceClose { remaining: runtime.tracker.active_count() };
            self.parts.logger.error("error during force close", &[("error", err.to_string())]);
            return Err(err);
        }
        Ok(())
    }

    async fn accept_loop(&self, listener: TcpListener, runtime: &Runtime) -> Result<(), ServerError> {
        // Stop waits for this guard too, so it cannot report success while
        // the listener still accepts.
        let listening = runtime.tracker.track();

        let settings = &self.parts.settings;
        let context = ConnectionContext {
            app: self.app(),
            builder: settings.connection_builder(),
            drain: runtime.drain.clone(),
            kill: runtime.kill.clone(),
            idle_timeout: settings.effective_idle_timeout(),
            error_log: self.parts.error_log(),
        };
        let acceptor = settings.tls.clone().map(|config| {
            let acceptor = RustlsAcceptor::new(config);
            match settings.effective_read_header_timeout() {
                Some(limit) => acceptor.handshake_timeout(limit),
                None => acceptor,
            }
        });

        loop {
            let (stream, peer) = tokio::select! {
                biased;
                _ = runtime.drain.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => match classify_accept_error(&e) {
                        AcceptFailure::Retry => {
                            tracing::debug!(error = %e, "Transient accept error");
                            continue;
                        }
                        AcceptFailure::Backoff => {
                            context.error_log.error("accept error; retrying", &[("error", e.to_string())]);
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                        AcceptFailure::Fatal => return Err(ServerError::Start(e)),
                    },
                },
            };

            let guard = runtime.tracker.track();
            let context = context.clone();
            match &acceptor {
                Some(acceptor) => {
                    let hook = settings.tls_next_proto.clone();
                    tokio::spawn(context.serve_tls(acceptor.clone(), hook, stream, peer, guard));
                }
                None => {
                    tokio::spawn(context.serve(stream, peer, guard));
                }
            }
        }

        drop(listener);
        drop(listening);
        tracing::debug!(address = %runtime.local_addr, "Listener closed");
        Ok(())
    }

    async fn watch_shutdown(&self, scope: &CancellationToken) -> Result<(), ServerError> {
        match wait_for_trigger(scope).await {
            ShutdownTrigger::Cancelled => {
                self.parts.logger.info("context cancelled, initiating shutdown", &[]);
            }
            ShutdownTrigger::Signal(signal) => {
                self.parts.logger.info("received shutdown signal", &[("signal", signal.to_string())]);
            }
        }

        // A fresh token: the caller's may already be cancelled, and in-flight
        // requests still get their grace period.
        self.stop(&CancellationToken::new(), self.parts.grace_period).await
    }

    /// The handler wrapped in transport middleware.
    ///
    /// A handler that outlives the write timeout is answered with 503: the
    /// server, not the client, failed to respond in time.
    fn app(&self) -> Router {
        let settings = &self.parts.settings;
        let mut app = self.handler.clone();
        if !settings.write_timeout.is_zero() {
            app = app.layer(TimeoutLayer::with_status_code(
                StatusCode::SERVICE_UNAVAILABLE,
                settings.write_timeout,
            ));
        }
        if !settings.read_timeout.is_zero() {
            app = app.layer(RequestBodyTimeoutLayer::new(settings.read_timeout));
        }
        app.layer(TraceLayer::new_for_http())
    }

    fn transition(&self, next: Lifecycle) -> bool {
        self.lifecycle.send_if_modified(|state| {
            if state.can_transition_to(next) {
                tracing::debug!(from = %state, to = %next, "Lifecycle transition");
                *state = next;
                true
            } else {
                false
            }
        })
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.address)
            .field("settings", &self.parts.settings)
            .field("grace_period", &self.parts.grace_period)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

async fn bind(address: &str) -> io::Result<(TcpListener, SocketAddr)> {
    let listener = listener::bind(address).await?;
    let local_addr = listener.local_addr()?;
    Ok((listener, local_addr))
}

/// Build a server with default options and run it until `ctx` is cancelled.
pub async fn run(ctx: CancellationToken, address: impl Into<String>, handler: Router) -> Result<(), ServerError> {
    let server = Server::new(address, handler, [])?;
    server.start(ctx).await
}
