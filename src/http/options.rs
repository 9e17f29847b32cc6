//! Server options and the builder that applies them.
//!
//! Options are applied in order onto a default-initialised configuration, so
//! the last option touching a field wins.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use hyper_util::server::conn::auto::Builder;

use crate::error::ServerError;
use crate::http::server::Server;
use crate::net::tls::NextProtoHook;
use crate::observability::{Logger, TracingLogger};

/// Header buffer cap used when none is configured.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 1 << 20;

/// Grace period used when none is configured.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// hyper refuses HTTP/1 buffers smaller than this.
const MIN_HEADER_BUFFER: usize = 8192;

/// Transport-level settings of the underlying HTTP server.
///
/// `Default` is the raw transport (every bound disabled);
/// [`HttpSettings::standard`] is what [`Server`] starts from.
#[derive(Clone, Default)]
pub struct HttpSettings {
    /// Bound on reading a full request, headers included. Zero disables it.
    pub read_timeout: Duration,
    /// Bound on reading request headers. Zero falls back to `read_timeout`.
    pub read_header_timeout: Duration,
    /// Bound on producing a response. Zero disables it.
    pub write_timeout: Duration,
    /// Keep-alive idle bound. Zero falls back to `read_timeout`.
    pub idle_timeout: Duration,
    /// Header buffer cap. Zero means [`DEFAULT_MAX_HEADER_BYTES`].
    pub max_header_bytes: usize,
    pub tls: Option<RustlsConfig>,
    pub tls_next_proto: Option<NextProtoHook>,
}

impl HttpSettings {
    /// Read 5s, write 10s, idle 15s, 1 MiB of headers.
    pub fn standard() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(15),
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            ..Self::default()
        }
    }

    /// Bound on reading request headers: the read-header timeout, else the
    /// read timeout, else none.
    pub fn effective_read_header_timeout(&self) -> Option<Duration> {
        [self.read_header_timeout, self.read_timeout].into_iter().find(|d| !d.is_zero())
    }

    pub fn effective_idle_timeout(&self) -> Option<Duration> {
        [self.idle_timeout, self.read_timeout].into_iter().find(|d| !d.is_zero())
    }

    pub fn effective_max_header_bytes(&self) -> usize {
        if self.max_header_bytes == 0 {
            DEFAULT_MAX_HEADER_BYTES
        } else {
            self.max_header_bytes
        }
    }

    /// hyper connection builder carrying the header limits and timeouts.
    pub(crate) fn connection_builder(&self) -> Builder<TokioExecutor> {
        let max_header_bytes = self.effective_max_header_bytes();
        let mut builder = Builder::new(TokioExecutor::new());
        // `None` also switches off hyper's built-in 30s header deadline.
        builder
            .http1()
            .timer(TokioTimer::new())
            .max_buf_size(max_header_bytes.max(MIN_HEADER_BUFFER))
            .header_read_timeout(self.effective_read_header_timeout());
        builder
            .http2()
            .timer(TokioTimer::new())
            .max_header_list_size(u32::try_from(max_header_bytes).unwrap_or(u32::MAX));
        builder
    }
}

impl fmt::Debug for HttpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSettings")
            .field("read_timeout", &self.read_timeout)
            .field("read_header_timeout", &self.read_header_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_header_bytes", &self.max_header_bytes)
            .field("tls", &self.tls.is_some())
            .field("tls_next_proto", &self.tls_next_proto.is_some())
            .finish()
    }
}

/// One configuration mutation.
pub enum ServerOption {
    /// Replace every transport setting at once.
    Preconfigured(HttpSettings),
    ReadTimeout(Duration),
    ReadHeaderTimeout(Duration),
    WriteTimeout(Duration),
    IdleTimeout(Duration),
    MaxHeaderBytes(usize),
    Tls(RustlsConfig),
    TlsNextProto(NextProtoHook),
    /// Destination for connection-level errors.
    ErrorLog(Arc<dyn Logger>),
    /// Grace period for in-flight requests. Zero means [`DEFAULT_GRACE_PERIOD`].
    GracefulShutdown(Duration),
    /// Destination for lifecycle events.
    Logger(Arc<dyn Logger>),
}

impl fmt::Debug for ServerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerOption::Preconfigured(s) => f.debug_tuple("Preconfigured").field(s).finish(),
            ServerOption::ReadTimeout(d) => f.debug_tuple("ReadTimeout").field(d).finish(),
            ServerOption::ReadHeaderTimeout(d) => f.debug_tuple("ReadHeaderTimeout").field(d).finish(),
            ServerOption::WriteTimeout(d) => f.debug_tuple("WriteTimeout").field(d).finish(),
            ServerOption::IdleTimeout(d) => f.debug_tuple("IdleTimeout").field(d).finish(),
            ServerOption::MaxHeaderBytes(n) => f.debug_tuple("MaxHeaderBytes").field(n).finish(),
            ServerOption::Tls(_) => f.write_str("Tls(..)"),
            ServerOption::TlsNextProto(_) => f.write_str("TlsNextProto(..)"),
            ServerOption::ErrorLog(_) => f.write_str("ErrorLog(..)"),
            ServerOption::GracefulShutdown(d) => f.debug_tuple("GracefulShutdown").field(d).finish(),
            ServerOption::Logger(_) => f.write_str("Logger(..)"),
        }
    }
}

/// Configuration a [`Server`] is sealed with.
#[derive(Clone)]
pub(crate) struct ServerParts {
    pub settings: HttpSettings,
    pub grace_period: Duration,
    pub logger: Arc<dyn Logger>,
    pub error_log: Option<Arc<dyn Logger>>,
}

impl Default for ServerParts {
    fn default() -> Self {
        Self {
            settings: HttpSettings::standard(),
            grace_period: DEFAULT_GRACE_PERIOD,
            logger: Arc::new(TracingLogger::default()),
            error_log: None,
        }
    }
}

impl ServerParts {
    pub fn apply(&mut self, option: ServerOption) {
        match option {
            ServerOption::Preconfigured(settings) => self.settings = settings,
            ServerOption::ReadTimeout(d) => self.settings.read_timeout = d,
            ServerOption::ReadHeaderTimeout(d) => self.settings.read_header_timeout = d,
            ServerOption::WriteTimeout(d) => self.settings.write_timeout = d,
            ServerOption::IdleTimeout(d) => self.settings.idle_timeout = d,
            ServerOption::MaxHeaderBytes(n) => self.settings.max_header_bytes = n,
            ServerOption::Tls(config) => self.settings.tls = Some(config),
            ServerOption::TlsNextProto(hook) => self.settings.tls_next_proto = Some(hook),
            ServerOption::ErrorLog(logger) => self.error_log = Some(logger),
            ServerOption::GracefulShutdown(d) => {
                self.grace_period = if d.is_zero() { DEFAULT_GRACE_PERIOD } else { d }
            }
            ServerOption::Logger(logger) => self.logger = logger,
        }
    }

    /// Connection errors go to the lifecycle logger unless redirected.
    pub fn error_log(&self) -> Arc<dyn Logger> {
        self.error_log.clone().unwrap_or_else(|| Arc::clone(&self.logger))
    }
}

/// Fluent construction of a [`Server`].
///
/// ```no_run
/// # use std::time::Duration;
/// # use axum::{routing::get, Router};
/// let server = httpserver::Server::builder()
///     .address("127.0.0.1:8080")
///     .handler(Router::new().route("/", get(|| async { "hi" })))
///     .graceful_shutdown(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// ```
#[derive(Default)]
pub struct ServerBuilder {
    address: Option<String>,
    handler: Option<Router>,
    options: Vec<ServerOption>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn handler(mut self, handler: Router) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Queue an option; options apply in the order they were added.
    pub fn option(mut self, option: ServerOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn options(mut self, options: impl IntoIterator<Item = ServerOption>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn read_timeout(self, d: Duration) -> Self {
        self.option(ServerOption::ReadTimeout(d))
    }

    pub fn read_header_timeout(self, d: Duration) -> Self {
        self.option(ServerOption::ReadHeaderTimeout(d))
    }

    pub fn write_timeout(self, d: Duration) -> Self {
        self.option(ServerOption::WriteTimeout(d))
    }

    pub fn idle_timeout(self, d: Duration) -> Self {
        self.option(ServerOption::IdleTimeout(d))
    }

    pub fn max_header_bytes(self, n: usize) -> Self {
        self.option(ServerOption::MaxHeaderBytes(n))
    }

    pub fn tls(self, config: RustlsConfig) -> Self {
        self.option(ServerOption::Tls(config))
    }

    pub fn graceful_shutdown(self, d: Duration) -> Self {
        self.option(ServerOption::GracefulShutdown(d))
    }

    pub fn logger(self, logger: Arc<dyn Logger>) -> Self {
        self.option(ServerOption::Logger(logger))
    }

    /// Validate and seal the configuration. Nothing is bound here.
    pub fn build(self) -> Result<Server, ServerError> {
        let address = self.address.filter(|a| !a.is_empty()).ok_or(ServerError::EmptyAddress)?;
        let handler = self.handler.ok_or(ServerError::MissingHandler)?;

        let mut parts = ServerParts::default();
        for option in self.options {
            parts.apply(option);
        }

        Ok(Server::from_parts(address, handler, parts))
    }
}
