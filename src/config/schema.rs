//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! TLS material is loaded separately by the binary; `options()` covers
//! everything else.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::options::ServerOption;

/// Root configuration for the server binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address and header limits.
    pub listener: ListenerConfig,

    /// Per-connection timeouts.
    pub timeouts: TimeoutConfig,

    pub shutdown: ShutdownConfig,

    /// Serve HTTPS when present.
    pub tls: Option<TlsConfig>,

    pub static_files: StaticFilesConfig,

    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    /// The server options this file describes, in application order.
    pub fn options(&self) -> Vec<ServerOption> {
        let timeouts = &self.timeouts;
        let mut options = vec![
            ServerOption::ReadTimeout(Duration::from_secs(timeouts.read_secs)),
            ServerOption::ReadHeaderTimeout(Duration::from_secs(timeouts.read_header_secs)),
            ServerOption::WriteTimeout(Duration::from_secs(timeouts.write_secs)),
            ServerOption::IdleTimeout(Duration::from_secs(timeouts.idle_secs)),
            ServerOption::GracefulShutdown(Duration::from_secs(self.shutdown.grace_period_secs)),
        ];
        if let Some(max) = self.listener.max_header_bytes {
            options.push(ServerOption::MaxHeaderBytes(max));
        }
        options
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "localhost:8080" or ":8080").
    pub bind_address: String,

    /// Request header size limit. Unset means 1 MiB.
    pub max_header_bytes: Option<usize>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "localhost:8080".to_string(),
            max_header_bytes: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration. Zero disables a timeout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to read a request body, in seconds.
    pub read_secs: u64,

    /// Time allowed to read request headers, in seconds.
    pub read_header_secs: u64,

    /// Time allowed to produce a response, in seconds.
    pub write_secs: u64,

    /// Keep-alive idle timeout in seconds. Zero falls back to `read_secs`.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 5,
            read_header_secs: 0,
            write_secs: 10,
            idle_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Grace period for in-flight requests, in seconds.
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_period_secs: 5 }
    }
}

/// Static directory mounted by the binary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub enabled: bool,

    /// URL prefix under which files are served.
    pub public_path: String,

    /// Directory on disk.
    pub root: String,

    /// Cache lifetime in seconds. Zero disables caching headers.
    pub cache_ttl_secs: u64,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            public_path: "/static".to_string(),
            root: "static".to_string(),
            cache_ttl_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
