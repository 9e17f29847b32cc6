//! Demo server: a hello route plus an optional static directory.
//!
//! ```text
//! httpserver --config httpserver.toml --addr :8080 --static-root ./public
//! ```
//!
//! Runs until SIGINT or SIGTERM, then drains in-flight requests for the
//! configured grace period.

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::{routing::get, Router};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use httpserver::config::validation::validate_config;
use httpserver::config::{load_config, ConfigError, ServerConfig};
use httpserver::net::tls::load_tls_config;
use httpserver::observability::logging;
use httpserver::{DirStore, Server, ServerOption, StaticFiles};

#[derive(Parser, Debug)]
#[command(name = "httpserver")]
#[command(about = "HTTP server with graceful shutdown and static file caching", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. "127.0.0.1:8080" or ":8080".
    #[arg(short, long)]
    addr: Option<String>,

    /// Serve files from this directory (enables static files).
    #[arg(long)]
    static_root: Option<String>,

    /// URL prefix for static files.
    #[arg(long)]
    public_path: Option<String>,

    /// Cache lifetime for static files in seconds; 0 disables caching headers.
    #[arg(long)]
    cache_ttl_secs: Option<u64>,
}

impl Cli {
    /// Load the file (if any), apply flag overrides, then validate the result.
    fn into_config(mut self) -> Result<ServerConfig, ConfigError> {
        let mut config = match self.config.take() {
            Some(path) => load_config(&path)?,
            None => ServerConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(self, config: &mut ServerConfig) {
        if let Some(addr) = self.addr {
            config.listener.bind_address = addr;
        }
        if let Some(root) = self.static_root {
            config.static_files.enabled = true;
            config.static_files.root = root;
        }
        if let Some(prefix) = self.public_path {
            config.static_files.public_path = prefix;
        }
        if let Some(ttl) = self.cache_ttl_secs {
            config.static_files.cache_ttl_secs = ttl;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init(&config.observability.log_level);
    tracing::info!("httpserver v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        static_files = config.static_files.enabled,
        grace_period_secs = config.shutdown.grace_period_secs,
        "Configuration loaded"
    );

    let mut app = Router::new().route("/", get(|| async { "Hello, World!" }));

    let static_files = &config.static_files;
    if static_files.enabled {
        let handler = StaticFiles::new(
            &static_files.public_path,
            DirStore::new(&static_files.root),
            Duration::from_secs(static_files.cache_ttl_secs),
        );
        let route = format!("{}/{{*path}}", handler.public_path());
        tracing::info!(route = %route, root = %static_files.root, "Serving static files");
        app = app.route_service(&route, handler);
    }

    let mut options = config.options();
    if let Some(tls) = &config.tls {
        let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
        options.push(ServerOption::Tls(rustls));
    }

    let server = Server::new(config.listener.bind_address.clone(), app, options)?;
    server.start(CancellationToken::new()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
