//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{routing::get, Router};
use httpserver::{Logger, Server, ServerError, ServerOption};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Logger that keeps every message for assertions.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    fn record(&self, level: &str, msg: &str, fields: &[(&str, String)]) {
        let mut line = format!("{level} {msg}");
        for (key, value) in fields {
            line.push_str(&format!(" {key}={value}"));
        }
        self.lines.lock().unwrap().push(line);
    }
}

impl Logger for RecordingLogger {
    fn info(&self, msg: &str, fields: &[(&str, String)]) {
        self.record("INFO", msg, fields);
    }

    fn error(&self, msg: &str, fields: &[(&str, String)]) {
        self.record("ERROR", msg, fields);
    }
}

/// A started server plus the handles a test needs to drive it.
pub struct Running {
    pub server: Arc<Server>,
    pub ctx: CancellationToken,
    pub addr: SocketAddr,
    pub task: JoinHandle<Result<(), ServerError>>,
}

impl Running {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Cancel the start context and wait for `start` to return.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        self.ctx.cancel();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }
}

/// Start `app` on an ephemeral localhost port and wait until it listens.
pub async fn spawn_server(app: Router, options: Vec<ServerOption>) -> Running {
    let server = Arc::new(Server::new("127.0.0.1:0", app, options).unwrap());
    let ctx = CancellationToken::new();

    let task = {
        let server = Arc::clone(&server);
        let ctx = ctx.clone();
        tokio::spawn(async move { server.start(ctx).await })
    };

    let addr = tokio::time::timeout(Duration::from_secs(5), server.listening())
        .await
        .expect("server did not bind in time")
        .expect("server failed to bind");

    Running { server, ctx, addr, task }
}

pub fn hello_app() -> Router {
    Router::new().route("/", get(|| async { "Hello, World!" }))
}

/// Client that never routes through a system proxy and never pools.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
