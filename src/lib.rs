//! A small HTTP server library with graceful lifecycle management and a
//! cache-aware static file handler.

pub mod config;
pub mod error;
pub mod fs;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use error::{ServerError, StopFailure};
pub use fs::{DirStore, FileStore, MemoryStore};
pub use http::{run, HttpSettings, Server, ServerBuilder, ServerOption, StaticFiles};
pub use lifecycle::Lifecycle;
pub use observability::{Logger, TracingLogger};
