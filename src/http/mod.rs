//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! ServerOption list / ServerBuilder
//!     → options.rs (HttpSettings, grace period, loggers)
//!     → server.rs (bind, accept loop, shutdown watcher)
//!     → net::connection (hyper per connection)
//!     → handler Router
//!         → static_files.rs (store lookup, 404 on miss)
//!         → cache.rs (ETag / Last-Modified / 304)
//!         → content.rs (type, ranges, streamed body)
//! ```

pub mod cache;
pub mod content;
pub mod date;
pub mod options;
pub mod server;
pub mod static_files;

pub use cache::CacheValidator;
pub use options::{HttpSettings, ServerBuilder, ServerOption};
pub use server::{run, Server};
pub use static_files::{embedded_static_handler, static_handler, StaticFiles};
