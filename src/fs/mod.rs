//! Read-only file stores for static content.
//!
//! # Data Flow
//! ```text
//! request path (prefix stripped)
//!     → clean_path (lexical normalisation, `..` cannot escape the root)
//!     → FileStore::open
//!     → StoreFile (async read + seek, metadata, close)
//! ```
//!
//! # Design Decisions
//! - Stores never mutate; any number of concurrent reads is safe
//! - Directories open successfully and report `is_dir`; callers decide policy
//! - Two backends: an on-disk root and an in-memory asset bundle

pub mod dir;
pub mod memory;

use std::future::Future;
use std::io;
use std::time::SystemTime;

use tokio::io::{AsyncRead, AsyncSeek};

pub use dir::DirStore;
pub use memory::MemoryStore;

/// Metadata of an opened entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Base name of the entry.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// An opened entry in a [`FileStore`].
pub trait StoreFile: AsyncRead + AsyncSeek + Unpin + Send + 'static {
    /// Inspect the entry's metadata.
    fn metadata(&mut self) -> impl Future<Output = io::Result<FileInfo>> + Send;

    /// Release the entry.
    fn close(self) -> impl Future<Output = io::Result<()>> + Send
    where
        Self: Sized;
}

/// A hierarchical, read-only file store.
pub trait FileStore: Send + Sync + 'static {
    type File: StoreFile;

    /// Open the entry at `path`, relative to the store root.
    fn open(&self, path: &str) -> impl Future<Output = io::Result<Self::File>> + Send;
}

/// Normalise a slash-separated path into its components.
///
/// Empty and `.` segments are dropped and `..` pops the previous segment, so
/// the result never climbs above the root. An empty vector names the root.
pub fn clean_path(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts
}
