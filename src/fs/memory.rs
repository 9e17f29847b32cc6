//! In-memory file store for assets bundled into the binary.

use std::collections::HashMap;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::SystemTime;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

use super::{clean_path, FileInfo, FileStore, StoreFile};

#[derive(Debug, Clone)]
struct Entry {
    data: Bytes,
    modified: SystemTime,
}

/// A read-only store of byte buffers keyed by slash-separated path.
///
/// Directories are implied by the paths of the files inserted; they cannot be
/// created empty.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: HashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, replacing any previous entry at the same path.
    pub fn with_file(mut self, path: &str, data: impl Into<Bytes>, modified: SystemTime) -> Self {
        self.insert(path, data, modified);
        self
    }

    pub fn insert(&mut self, path: &str, data: impl Into<Bytes>, modified: SystemTime) {
        let key = clean_path(path).join("/");
        self.files.insert(key, Entry { data: data.into(), modified });
    }

    fn is_dir(&self, key: &str) -> bool {
        if key.is_empty() {
            return true;
        }
        let prefix = format!("{key}/");
        self.files.keys().any(|k| k.starts_with(&prefix))
    }
}

impl FileStore for MemoryStore {
    type File = MemoryFile;

    async fn open(&self, path: &str) -> io::Result<MemoryFile> {
        let parts = clean_path(path);
        let key = parts.join("/");
        let name = parts.last().copied().unwrap_or("/").to_string();

        if let Some(entry) = self.files.get(&key) {
            return Ok(MemoryFile {
                info: FileInfo {
                    name,
                    size: entry.data.len() as u64,
                    modified: entry.modified,
                    is_dir: false,
                },
                cursor: Cursor::new(entry.data.clone()),
            });
        }

        if self.is_dir(&key) {
            return Ok(MemoryFile {
                info: FileInfo { name, size: 0, modified: SystemTime::UNIX_EPOCH, is_dir: true },
                cursor: Cursor::new(Bytes::new()),
            });
        }

        Err(io::Error::new(io::ErrorKind::NotFound, format!("{path}: no such file")))
    }
}

/// An open entry of a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryFile {
    info: FileInfo,
    cursor: Cursor<Bytes>,
}

impl StoreFile for MemoryFile {
    async fn metadata(&mut self) -> io::Result<FileInfo> {
        Ok(self.info.clone())
    }

    async fn close(self) -> io::Result<()> {
        Ok(())
    }
}

impl AsyncRead for MemoryFile {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.cursor).poll_read(cx, buf)
    }
}

impl AsyncSeek for MemoryFile {
    fn start_seek(mut self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
        Pin::new(&mut self.cursor).start_seek(position)
    }

    fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Pin::new(&mut self.cursor).poll_complete(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    fn store() -> MemoryStore {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        MemoryStore::new()
            .with_file("/index.html", "<h1>hi</h1>", modified)
            .with_file("js/app.js", "console.log(1)", modified)
    }

    #[tokio::test]
    async fn opens_files_with_metadata() {
        let mut file = store().open("/js/app.js").await.unwrap();
        let info = file.metadata().await.unwrap();
        assert_eq!(info.name, "app.js");
        assert_eq!(info.size, 14);
        assert!(!info.is_dir);

        file.seek(io::SeekFrom::Start(8)).await.unwrap();
        let mut rest = String::new();
        file.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "log(1)");
    }

    #[tokio::test]
    async fn directories_are_inferred_from_paths() {
        let store = store();
        assert!(store.open("/js").await.unwrap().metadata().await.unwrap().is_dir);
        assert!(store.open("/").await.unwrap().metadata().await.unwrap().is_dir);
        assert!(store.open("/j").await.is_err());
    }

    #[tokio::test]
    async fn missing_files_are_not_found() {
        let err = store().open("/missing.txt").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
