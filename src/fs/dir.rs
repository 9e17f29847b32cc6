//! On-disk file store rooted at a directory.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

use super::{clean_path, FileInfo, FileStore, StoreFile};

/// Serves files below a root directory.
///
/// Backslashes are refused outright so Windows-style separators cannot
/// smuggle `..` past [`clean_path`].
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        if path.contains('\\') || path.contains('\0') {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid character in file path"));
        }
        let mut full = self.root.clone();
        full.extend(clean_path(path));
        Ok(full)
    }
}

impl FileStore for DirStore {
    type File = DirFile;

    async fn open(&self, path: &str) -> io::Result<DirFile> {
        let full = self.resolve(path)?;
        let file = tokio::fs::File::open(&full).await?;
        let name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(DirFile { file, name })
    }
}

/// An open file below a [`DirStore`] root.
#[derive(Debug)]
pub struct DirFile {
    file: tokio::fs::File,
    name: String,
}

impl StoreFile for DirFile {
    async fn metadata(&mut self) -> io::Result<FileInfo> {
        let meta = self.file.metadata().await?;
        Ok(FileInfo {
            name: self.name.clone(),
            size: meta.len(),
            modified: meta.modified()?,
            is_dir: meta.is_dir(),
        })
    }

    async fn close(self) -> io::Result<()> {
        // Waits for any in-flight blocking operation before the descriptor drops.
        let file = self.file.into_std().await;
        drop(file);
        Ok(())
    }
}

impl AsyncRead for DirFile {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

impl AsyncSeek for DirFile {
    fn start_seek(mut self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
        Pin::new(&mut self.file).start_seek(position)
    }

    fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Pin::new(&mut self.file).poll_complete(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn opens_files_and_reports_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/app.css"), "body{}").unwrap();
        let store = DirStore::new(dir.path());

        let mut file = store.open("/css/app.css").await.unwrap();
        let info = file.metadata().await.unwrap();
        assert_eq!(info.name, "app.css");
        assert_eq!(info.size, 6);
        assert!(!info.is_dir);

        let mut body = String::new();
        file.read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "body{}");
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn directories_open_and_report_is_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        let store = DirStore::new(dir.path());

        let mut file = store.open("/css").await.unwrap();
        assert!(file.metadata().await.unwrap().is_dir);
    }

    #[tokio::test]
    async fn traversal_stays_inside_root() {
        let outer = tempfile::tempdir().unwrap();
        std::fs::write(outer.path().join("secret.txt"), "nope").unwrap();
        std::fs::create_dir(outer.path().join("public")).unwrap();
        let store = DirStore::new(outer.path().join("public"));

        let err = store.open("/../secret.txt").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(store.open("..\\secret.txt").await.is_err());
    }
}
