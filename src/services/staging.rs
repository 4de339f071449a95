//! Local staging area for uploads.
//!
//! Multipart bodies are spooled to disk before being streamed into the store
//! with a known length. A [`StagingFile`] removes its artifact when released,
//! and its `Drop` impl removes it on every path that skips the release
//! (errors, cancelled requests).

use crate::store::ByteStream;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

const READ_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the staging directory if it is missing.
    pub async fn prepare(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// Open a fresh staging file for writing.
    pub async fn begin(&self) -> io::Result<StagingWriter> {
        let path = self.dir.join(format!(".upload-{}", Uuid::new_v4()));
        let file = File::create(&path).await?;
        Ok(StagingWriter {
            file,
            staged: StagingFile {
                path,
                size: 0,
                released: false,
            },
        })
    }
}

/// Write half of a staging file. Dropping it unfinished removes the file.
pub struct StagingWriter {
    file: File,
    staged: StagingFile,
}

impl StagingWriter {
    pub async fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.staged.size += chunk.len() as u64;
        Ok(())
    }

    pub async fn finish(mut self) -> io::Result<StagingFile> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(self.staged)
    }
}

/// A completed staging artifact.
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
    size: u64,
    released: bool,
}

impl StagingFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Stream the staged bytes.
    pub async fn open_stream(&self) -> io::Result<ByteStream> {
        let file = File::open(&self.path).await?;
        Ok(Box::pin(ReaderStream::with_capacity(file, READ_CHUNK_SIZE)))
    }

    /// Remove the artifact from disk.
    pub async fn release(mut self) {
        self.released = true;
        match fs::remove_file(&self.path).await {
            Ok(_) => debug!("removed staging file {}", self.path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                "failed to remove staging file {}: {}",
                self.path.display(),
                err
            ),
        }
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(_) => debug!("dropped staging file {}", self.path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                "failed to remove staging file {}: {}",
                self.path.display(),
                err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn staged(area: &StagingArea, data: &[u8]) -> StagingFile {
        let mut writer = area.begin().await.unwrap();
        writer.write(data).await.unwrap();
        writer.finish().await.unwrap()
    }

    #[tokio::test]
    async fn release_removes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());

        let file = staged(&area, b"hello").await;
        let path = file.path().to_path_buf();
        assert_eq!(file.size(), 5);
        assert!(path.exists());

        file.release().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_removes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());

        let file = staged(&area, b"hello").await;
        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn abandoned_writer_removes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());

        let mut writer = area.begin().await.unwrap();
        writer.write(b"partial").await.unwrap();
        drop(writer);

        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }
}
