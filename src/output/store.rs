//! Durable output storage
//!
//! The finalizer only needs two primitives: make a directory, write one blob.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage failures during finalization
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn path(&self) -> &Path {
        match self {
            StorageError::CreateDir { path, .. } | StorageError::Write { path, .. } => path,
        }
    }
}

/// Where finished recordings are persisted
#[async_trait]
pub trait OutputStore: Send + Sync {
    /// Directory that holds the files of `session_id`
    fn session_dir(&self, session_id: &str) -> PathBuf;

    /// Create `dir` and any missing parents. Succeeds if it already exists.
    async fn create_dir(&self, dir: &Path) -> Result<(), StorageError>;

    /// Write `bytes` to `path`, replacing any existing file
    async fn write_file(&self, path: &Path, bytes: Vec<u8>) -> Result<(), StorageError>;
}

/// Filesystem store rooted at a base directory
#[derive(Debug, Clone)]
pub struct FsOutputStore {
    root: PathBuf,
}

impl FsOutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl OutputStore for FsOutputStore {
    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    async fn create_dir(&self, dir: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })
    }

    async fn write_file(&self, path: &Path, bytes: Vec<u8>) -> Result<(), StorageError> {
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| StorageError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}
