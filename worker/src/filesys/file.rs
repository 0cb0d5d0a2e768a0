//! File operations

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::WorkerError;

/// A JSON file wrapper with path
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read and decode the file contents
    pub async fn read<T: DeserializeOwned>(&self) -> Result<T, WorkerError> {
        let contents = fs::read_to_string(&self.path).await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// Encode and write the value atomically (tmp file + rename).
    ///
    /// The parent directory is created when missing. A crash mid-write
    /// leaves the previous contents intact.
    pub async fn write<T: Serialize>(&self, value: &T) -> Result<(), WorkerError> {
        let contents = serde_json::to_string_pretty(value)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

/// Remove a directory tree if it exists
pub async fn remove_dir_if_exists(path: &Path) -> Result<(), WorkerError> {
    if fs::metadata(path).await.is_ok() {
        fs::remove_dir_all(path).await?;
    }
    Ok(())
}
