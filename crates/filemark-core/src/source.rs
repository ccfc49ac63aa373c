//! Concrete file sources.
//!
//! `InMemoryFile` wraps bytes the presentation layer already holds (the
//! browser-style "file picker hands us a buffer" case). `DiskFile` reads a
//! path with `tokio::fs` when the tracker asks for the content.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use filemark_contracts::{TrackerError, TrackerResult};

use crate::traits::FileSource;

/// A file whose content is already in memory.
#[derive(Debug, Clone)]
pub struct InMemoryFile {
    name: String,
    bytes: Vec<u8>,
}

impl InMemoryFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl FileSource for InMemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    async fn read_bytes(&self) -> TrackerResult<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// A file on the local filesystem.
///
/// The size is captured when the file is opened; a later read that returns
/// fewer bytes is reported as a truncated read (`TrackerError::Hash`).
#[derive(Debug, Clone)]
pub struct DiskFile {
    path: PathBuf,
    name: String,
    size: u64,
}

impl DiskFile {
    /// Stat `path` and capture its name and size.
    pub async fn open(path: impl AsRef<Path>) -> TrackerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| TrackerError::Io {
                reason: format!("failed to stat '{}': {e}", path.display()),
            })?;

        if !metadata.is_file() {
            return Err(TrackerError::Io {
                reason: format!("'{}' is not a regular file", path.display()),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            path,
            name,
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FileSource for DiskFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read_bytes(&self) -> TrackerResult<Vec<u8>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| TrackerError::Io {
                reason: format!("failed to read '{}': {e}", self.path.display()),
            })?;

        if (bytes.len() as u64) < self.size {
            return Err(TrackerError::Hash {
                reason: format!(
                    "truncated read of '{}': expected {} bytes, got {}",
                    self.path.display(),
                    self.size,
                    bytes.len()
                ),
            });
        }

        Ok(bytes)
    }
}
