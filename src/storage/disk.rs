//! Keyed blobs on disks for filesystem-backed config stores

use crate::errors::{BudError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, Instrument};

/// A named place blobs can be read from and written to
///
/// Paths are relative, `/`-separated and validated by [`validate_blob_path`].
#[async_trait]
pub trait Disk: Send + Sync + fmt::Debug {
    /// Read a blob, `None` when it doesn't exist
    async fn get(&self, path: &str) -> Result<Option<String>>;

    /// Write a blob, replacing any existing contents
    async fn put(&self, path: &str, contents: &str) -> Result<()>;

    /// Delete a blob, returning whether it existed
    async fn delete(&self, path: &str) -> Result<bool>;
}

/// Check that a blob path cannot escape the disk root
pub fn validate_blob_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(BudError::validation_field("blob path cannot be empty", "path"));
    }

    for segment in path.split('/') {
        validate_segment(segment)
            .map_err(|reason| BudError::validation_field(format!("{}: '{}'", reason, path), "path"))?;
    }

    Ok(())
}

/// Check a single path segment
pub fn validate_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err("blob path segments cannot be empty or relative");
    }
    if segment.contains(['/', '\\', '\0']) {
        return Err("blob path segments cannot contain separators");
    }
    Ok(())
}

/// Map an arbitrary key segment to a safe, reversible blob path segment
///
/// Everything outside `[A-Za-z0-9-._~]` is percent-encoded. Dot-only segments
/// have their dots encoded and the empty segment becomes a lone `%`, which
/// percent-encoding never produces, so distinct inputs stay distinct.
pub fn encode_segment(segment: &str) -> String {
    if segment.is_empty() {
        return "%".to_string();
    }

    let encoded = urlencoding::encode(segment);
    if encoded.chars().all(|c| c == '.') {
        encoded.replace('.', "%2E")
    } else {
        encoded.into_owned()
    }
}

/// Disk rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        validate_blob_path(path)?;
        Ok(path.split('/').fold(self.root.clone(), |full, segment| full.join(segment)))
    }
}

#[async_trait]
impl Disk for LocalDisk {
    async fn get(&self, path: &str) -> Result<Option<String>> {
        let full = self.resolve(path)?;

        match tokio::fs::read_to_string(&full)
            .instrument(crate::store_span!("read_blob", path = %path))
            .await
        {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BudError::io(e, format!("Failed to read blob {}", full.display()))),
        }
    }

    async fn put(&self, path: &str, contents: &str) -> Result<()> {
        let full = self.resolve(path)?;

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                BudError::io(e, format!("Failed to create directory {}", parent.display()))
            })?;
        }

        tokio::fs::write(&full, contents)
            .instrument(crate::store_span!("write_blob", path = %path))
            .await
            .map_err(|e| BudError::io(e, format!("Failed to write blob {}", full.display())))?;

        debug!(path = %path, "Blob written");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;

        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BudError::io(e, format!("Failed to delete blob {}", full.display()))),
        }
    }
}

/// In-process disk
#[derive(Debug, Default)]
pub struct MemoryDisk {
    blobs: RwLock<HashMap<String, String>>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of all stored blobs, sorted
    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl Disk for MemoryDisk {
    async fn get(&self, path: &str) -> Result<Option<String>> {
        validate_blob_path(path)?;
        Ok(self.blobs.read().await.get(path).cloned())
    }

    async fn put(&self, path: &str, contents: &str) -> Result<()> {
        validate_blob_path(path)?;
        self.blobs.write().await.insert(path.to_string(), contents.to_string());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        validate_blob_path(path)?;
        Ok(self.blobs.write().await.remove(path).is_some())
    }
}
