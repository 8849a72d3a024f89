// src/storage/fs.rs
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{AssetStore, DirEntry};
use crate::error::StorageError;

/// Directory-tree backend. Store paths are relative to `root`; a leading `/`
/// means the root itself and any `..` segment is rejected.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let reject = |reason: &str| StorageError::PathValidation {
            path: path.to_string(),
            reason: reason.to_string(),
        };
        let rel = Path::new(path.trim().trim_start_matches(['/', '\\']));
        for c in rel.components() {
            match c {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => return Err(reject("parent directory segment")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(reject("absolute path inside store"))
                }
            }
        }
        Ok(self.root.join(rel))
    }
}

fn io_err(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl AssetStore for FsStore {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn write_file(&self, path: &str, bytes: &[u8], _mime: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| io_err(&target, e))
    }

    async fn remove_file_if_exists(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&target, e)),
        }
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, StorageError> {
        let dir = self.resolve(path)?;
        let mut rd = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&dir, e)),
        };
        let mut out = Vec::new();
        while let Some(entry) = rd.next_entry().await.map_err(|e| io_err(&dir, e))? {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            out.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}
