// src/storage/mod.rs
//! Persistence adapter: where imported icons end up.
//!
//! The core needs three operations from a backend ([`AssetStore`]).
//! [`EmojiStore`] layers the candidate-root policy on top: roots are tried in
//! preference order until one accepts the write, and the winner is remembered
//! for the rest of the session.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::sources::{Source, SOURCES};

pub mod fs;
pub mod host_api;

pub use fs::FsStore;
pub use host_api::HostApiStore;

/// Roots the host application serves custom emojis from, in preference order.
pub const HOST_EMOJI_ROOTS: [&str; 2] = ["/data/emojis", "/emojis"];

/// Suffix of sidecar files written by older plugin versions.
pub const LEGACY_META_SUFFIX: &str = ".meta.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn write_file(&self, path: &str, bytes: &[u8], mime: &str) -> Result<(), StorageError>;

    /// No-op when the file is absent.
    async fn remove_file_if_exists(&self, path: &str) -> Result<(), StorageError>;

    /// Missing directories list as empty.
    async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, StorageError>;
}

/// `<base>/<rest>` where a `/` or empty base means the store root.
pub fn join_path(base: &str, rest: &str) -> String {
    let b = base.trim().trim_end_matches('/');
    format!("{b}/{}", rest.trim_start_matches('/'))
}

/// Last path segment, accepting either separator.
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// `file_name` must be one plain segment: backends receive the joined path
/// as-is, and the host API does no validation of its own.
pub fn check_file_name(file_name: &str) -> Result<(), StorageError> {
    let reason = if file_name.trim().is_empty() {
        "empty file name"
    } else if file_name.contains(['/', '\\']) {
        "path separator in file name"
    } else if file_name == "." || file_name == ".." {
        "relative segment as file name"
    } else {
        return Ok(());
    };
    Err(StorageError::PathValidation {
        path: file_name.to_string(),
        reason: reason.to_string(),
    })
}

/// Candidate-root policy over one backend.
pub struct EmojiStore {
    backend: Arc<dyn AssetStore>,
    remembered: Mutex<String>,
    fixed: Vec<String>,
}

impl EmojiStore {
    pub fn new(backend: Arc<dyn AssetStore>, fixed: Vec<String>) -> Self {
        Self {
            backend,
            remembered: Mutex::new(String::new()),
            fixed,
        }
    }

    /// Host file API with the built-in roots; `preferred` (may be empty) is tried first.
    pub fn for_host(backend: Arc<dyn AssetStore>, preferred: &str) -> Self {
        let store = Self::new(
            backend,
            HOST_EMOJI_ROOTS.iter().map(|s| s.to_string()).collect(),
        );
        store.remember(preferred);
        store
    }

    /// A single rooted directory tree.
    pub fn for_fs(backend: Arc<dyn AssetStore>) -> Self {
        Self::new(backend, vec!["/".to_string()])
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn remember(&self, base: &str) {
        if let Ok(mut r) = self.remembered.lock() {
            *r = base.trim().to_string();
        }
    }

    pub fn remembered(&self) -> String {
        self.remembered
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Remembered winner first, then the fixed roots; deduplicated.
    pub fn candidates(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for base in std::iter::once(self.remembered()).chain(self.fixed.iter().cloned()) {
            let norm = base.trim().to_string();
            if !norm.is_empty() && !out.contains(&norm) {
                out.push(norm);
            }
        }
        out
    }

    /// Write `<base>/<source.dir>/<file_name>` under the first accepting root.
    /// Returns the root that accepted the write.
    pub async fn write(
        &self,
        source: &Source,
        file_name: &str,
        bytes: &[u8],
        mime: &str,
    ) -> Result<String, StorageError> {
        check_file_name(file_name)?;
        let mut last: Option<StorageError> = None;
        for base in self.candidates() {
            let path = join_path(&base, &format!("{}/{file_name}", source.dir));
            match self.backend.write_file(&path, bytes, mime).await {
                Ok(()) => {
                    self.remember(&base);
                    debug!(target: "storage", path = %path, bytes = bytes.len(), "icon written");
                    return Ok(base);
                }
                Err(e) => {
                    warn!(target: "storage", path = %path, error = %e, "write rejected, trying next root");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or(StorageError::NoCandidate))
    }

    /// Best-effort removal; failures are logged and swallowed.
    pub async fn remove_best_effort(&self, path: &str) {
        if let Err(e) = self.backend.remove_file_if_exists(path).await {
            debug!(target: "storage", path, error = %e, "cleanup failed (ignored)");
        }
    }

    /// Remove every `*.meta.json` sidecar under each root/source directory.
    pub async fn cleanup_legacy_meta_files(&self) -> usize {
        let mut removed = 0usize;
        for base in self.candidates() {
            for source in SOURCES.iter() {
                let dir = join_path(&base, source.dir);
                let rows = match self.backend.list_directory(&dir).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        debug!(target: "storage", dir = %dir, error = %e, "listing failed (ignored)");
                        continue;
                    }
                };
                for row in rows
                    .iter()
                    .filter(|r| !r.is_dir && r.name.ends_with(LEGACY_META_SUFFIX))
                {
                    let full = join_path(&dir, base_name(&row.name));
                    match self.backend.remove_file_if_exists(&full).await {
                        Ok(()) => removed += 1,
                        Err(e) => {
                            debug!(target: "storage", path = %full, error = %e, "legacy cleanup failed (ignored)")
                        }
                    }
                }
            }
        }
        if removed > 0 {
            info!(target: "storage", removed, "legacy metadata files removed");
        }
        removed
    }
}
