//! Output storage for shard files.
//!
//! Shards are written into a staging directory beside the output root and
//! only moved into place by [`StagedDir::commit`]. Dropping an uncommitted
//! [`StagedDir`] removes everything it wrote and leaves the previous output
//! untouched.

use bytes::Bytes;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::warn;

/// Where replaced subtrees wait inside the staging directory until it is
/// dropped.
const RETIRED_DIR: &str = ".retired";

/// Storage-related errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error during a storage operation.
    #[error("storage I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Object path escapes the store or is empty.
    #[error("invalid object path: {0:?}")]
    InvalidPath(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Destination for encoded shard files, addressed by relative path.
pub trait ShardStore {
    /// Write an object (overwrites if it exists).
    fn put(&mut self, path: &str, data: Bytes) -> StorageResult<()>;
}

/// Reject absolute paths and parent references.
fn check_relative(path: &str) -> StorageResult<&Path> {
    let p = Path::new(path);
    let ok = !path.is_empty() && p.components().all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(p)
    } else {
        Err(StorageError::InvalidPath(path.to_string()))
    }
}

/// A staging directory that replaces subtrees of `root` on commit.
pub struct StagedDir {
    root: PathBuf,
    staging: TempDir,
    files_written: usize,
    bytes_written: u64,
}

impl StagedDir {
    /// Create `root` if needed and a fresh staging directory next to it.
    pub fn create(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(io_err(&root))?;

        let parent = root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let staging = tempfile::Builder::new()
            .prefix(".wikishard-staging-")
            .tempdir_in(parent)
            .map_err(io_err(parent))?;

        Ok(Self {
            root,
            staging,
            files_written: 0,
            bytes_written: 0,
        })
    }

    /// Output root the staged subtrees will replace.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where files are being written until commit.
    pub fn staging_path(&self) -> &Path {
        self.staging.path()
    }

    /// Number of files written so far.
    pub fn files_written(&self) -> usize {
        self.files_written
    }

    /// Total payload bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Replace `root/<sub>` with the staged `<sub>` for each entry.
    ///
    /// Each existing subtree is first renamed into the staging directory,
    /// then the staged one is renamed into place. If any swap fails, the
    /// subtrees already swapped are put back, so the named subtrees never
    /// mix two builds. A staged subtree that received no files is committed
    /// as an empty directory. Other entries under `root` are left alone.
    pub fn commit(self, subdirs: &[&str]) -> StorageResult<()> {
        let retired = self.staging.path().join(RETIRED_DIR);
        fs::create_dir_all(&retired).map_err(io_err(&retired))?;

        let mut swapped: Vec<&str> = Vec::with_capacity(subdirs.len());
        for &sub in subdirs {
            if let Err(e) = self.swap_in(sub, &retired) {
                self.roll_back(&swapped, &retired);
                return Err(e);
            }
            swapped.push(sub);
        }
        Ok(())
    }

    fn swap_in(&self, sub: &str, retired: &Path) -> StorageResult<()> {
        let rel = check_relative(sub)?;
        let staged = self.staging.path().join(rel);
        let target = self.root.join(rel);
        let old = retired.join(rel);

        fs::create_dir_all(&staged).map_err(io_err(&staged))?;
        for dir in [target.parent(), old.parent()].into_iter().flatten() {
            fs::create_dir_all(dir).map_err(io_err(dir))?;
        }

        let had_old = target.exists();
        if had_old {
            fs::rename(&target, &old).map_err(io_err(&target))?;
        }
        if let Err(source) = fs::rename(&staged, &target) {
            if had_old {
                if let Err(e) = fs::rename(&old, &target) {
                    warn!(path = %target.display(), error = %e, "failed to restore previous output");
                }
            }
            return Err(StorageError::Io {
                path: target,
                source,
            });
        }
        Ok(())
    }

    /// Put back the subtrees retired by earlier swaps, newest first.
    fn roll_back(&self, swapped: &[&str], retired: &Path) {
        for sub in swapped.iter().rev() {
            let target = self.root.join(sub);
            let old = retired.join(sub);
            if let Err(e) = fs::remove_dir_all(&target) {
                warn!(path = %target.display(), error = %e, "failed to remove partial output");
            }
            if old.exists() {
                if let Err(e) = fs::rename(&old, &target) {
                    warn!(path = %target.display(), error = %e, "failed to restore previous output");
                }
            }
        }
    }
}

impl ShardStore for StagedDir {
    fn put(&mut self, path: &str, data: Bytes) -> StorageResult<()> {
        let full = self.staging.path().join(check_relative(path)?);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        fs::write(&full, &data).map_err(io_err(&full))?;

        self.files_written += 1;
        self.bytes_written += data.len() as u64;
        Ok(())
    }
}

/// In-memory store, ordered by path.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub objects: std::collections::BTreeMap<String, Bytes>,
}

#[cfg(test)]
impl ShardStore for MemoryStore {
    fn put(&mut self, path: &str, data: Bytes) -> StorageResult<()> {
        check_relative(path)?;
        self.objects.insert(path.to_string(), data);
        Ok(())
    }
}
