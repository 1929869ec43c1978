//! ---
//! psd_section: "02-storage"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Storage backends and the priority-ordered union registry."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::fmt;
use std::path::PathBuf;

use glob::{MatchOptions, Pattern};
use sha2::{Digest, Sha256};

use crate::{path, Result, StorageError};

/// Operations every storage backend exposes.
///
/// Paths are slash-separated and relative to the backend root. Backends are
/// shared behind `Arc` and every call blocks until the backend answers.
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Human-readable location, used in diagnostics.
    fn describe(&self) -> String;

    /// Whether a file or directory exists at `path`.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Whether `path` is a directory.
    fn is_dir(&self, path: &str) -> Result<bool>;

    /// Read the full content of a file.
    fn read_bytes(&self, path: &str) -> Result<Vec<u8>>;

    /// Write a file, creating missing parent directories and replacing any
    /// previous content.
    fn write_bytes(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Create a directory and its parents; existing directories are fine.
    fn make_dirs(&self, path: &str) -> Result<()>;

    /// Remove a single file.
    fn remove(&self, path: &str) -> Result<()>;

    /// Names of the direct children of a directory.
    fn list_dir(&self, path: &str) -> Result<Vec<String>>;

    /// Relative paths of every file matching `pattern`, sorted.
    fn glob(&self, pattern: &str) -> Result<Vec<String>>;

    /// Copy a file within the backend, replacing the destination.
    fn copy(&self, src: &str, dest: &str) -> Result<()> {
        let data = self.read_bytes(src)?;
        self.write_bytes(dest, &data)
    }

    /// Move a file within the backend.
    fn rename(&self, src: &str, dest: &str, overwrite: bool) -> Result<()> {
        if !overwrite && self.exists(dest)? {
            return Err(StorageError::AlreadyExists {
                path: dest.to_owned(),
            });
        }
        self.copy(src, dest)?;
        self.remove(src)
    }

    /// Hex-encoded SHA-256 of the file content.
    fn hash(&self, path: &str) -> Result<String> {
        let data = self.read_bytes(path)?;
        Ok(hex::encode(Sha256::digest(&data)))
    }

    /// Location of `path` on the local disk, when the backend has one.
    fn sys_path(&self, _path: &str) -> Option<PathBuf> {
        None
    }
}

/// Copy a file between two backends.
pub fn copy_file(
    src_fs: &dyn FileSystem,
    src: &str,
    dest_fs: &dyn FileSystem,
    dest: &str,
) -> Result<u64> {
    let data = src_fs.read_bytes(src)?;
    dest_fs.write_bytes(dest, &data)?;
    Ok(data.len() as u64)
}

/// Move a file between two backends: copy, then remove the source.
pub fn move_file(
    src_fs: &dyn FileSystem,
    src: &str,
    dest_fs: &dyn FileSystem,
    dest: &str,
) -> Result<u64> {
    let bytes = copy_file(src_fs, src, dest_fs, dest)?;
    src_fs.remove(src)?;
    Ok(bytes)
}

/// Compile a relative glob pattern. `*` stops at `/`; `**` spans directories.
pub(crate) fn compile_pattern(pattern: &str) -> Result<Pattern> {
    let trimmed = pattern.trim_start_matches('/');
    if trimmed.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidPath {
            path: pattern.to_owned(),
            reason: "parent segments are not allowed",
        });
    }
    Ok(Pattern::new(trimmed)?)
}

pub(crate) fn matches(pattern: &Pattern, candidate: &str) -> bool {
    pattern.matches_with(
        candidate,
        MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        },
    )
}

/// Filter a list of relative file paths by a glob pattern.
pub(crate) fn filter_glob<I>(pattern: &str, candidates: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = String>,
{
    let compiled = compile_pattern(pattern)?;
    let mut matched: Vec<String> = candidates
        .into_iter()
        .filter(|candidate| matches(&compiled, candidate))
        .collect();
    matched.sort();
    matched.dedup();
    Ok(matched)
}

pub(crate) fn normalized(path: &str) -> Result<String> {
    path::normalize(path)
}
