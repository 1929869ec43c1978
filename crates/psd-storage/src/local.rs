//! ---
//! psd_section: "02-storage"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Storage backends and the priority-ordered union registry."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::filesystem::{filter_glob, normalized, FileSystem};
use crate::{Result, StorageError};

/// Backend rooted at a directory on the local disk.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    /// Open a directory as a backend, creating it when missing.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of the backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = normalized(path)?;
        if relative.is_empty() {
            return Ok(self.root.clone());
        }
        Ok(self.root.join(relative))
    }

    fn ensure_parent(target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn not_found(path: &str, err: io::Error) -> StorageError {
        if err.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound {
                path: path.to_owned(),
            }
        } else {
            StorageError::Io(err)
        }
    }
}

impl FileSystem for LocalFs {
    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path)?.exists())
    }

    fn is_dir(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path)?.is_dir())
    }

    fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        if target.is_dir() {
            return Err(StorageError::NotAFile {
                path: path.to_owned(),
            });
        }
        fs::read(&target).map_err(|err| Self::not_found(path, err))
    }

    fn write_bytes(&self, path: &str, data: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        Self::ensure_parent(&target)?;
        let parent = target.parent().unwrap_or(&self.root);
        // Readers see either the previous content or the whole new file.
        let mut staged = NamedTempFile::new_in(parent)?;
        staged.write_all(data)?;
        staged.as_file().sync_all()?;
        staged.persist(&target).map_err(|err| StorageError::Io(err.error))?;
        Ok(())
    }

    fn make_dirs(&self, path: &str) -> Result<()> {
        fs::create_dir_all(self.resolve(path)?)?;
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        if target.is_dir() {
            return Err(StorageError::NotAFile {
                path: path.to_owned(),
            });
        }
        fs::remove_file(&target).map_err(|err| Self::not_found(path, err))
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let target = self.resolve(path)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&target).map_err(|err| Self::not_found(path, err))? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let files = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|relative| {
                        relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy().into_owned())
                            .collect::<Vec<_>>()
                            .join("/")
                    })
            });
        filter_glob(pattern, files)
    }

    fn copy(&self, src: &str, dest: &str) -> Result<()> {
        let from = self.resolve(src)?;
        let to = self.resolve(dest)?;
        Self::ensure_parent(&to)?;
        fs::copy(&from, &to).map_err(|err| Self::not_found(src, err))?;
        Ok(())
    }

    fn rename(&self, src: &str, dest: &str, overwrite: bool) -> Result<()> {
        let from = self.resolve(src)?;
        let to = self.resolve(dest)?;
        if !from.exists() {
            return Err(StorageError::NotFound {
                path: src.to_owned(),
            });
        }
        if !overwrite && to.exists() {
            return Err(StorageError::AlreadyExists {
                path: dest.to_owned(),
            });
        }
        Self::ensure_parent(&to)?;
        if let Err(err) = fs::rename(&from, &to) {
            // Cross-device moves cannot rename in place.
            debug!(src = %from.display(), dest = %to.display(), error = %err, "rename failed, copying instead");
            fs::copy(&from, &to)?;
            fs::remove_file(&from)?;
        }
        Ok(())
    }

    fn hash(&self, path: &str) -> Result<String> {
        let target = self.resolve(path)?;
        let mut file = File::open(&target).map_err(|err| Self::not_found(path, err))?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(hex::encode(hasher.finalize()))
    }

    fn sys_path(&self, path: &str) -> Option<PathBuf> {
        self.resolve(path).ok()
    }
}
