//! ---
//! psd_section: "02-storage"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Storage backends and the priority-ordered union registry."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::filesystem::{copy_file, FileSystem};
use crate::{Result, StorageError};

/// One backend registered with a [`UnionFs`].
#[derive(Debug, Clone)]
pub struct BackendEntry {
    name: String,
    fs: Arc<dyn FileSystem>,
    priority: i32,
    writable: bool,
    order: usize,
}

impl BackendEntry {
    /// Registration name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend handle.
    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Resolution priority; higher wins.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether writes may target this backend.
    pub fn writable(&self) -> bool {
        self.writable
    }
}

/// Priority-ordered union of backends presented as a single filesystem.
///
/// Reads resolve to the highest-priority backend holding the path; among equal
/// priorities the most recently added backend wins. Writes go to the
/// highest-priority writable backend.
#[derive(Debug, Clone, Default)]
pub struct UnionFs {
    entries: Vec<BackendEntry>,
    next_order: usize,
}

impl UnionFs {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        fs: Arc<dyn FileSystem>,
        priority: i32,
        writable: bool,
    ) -> &mut Self {
        let name = name.into();
        self.entries.retain(|entry| entry.name != name);
        debug!(backend = %name, location = %fs.describe(), priority, writable, "registering backend");
        self.entries.push(BackendEntry {
            name,
            fs,
            priority,
            writable,
            order: self.next_order,
        });
        self.next_order += 1;
        self.entries
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(b.order.cmp(&a.order)));
        self
    }

    /// Register a backend produced by a fallible connector.
    ///
    /// A failed connection is logged and skipped so the registry degrades to
    /// the remaining backends. Returns whether the backend was added.
    pub fn add_connecting<F>(
        &mut self,
        name: impl Into<String>,
        priority: i32,
        writable: bool,
        connect: F,
    ) -> bool
    where
        F: FnOnce() -> Result<Arc<dyn FileSystem>>,
    {
        let name = name.into();
        match connect() {
            Ok(fs) => {
                self.add(name, fs, priority, writable);
                true
            }
            Err(err) => {
                warn!(backend = %name, error = %err, "could not connect backend; continuing without it");
                false
            }
        }
    }

    /// Registered backends in resolution order.
    pub fn backends(&self) -> impl Iterator<Item = &BackendEntry> {
        self.entries.iter()
    }

    /// Backend registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn FileSystem>> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.fs)
    }

    /// Whether a backend named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The backend that is authoritative for `path`, if any holds it.
    pub fn which(&self, path: &str) -> Result<Option<&BackendEntry>> {
        for entry in &self.entries {
            if entry.fs.exists(path)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Highest-priority writable backend.
    pub fn writer(&self) -> Result<&BackendEntry> {
        self.entries
            .iter()
            .find(|entry| entry.writable)
            .ok_or(StorageError::NoWritableBackend)
    }

    /// Write to a specific named backend.
    pub fn write_to(&self, name: &str, path: &str, data: &[u8]) -> Result<()> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| StorageError::UnknownBackend(name.to_owned()))?;
        if !entry.writable {
            return Err(StorageError::ReadOnly {
                backend: entry.name.clone(),
            });
        }
        entry.fs.write_bytes(path, data)
    }

    fn holder(&self, path: &str) -> Result<&BackendEntry> {
        self.which(path)?.ok_or_else(|| StorageError::NotFound {
            path: path.to_owned(),
        })
    }
}

impl FileSystem for UnionFs {
    fn describe(&self) -> String {
        let names: Vec<&str> = self.entries.iter().map(|entry| entry.name.as_str()).collect();
        format!("union({})", names.join(", "))
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.which(path)?.is_some())
    }

    fn is_dir(&self, path: &str) -> Result<bool> {
        for entry in &self.entries {
            if entry.fs.is_dir(path)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        self.holder(path)?.fs.read_bytes(path)
    }

    fn write_bytes(&self, path: &str, data: &[u8]) -> Result<()> {
        self.writer()?.fs.write_bytes(path, data)
    }

    fn make_dirs(&self, path: &str) -> Result<()> {
        self.writer()?.fs.make_dirs(path)
    }

    fn remove(&self, path: &str) -> Result<()> {
        let writer = self.writer()?;
        if !writer.fs.exists(path)? {
            if let Some(holder) = self.which(path)? {
                return Err(StorageError::ReadOnly {
                    backend: holder.name.clone(),
                });
            }
        }
        writer.fs.remove(path)
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        let mut found = false;
        for entry in &self.entries {
            if entry.fs.is_dir(path)? {
                found = true;
                names.extend(entry.fs.list_dir(path)?);
            }
        }
        if !found {
            return Err(StorageError::NotFound {
                path: path.to_owned(),
            });
        }
        Ok(names.into_iter().collect())
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let mut matched = BTreeSet::new();
        for entry in &self.entries {
            matched.extend(entry.fs.glob(pattern)?);
        }
        Ok(matched.into_iter().collect())
    }

    fn copy(&self, src: &str, dest: &str) -> Result<()> {
        let holder = self.holder(src)?;
        let writer = self.writer()?;
        if holder.name == writer.name {
            return writer.fs.copy(src, dest);
        }
        copy_file(holder.fs.as_ref(), src, writer.fs.as_ref(), dest).map(|_| ())
    }

    fn rename(&self, src: &str, dest: &str, overwrite: bool) -> Result<()> {
        let holder = self.holder(src)?;
        if !holder.writable {
            return Err(StorageError::ReadOnly {
                backend: holder.name.clone(),
            });
        }
        holder.fs.rename(src, dest, overwrite)
    }

    fn hash(&self, path: &str) -> Result<String> {
        self.holder(path)?.fs.hash(path)
    }

    fn sys_path(&self, path: &str) -> Option<PathBuf> {
        self.which(path).ok().flatten().and_then(|entry| entry.fs.sys_path(path))
    }
}
