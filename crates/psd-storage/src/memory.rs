//! ---
//! psd_section: "02-storage"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Storage backends and the priority-ordered union registry."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;

use crate::filesystem::{filter_glob, normalized, FileSystem};
use crate::path::dirname;
use crate::{Result, StorageError};

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl Tree {
    fn add_parents(&mut self, path: &str) {
        let mut parent = dirname(path);
        while !parent.is_empty() {
            if !self.dirs.insert(parent.to_owned()) {
                break;
            }
            parent = dirname(parent);
        }
    }

    fn is_dir(&self, path: &str) -> bool {
        path.is_empty() || self.dirs.contains(path)
    }
}

/// In-process backend used by tests and the in-memory data access variant.
#[derive(Debug, Default)]
pub struct MemoryFs {
    name: String,
    tree: RwLock<Tree>,
}

impl MemoryFs {
    /// Create an empty backend labelled `name` in diagnostics.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tree: RwLock::new(Tree::default()),
        }
    }

    /// Number of files currently held.
    pub fn len(&self) -> usize {
        self.tree.read().files.len()
    }

    /// Whether the backend holds no files.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileSystem for MemoryFs {
    fn describe(&self) -> String {
        format!("mem:{}", self.name)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let path = normalized(path)?;
        let tree = self.tree.read();
        Ok(tree.files.contains_key(&path) || tree.is_dir(&path))
    }

    fn is_dir(&self, path: &str) -> Result<bool> {
        let path = normalized(path)?;
        Ok(self.tree.read().is_dir(&path))
    }

    fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let key = normalized(path)?;
        let tree = self.tree.read();
        if tree.is_dir(&key) {
            return Err(StorageError::NotAFile {
                path: path.to_owned(),
            });
        }
        tree.files
            .get(&key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_owned(),
            })
    }

    fn write_bytes(&self, path: &str, data: &[u8]) -> Result<()> {
        let key = normalized(path)?;
        let mut tree = self.tree.write();
        if key.is_empty() || tree.dirs.contains(&key) {
            return Err(StorageError::NotAFile {
                path: path.to_owned(),
            });
        }
        tree.add_parents(&key);
        tree.files.insert(key, data.to_vec());
        Ok(())
    }

    fn make_dirs(&self, path: &str) -> Result<()> {
        let key = normalized(path)?;
        if key.is_empty() {
            return Ok(());
        }
        let mut tree = self.tree.write();
        if tree.files.contains_key(&key) {
            return Err(StorageError::AlreadyExists { path: key });
        }
        tree.add_parents(&key);
        tree.dirs.insert(key);
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        let key = normalized(path)?;
        let mut tree = self.tree.write();
        if tree.is_dir(&key) {
            return Err(StorageError::NotAFile {
                path: path.to_owned(),
            });
        }
        tree.files
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_owned(),
            })
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let key = normalized(path)?;
        let tree = self.tree.read();
        if !tree.is_dir(&key) {
            return Err(StorageError::NotFound {
                path: path.to_owned(),
            });
        }
        let names: BTreeSet<String> = tree
            .files
            .keys()
            .chain(tree.dirs.iter())
            .filter(|candidate| dirname(candidate) == key)
            .map(|candidate| crate::path::basename(candidate).to_owned())
            .collect();
        Ok(names.into_iter().collect())
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let files: Vec<String> = self.tree.read().files.keys().cloned().collect();
        filter_glob(pattern, files)
    }

    fn rename(&self, src: &str, dest: &str, overwrite: bool) -> Result<()> {
        let from = normalized(src)?;
        let to = normalized(dest)?;
        let mut tree = self.tree.write();
        if !overwrite && tree.files.contains_key(&to) {
            return Err(StorageError::AlreadyExists {
                path: dest.to_owned(),
            });
        }
        let data = tree.files.remove(&from).ok_or_else(|| StorageError::NotFound {
            path: src.to_owned(),
        })?;
        tree.add_parents(&to);
        tree.files.insert(to, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_implicit() {
        let mem = MemoryFs::new("test");
        mem.write_bytes("raw/usa_tamu/demand_v1.csv", b"x").unwrap();
        assert!(mem.is_dir("raw").unwrap());
        assert!(mem.is_dir("raw/usa_tamu").unwrap());
        assert_eq!(mem.list_dir("raw").unwrap(), vec!["usa_tamu"]);
        assert_eq!(mem.list_dir("raw/usa_tamu").unwrap(), vec!["demand_v1.csv"]);
        assert!(mem.list_dir("missing").is_err());
    }

    #[test]
    fn rename_moves_content() {
        let mem = MemoryFs::new("test");
        mem.write_bytes("a.pkl", b"a").unwrap();
        mem.rename("a.pkl", "nested/b.pkl", false).unwrap();
        assert!(!mem.exists("a.pkl").unwrap());
        assert_eq!(mem.read_bytes("nested/b.pkl").unwrap(), b"a");
        assert_eq!(mem.len(), 1);
    }

    #[test]
    fn removing_directories_is_rejected() {
        let mem = MemoryFs::new("test");
        mem.make_dirs("data/output").unwrap();
        assert!(matches!(
            mem.remove("data/output"),
            Err(StorageError::NotAFile { .. })
        ));
        assert!(mem.is_empty());
    }
}
