//! ---
//! psd_section: "04-data-access"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "In-process client/server pair for tests."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::sync::Arc;

use psd_storage::{move_file, FileSystem, MemoryFs, UnionFs};

use crate::prompt::Confirm;
use crate::store::{DataAccess, DataStore, MEMORY_BACKEND};
use crate::Result;

/// Client mirror and "server" both held in memory.
#[derive(Debug)]
pub struct MemoryDataAccess {
    store: DataStore,
    remote: Arc<MemoryFs>,
}

impl MemoryDataAccess {
    /// Empty mirror and remote.
    pub fn new() -> Self {
        let remote = Arc::new(MemoryFs::new(MEMORY_BACKEND));
        let mut fs = UnionFs::new();
        fs.add(MEMORY_BACKEND, Arc::clone(&remote) as Arc<dyn FileSystem>, 0, true);
        Self {
            store: DataStore::new("dummy", fs, Arc::new(MemoryFs::new("local"))),
            remote,
        }
    }

    /// Replace the terminal prompt used by [`DataAccess::remove`].
    pub fn with_confirm(mut self, confirm: Box<dyn Confirm>) -> Self {
        self.store = self.store.with_confirm(confirm);
        self
    }

    /// The in-memory "server".
    pub fn remote(&self) -> &Arc<MemoryFs> {
        &self.remote
    }
}

impl Default for MemoryDataAccess {
    fn default() -> Self {
        Self::new()
    }
}

impl DataAccess for MemoryDataAccess {
    fn store(&self) -> &DataStore {
        &self.store
    }

    /// Moves the file unconditionally; `checksum` is ignored.
    fn push(&self, file_name: &str, _checksum: &str, rename: &str) -> Result<()> {
        move_file(
            self.store.local().as_ref(),
            file_name,
            self.store.fs(),
            rename,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_overwrites_remote() {
        let access = MemoryDataAccess::new();
        access.remote().write_bytes("ScenarioList.csv", b"old").unwrap();
        access
            .store()
            .local()
            .write_bytes("ScenarioList.csv", b"new")
            .unwrap();

        access.push("ScenarioList.csv", "ignored", "ScenarioList.csv").unwrap();
        assert_eq!(access.remote().read_bytes("ScenarioList.csv").unwrap(), b"new");
        assert!(!access.store().local().exists("ScenarioList.csv").unwrap());
    }
}
