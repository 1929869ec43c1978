//! ---
//! psd_section: "04-data-access"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Data access against a directory on the workstation."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::sync::Arc;

use psd_common::AccessConfig;
use psd_logging::{log_transfer_event, LogContext, TransferOutcome};
use psd_storage::{BlobFs, FileSystem, LocalFs, StorageMetrics, UnionFs};

use crate::prompt::Confirm;
use crate::store::{DataAccess, DataStore, LOCAL_BACKEND, PROFILE_BACKEND};
use crate::{DataAccessError, Result};

/// Facade over the local data directory, which is both the writable backend
/// and the mirror. Profiles missing locally are read from the profile
/// container.
#[derive(Debug)]
pub struct LocalDataAccess {
    store: DataStore,
}

impl LocalDataAccess {
    /// Open the configured local directory, creating it if needed.
    pub fn open(config: &AccessConfig) -> Result<Self> {
        let root = config
            .directories
            .local_root()
            .map_err(|err| DataAccessError::Config(err.to_string()))?;
        let local: Arc<dyn FileSystem> = Arc::new(LocalFs::open(&root)?);

        let mut fs = UnionFs::new();
        fs.add_connecting(PROFILE_BACKEND, 2, false, || {
            Ok(Arc::new(BlobFs::open(&config.blob, &config.blob.profile_container)?)
                as Arc<dyn FileSystem>)
        });
        fs.add(LOCAL_BACKEND, Arc::clone(&local), 3, true);

        let store = DataStore::new(root.display().to_string(), fs, local)
            .with_execute_dir(config.directories.execute_dir.clone());
        Ok(Self { store })
    }

    /// Facade over `local`, optionally backed by a read-only `profiles`
    /// backend.
    pub fn with_backends(
        root: impl Into<String>,
        local: Arc<dyn FileSystem>,
        profiles: Option<Arc<dyn FileSystem>>,
    ) -> Self {
        let mut fs = UnionFs::new();
        if let Some(profiles) = profiles {
            fs.add(PROFILE_BACKEND, profiles, 2, false);
        }
        fs.add(LOCAL_BACKEND, Arc::clone(&local), 3, true);
        Self {
            store: DataStore::new(root, fs, local),
        }
    }

    /// Replace the terminal prompt used by [`DataAccess::remove`].
    pub fn with_confirm(mut self, confirm: Box<dyn Confirm>) -> Self {
        self.store = self.store.with_confirm(confirm);
        self
    }

    /// Record transfers into `metrics`.
    pub fn with_metrics(mut self, metrics: StorageMetrics) -> Self {
        self.store = self.store.with_metrics(metrics);
        self
    }
}

impl DataAccess for LocalDataAccess {
    fn store(&self) -> &DataStore {
        &self.store
    }

    /// Rename `file_name` over `rename` when `rename` still hashes to
    /// `checksum`. The check and the rename are not atomic.
    fn push(&self, file_name: &str, checksum: &str, rename: &str) -> Result<()> {
        let ctx = LogContext::new().with_backend(LOCAL_BACKEND).with_path(rename);
        if self.checksum(rename)? != checksum {
            self.store.record_push_conflict(LOCAL_BACKEND);
            log_transfer_event(Some(&ctx), "push", "checksum changed", TransferOutcome::Conflict);
            return Err(DataAccessError::ChecksumConflict {
                path: rename.to_owned(),
            });
        }
        self.store.fs().rename(file_name, rename, true)?;
        log_transfer_event(Some(&ctx), "push", "renamed over destination", TransferOutcome::Success);
        Ok(())
    }
}
