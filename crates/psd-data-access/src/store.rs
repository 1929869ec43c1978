//! ---
//! psd_section: "04-data-access"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Shared state and provided operations of the data-access facade."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use psd_logging::{log_transfer_event, psd_info, psd_warn, LogContext, TransferOutcome};
use psd_storage::path::{basename, dirname, join, normalize};
use psd_storage::{FileSystem, StorageMetrics, UnionFs};
use tracing::info;

use crate::artifact::Artifact;
use crate::profile::profile_versions;
use crate::prompt::{Confirm, StdinConfirm};
use crate::table::Table;
use crate::{DataAccessError, Result};

/// Union name of the on-disk backend of [`crate::LocalDataAccess`].
pub const LOCAL_BACKEND: &str = "local_fs";
/// Union name of the scenario server.
pub const SSH_BACKEND: &str = "ssh_fs";
/// Union name of the profiles blob container.
pub const PROFILE_BACKEND: &str = "profile_fs";

/// Suffix of a mirror file while it is being fetched.
const FETCH_SUFFIX: &str = ".part";
/// Union name of the scenario data blob container.
pub const SCENARIO_BACKEND: &str = "scenario_fs";
/// Union name of the in-process remote of [`crate::MemoryDataAccess`].
pub const MEMORY_BACKEND: &str = "in_memory";

const DEFAULT_EXECUTE_DIR: &str = "tmp";

/// Result of [`DataAccess::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The prompt was not answered with yes; nothing was deleted.
    Cancelled,
    /// The listed paths were deleted.
    Removed(Vec<String>),
}

/// Backends and collaborators shared by every facade variant.
pub struct DataStore {
    root: String,
    fs: UnionFs,
    local: Arc<dyn FileSystem>,
    execute_dir: String,
    confirm: Box<dyn Confirm>,
    metrics: Option<StorageMetrics>,
}

impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("root", &self.root)
            .field("fs", &self.fs)
            .field("local", &self.local.describe())
            .field("execute_dir", &self.execute_dir)
            .finish_non_exhaustive()
    }
}

impl DataStore {
    /// Store over `fs` with `local` as the read-through mirror.
    pub fn new(root: impl Into<String>, fs: UnionFs, local: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
            local,
            execute_dir: DEFAULT_EXECUTE_DIR.to_owned(),
            confirm: Box::new(StdinConfirm),
            metrics: None,
        }
    }

    /// Directory holding per-scenario scratch folders.
    pub fn with_execute_dir(mut self, execute_dir: impl Into<String>) -> Self {
        self.execute_dir = execute_dir.into();
        self
    }

    /// Replace the terminal prompt used by [`DataAccess::remove`].
    pub fn with_confirm(mut self, confirm: Box<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    /// Record transfers into `metrics`.
    pub fn with_metrics(mut self, metrics: StorageMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Root the store was opened at.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Union of every connected backend.
    pub fn fs(&self) -> &UnionFs {
        &self.fs
    }

    /// Local mirror.
    pub fn local(&self) -> &Arc<dyn FileSystem> {
        &self.local
    }

    /// Directory holding per-scenario scratch folders.
    pub fn execute_dir(&self) -> &str {
        &self.execute_dir
    }

    pub(crate) fn confirm(&self) -> &dyn Confirm {
        self.confirm.as_ref()
    }

    pub(crate) fn record_transfer(&self, backend: &str, direction: &str, bytes: u64) {
        if let Some(metrics) = &self.metrics {
            metrics.record_transfer(backend, direction, bytes);
        }
    }

    pub(crate) fn record_push_conflict(&self, backend: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_push_conflict(backend);
        }
    }

    pub(crate) fn observe_push(&self, backend: &str, seconds: f64) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_push_duration(backend, seconds);
        }
    }
}

/// Read, write and synchronize scenario artifacts by relative path.
///
/// Implementors supply their [`DataStore`] and a push strategy; every other
/// operation is shared.
pub trait DataAccess {
    /// Backends and collaborators of this facade.
    fn store(&self) -> &DataStore;

    /// Move `file_name` from the local mirror over `rename`, provided the
    /// destination still has `checksum`.
    fn push(&self, file_name: &str, checksum: &str, rename: &str) -> Result<()>;

    /// Root the facade was opened at.
    fn root(&self) -> &str {
        self.store().root()
    }

    /// Join relative path components with `/`.
    fn join(&self, parts: &[&str]) -> String {
        parts.iter().fold(String::new(), |acc, part| join(&acc, part))
    }

    /// Read an artifact, fetching it into the local mirror first if needed.
    fn read(&self, path: &str) -> Result<Artifact> {
        let store = self.store();
        let path = normalize(path)?;
        if !store.local().exists(&path)? {
            info!(path = %path, "{path} not found on local machine");
            self.copy_from(basename(&path), Some(dirname(&path)))?;
        }
        Artifact::decode(store.local().as_ref(), &path)
    }

    /// Read a tabular artifact.
    fn read_table(&self, path: &str) -> Result<Table> {
        self.read(path)?.into_table(path)
    }

    /// Write a new artifact to the writable backend, and to the local
    /// mirror too when `save_local` is set.
    fn write(&self, path: &str, data: &Artifact, save_local: bool) -> Result<()> {
        let store = self.store();
        let path = normalize(path)?;
        self.check_file_exists(&path, false)?;
        let bytes = data.encode(&path)?;

        let writer = store.fs().writer()?;
        psd_info!(
            context = LogContext::new().with_backend(writer.name()).with_path(&path),
            "Writing {path}"
        );
        store.fs().make_dirs(dirname(&path))?;
        store.fs().write_bytes(&path, &bytes)?;
        store.record_transfer(writer.name(), "write", bytes.len() as u64);

        if save_local && writer.name() != LOCAL_BACKEND {
            store.local().write_bytes(&path, &bytes)?;
        }
        Ok(())
    }

    /// Copy `from_dir/file_name` from the union into the local mirror.
    ///
    /// The file is staged next to its destination and renamed into place,
    /// so a failed transfer never leaves a partial file under the final name.
    fn copy_from(&self, file_name: &str, from_dir: Option<&str>) -> Result<()> {
        let store = self.store();
        let from_path = normalize(&join(from_dir.unwrap_or_default(), file_name))?;
        let location = self
            .check_file_exists(&from_path, true)?
            .unwrap_or_default();
        let ctx = LogContext::new().with_backend(&location).with_path(&from_path);
        psd_info!(context = ctx.clone(), "Transferring {file_name} from {location}");

        let local = store.local();
        let staged = format!("{from_path}{FETCH_SUFFIX}");
        let transfer = store.fs().read_bytes(&from_path).and_then(|bytes| {
            local.write_bytes(&staged, &bytes)?;
            local.rename(&staged, &from_path, true)?;
            Ok(bytes.len() as u64)
        });
        match transfer {
            Ok(bytes) => {
                store.record_transfer(&location, "fetch", bytes);
                Ok(())
            }
            Err(err) => {
                if local.exists(&staged).unwrap_or(false) {
                    if let Err(cleanup) = local.remove(&staged) {
                        psd_warn!(context = ctx.clone(), "could not remove {staged}: {cleanup}");
                    }
                }
                log_transfer_event(Some(&ctx), "fetch", &err.to_string(), TransferOutcome::Fault);
                Err(err.into())
            }
        }
    }

    /// Copy within the union. A directory `dest` receives the source name.
    fn copy(&self, src: &str, dest: &str) -> Result<()> {
        let fs = self.store().fs();
        let dest = if fs.is_dir(dest)? {
            join(dest, basename(src))
        } else {
            normalize(dest)?
        };
        self.check_file_exists(src, true)?;
        self.check_file_exists(&dest, false)?;
        fs.copy(src, &dest)?;
        Ok(())
    }

    /// Delete every file matching the glob `pattern`, asking first when
    /// `confirm` is set.
    fn remove(&self, pattern: &str, confirm: bool) -> Result<RemoveOutcome> {
        let store = self.store();
        let matches = store.fs().glob(pattern)?;
        if matches.is_empty() {
            return Err(DataAccessError::NotFound {
                path: pattern.to_owned(),
            });
        }
        if confirm
            && !store
                .confirm()
                .confirm(&format!("Delete '{pattern}'? [y/n] (default is 'n')"))?
        {
            info!(pattern, "Operation cancelled.");
            return Ok(RemoveOutcome::Cancelled);
        }
        for path in &matches {
            store.fs().remove(path)?;
        }
        info!(pattern, removed = matches.len(), "--> Done!");
        Ok(RemoveOutcome::Removed(matches))
    }

    /// Content hash of the authoritative copy of `path`.
    fn checksum(&self, path: &str) -> Result<String> {
        self.check_file_exists(path, true)?;
        Ok(self.store().fs().hash(path)?)
    }

    /// Scratch folder of a scenario run.
    fn tmp_folder(&self, scenario_id: &str) -> String {
        join(self.store().execute_dir(), &format!("scenario_{scenario_id}"))
    }

    /// Raw profile versions of `kind` for `grid_model`, from the profile
    /// container and the local mirror.
    fn get_profile_version(&self, grid_model: &str, kind: &str) -> Result<BTreeSet<String>> {
        let store = self.store();
        let mut versions = BTreeSet::new();
        if let Some(profiles) = store.fs().get(PROFILE_BACKEND) {
            versions.extend(profile_versions(profiles.as_ref(), grid_model, kind)?);
        }
        versions.extend(profile_versions(store.local().as_ref(), grid_model, kind)?);
        Ok(versions)
    }

    /// Check presence of `path` on the union.
    ///
    /// Returns the name of the holding backend, if any.
    fn check_file_exists(&self, path: &str, should_exist: bool) -> Result<Option<String>> {
        let location = self
            .store()
            .fs()
            .which(path)?
            .map(|entry| entry.name().to_owned());
        match (should_exist, location) {
            (true, None) => Err(DataAccessError::NotFound {
                path: path.to_owned(),
            }),
            (false, Some(location)) => Err(DataAccessError::AlreadyExists {
                path: path.to_owned(),
                location,
            }),
            (_, location) => Ok(location),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDataAccess;
    use crate::prompt::ScriptedConfirm;
    use crate::table::{ColumnKey, IndexValue};
    use psd_storage::{MemoryFs, StorageError};
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Mirror whose writes stop halfway while `full` is set.
    #[derive(Debug)]
    struct FullDisk {
        inner: MemoryFs,
        full: AtomicBool,
    }

    impl FileSystem for FullDisk {
        fn describe(&self) -> String {
            self.inner.describe()
        }
        fn exists(&self, path: &str) -> psd_storage::Result<bool> {
            self.inner.exists(path)
        }
        fn is_dir(&self, path: &str) -> psd_storage::Result<bool> {
            self.inner.is_dir(path)
        }
        fn read_bytes(&self, path: &str) -> psd_storage::Result<Vec<u8>> {
            self.inner.read_bytes(path)
        }
        fn write_bytes(&self, path: &str, data: &[u8]) -> psd_storage::Result<()> {
            if self.full.load(Ordering::SeqCst) {
                self.inner.write_bytes(path, &data[..data.len() / 2])?;
                return Err(StorageError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "no space left on device",
                )));
            }
            self.inner.write_bytes(path, data)
        }
        fn make_dirs(&self, path: &str) -> psd_storage::Result<()> {
            self.inner.make_dirs(path)
        }
        fn remove(&self, path: &str) -> psd_storage::Result<()> {
            self.inner.remove(path)
        }
        fn list_dir(&self, path: &str) -> psd_storage::Result<Vec<String>> {
            self.inner.list_dir(path)
        }
        fn glob(&self, pattern: &str) -> psd_storage::Result<Vec<String>> {
            self.inner.glob(pattern)
        }
    }

    #[derive(Debug)]
    struct MirroredAccess {
        store: DataStore,
    }

    impl DataAccess for MirroredAccess {
        fn store(&self) -> &DataStore {
            &self.store
        }

        fn push(&self, _file_name: &str, _checksum: &str, _rename: &str) -> Result<()> {
            Ok(())
        }
    }

    fn table() -> Table {
        Table::new(
            Some("UTC".into()),
            vec![IndexValue::Int(0), IndexValue::Int(1)],
            vec![ColumnKey::Int(1), ColumnKey::Int(2)],
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        )
        .unwrap()
    }

    #[test]
    fn join_skips_empty_parts() {
        let access = MemoryDataAccess::new();
        assert_eq!(access.join(&["data", "", "output"]), "data/output");
        assert_eq!(access.tmp_folder("87"), "tmp/scenario_87");
    }

    #[test]
    fn writing_twice_reports_holder() {
        let access = MemoryDataAccess::new();
        let data = Artifact::Table(table());
        access.write("data/output/1_PG.pkl", &data, true).unwrap();
        let err = access.write("data/output/1_PG.pkl", &data, true).unwrap_err();
        assert!(matches!(
            err,
            DataAccessError::AlreadyExists { location, .. } if location == MEMORY_BACKEND
        ));
    }

    #[test]
    fn read_fetches_into_mirror() {
        let access = MemoryDataAccess::new();
        access
            .write("data/output/1_PG.csv", &Artifact::Table(table()), false)
            .unwrap();
        assert!(!access.store().local().exists("data/output/1_PG.csv").unwrap());

        assert_eq!(access.read_table("data/output/1_PG.csv").unwrap(), table());
        assert!(access.store().local().exists("data/output/1_PG.csv").unwrap());
    }

    #[test]
    fn copy_into_directory_keeps_name() {
        let access = MemoryDataAccess::new();
        access
            .write("data/input/1_ct.pkl", &Artifact::Table(table()), false)
            .unwrap();
        access.store().fs().make_dirs("backup").unwrap();
        access.copy("data/input/1_ct.pkl", "backup").unwrap();
        assert!(access.store().fs().exists("backup/1_ct.pkl").unwrap());

        let err = access.copy("data/input/1_ct.pkl", "backup").unwrap_err();
        assert!(matches!(err, DataAccessError::AlreadyExists { .. }));
    }

    #[test]
    fn declined_removal_keeps_files() {
        let access = MemoryDataAccess::new()
            .with_confirm(Box::new(ScriptedConfirm::new(["n", "y"])));
        for id in ["1", "2"] {
            access
                .write(&format!("data/output/{id}_PG.pkl"), &Artifact::Table(table()), false)
                .unwrap();
        }

        let outcome = access.remove("data/output/*_PG.pkl", true).unwrap();
        assert_eq!(outcome, RemoveOutcome::Cancelled);
        assert_eq!(access.remote().len(), 2);

        let outcome = access.remove("data/output/*_PG.pkl", true).unwrap();
        assert_eq!(
            outcome,
            RemoveOutcome::Removed(vec![
                "data/output/1_PG.pkl".to_owned(),
                "data/output/2_PG.pkl".to_owned()
            ])
        );
        assert!(access.remote().is_empty());
        assert!(matches!(
            access.remove("data/output/*_PG.pkl", false),
            Err(DataAccessError::NotFound { .. })
        ));
    }

    #[test]
    fn profile_versions_merge_mirror() {
        let access = MemoryDataAccess::new();
        access
            .store()
            .local()
            .write_bytes("raw/usa_tamu/wind_vJan2021.csv", b"UTC\n")
            .unwrap();
        let versions = access.get_profile_version("usa_tamu", "wind").unwrap();
        assert_eq!(versions.into_iter().collect::<Vec<_>>(), ["vJan2021"]);
        assert!(access.get_profile_version("usa_tamu", "solar").unwrap().is_empty());
    }

    #[test]
    fn checksum_requires_presence() {
        let access = MemoryDataAccess::new();
        assert!(matches!(
            access.checksum("ScenarioList.csv"),
            Err(DataAccessError::NotFound { .. })
        ));
        let remote = MemoryFs::new("probe");
        remote.write_bytes("a", b"abc").unwrap();
        access.remote().write_bytes("ScenarioList.csv", b"abc").unwrap();
        assert_eq!(
            access.checksum("ScenarioList.csv").unwrap(),
            remote.hash("a").unwrap()
        );
    }

    #[test]
    fn failed_fetch_leaves_mirror_clean() {
        let remote = Arc::new(MemoryFs::new(MEMORY_BACKEND));
        let mut fs = UnionFs::new();
        fs.add(MEMORY_BACKEND, Arc::clone(&remote) as Arc<dyn FileSystem>, 0, true);
        let mirror = Arc::new(FullDisk {
            inner: MemoryFs::new("local"),
            full: AtomicBool::new(true),
        });
        let access = MirroredAccess {
            store: DataStore::new("dummy", fs, Arc::clone(&mirror) as Arc<dyn FileSystem>),
        };
        let rows = Table::new(
            Some("UTC".into()),
            (0..4).map(IndexValue::Int).collect(),
            vec![ColumnKey::Int(1), ColumnKey::Int(2)],
            vec![vec![1.0, 2.0]; 4],
        )
        .unwrap();
        access
            .write("data/x.csv", &Artifact::Table(rows.clone()), false)
            .unwrap();

        assert!(access.read_table("data/x.csv").is_err());
        assert!(!mirror.exists("data/x.csv").unwrap());
        assert!(mirror.glob("data/*").unwrap().is_empty());

        mirror.full.store(false, Ordering::SeqCst);
        assert_eq!(access.read_table("data/x.csv").unwrap(), rows);
        assert!(mirror.exists("data/x.csv").unwrap());
    }
}
