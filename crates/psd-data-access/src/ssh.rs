//! ---
//! psd_section: "04-data-access"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Data access against the shared scenario server."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::process::{Child, Command};
use std::sync::Arc;
use std::time::Instant;

use psd_common::{AccessConfig, ServerConfig};
use psd_logging::{
    log_transfer_event, psd_debug, psd_error, psd_info, psd_warn, LogContext, TransferOutcome,
};
use psd_storage::{
    move_file, BlobFs, CommandOutput, FileSystem, LocalFs, Shell, SshFs, SshShell, UnionFs,
};

use crate::push::{staging_name, StagedPush, SwapCommand, LOCK_FILE};
use crate::store::{DataAccess, DataStore, PROFILE_BACKEND, SCENARIO_BACKEND, SSH_BACKEND};
use crate::{DataAccessError, Result};

/// Facade over the scenario server, falling back to the blob containers
/// for reads.
///
/// Backends, highest priority first: the server (writable), the profile
/// container, the scenario data container. Artifacts are cached in the
/// local directory from the configuration.
#[derive(Debug)]
pub struct SshDataAccess {
    store: DataStore,
    remote: Option<Arc<SshFs>>,
    server: Option<ServerConfig>,
}

impl SshDataAccess {
    /// Connect using the `ssh` client and the configured blob account.
    ///
    /// An unreachable server is logged and left out of the union, so reads
    /// still resolve from blob storage.
    pub fn connect(config: &AccessConfig) -> Result<Self> {
        let server = config.server.clone();
        let mut access = Self::build(config, move || {
            Ok(Arc::new(SshShell::from_config(&server)?) as Arc<dyn Shell>)
        })?;
        access.server = Some(config.server.clone());
        Ok(access)
    }

    /// Connect through an already configured shell.
    pub fn with_shell(config: &AccessConfig, shell: Arc<dyn Shell>) -> Result<Self> {
        Self::build(config, move || Ok(shell))
    }

    /// Facade over a prepared store; `remote` must be the backend registered
    /// as [`SSH_BACKEND`].
    pub fn from_store(store: DataStore, remote: Option<Arc<SshFs>>) -> Self {
        Self {
            store,
            remote,
            server: None,
        }
    }

    fn build<F>(config: &AccessConfig, shell: F) -> Result<Self>
    where
        F: FnOnce() -> psd_storage::Result<Arc<dyn Shell>>,
    {
        let directories = &config.directories;
        let local_root = directories
            .local_root()
            .map_err(|err| DataAccessError::Config(err.to_string()))?;
        let local: Arc<dyn FileSystem> = Arc::new(LocalFs::open(&local_root)?);
        let root = directories.data_root_dir.clone();

        let mut fs = UnionFs::new();
        let mut remote = None;
        fs.add_connecting(SSH_BACKEND, 3, true, || {
            let ssh = Arc::new(SshFs::connect(shell()?, root.clone())?);
            remote = Some(Arc::clone(&ssh));
            Ok(ssh as Arc<dyn FileSystem>)
        });
        fs.add_connecting(PROFILE_BACKEND, 2, false, || {
            Ok(Arc::new(BlobFs::open(&config.blob, &config.blob.profile_container)?)
                as Arc<dyn FileSystem>)
        });
        fs.add_connecting(SCENARIO_BACKEND, 1, false, || {
            Ok(Arc::new(BlobFs::open(&config.blob, &config.blob.scenario_container)?)
                as Arc<dyn FileSystem>)
        });

        let store =
            DataStore::new(root, fs, local).with_execute_dir(directories.execute_dir.clone());
        Ok(Self::from_store(store, remote))
    }

    /// Replace the terminal prompt used by [`DataAccess::remove`].
    pub fn with_confirm(mut self, confirm: Box<dyn crate::Confirm>) -> Self {
        self.store = self.store.with_confirm(confirm);
        self
    }

    /// Record transfers and pushes into `metrics`.
    pub fn with_metrics(mut self, metrics: psd_storage::StorageMetrics) -> Self {
        self.store = self.store.with_metrics(metrics);
        self
    }

    /// The connected server backend.
    pub fn remote(&self) -> Result<&Arc<SshFs>> {
        self.remote
            .as_ref()
            .ok_or_else(|| DataAccessError::Connection("ssh server is not connected".into()))
    }

    /// Run a command on the server and wait for it.
    pub fn execute_command(&self, command: &str) -> Result<CommandOutput> {
        Ok(self.remote()?.exec(command)?)
    }

    /// Start a command on the server without waiting for it to finish.
    pub fn execute_command_async(&self, command: &[&str]) -> Result<Child> {
        let server = self.server.as_ref().ok_or_else(|| {
            DataAccessError::Connection("no ssh client configured for this facade".into())
        })?;
        let user = server
            .resolve_user()
            .map_err(|err| DataAccessError::Config(err.to_string()))?;
        let child = Command::new("ssh")
            .arg("-p")
            .arg(server.ssh_port.to_string())
            .arg(format!("{user}@{}", server.address))
            .args(command)
            .spawn()?;
        Ok(child)
    }

    /// Upload `file_name` from the local mirror to the staging name of
    /// `rename` on the server.
    ///
    /// Fails with [`DataAccessError::NamingConflict`] when a staged copy from
    /// an earlier push is still present.
    pub fn stage(&self, file_name: &str, rename: &str) -> Result<StagedPush> {
        let remote = self.remote()?;
        let backup = staging_name(rename);
        let ctx = LogContext::new().with_backend(SSH_BACKEND).with_path(rename);
        self.check_file_exists(&backup, false).map_err(|err| match err {
            DataAccessError::AlreadyExists { path, .. } => {
                psd_warn!(context = ctx.clone(), "{path} is left over from an earlier push");
                DataAccessError::NamingConflict { path }
            }
            other => other,
        })?;

        psd_info!(context = ctx.clone(), "Transferring {rename} to server");
        let bytes = move_file(self.store.local().as_ref(), file_name, &**remote, &backup)
            .map_err(|err| {
                log_transfer_event(Some(&ctx), "push", &err.to_string(), TransferOutcome::Fault);
                err
            })?;
        self.store.record_transfer(SSH_BACKEND, "push", bytes);

        Ok(StagedPush {
            rename: rename.to_owned(),
            original: remote.remote_path(rename)?,
            updated: remote.remote_path(&backup)?,
        })
    }

    /// Swap a staged upload over its destination if the destination still
    /// has `checksum`.
    pub fn verify_and_swap(&self, staged: &StagedPush, checksum: &str) -> Result<()> {
        let remote = self.remote()?;
        let command = SwapCommand::new(staged, remote.remote_path(LOCK_FILE)?, checksum);
        let ctx = LogContext::new()
            .with_backend(SSH_BACKEND)
            .with_path(&staged.rename);
        psd_debug!(context = ctx.clone(), "swapping {} over {}", staged.updated, staged.original);
        let output = remote.exec(&command.render()).map_err(|err| {
            log_transfer_event(Some(&ctx), "push", &err.to_string(), TransferOutcome::Fault);
            err
        })?;

        let errors = output.stderr_lines();
        if !errors.is_empty() {
            for line in &errors {
                psd_error!(context = ctx, "{line}");
            }
            self.store.record_push_conflict(SSH_BACKEND);
            log_transfer_event(Some(&ctx), "push", "remote swap rejected", TransferOutcome::Conflict);
            return Err(DataAccessError::PushFailed {
                path: staged.rename.clone(),
                lines: errors,
            });
        }
        log_transfer_event(Some(&ctx), "push", "remote swap completed", TransferOutcome::Success);
        Ok(())
    }
}

impl DataAccess for SshDataAccess {
    fn store(&self) -> &DataStore {
        &self.store
    }

    /// `sha1sum` line of the server copy, the value the swap compares.
    fn checksum(&self, path: &str) -> Result<String> {
        self.check_file_exists(path, true)?;
        Ok(self.remote()?.checksum(path)?)
    }

    fn push(&self, file_name: &str, checksum: &str, rename: &str) -> Result<()> {
        let started = Instant::now();
        let outcome = self
            .stage(file_name, rename)
            .and_then(|staged| self.verify_and_swap(&staged, checksum));
        self.store
            .observe_push(SSH_BACKEND, started.elapsed().as_secs_f64());
        outcome
    }
}
