//! ---
//! psd_section: "04-data-access"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Scenario artifact access over the storage union."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Uniform read/write/copy/remove/push over a [`psd_storage::UnionFs`] with a
//! local mirror that caches every artifact that has been read once.
//!
//! Three variants implement [`DataAccess`]: [`LocalDataAccess`] for
//! workstation-only use, [`SshDataAccess`] for the shared scenario server and
//! [`MemoryDataAccess`] for tests.

use psd_storage::StorageError;

/// Result alias used throughout the data-access crate.
pub type Result<T> = std::result::Result<T, DataAccessError>;

/// Error type for the data-access facade.
#[derive(Debug, thiserror::Error)]
pub enum DataAccessError {
    /// The path is absent from every registered backend.
    #[error("{path} not found")]
    NotFound {
        /// Relative path that was requested.
        path: String,
    },
    /// The destination already exists.
    #[error("{path} already exists on {location}")]
    AlreadyExists {
        /// Relative path of the existing file.
        path: String,
        /// Backend holding it.
        location: String,
    },
    /// The file extension maps to no known artifact format.
    #[error("unknown extension: {0}")]
    UnsupportedFormat(String),
    /// The artifact does not have the shape the caller asked for.
    #[error("{path} does not hold a {expected}")]
    WrongArtifact {
        /// Relative path of the artifact.
        path: String,
        /// Expected artifact shape.
        expected: &'static str,
    },
    /// The destination changed since the caller read it.
    #[error("checksum of {path} changed since it was read; refusing to overwrite")]
    ChecksumConflict {
        /// Destination path.
        path: String,
    },
    /// A staged copy from an earlier push is still on the server.
    #[error("{path} already exists on the server; remove it before pushing again")]
    NamingConflict {
        /// Staging path on the server.
        path: String,
    },
    /// The remote swap reported errors, usually a concurrent modification.
    #[error("failed to push {path}, most likely due to a conflict: {}", lines.join("; "))]
    PushFailed {
        /// Destination path.
        path: String,
        /// Error lines reported by the remote command.
        lines: Vec<String>,
    },
    /// A backend needed by the operation is not connected.
    #[error("backend unavailable: {0}")]
    Connection(String),
    /// The configuration cannot be turned into backends.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Stored content could not be decoded.
    #[error("{path} is corrupted: {reason}")]
    Corrupted {
        /// Relative path of the artifact.
        path: String,
        /// Decoder diagnostic.
        reason: String,
    },
    /// The artifact has no local filesystem location.
    #[error("{path} has no local system path")]
    NoSystemPath {
        /// Relative path of the artifact.
        path: String,
    },
    /// Wrapper for tabular decoding failures.
    #[error("table error: {0}")]
    Table(#[from] table::TableError),
    /// Wrapper for MATLAB container failures.
    #[error("mat file error: {0}")]
    Mat(#[from] mat::MatError),
    /// Wrapper for CBOR serialization issues.
    #[error("cbor serialization error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    /// Wrapper for other storage failures.
    #[error("storage error: {0}")]
    Storage(StorageError),
    /// Wrapper for IO errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for DataAccessError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { path } => DataAccessError::NotFound { path },
            StorageError::NoSystemPath { path } => DataAccessError::NoSystemPath { path },
            StorageError::Connection { backend, reason } => {
                DataAccessError::Connection(format!("{backend}: {reason}"))
            }
            other => DataAccessError::Storage(other),
        }
    }
}

pub mod artifact;
pub mod local;
pub mod mat;
pub mod memory;
pub mod profile;
pub mod prompt;
pub mod push;
pub mod ssh;
pub mod store;
pub mod table;

pub use artifact::{Artifact, ArtifactKind};
pub use local::LocalDataAccess;
pub use mat::{MatFile, MatMatrix};
pub use memory::MemoryDataAccess;
pub use profile::{profile_versions, PROFILE_KINDS};
pub use prompt::{Confirm, ScriptedConfirm, StdinConfirm};
pub use push::{StagedPush, SwapCommand};
pub use ssh::SshDataAccess;
pub use store::{
    DataAccess, DataStore, RemoveOutcome, LOCAL_BACKEND, MEMORY_BACKEND, PROFILE_BACKEND,
    SCENARIO_BACKEND, SSH_BACKEND,
};
pub use table::{ColumnKey, ColumnTyping, IndexValue, Table, TableError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_keep_their_meaning() {
        let err: DataAccessError = StorageError::NotFound {
            path: "data/output/1_PG.pkl".into(),
        }
        .into();
        assert!(matches!(err, DataAccessError::NotFound { .. }));

        let err: DataAccessError = StorageError::NoWritableBackend.into();
        assert!(matches!(err, DataAccessError::Storage(_)));
    }

    #[test]
    fn push_failure_lists_remote_lines() {
        let err = DataAccessError::PushFailed {
            path: "ScenarioList.csv".into(),
            lines: vec!["CONFLICT_ERROR".into()],
        };
        assert!(err.to_string().contains("CONFLICT_ERROR"));
    }
}
