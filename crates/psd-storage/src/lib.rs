//! ---
//! psd_section: "02-storage"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Storage backends and the priority-ordered union registry."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Storage backends addressed by slash-separated relative paths.
//!
//! Every backend implements [`FileSystem`]; [`UnionFs`] stacks several of them
//! into one namespace where the highest-priority backend holding a path wins.

/// Result alias used throughout the storage crate.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Error type for the storage subsystem.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The path does not exist on the backend.
    #[error("{path} not found")]
    NotFound {
        /// Relative path that was requested.
        path: String,
    },
    /// The destination already exists and overwriting was not requested.
    #[error("{path} already exists")]
    AlreadyExists {
        /// Relative path of the existing entry.
        path: String,
    },
    /// A file operation targeted a directory.
    #[error("{path} is not a file")]
    NotAFile {
        /// Relative path of the directory.
        path: String,
    },
    /// The backend does not accept writes.
    #[error("backend {backend} is read-only")]
    ReadOnly {
        /// Backend description.
        backend: String,
    },
    /// The union registry holds no writable backend.
    #[error("no writable backend registered")]
    NoWritableBackend,
    /// A backend name was not registered with the union.
    #[error("unknown backend: {0}")]
    UnknownBackend(String),
    /// The backend cannot map the path onto the local filesystem.
    #[error("{path} has no local system path")]
    NoSystemPath {
        /// Relative path that was requested.
        path: String,
    },
    /// The path or pattern is malformed.
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// Offending path.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// A backend could not be reached.
    #[error("unable to connect to {backend}: {reason}")]
    Connection {
        /// Backend description.
        backend: String,
        /// Diagnostic returned by the transport.
        reason: String,
    },
    /// A remote command exited unsuccessfully.
    #[error("remote command `{command}` failed (status {status:?}): {stderr}")]
    Remote {
        /// Command line that was executed.
        command: String,
        /// Exit status, when the process exited normally.
        status: Option<i32>,
        /// Captured error output.
        stderr: String,
    },
    /// Blob storage answered with an unexpected HTTP status.
    #[error("blob request to {url} returned HTTP {status}")]
    Http {
        /// Requested URL without credentials.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// Wrapper for HTTP transport failures.
    #[error("blob transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Wrapper for IO errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for malformed glob patterns.
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    /// Wrapper for Prometheus metrics registration failures.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub mod blob;
pub mod filesystem;
pub mod local;
pub mod memory;
pub mod metrics;
pub mod path;
pub mod shell;
pub mod ssh;
pub mod union;

pub use blob::BlobFs;
pub use filesystem::{copy_file, move_file, FileSystem};
pub use local::LocalFs;
pub use memory::MemoryFs;
pub use metrics::StorageMetrics;
pub use shell::{CommandOutput, LocalShell, Shell, SshShell};
pub use ssh::SshFs;
pub use union::{BackendEntry, UnionFs};
