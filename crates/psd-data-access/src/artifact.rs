//! ---
//! psd_section: "04-data-access"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Artifact formats selected by file extension."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::str::FromStr;

use psd_storage::path::extension;
use psd_storage::FileSystem;
use strum::{AsRefStr, Display, EnumString};

use crate::mat::MatFile;
use crate::table::{ColumnTyping, Table};
use crate::{DataAccessError, Result};

/// Serialization selected from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum ArtifactKind {
    /// Binary table envelope.
    #[strum(serialize = "pkl")]
    TableBinary,
    /// Comma-separated table.
    #[strum(serialize = "csv")]
    TableText,
    /// MATLAB level 4 container.
    #[strum(serialize = "mat")]
    Matlab,
}

impl ArtifactKind {
    /// Kind for a path, or [`DataAccessError::UnsupportedFormat`].
    pub fn from_path(path: &str) -> Result<Self> {
        let ext = extension(path).unwrap_or_default();
        ArtifactKind::from_str(ext).map_err(|_| DataAccessError::UnsupportedFormat(ext.to_owned()))
    }
}

/// Content handed to and returned by the data-access facade.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// Tabular data.
    Table(Table),
    /// Named matrices, only produced by writers.
    Matlab(MatFile),
    /// Location of a file in the local mirror.
    LocalPath(PathBuf),
}

impl Artifact {
    /// Table content, consuming the artifact.
    pub fn into_table(self, path: &str) -> Result<Table> {
        match self {
            Artifact::Table(table) => Ok(table),
            _ => Err(DataAccessError::WrongArtifact {
                path: path.to_owned(),
                expected: "table",
            }),
        }
    }

    /// Local file location, consuming the artifact.
    pub fn into_local_path(self, path: &str) -> Result<PathBuf> {
        match self {
            Artifact::LocalPath(location) => Ok(location),
            _ => Err(DataAccessError::WrongArtifact {
                path: path.to_owned(),
                expected: "local file",
            }),
        }
    }

    /// Serialize for storage at `path`.
    pub fn encode(&self, path: &str) -> Result<Vec<u8>> {
        match (ArtifactKind::from_path(path)?, self) {
            (ArtifactKind::TableBinary, Artifact::Table(table)) => Ok(table.to_binary()?),
            (ArtifactKind::TableText, Artifact::Table(table)) => Ok(table.to_csv()?),
            (ArtifactKind::Matlab, Artifact::Matlab(file)) => Ok(file.to_bytes()),
            (ArtifactKind::Matlab, _) => Err(DataAccessError::WrongArtifact {
                path: path.to_owned(),
                expected: "matrix container",
            }),
            _ => Err(DataAccessError::WrongArtifact {
                path: path.to_owned(),
                expected: "table",
            }),
        }
    }

    /// Decode the file at `path` from `fs`.
    ///
    /// Tables are materialized; MATLAB containers resolve to their local path.
    pub fn decode(fs: &dyn FileSystem, path: &str) -> Result<Self> {
        match ArtifactKind::from_path(path)? {
            ArtifactKind::TableBinary => {
                let bytes = fs.read_bytes(path)?;
                Table::from_binary(&bytes)
                    .map(Artifact::Table)
                    .map_err(|err| DataAccessError::Corrupted {
                        path: path.to_owned(),
                        reason: err.to_string(),
                    })
            }
            ArtifactKind::TableText => {
                let bytes = fs.read_bytes(path)?;
                Ok(Artifact::Table(Table::from_csv(
                    &bytes,
                    ColumnTyping::for_path(path),
                )?))
            }
            ArtifactKind::Matlab => {
                if !fs.exists(path)? {
                    return Err(DataAccessError::NotFound {
                        path: path.to_owned(),
                    });
                }
                fs.sys_path(path)
                    .map(Artifact::LocalPath)
                    .ok_or_else(|| DataAccessError::NoSystemPath {
                        path: path.to_owned(),
                    })
            }
        }
    }
}
