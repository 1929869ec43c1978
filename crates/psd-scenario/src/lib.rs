//! ---
//! psd_section: "05-scenario"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Scenario metadata and readers built on the data-access facade."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Readers for the artifacts of one simulated scenario: output tables,
//! input profiles with the demand reductions applied by the optimizer, and
//! helpers to clone a set of scenarios out of the local mirror.

use psd_data_access::{DataAccessError, TableError};
use psd_storage::StorageError;

/// Result alias used throughout the scenario crate.
pub type Result<T> = std::result::Result<T, ScenarioError>;

/// Error type for scenario readers.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// The output field is not one the simulation produces.
    #[error("unknown field {field}; only {allowed} data can be loaded")]
    InvalidField {
        /// Requested field.
        field: String,
        /// Accepted fields joined with ` | `.
        allowed: String,
    },
    /// The profile kind is not a known family.
    #[error("unknown profile kind {0}")]
    InvalidProfileKind(String),
    /// The infeasibilities field is neither `No` nor `<interval>:<percent>` pairs.
    #[error("malformed infeasibilities '{0}'")]
    InvalidInfeasibilities(String),
    /// The interval is not `<n>H` or `<n>D`.
    #[error("malformed interval '{0}'")]
    InvalidInterval(String),
    /// An infeasible interval lies outside the scenario period.
    #[error("interval {index} is outside the {intervals} intervals of the scenario")]
    IntervalOutOfRange {
        /// Interval index from the infeasibilities field.
        index: usize,
        /// Number of intervals in the scenario period.
        intervals: usize,
    },
    /// A required metadata field is absent.
    #[error("scenario metadata has no '{0}' field")]
    MissingField(String),
    /// A date field could not be parsed.
    #[error("invalid date '{value}' in field {field}")]
    Date {
        /// Field name.
        field: String,
        /// Raw value.
        value: String,
    },
    /// The scenario is absent from the listing.
    #[error("scenario {0} not found")]
    ScenarioNotFound(String),
    /// An output file could not be decoded.
    #[error("unable to decode {file}, possibly corrupted in download")]
    Corrupted {
        /// Relative path of the output file.
        file: String,
    },
    /// Wrapper for data-access failures.
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
    /// Wrapper for table failures.
    #[error(transparent)]
    Table(#[from] TableError),
    /// Wrapper for storage failures.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Wrapper for CSV failures on listings.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub mod analyze;
pub mod clone;
pub mod info;
pub mod listing;
pub mod load_shed;
pub mod output;
pub mod profile_input;

pub use analyze::{Analyze, ScenarioSummary};
pub use clone::ScenarioCloner;
pub use info::{date_range, parse_infeasibilities, Infeasibilities, Interval, ScenarioInfo};
pub use listing::{Listing, EXECUTE_LIST, SCENARIO_LIST};
pub use load_shed::construct_load_shed;
pub use output::{OutputData, OutputField};
pub use profile_input::ProfileInput;
