//! ---
//! psd_section: "01-core-functionality"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Shared primitives and utilities for the data-access stack."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
//! Shared configuration and tracing setup for the PSD workspace.
//! Every backend constructor receives an [`AccessConfig`] value rather than
//! reading process-wide settings.

pub mod config;
pub mod logging;

pub use config::{
    AccessConfig, BlobConfig, DirectoryConfig, LoadedAccessConfig, LoggingConfig, ServerConfig,
};
pub use logging::{init_tracing, log_file_name, LogFormat};
