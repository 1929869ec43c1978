//! ---
//! psd_section: "03-logging"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Structured logging adapters for data transfers."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for development and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Scenario identifier the artifact belongs to.
    pub scenario: Option<&'a str>,
    /// Name of the storage backend involved.
    pub backend: Option<&'a str>,
    /// Relative artifact path.
    pub path: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a scenario identifier.
    pub fn with_scenario(mut self, scenario: &'a str) -> Self {
        self.scenario = Some(scenario);
        self
    }

    /// Attach a backend name.
    pub fn with_backend(mut self, backend: &'a str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Attach an artifact path.
    pub fn with_path(mut self, path: &'a str) -> Self {
        self.path = Some(path);
        self
    }
}

/// Outcome recorded for a transfer between backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The transfer completed.
    Success,
    /// The remote content changed since it was read; nothing was written.
    Conflict,
    /// The transfer failed for another reason.
    Fault,
}

impl TransferOutcome {
    /// Stable label used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferOutcome::Success => "success",
            TransferOutcome::Conflict => "conflict",
            TransferOutcome::Fault => "fault",
        }
    }

    fn level(&self) -> Level {
        match self {
            TransferOutcome::Success => Level::INFO,
            TransferOutcome::Conflict => Level::WARN,
            TransferOutcome::Fault => Level::ERROR,
        }
    }
}

/// Emit a standardized transfer event (fetch, write, push) with its outcome.
pub fn log_transfer_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: TransferOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    let scenario = ctx.scenario.unwrap_or("");
    let backend = ctx.backend.unwrap_or("");
    let path = ctx.path.unwrap_or("");
    match outcome.level() {
        Level::ERROR => tracing::error!(event, outcome = outcome.as_str(), scenario, backend, path, message = %message),
        Level::WARN => tracing::warn!(event, outcome = outcome.as_str(), scenario, backend, path, message = %message),
        _ => tracing::info!(event, outcome = outcome.as_str(), scenario, backend, path, message = %message),
    }
}
