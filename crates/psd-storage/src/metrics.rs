//! ---
//! psd_section: "02-storage"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Storage backends and the priority-ordered union registry."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{self, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

use crate::Result;

/// Metrics published by the data-access layer.
#[derive(Clone)]
pub struct StorageMetrics {
    transfers: IntCounterVec,
    transfer_bytes: IntCounterVec,
    push_conflicts: IntCounterVec,
    push_duration: HistogramVec,
    #[allow(dead_code)]
    registry: Arc<Registry>,
}

impl StorageMetrics {
    /// Register all storage metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        let transfers = IntCounterVec::new(
            Opts::new(
                "psd_transfers_total",
                "Total number of artifact transfers between backends",
            ),
            &["backend", "direction"],
        )?;
        registry.register(Box::new(transfers.clone()))?;

        let transfer_bytes = IntCounterVec::new(
            Opts::new(
                "psd_transfer_bytes_total",
                "Total bytes moved between backends",
            ),
            &["backend", "direction"],
        )?;
        registry.register(Box::new(transfer_bytes.clone()))?;

        let push_conflicts = IntCounterVec::new(
            Opts::new(
                "psd_push_conflicts_total",
                "Total number of pushes rejected because remote content changed",
            ),
            &["backend"],
        )?;
        registry.register(Box::new(push_conflicts.clone()))?;

        let histogram_opts = HistogramOpts::new(
            "psd_push_duration_seconds",
            "Duration of push operations including verification",
        )
        .buckets(prometheus::exponential_buckets(0.005, 2.0, 12)?);
        let push_duration = HistogramVec::new(histogram_opts, &["backend"])?;
        registry.register(Box::new(push_duration.clone()))?;

        Ok(Self {
            transfers,
            transfer_bytes,
            push_conflicts,
            push_duration,
            registry,
        })
    }

    /// Record a completed transfer of `bytes` in `direction` (`fetch`, `write`, `push`).
    pub fn record_transfer(&self, backend: &str, direction: &str, bytes: u64) {
        self.transfers
            .with_label_values(&[backend, direction])
            .inc();
        self.transfer_bytes
            .with_label_values(&[backend, direction])
            .inc_by(bytes);
    }

    /// Record a push rejected by the checksum comparison.
    pub fn record_push_conflict(&self, backend: &str) {
        self.push_conflicts.with_label_values(&[backend]).inc();
    }

    /// Observe the wall time of a push.
    pub fn observe_push_duration(&self, backend: &str, seconds: f64) {
        self.push_duration
            .with_label_values(&[backend])
            .observe(seconds);
    }
}

impl std::fmt::Debug for StorageMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageMetrics").finish_non_exhaustive()
    }
}
