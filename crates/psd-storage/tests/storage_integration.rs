//! ---
//! psd_section: "02-storage"
//! psd_subsection: "tests"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Integration tests for storage backends and the union registry."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::Registry;
use psd_storage::{FileSystem, LocalFs, LocalShell, MemoryFs, SshFs, StorageMetrics, UnionFs};
use tempfile::tempdir;

#[test]
fn ssh_backend_round_trips_over_local_shell() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("pcm");
    std::fs::create_dir_all(&root).unwrap();
    let remote = SshFs::connect(Arc::new(LocalShell::new()), root.to_string_lossy()).unwrap();

    remote.write_bytes("data/output/1171_PG.pkl", b"pg-bytes").unwrap();
    assert!(remote.exists("data/output/1171_PG.pkl").unwrap());
    assert!(remote.is_dir("data/output").unwrap());
    assert!(!remote.exists("data/output/1171_PF.pkl").unwrap());
    assert_eq!(remote.read_bytes("data/output/1171_PG.pkl").unwrap(), b"pg-bytes");
    assert_eq!(remote.list_dir("data/output").unwrap(), vec!["1171_PG.pkl"]);

    remote.copy("data/output/1171_PG.pkl", "backup/1171_PG.pkl").unwrap();
    assert_eq!(remote.glob("**/*_PG.pkl").unwrap().len(), 2);

    let local_hash = LocalFs::open(&root).unwrap().hash("backup/1171_PG.pkl").unwrap();
    assert_eq!(remote.hash("backup/1171_PG.pkl").unwrap(), local_hash);
    assert!(remote.checksum("backup/1171_PG.pkl").unwrap().ends_with("backup/1171_PG.pkl"));

    remote.remove("backup/1171_PG.pkl").unwrap();
    assert!(!root.join("backup/1171_PG.pkl").exists());
    assert!(matches!(
        remote.read_bytes("backup/1171_PG.pkl"),
        Err(psd_storage::StorageError::NotFound { .. })
    ));
}

#[test]
fn union_prefers_remote_over_mirror_copy() {
    let dir = tempdir().unwrap();
    let local: Arc<dyn FileSystem> = Arc::new(LocalFs::open(dir.path()).unwrap());
    let remote: Arc<dyn FileSystem> = Arc::new(MemoryFs::new("remote"));
    local.write_bytes("ScenarioList.csv", b"stale").unwrap();
    remote.write_bytes("ScenarioList.csv", b"fresh").unwrap();

    let mut union = UnionFs::new();
    union.add("local_fs", local, 1, true).add("ssh_fs", remote, 3, true);

    assert_eq!(union.read_bytes("ScenarioList.csv").unwrap(), b"fresh");
    assert!(union.sys_path("ScenarioList.csv").is_none());
}

#[test]
fn storage_metrics_capture_activity() {
    let registry = Arc::new(Registry::new());
    let metrics = StorageMetrics::new(registry.clone()).unwrap();

    metrics.record_transfer("ssh_fs", "fetch", 512);
    metrics.record_transfer("ssh_fs", "fetch", 512);
    metrics.record_push_conflict("ssh_fs");
    metrics.observe_push_duration("ssh_fs", 0.2);

    let families = registry.gather();
    assert_eq!(metric_total(&families, "psd_transfers_total"), 2.0);
    assert_eq!(metric_total(&families, "psd_transfer_bytes_total"), 1024.0);
    assert_eq!(metric_total(&families, "psd_push_conflicts_total"), 1.0);
    assert!(metric_histogram_count(&families, "psd_push_duration_seconds") >= 1.0);
}

fn metric_total(families: &[prometheus::proto::MetricFamily], name: &str) -> f64 {
    families
        .iter()
        .find(|family| family.get_name() == name)
        .and_then(|family| family.get_metric().first())
        .map(|metric| metric.get_counter().get_value())
        .unwrap_or_default()
}

fn metric_histogram_count(families: &[prometheus::proto::MetricFamily], name: &str) -> f64 {
    families
        .iter()
        .find(|family| family.get_name() == name)
        .and_then(|family| family.get_metric().first())
        .map(|metric| metric.get_histogram().get_sample_count() as f64)
        .unwrap_or_default()
}
