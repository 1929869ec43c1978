//! ---
//! psd_section: "01-core-functionality"
//! psd_subsection: "tests"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Configuration loading tests."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::time::Duration;

use psd_common::config::{AccessConfig, ENV_SERVER_USER};
use psd_common::{init_tracing, log_file_name, LogFormat, LoggingConfig, ServerConfig};
use serial_test::serial;
use tempfile::tempdir;

const SAMPLE: &str = r#"
[server]
address = "sim.example.org"
ssh_port = 2222
connect_timeout = 3

[directories]
local_dir = "/srv/scenario-data"
data_root_dir = "/mnt/pcm"
execute_dir = "tmp"
output_dir = ["data", "output"]

[blob]
account = "gridarchive"
sas_token = "sv=2024&sig=abc"

[logging]
format = "structured-json"
"#;

#[test]
#[serial]
fn loads_first_existing_candidate() {
    std::env::remove_var(AccessConfig::ENV_CONFIG_PATH);
    let dir = tempdir().unwrap();
    let path = dir.path().join("psd.toml");
    std::fs::write(&path, SAMPLE).unwrap();

    let missing = dir.path().join("missing.toml");
    let loaded = AccessConfig::load_with_source(&[missing, path.clone()]).unwrap();
    assert_eq!(loaded.source, path);
    assert_eq!(loaded.config.server.address, "sim.example.org");
    assert_eq!(loaded.config.server.ssh_port, 2222);
    assert_eq!(loaded.config.server.connect_timeout, Duration::from_secs(3));
    assert_eq!(loaded.config.directories.data_root_dir, "/mnt/pcm");
    assert_eq!(loaded.config.blob.sas_token.as_deref(), Some("sv=2024&sig=abc"));
    assert_eq!(loaded.config.logging.format, LogFormat::StructuredJson);
}

#[test]
#[serial]
fn env_override_takes_precedence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("override.toml");
    std::fs::write(&path, "[server]\naddress = \"override.example.org\"\n").unwrap();
    std::env::set_var(AccessConfig::ENV_CONFIG_PATH, &path);

    let config = AccessConfig::load::<&str>(&[]).unwrap();
    std::env::remove_var(AccessConfig::ENV_CONFIG_PATH);
    assert_eq!(config.server.address, "override.example.org");
}

#[test]
#[serial]
fn missing_candidates_report_inspected_paths() {
    std::env::remove_var(AccessConfig::ENV_CONFIG_PATH);
    let err = AccessConfig::load(&["/nonexistent/psd.toml"]).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/psd.toml"));
}

#[test]
#[serial]
fn server_user_falls_back_to_environment() {
    std::env::set_var(ENV_SERVER_USER, "remote-analyst");
    let user = ServerConfig::default().resolve_user().unwrap();
    std::env::remove_var(ENV_SERVER_USER);
    assert_eq!(user, "remote-analyst");
}

#[test]
fn tracing_initialises_with_log_directory() {
    let dir = tempdir().unwrap();
    let config = LoggingConfig {
        directory: dir.path().join("logs"),
        format: LogFormat::Pretty,
        file_prefix: Some("psd-test".into()),
    };
    init_tracing("psd-test", &config).unwrap();
    assert!(config.directory.is_dir());
}

#[test]
fn log_file_is_named_per_command() {
    let mut config = LoggingConfig::default();
    assert_eq!(log_file_name("psdctl-push", &config), "psdctl-push.log");
    config.file_prefix = Some("nightly".into());
    assert_eq!(log_file_name("psdctl-push", &config), "nightly-psdctl-push.log");
    config.file_prefix = Some("  ".into());
    assert_eq!(log_file_name("psdctl-info", &config), "psdctl-info.log");
}
