//! ---
//! psd_section: "01-core-functionality"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Shared primitives and utilities for the data-access stack."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

/// Environment variable consulted when no user is configured for the server.
pub const ENV_SERVER_USER: &str = "PSD_SERVER_USER";

fn default_server_address() -> String {
    "becompute01.gatesventures.com".to_owned()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_local_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join("ScenarioData"),
        None => PathBuf::from("ScenarioData"),
    }
}

fn default_data_root_dir() -> String {
    "/mnt/bes/pcm".to_owned()
}

fn default_execute_dir() -> String {
    "tmp".to_owned()
}

fn default_input_dir() -> Vec<String> {
    vec!["data".to_owned(), "input".to_owned()]
}

fn default_output_dir() -> Vec<String> {
    vec!["data".to_owned(), "output".to_owned()]
}

fn default_blob_account() -> String {
    "besciences".to_owned()
}

fn default_scenario_container() -> String {
    "scenariodata".to_owned()
}

fn default_profile_container() -> String {
    "profiles".to_owned()
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Complete configuration consumed by the data-access backends.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccessConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub directories: DirectoryConfig,
    #[serde(default)]
    pub blob: BlobConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AccessConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAccessConfig {
    pub config: AccessConfig,
    pub source: PathBuf,
}

impl AccessConfig {
    pub const ENV_CONFIG_PATH: &str = "PSD_CONFIG";

    /// Load configuration from disk, respecting the `PSD_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAccessConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAccessConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAccessConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AccessConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.directories.validate()?;
        if self.blob.account.trim().is_empty() {
            return Err(anyhow!("blob account cannot be empty"));
        }
        Ok(())
    }
}

impl std::str::FromStr for AccessConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AccessConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Location of the SSH-accessible scenario server.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_address")]
    pub address: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_connect_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub connect_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_server_address(),
            ssh_port: default_ssh_port(),
            user: None,
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl ServerConfig {
    /// Resolve the login used on the server: configured user, then
    /// `PSD_SERVER_USER`, then the local account name.
    pub fn resolve_user(&self) -> Result<String> {
        if let Some(user) = self.user.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(user.to_owned());
        }
        for var in [ENV_SERVER_USER, "USER", "USERNAME"] {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    return Ok(value);
                }
            }
        }
        Err(anyhow!(
            "unable to determine server user; set server.user or {}",
            ENV_SERVER_USER
        ))
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(anyhow!("server address cannot be empty"));
        }
        if self.ssh_port == 0 {
            return Err(anyhow!("server ssh_port must be non-zero"));
        }
        Ok(())
    }
}

/// Local and remote directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,
    #[serde(default = "default_data_root_dir")]
    pub data_root_dir: String,
    #[serde(default = "default_execute_dir")]
    pub execute_dir: String,
    #[serde(default = "default_input_dir")]
    pub input_dir: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: Vec<String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            local_dir: default_local_dir(),
            data_root_dir: default_data_root_dir(),
            execute_dir: default_execute_dir(),
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl DirectoryConfig {
    /// Absolute form of the local mirror directory.
    pub fn local_root(&self) -> Result<PathBuf> {
        let absolute = self.local_dir.absolutize().with_context(|| {
            format!("unable to resolve local dir {}", self.local_dir.display())
        })?;
        Ok(absolute.into_owned())
    }

    /// Slash-joined relative input directory.
    pub fn input_path(&self) -> String {
        self.input_dir.join("/")
    }

    /// Slash-joined relative output directory.
    pub fn output_path(&self) -> String {
        self.output_dir.join("/")
    }

    pub fn validate(&self) -> Result<()> {
        if !self.data_root_dir.starts_with('/') {
            return Err(anyhow!(
                "data_root_dir '{}' must be an absolute remote path",
                self.data_root_dir
            ));
        }
        if self.output_dir.is_empty() {
            return Err(anyhow!("output_dir must contain at least one component"));
        }
        Ok(())
    }
}

/// Cloud object storage account holding the scenario and profile containers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    #[serde(default = "default_blob_account")]
    pub account: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_scenario_container")]
    pub scenario_container: String,
    #[serde(default = "default_profile_container")]
    pub profile_container: String,
    #[serde(default)]
    pub sas_token: Option<String>,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            account: default_blob_account(),
            endpoint: None,
            scenario_container: default_scenario_container(),
            profile_container: default_profile_container(),
            sas_token: None,
        }
    }
}

impl BlobConfig {
    /// Base URL of the storage account, without a trailing slash.
    pub fn account_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_owned(),
            None => format!("https://{}.blob.core.windows.net", self.account),
        }
    }

    /// URL of a container within the account.
    pub fn container_url(&self, container: &str) -> String {
        format!("{}/{}", self.account_url(), container)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AccessConfig::from_str("").unwrap();
        assert_eq!(config.server.ssh_port, 22);
        assert_eq!(config.directories.data_root_dir, "/mnt/bes/pcm");
        assert_eq!(config.directories.output_path(), "data/output");
        assert_eq!(config.blob.profile_container, "profiles");
    }

    #[test]
    fn relative_data_root_is_rejected() {
        let err = AccessConfig::from_str("[directories]\ndata_root_dir = \"pcm\"\n").unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn endpoint_override_builds_container_url() {
        let blob = BlobConfig {
            endpoint: Some("http://127.0.0.1:10000/devstore/".into()),
            ..BlobConfig::default()
        };
        assert_eq!(
            blob.container_url("profiles"),
            "http://127.0.0.1:10000/devstore/profiles"
        );
        assert_eq!(
            BlobConfig::default().container_url("scenariodata"),
            "https://besciences.blob.core.windows.net/scenariodata"
        );
    }

    #[test]
    fn configured_user_wins() {
        let server = ServerConfig {
            user: Some("analyst".into()),
            ..ServerConfig::default()
        };
        assert_eq!(server.resolve_user().unwrap(), "analyst");
    }
}
