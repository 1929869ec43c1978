//! ---
//! psd_section: "02-storage"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Storage backends and the priority-ordered union registry."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use psd_common::ServerConfig;
use tracing::trace;

use crate::{Result, StorageError};

/// Captured result of a shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status, `None` when the process was killed by a signal.
    pub status: Option<i32>,
    /// Raw standard output.
    pub stdout: Vec<u8>,
    /// Raw standard error.
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Standard output as trimmed text.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_owned()
    }

    /// Non-empty lines written to standard error.
    pub fn stderr_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.stderr)
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Executes command strings somewhere: over SSH or on the local host.
pub trait Shell: Send + Sync + fmt::Debug {
    /// Where commands run, for diagnostics.
    fn describe(&self) -> String;

    /// Run `command`, feeding `input` on stdin when given, and wait for it.
    fn run(&self, command: &str, input: Option<&[u8]>) -> Result<CommandOutput>;
}

/// Quote a value for safe interpolation into a POSIX shell command.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn spawn(mut command: Command, label: &str, input: Option<&[u8]>) -> Result<CommandOutput> {
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command.spawn()?;
    if let Some(data) = input {
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(data)?;
        }
    }
    let output = child.wait_with_output()?;
    trace!(shell = label, status = ?output.status.code(), "command finished");
    Ok(CommandOutput {
        status: output.status.code(),
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Runs commands on the scenario server through the `ssh` client.
#[derive(Debug, Clone)]
pub struct SshShell {
    destination: String,
    port: u16,
    connect_timeout: Duration,
}

impl SshShell {
    /// Build a shell for `user@host` on the given port.
    pub fn new(user: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            destination: format!("{}@{}", user.into(), host.into()),
            port,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Build a shell from server configuration, resolving the login name.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let user = config
            .resolve_user()
            .map_err(|err| StorageError::Connection {
                backend: config.address.clone(),
                reason: err.to_string(),
            })?;
        Ok(Self::new(user, &config.address, config.ssh_port)
            .with_connect_timeout(config.connect_timeout))
    }

    /// Override the connection timeout passed to the client.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Shell for SshShell {
    fn describe(&self) -> String {
        format!("ssh://{}:{}", self.destination, self.port)
    }

    fn run(&self, command: &str, input: Option<&[u8]>) -> Result<CommandOutput> {
        let mut ssh = Command::new("ssh");
        ssh.arg("-p")
            .arg(self.port.to_string())
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)))
            .arg(&self.destination)
            .arg(command);
        spawn(ssh, &self.destination, input)
    }
}

/// Runs commands with the local `bash`; stands in for the server in tests
/// and when the data root is mounted on the same host.
#[derive(Debug, Clone, Default)]
pub struct LocalShell {
    working_dir: Option<PathBuf>,
}

impl LocalShell {
    /// Shell running in the current directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shell running in `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }
}

impl Shell for LocalShell {
    fn describe(&self) -> String {
        match &self.working_dir {
            Some(dir) => format!("bash:{}", dir.display()),
            None => "bash".to_owned(),
        }
    }

    fn run(&self, command: &str, input: Option<&[u8]>) -> Result<CommandOutput> {
        let mut bash = Command::new("bash");
        bash.arg("-c").arg(command);
        if let Some(dir) = &self.working_dir {
            bash.current_dir(dir);
        }
        spawn(bash, "bash", input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_escapes_single_quotes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn stderr_lines_skip_blanks() {
        let output = CommandOutput {
            status: Some(0),
            stdout: b" ok \n".to_vec(),
            stderr: b"\nCONFLICT_ERROR\n\n".to_vec(),
        };
        assert_eq!(output.stdout_text(), "ok");
        assert_eq!(output.stderr_lines(), vec!["CONFLICT_ERROR"]);
    }

    #[test]
    fn local_shell_feeds_stdin() {
        let output = LocalShell::new().run("cat", Some(b"payload")).unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, b"payload");
    }

    #[test]
    fn ssh_shell_describes_destination() {
        let shell = SshShell::new("analyst", "sim.example.org", 2222);
        assert_eq!(shell.describe(), "ssh://analyst@sim.example.org:2222");
    }
}
