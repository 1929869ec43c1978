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

use tracing::{debug, info};

use crate::filesystem::{compile_pattern, normalized, FileSystem};
use crate::path::dirname;
use crate::shell::{shell_quote, CommandOutput, Shell};
use crate::{Result, StorageError};

const PROBE_TOKEN: &str = "psd-ssh-ok";

/// Characters refused in glob patterns, which are expanded unquoted remotely.
const UNSAFE_GLOB_CHARS: &[char] = &[
    ';', '|', '&', '$', '`', '\'', '"', '(', ')', '<', '>', '\n', '\\', ' ',
];

/// Remote directory on the scenario server, driven through shell commands.
#[derive(Debug, Clone)]
pub struct SshFs {
    shell: Arc<dyn Shell>,
    root: String,
}

impl SshFs {
    /// Probe the shell and bind the backend to the absolute remote `root`.
    ///
    /// Fails with [`StorageError::Connection`] when the probe does not answer.
    pub fn connect(shell: Arc<dyn Shell>, root: impl Into<String>) -> Result<Self> {
        let root = root.into().trim_end_matches('/').to_owned();
        let output = shell
            .run(&format!("echo {PROBE_TOKEN}"), None)
            .map_err(|err| StorageError::Connection {
                backend: shell.describe(),
                reason: err.to_string(),
            })?;
        if !output.success() || output.stdout_text() != PROBE_TOKEN {
            return Err(StorageError::Connection {
                backend: shell.describe(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        info!(backend = %shell.describe(), root = %root, "connected to remote backend");
        Ok(Self { shell, root })
    }

    /// Absolute remote root.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Absolute remote path for a relative path.
    pub fn remote_path(&self, path: &str) -> Result<String> {
        let relative = normalized(path)?;
        if relative.is_empty() {
            return Ok(self.root.clone());
        }
        Ok(format!("{}/{}", self.root, relative))
    }

    /// Run an arbitrary command on the remote host.
    pub fn exec(&self, command: &str) -> Result<CommandOutput> {
        debug!(backend = %self.shell.describe(), "executing remote command");
        self.shell.run(command, None)
    }

    /// Output of `sha1sum` for the file, as compared by the push protocol.
    pub fn checksum(&self, path: &str) -> Result<String> {
        let remote = self.remote_path(path)?;
        let output = self.checked(&format!("sha1sum {}", shell_quote(&remote)), None, path)?;
        Ok(output.stdout_text())
    }

    fn run(&self, command: &str, input: Option<&[u8]>) -> Result<CommandOutput> {
        self.shell.run(command, input)
    }

    fn checked(&self, command: &str, input: Option<&[u8]>, path: &str) -> Result<CommandOutput> {
        let output = self.run(command, input)?;
        if output.success() {
            return Ok(output);
        }
        if !self.exists(path)? {
            return Err(StorageError::NotFound {
                path: path.to_owned(),
            });
        }
        Err(remote_error(command, &output))
    }

    fn test(&self, flag: &str, path: &str) -> Result<bool> {
        let command = format!("test {flag} {}", shell_quote(&self.remote_path(path)?));
        let output = self.run(&command, None)?;
        match output.status {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(remote_error(&command, &output)),
        }
    }
}

fn remote_error(command: &str, output: &CommandOutput) -> StorageError {
    StorageError::Remote {
        command: command.to_owned(),
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
    }
}

impl FileSystem for SshFs {
    fn describe(&self) -> String {
        format!("{}{}", self.shell.describe(), self.root)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.test("-e", path)
    }

    fn is_dir(&self, path: &str) -> Result<bool> {
        self.test("-d", path)
    }

    fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let remote = self.remote_path(path)?;
        let output = self.checked(&format!("cat {}", shell_quote(&remote)), None, path)?;
        Ok(output.stdout)
    }

    fn write_bytes(&self, path: &str, data: &[u8]) -> Result<()> {
        let remote = self.remote_path(path)?;
        let parent = self.remote_path(dirname(&normalized(path)?))?;
        let command = format!(
            "mkdir -p {} && cat > {}",
            shell_quote(&parent),
            shell_quote(&remote)
        );
        let output = self.run(&command, Some(data))?;
        if !output.success() {
            return Err(remote_error(&command, &output));
        }
        Ok(())
    }

    fn make_dirs(&self, path: &str) -> Result<()> {
        let command = format!("mkdir -p {}", shell_quote(&self.remote_path(path)?));
        let output = self.run(&command, None)?;
        if !output.success() {
            return Err(remote_error(&command, &output));
        }
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        if self.is_dir(path)? {
            return Err(StorageError::NotAFile {
                path: path.to_owned(),
            });
        }
        let remote = self.remote_path(path)?;
        self.checked(&format!("rm {}", shell_quote(&remote)), None, path)?;
        Ok(())
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let remote = self.remote_path(path)?;
        let output = self.checked(&format!("ls -1A {}", shell_quote(&remote)), None, path)?;
        let mut names: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        names.sort();
        Ok(names)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        compile_pattern(pattern)?;
        let pattern = pattern.trim_start_matches('/');
        if pattern.contains(UNSAFE_GLOB_CHARS) {
            return Err(StorageError::InvalidPath {
                path: pattern.to_owned(),
                reason: "pattern contains shell metacharacters",
            });
        }
        let command = format!(
            "cd {} && shopt -s globstar nullglob && for f in {pattern}; do [ -f \"$f\" ] && printf '%s\\n' \"$f\"; done; true",
            shell_quote(&self.root)
        );
        let output = self.run(&command, None)?;
        if !output.success() {
            return Err(remote_error(&command, &output));
        }
        let mut matched: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        matched.sort();
        matched.dedup();
        Ok(matched)
    }

    fn copy(&self, src: &str, dest: &str) -> Result<()> {
        let from = self.remote_path(src)?;
        let to = self.remote_path(dest)?;
        let parent = self.remote_path(dirname(&normalized(dest)?))?;
        let command = format!(
            "mkdir -p {} && cp {} {}",
            shell_quote(&parent),
            shell_quote(&from),
            shell_quote(&to)
        );
        self.checked(&command, None, src)?;
        Ok(())
    }

    fn rename(&self, src: &str, dest: &str, overwrite: bool) -> Result<()> {
        if !overwrite && self.exists(dest)? {
            return Err(StorageError::AlreadyExists {
                path: dest.to_owned(),
            });
        }
        let from = self.remote_path(src)?;
        let to = self.remote_path(dest)?;
        let parent = self.remote_path(dirname(&normalized(dest)?))?;
        let command = format!(
            "mkdir -p {} && mv -f {} {}",
            shell_quote(&parent),
            shell_quote(&from),
            shell_quote(&to)
        );
        self.checked(&command, None, src)?;
        Ok(())
    }

    fn hash(&self, path: &str) -> Result<String> {
        let remote = self.remote_path(path)?;
        let output = self.checked(&format!("sha256sum {}", shell_quote(&remote)), None, path)?;
        output
            .stdout_text()
            .split_whitespace()
            .next()
            .map(str::to_owned)
            .ok_or_else(|| StorageError::Remote {
                command: "sha256sum".to_owned(),
                status: output.status,
                stderr: "empty digest".to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records commands and answers from a script.
    #[derive(Debug, Default)]
    struct ScriptedShell {
        commands: Mutex<Vec<String>>,
        replies: Mutex<Vec<CommandOutput>>,
    }

    impl ScriptedShell {
        fn reply(self, status: i32, stdout: &str, stderr: &str) -> Self {
            self.replies.lock().push(CommandOutput {
                status: Some(status),
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            });
            self
        }
    }

    impl Shell for ScriptedShell {
        fn describe(&self) -> String {
            "scripted".to_owned()
        }

        fn run(&self, command: &str, _input: Option<&[u8]>) -> Result<CommandOutput> {
            self.commands.lock().push(command.to_owned());
            let mut replies = self.replies.lock();
            if replies.is_empty() {
                return Ok(CommandOutput {
                    status: Some(0),
                    ..CommandOutput::default()
                });
            }
            Ok(replies.remove(0))
        }
    }

    #[test]
    fn failed_probe_is_a_connection_error() {
        let shell = Arc::new(ScriptedShell::default().reply(255, "", "Connection refused"));
        let err = SshFs::connect(shell, "/mnt/pcm").unwrap_err();
        match err {
            StorageError::Connection { reason, .. } => assert_eq!(reason, "Connection refused"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn checksum_runs_sha1sum_on_remote_path() {
        let shell = Arc::new(
            ScriptedShell::default()
                .reply(0, PROBE_TOKEN, "")
                .reply(0, "abc123  /mnt/pcm/ScenarioList.csv\n", ""),
        );
        let remote = SshFs::connect(shell.clone(), "/mnt/pcm/").unwrap();
        let checksum = remote.checksum("ScenarioList.csv").unwrap();
        assert_eq!(checksum, "abc123  /mnt/pcm/ScenarioList.csv");
        assert_eq!(
            shell.commands.lock().last().unwrap(),
            "sha1sum '/mnt/pcm/ScenarioList.csv'"
        );
    }

    #[test]
    fn unsafe_glob_is_rejected() {
        let shell = Arc::new(ScriptedShell::default().reply(0, PROBE_TOKEN, ""));
        let remote = SshFs::connect(shell, "/mnt/pcm").unwrap();
        assert!(matches!(
            remote.glob("data/*; rm -rf /"),
            Err(StorageError::InvalidPath { .. })
        ));
    }
}
