//! ---
//! psd_section: "04-data-access"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Checksum-gated swap command run on the scenario server."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use psd_storage::shell::shell_quote;

/// Lock file, relative to the remote root, serializing swaps across clients.
pub const LOCK_FILE: &str = "scenario.lockfile";

/// Marker written to stderr when the destination changed.
pub const CONFLICT_MARKER: &str = "CONFLICT_ERROR";

/// Suffix of the staged copy uploaded next to the destination.
pub const STAGING_SUFFIX: &str = ".temp";

/// Staging name for a push to `rename`.
pub fn staging_name(rename: &str) -> String {
    format!("{rename}{STAGING_SUFFIX}")
}

/// A file uploaded under its staging name, waiting to be swapped in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPush {
    /// Relative destination path.
    pub rename: String,
    /// Absolute remote path of the destination.
    pub original: String,
    /// Absolute remote path of the staged upload.
    pub updated: String,
}

/// Remote command that swaps a staged upload over its destination when the
/// destination still has the expected checksum.
///
/// The check and the rename run under an exclusive `flock` on the lock file.
/// On success the previous destination is kept as a `~` backup; otherwise
/// [`CONFLICT_MARKER`] is printed to stderr and nothing is moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCommand {
    /// Absolute remote path of the destination.
    pub original: String,
    /// Absolute remote path of the staged upload.
    pub updated: String,
    /// Absolute remote path of the lock file.
    pub lockfile: String,
    /// `sha1sum` line of the destination captured before the edit.
    pub checksum: String,
}

impl SwapCommand {
    /// Command for `staged`, guarded by `lockfile`.
    pub fn new(staged: &StagedPush, lockfile: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            original: staged.original.clone(),
            updated: staged.updated.clone(),
            lockfile: lockfile.into(),
            checksum: checksum.into(),
        }
    }

    /// Single shell command line.
    pub fn render(&self) -> String {
        let original = shell_quote(&self.original);
        format!(
            "(flock -x 200; prev={checksum}; curr=$(sha1sum {original}); \
             if [[ \"$prev\" == \"$curr\" ]]; then mv {updated} {original} -b; \
             else echo {CONFLICT_MARKER} 1>&2; fi) 200>{lockfile}",
            checksum = shell_quote(&self.checksum),
            updated = shell_quote(&self.updated),
            lockfile = shell_quote(&self.lockfile),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_quotes_every_operand() {
        let staged = StagedPush {
            rename: "ScenarioList.csv".into(),
            original: "/mnt/bes/pcm/ScenarioList.csv".into(),
            updated: "/mnt/bes/pcm/ScenarioList.csv.temp".into(),
        };
        let command = SwapCommand::new(&staged, "/mnt/bes/pcm/scenario.lockfile", "abc  /mnt/bes/pcm/ScenarioList.csv");
        let rendered = command.render();
        assert!(rendered.starts_with("(flock -x 200; prev='abc  /mnt/bes/pcm/ScenarioList.csv';"));
        assert!(rendered.contains("curr=$(sha1sum '/mnt/bes/pcm/ScenarioList.csv')"));
        assert!(rendered.contains(
            "mv '/mnt/bes/pcm/ScenarioList.csv.temp' '/mnt/bes/pcm/ScenarioList.csv' -b"
        ));
        assert!(rendered.ends_with("200>'/mnt/bes/pcm/scenario.lockfile'"));
    }

    #[test]
    fn checksum_cannot_break_out_of_quotes() {
        let staged = StagedPush {
            rename: "x".into(),
            original: "/r/x".into(),
            updated: "/r/x.temp".into(),
        };
        let rendered = SwapCommand::new(&staged, "/r/lock", "'; rm -rf /; '").render();
        assert!(rendered.contains(r#"prev=''\''; rm -rf /; '\'''"#));
    }

    #[test]
    fn staging_appends_suffix() {
        assert_eq!(staging_name("ExecuteList.csv"), "ExecuteList.csv.temp");
    }
}
