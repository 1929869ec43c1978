//! ---
//! psd_section: "05-scenario"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Copy a subset of scenarios from one data directory to another."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use psd_common::DirectoryConfig;
use psd_storage::path::join;
use psd_storage::{copy_file, FileSystem};
use tracing::{debug, info};

use crate::listing::{Listing, EXECUTE_LIST, SCENARIO_LIST};
use crate::Result;

/// Copies listings, inputs and outputs of selected scenarios.
///
/// Paths are relative to both backends, which share one directory layout.
pub struct ScenarioCloner<'a> {
    source: &'a dyn FileSystem,
    target: &'a dyn FileSystem,
    input_dir: String,
    output_dir: String,
}

impl<'a> ScenarioCloner<'a> {
    /// Cloner between two data directories laid out as `directories`.
    pub fn new(
        source: &'a dyn FileSystem,
        target: &'a dyn FileSystem,
        directories: &DirectoryConfig,
    ) -> Self {
        Self {
            source,
            target,
            input_dir: directories.input_path(),
            output_dir: directories.output_path(),
        }
    }

    /// Write both listings restricted to `ids`. Absent listings are skipped.
    pub fn copy_metadata(&self, ids: &[&str]) -> Result<Vec<String>> {
        let mut copied = Vec::new();
        for name in [SCENARIO_LIST, EXECUTE_LIST] {
            if !self.source.exists(name)? {
                debug!(file = name, "listing absent, skipped");
                continue;
            }
            let listing = Listing::from_csv(&self.source.read_bytes(name)?)?;
            let kept = listing.retain_ids(ids);
            self.target.write_bytes(name, &kept.to_csv()?)?;
            info!(file = name, rows = kept.len(), "copied listing");
            copied.push(name.to_owned());
        }
        Ok(copied)
    }

    /// Copy the case and grid inputs of scenario `id`.
    pub fn copy_input(&self, id: &str) -> Result<Vec<String>> {
        let files = [
            join(&self.input_dir, &format!("{id}_ct.pkl")),
            join(&self.input_dir, &format!("{id}_grid.mat")),
        ];
        let mut copied = Vec::new();
        for path in files {
            if !self.source.exists(&path)? {
                debug!(scenario = id, path = %path, "input absent, skipped");
                continue;
            }
            self.copy(&path)?;
            copied.push(path);
        }
        Ok(copied)
    }

    /// Copy every output table of scenario `id`.
    pub fn copy_output(&self, id: &str) -> Result<Vec<String>> {
        let pattern = join(&self.output_dir, &format!("{id}_*.pkl"));
        let files = self.source.glob(&pattern)?;
        for path in &files {
            self.copy(path)?;
        }
        Ok(files)
    }

    /// Listings, inputs and outputs of every scenario in `ids`.
    pub fn clone_all(&self, ids: &[&str]) -> Result<Vec<String>> {
        let mut copied = self.copy_metadata(ids)?;
        for id in ids {
            copied.extend(self.copy_input(id)?);
            copied.extend(self.copy_output(id)?);
        }
        info!(
            scenarios = ids.len(),
            files = copied.len(),
            "cloned {} into {}",
            self.source.describe(),
            self.target.describe()
        );
        Ok(copied)
    }

    fn copy(&self, path: &str) -> Result<()> {
        let bytes = copy_file(self.source, path, self.target, path)?;
        debug!(path, bytes, "copied");
        Ok(())
    }
}
