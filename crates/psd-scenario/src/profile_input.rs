//! ---
//! psd_section: "05-scenario"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Raw input profiles used by a scenario."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::collections::BTreeSet;

use psd_data_access::profile::{profile_dir, profile_file_name};
use psd_data_access::{DataAccess, Table};
use psd_storage::path::join;

use crate::info::ScenarioInfo;
use crate::Result;

/// Reader of raw profiles through a data-access facade.
pub struct ProfileInput<'a> {
    access: &'a dyn DataAccess,
}

impl<'a> ProfileInput<'a> {
    /// Reader backed by `access`.
    pub fn new(access: &'a dyn DataAccess) -> Self {
        Self { access }
    }

    /// Relative path of the `kind` profile used by the scenario.
    pub fn path(info: &ScenarioInfo, kind: &str) -> Result<String> {
        let version = info.profile_version(kind)?;
        Ok(join(
            &profile_dir(&info.grid_model),
            &profile_file_name(kind, version),
        ))
    }

    /// Profile table of `kind` for the scenario.
    pub fn get_data(&self, info: &ScenarioInfo, kind: &str) -> Result<Table> {
        let path = Self::path(info, kind)?;
        Ok(self.access.read_table(&path)?)
    }

    /// Versions of `kind` available for `grid_model`.
    pub fn get_profile_version(&self, grid_model: &str, kind: &str) -> Result<BTreeSet<String>> {
        Ok(self.access.get_profile_version(grid_model, kind)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::tests::info;
    use crate::ScenarioError;
    use psd_data_access::{ColumnKey, MemoryDataAccess};
    use psd_storage::FileSystem;

    #[test]
    fn paths_use_base_versions() {
        let info = info("24H", "No");
        assert_eq!(
            ProfileInput::path(&info, "demand").unwrap(),
            "raw/usa_tamu/demand_vJan2021.csv"
        );
        assert!(matches!(
            ProfileInput::path(&info, "nuclear"),
            Err(ScenarioError::InvalidProfileKind(_))
        ));
    }

    #[test]
    fn flexibility_profiles_keep_named_columns() {
        let mut info = info("24H", "No");
        info.extras
            .insert("demand_flexibility_dn".into(), "vFlex".into());
        let access = MemoryDataAccess::new();
        access
            .remote()
            .write_bytes(
                "raw/usa_tamu/demand_flexibility_dn_vFlex.csv",
                b"UTC,west,east\n2016-01-01 00:00:00,1.5,2.5\n",
            )
            .unwrap();

        let table = ProfileInput::new(&access)
            .get_data(&info, "demand_flexibility_dn")
            .unwrap();
        assert_eq!(table.columns()[1], ColumnKey::Text("east".into()));
        assert_eq!(table.row(0), &[1.5, 2.5]);
    }
}
