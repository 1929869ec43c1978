//! ---
//! psd_section: "05-scenario"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Simulation output tables by scenario and field."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::str::FromStr;

use psd_data_access::{DataAccess, DataAccessError, Table};
use psd_logging::{psd_info, psd_warn, LogContext};
use psd_storage::path::join;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{Result, ScenarioError};

/// Output tables written by the simulation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputField {
    /// Power generated per plant.
    Pg,
    /// Power flow per AC branch.
    Pf,
    /// Power flow per DC line.
    PfDcline,
    /// Locational marginal price per bus.
    Lmp,
    /// Congestion shadow price, upper flow limit.
    Congu,
    /// Congestion shadow price, lower flow limit.
    Congl,
    /// Congestion averaged over the period.
    AveragedCong,
    /// Power exchanged by storage units.
    StoragePg,
    /// Energy held by storage units.
    StorageE,
    /// Demand shed per bus.
    LoadShed,
}

impl OutputField {
    /// Every field joined with ` | `.
    pub fn allowed() -> String {
        Self::iter()
            .map(|field| field.to_string())
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Validate a field name.
    pub fn parse(field: &str) -> Result<Self> {
        Self::from_str(field).map_err(|_| ScenarioError::InvalidField {
            field: field.to_owned(),
            allowed: Self::allowed(),
        })
    }
}

/// Reader of output tables through a data-access facade.
pub struct OutputData<'a> {
    access: &'a dyn DataAccess,
    output_dir: String,
}

impl<'a> OutputData<'a> {
    /// Reader of tables under `output_dir`, e.g. `data/output`.
    pub fn new(access: &'a dyn DataAccess, output_dir: impl Into<String>) -> Self {
        Self {
            access,
            output_dir: output_dir.into(),
        }
    }

    /// Relative path of a field of a scenario.
    pub fn path(&self, scenario_id: &str, field: OutputField) -> String {
        join(&self.output_dir, &format!("{scenario_id}_{field}.pkl"))
    }

    /// Table for `field_name`, which must name an [`OutputField`].
    pub fn get_data(&self, scenario_id: &str, field_name: &str) -> Result<Table> {
        self.get(scenario_id, OutputField::parse(field_name)?)
    }

    /// Table for `field`, fetched into the local mirror when missing.
    pub fn get(&self, scenario_id: &str, field: OutputField) -> Result<Table> {
        let path = self.path(scenario_id, field);
        let ctx = LogContext::new().with_scenario(scenario_id).with_path(&path);
        psd_info!(context = ctx.clone(), "--> Loading {field}");
        match self.access.read_table(&path) {
            Ok(table) => Ok(table),
            Err(DataAccessError::Corrupted { .. }) => {
                psd_warn!(context = ctx, "{path} cannot be decoded");
                Err(ScenarioError::Corrupted { file: path })
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psd_data_access::{Artifact, ColumnKey, IndexValue, MemoryDataAccess};
    use psd_storage::FileSystem;

    #[test]
    fn field_names_follow_file_suffixes() {
        assert_eq!(OutputField::PfDcline.to_string(), "PF_DCLINE");
        assert_eq!(OutputField::parse("STORAGE_E").unwrap(), OutputField::StorageE);
        let err = OutputField::parse("pg").unwrap_err();
        assert!(err.to_string().contains("PG | PF | PF_DCLINE"));
        assert!(err.to_string().ends_with("LOAD_SHED data can be loaded"));
    }

    #[test]
    fn tables_are_read_by_id_and_field() {
        let access = MemoryDataAccess::new();
        let table = Table::new(
            Some("UTC".into()),
            vec![IndexValue::Int(0)],
            vec![ColumnKey::Int(7)],
            vec![vec![42.0]],
        )
        .unwrap();
        access
            .write("data/output/87_PG.pkl", &Artifact::Table(table.clone()), false)
            .unwrap();

        let output = OutputData::new(&access, "data/output");
        assert_eq!(output.get_data("87", "PG").unwrap(), table);
        assert!(matches!(
            output.get_data("87", "LMP"),
            Err(ScenarioError::DataAccess(DataAccessError::NotFound { .. }))
        ));
    }

    #[test]
    fn undecodable_output_is_flagged() {
        let access = MemoryDataAccess::new();
        access
            .remote()
            .write_bytes("data/output/87_PF.pkl", b"not a table")
            .unwrap();
        let err = OutputData::new(&access, "data/output")
            .get_data("87", "PF")
            .unwrap_err();
        assert!(err.to_string().contains("possibly corrupted in download"));
    }
}
