//! ---
//! psd_section: "05-scenario"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Readers for a solved scenario: outputs, profiles and adjusted demand."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use chrono::{Duration, NaiveDateTime};
use indexmap::IndexMap;
use psd_data_access::table::TIMESTAMP_FORMAT;
use psd_data_access::{DataAccess, DataAccessError, Table};
use psd_logging::{psd_info, LogContext};
use serde::Serialize;

use crate::info::{Infeasibilities, Interval, ScenarioInfo};
use crate::load_shed::construct_load_shed;
use crate::output::{OutputData, OutputField};
use crate::profile_input::ProfileInput;
use crate::{Result, ScenarioError};

/// Serializable overview of a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSummary {
    /// Scenario id.
    pub id: String,
    /// Plan name.
    pub plan: String,
    /// Scenario name.
    pub name: String,
    /// Grid model.
    pub grid_model: String,
    /// First simulated hour.
    pub start_date: String,
    /// Last simulated hour.
    pub end_date: String,
    /// Optimization interval.
    pub interval: Interval,
    /// Number of optimization intervals.
    pub intervals: usize,
    /// Demand reductions, absent when every interval was feasible.
    pub infeasibilities: Option<Infeasibilities>,
    /// Profile version per kind, for the kinds the scenario names.
    pub profiles: IndexMap<String, String>,
}

/// Readers bound to one scenario.
pub struct Analyze<'a> {
    info: ScenarioInfo,
    output: OutputData<'a>,
    profiles: ProfileInput<'a>,
}

impl<'a> Analyze<'a> {
    /// Readers for `info`, with outputs under `output_dir`.
    pub fn new(info: ScenarioInfo, access: &'a dyn DataAccess, output_dir: impl Into<String>) -> Self {
        Self {
            info,
            output: OutputData::new(access, output_dir),
            profiles: ProfileInput::new(access),
        }
    }

    /// Scenario metadata.
    pub fn info(&self) -> &ScenarioInfo {
        &self.info
    }

    /// Output table for `field`.
    pub fn output(&self, field: OutputField) -> Result<Table> {
        self.output.get(&self.info.id, field)
    }

    /// Power generated by each plant.
    pub fn get_pg(&self) -> Result<Table> {
        self.output(OutputField::Pg)
    }

    /// Power flowing through each AC line.
    pub fn get_pf(&self) -> Result<Table> {
        self.output(OutputField::Pf)
    }

    /// Power flowing through each DC line.
    pub fn get_dcline_pf(&self) -> Result<Table> {
        self.output(OutputField::PfDcline)
    }

    /// Locational marginal price of each bus.
    pub fn get_lmp(&self) -> Result<Table> {
        self.output(OutputField::Lmp)
    }

    /// Congestion shadow price at the upper flow limit.
    pub fn get_congu(&self) -> Result<Table> {
        self.output(OutputField::Congu)
    }

    /// Congestion shadow price at the lower flow limit.
    pub fn get_congl(&self) -> Result<Table> {
        self.output(OutputField::Congl)
    }

    /// Congestion averaged over the scenario period.
    pub fn get_averaged_cong(&self) -> Result<Table> {
        self.output(OutputField::AveragedCong)
    }

    /// Power exchanged by each storage unit.
    pub fn get_storage_pg(&self) -> Result<Table> {
        self.output(OutputField::StoragePg)
    }

    /// Energy held by each storage unit.
    pub fn get_storage_e(&self) -> Result<Table> {
        self.output(OutputField::StorageE)
    }

    /// Load shed written by the simulation engine.
    pub fn get_load_shed(&self) -> Result<Table> {
        self.output(OutputField::LoadShed)
    }

    /// Load shed from the output file, or reconstructed from `bus_demand`
    /// when the engine did not write one.
    pub fn get_load_shed_or_construct(&self, bus_demand: &Table) -> Result<Table> {
        match self.get_load_shed() {
            Err(ScenarioError::DataAccess(DataAccessError::NotFound { .. })) => {
                let infeasibilities = self.info.parsed_infeasibilities()?;
                construct_load_shed(&self.info, bus_demand, infeasibilities.as_ref())
            }
            other => other,
        }
    }

    /// Demand profile, reduced over infeasible intervals unless `original`.
    pub fn get_demand(&self, original: bool) -> Result<Table> {
        let demand = self.profiles.get_data(&self.info, "demand")?;
        if original {
            return Ok(demand);
        }
        self.adjust_demand(demand)
    }

    /// Apply the optimizer's demand reductions to a demand profile.
    pub fn adjust_demand(&self, mut demand: Table) -> Result<Table> {
        let Some(infeasibilities) = self.info.parsed_infeasibilities()? else {
            psd_info!(
                context = LogContext::new().with_scenario(&self.info.id),
                "No infeasibilities. Return original profile."
            );
            return Ok(demand);
        };
        for (start, end, percent) in self.infeasible_windows(&infeasibilities)? {
            let factor = 1.0 - f64::from(percent) / 100.0;
            demand.scale_rows_between(start, end, factor);
        }
        Ok(demand)
    }

    /// Hydro profile.
    pub fn get_hydro(&self) -> Result<Table> {
        self.profiles.get_data(&self.info, "hydro")
    }

    /// Solar profile.
    pub fn get_solar(&self) -> Result<Table> {
        self.profiles.get_data(&self.info, "solar")
    }

    /// Wind profile.
    pub fn get_wind(&self) -> Result<Table> {
        self.profiles.get_data(&self.info, "wind")
    }

    /// Human-readable account of the demand reductions.
    ///
    /// Each interval is printed from its start to the start of the next one.
    pub fn describe_infeasibilities(&self) -> Result<Vec<String>> {
        let Some(infeasibilities) = self.info.parsed_infeasibilities()? else {
            return Ok(vec!["There are no infeasibilities.".to_owned()]);
        };
        Ok(self
            .infeasible_windows(&infeasibilities)?
            .into_iter()
            .map(|(start, last_hour, percent)| {
                format!(
                    "demand in {} - {} interval has been reduced by {percent}%",
                    start.format(TIMESTAMP_FORMAT),
                    (last_hour + Duration::hours(1)).format(TIMESTAMP_FORMAT),
                )
            })
            .collect())
    }

    /// Every metadata field as `name: value`.
    pub fn info_lines(&self) -> Vec<String> {
        self.info
            .fields()
            .into_iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect()
    }

    /// Overview of the scenario.
    pub fn scenario_summary(&self) -> Result<ScenarioSummary> {
        let profiles = psd_data_access::PROFILE_KINDS
            .iter()
            .filter_map(|kind| {
                self.info
                    .profile_version(kind)
                    .ok()
                    .map(|version| ((*kind).to_owned(), version.to_owned()))
            })
            .collect();
        Ok(ScenarioSummary {
            id: self.info.id.clone(),
            plan: self.info.plan.clone(),
            name: self.info.name.clone(),
            grid_model: self.info.grid_model.clone(),
            start_date: self.info.start_date.format(TIMESTAMP_FORMAT).to_string(),
            end_date: self.info.end_date.format(TIMESTAMP_FORMAT).to_string(),
            interval: self.info.interval,
            intervals: self.info.dates().len(),
            infeasibilities: self.info.parsed_infeasibilities()?,
            profiles,
        })
    }

    /// First and last hour of each infeasible interval with its reduction.
    fn infeasible_windows(
        &self,
        infeasibilities: &Infeasibilities,
    ) -> Result<Vec<(NaiveDateTime, NaiveDateTime, u32)>> {
        let dates = self.info.dates();
        let span = self.info.interval.duration() - Duration::hours(1);
        infeasibilities
            .iter()
            .map(|(&index, &percent)| {
                let start = *dates.get(index).ok_or(ScenarioError::IntervalOutOfRange {
                    index,
                    intervals: dates.len(),
                })?;
                Ok((start, start + span, percent))
            })
            .collect()
    }
}
