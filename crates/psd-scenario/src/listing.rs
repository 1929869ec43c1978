//! ---
//! psd_section: "05-scenario"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Scenario and execute listings keyed by scenario id."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use csv::StringRecord;
use indexmap::IndexMap;

use crate::info::ScenarioInfo;
use crate::{Result, ScenarioError};

/// Listing of every scenario and its metadata.
pub const SCENARIO_LIST: &str = "ScenarioList.csv";
/// Listing of the execution state of every scenario.
pub const EXECUTE_LIST: &str = "ExecuteList.csv";

/// Rows of a listing file, kept as text.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    headers: StringRecord,
    rows: Vec<StringRecord>,
    id_column: usize,
}

impl Listing {
    /// Parse a listing. The `id` column (or the first column) keys the rows.
    pub fn from_csv(data: &[u8]) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(data);
        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        let id_column = headers.iter().position(|name| name == "id").unwrap_or(0);
        Ok(Self {
            headers,
            rows,
            id_column,
        })
    }

    /// Serialize with the original header.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|err| ScenarioError::Csv(err.into_error().into()))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the listing has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Scenario ids in listing order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |row| row.get(self.id_column).unwrap_or_default())
    }

    /// Listing restricted to `ids`, keeping the original order.
    pub fn retain_ids(&self, ids: &[&str]) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|row| {
                row.get(self.id_column)
                    .is_some_and(|id| ids.contains(&id.trim()))
            })
            .cloned()
            .collect();
        Self {
            headers: self.headers.clone(),
            rows,
            id_column: self.id_column,
        }
    }

    /// Columns of the row for `id`.
    pub fn record(&self, id: &str) -> Option<IndexMap<String, String>> {
        let row = self
            .rows
            .iter()
            .find(|row| row.get(self.id_column).map(str::trim) == Some(id))?;
        Some(
            self.headers
                .iter()
                .zip(row.iter())
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect(),
        )
    }

    /// Metadata of scenario `id`.
    pub fn scenario(&self, id: &str) -> Result<ScenarioInfo> {
        let record = self
            .record(id)
            .ok_or_else(|| ScenarioError::ScenarioNotFound(id.to_owned()))?;
        ScenarioInfo::from_fields(record)
    }
}
