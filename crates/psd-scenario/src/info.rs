//! ---
//! psd_section: "05-scenario"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Scenario metadata, simulation intervals and infeasibilities."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime};
use indexmap::IndexMap;
use psd_data_access::table::{parse_timestamp, TIMESTAMP_FORMAT};
use psd_data_access::PROFILE_KINDS;
use serde::{Serialize, Serializer};

use crate::{Result, ScenarioError};

/// Demand reductions applied by the optimizer: interval index to percent.
pub type Infeasibilities = BTreeMap<usize, u32>;

/// Parse the infeasibilities field.
///
/// `No` (or an empty field) means the optimizer solved every interval;
/// otherwise entries `<interval>:<percent>` are joined with `_`.
pub fn parse_infeasibilities(field: &str) -> Result<Option<Infeasibilities>> {
    let field = field.trim();
    if field.is_empty() || field == "No" {
        return Ok(None);
    }
    let invalid = || ScenarioError::InvalidInfeasibilities(field.to_owned());
    let mut parsed = Infeasibilities::new();
    for entry in field.split('_') {
        let (interval, percent) = entry.split_once(':').ok_or_else(invalid)?;
        let interval = interval.trim().parse().map_err(|_| invalid())?;
        let percent = percent.trim().parse().map_err(|_| invalid())?;
        parsed.insert(interval, percent);
    }
    Ok(Some(parsed))
}

/// Length of one simulation interval, a whole number of hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    hours: i64,
}

impl Interval {
    /// Interval of `hours` hours.
    pub fn hours(hours: i64) -> Self {
        Self { hours }
    }

    /// Number of hours in the interval.
    pub fn as_hours(&self) -> i64 {
        self.hours
    }

    /// Interval as a duration.
    pub fn duration(&self) -> Duration {
        Duration::hours(self.hours)
    }
}

impl FromStr for Interval {
    type Err = ScenarioError;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let invalid = || ScenarioError::InvalidInterval(raw.to_owned());
        let split = trimmed.len().checked_sub(1).ok_or_else(invalid)?;
        if !trimmed.is_char_boundary(split) {
            return Err(invalid());
        }
        let (count, unit) = trimmed.split_at(split);
        let count: i64 = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| invalid())?
        };
        let hours = match unit {
            "H" | "h" => count,
            "D" | "d" => count * 24,
            _ => return Err(invalid()),
        };
        if hours <= 0 {
            return Err(invalid());
        }
        Ok(Self { hours })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}H", self.hours)
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Interval starts from `start` to `end` inclusive.
pub fn date_range(start: NaiveDateTime, end: NaiveDateTime, interval: Interval) -> Vec<NaiveDateTime> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        dates.push(current);
        current += interval.duration();
    }
    dates
}

/// Metadata of one scenario, as listed in the scenario list.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioInfo {
    /// Scenario id.
    pub id: String,
    /// Plan the scenario belongs to.
    pub plan: String,
    /// Scenario name.
    pub name: String,
    /// Grid model, e.g. `usa_tamu`.
    pub grid_model: String,
    /// First simulated hour.
    pub start_date: NaiveDateTime,
    /// Last simulated hour.
    pub end_date: NaiveDateTime,
    /// Length of one optimization interval.
    pub interval: Interval,
    /// Raw infeasibilities field.
    pub infeasibilities: String,
    /// Every other column, in listing order.
    pub extras: IndexMap<String, String>,
}

impl ScenarioInfo {
    /// Build from the columns of a listing row.
    pub fn from_fields(mut fields: IndexMap<String, String>) -> Result<Self> {
        let mut take = |name: &str| {
            fields
                .shift_remove(name)
                .ok_or_else(|| ScenarioError::MissingField(name.to_owned()))
        };
        let id = take("id")?;
        let plan = take("plan")?;
        let name = take("name")?;
        let grid_model = take("grid_model")?;
        let start = take("start_date")?;
        let end = take("end_date")?;
        let interval = take("interval")?;
        let infeasibilities = take("infeasibilities").unwrap_or_else(|_| "No".to_owned());

        Ok(Self {
            id,
            plan,
            name,
            grid_model,
            start_date: parse_date("start_date", &start)?,
            end_date: parse_date("end_date", &end)?,
            interval: interval.parse()?,
            infeasibilities,
            extras: fields,
        })
    }

    /// Every field as `(name, value)` pairs, typed fields first.
    pub fn fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("id".to_owned(), self.id.clone()),
            ("plan".to_owned(), self.plan.clone()),
            ("name".to_owned(), self.name.clone()),
            ("grid_model".to_owned(), self.grid_model.clone()),
            ("start_date".to_owned(), self.start_date.format(TIMESTAMP_FORMAT).to_string()),
            ("end_date".to_owned(), self.end_date.format(TIMESTAMP_FORMAT).to_string()),
            ("interval".to_owned(), self.interval.to_string()),
            ("infeasibilities".to_owned(), self.infeasibilities.clone()),
        ];
        fields.extend(self.extras.iter().map(|(k, v)| (k.clone(), v.clone())));
        fields
    }

    /// Value of a listing column not covered by a typed field.
    pub fn extra(&self, name: &str) -> Option<&str> {
        self.extras.get(name).map(String::as_str)
    }

    /// Parsed infeasibilities.
    pub fn parsed_infeasibilities(&self) -> Result<Option<Infeasibilities>> {
        parse_infeasibilities(&self.infeasibilities)
    }

    /// Start of every interval of the scenario period.
    pub fn dates(&self) -> Vec<NaiveDateTime> {
        date_range(self.start_date, self.end_date, self.interval)
    }

    /// Every simulated hour.
    pub fn hours(&self) -> Vec<NaiveDateTime> {
        date_range(self.start_date, self.end_date, Interval::hours(1))
    }

    /// Raw profile version used for `kind`.
    ///
    /// Flexibility families name their version in a column of the same name;
    /// the base profiles in `base_<kind>`.
    pub fn profile_version(&self, kind: &str) -> Result<&str> {
        if !PROFILE_KINDS.contains(&kind) {
            return Err(ScenarioError::InvalidProfileKind(kind.to_owned()));
        }
        let column = if kind.contains("demand_flexibility") {
            kind.to_owned()
        } else {
            format!("base_{kind}")
        };
        self.extra(&column)
            .filter(|version| !version.is_empty())
            .ok_or(ScenarioError::MissingField(column))
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDateTime> {
    parse_timestamp(value).ok_or_else(|| ScenarioError::Date {
        field: field.to_owned(),
        value: value.to_owned(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn info(interval: &str, infeasibilities: &str) -> ScenarioInfo {
        let fields: IndexMap<String, String> = [
            ("id", "1171"),
            ("plan", "test"),
            ("name", "dummy"),
            ("state", "analyze"),
            ("grid_model", "usa_tamu"),
            ("base_demand", "vJan2021"),
            ("base_hydro", "vJan2021"),
            ("base_solar", "vJan2021"),
            ("base_wind", "vJan2021"),
            ("start_date", "2016-01-01 00:00:00"),
            ("end_date", "2016-01-01 23:00:00"),
            ("interval", interval),
            ("infeasibilities", infeasibilities),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        ScenarioInfo::from_fields(fields).unwrap()
    }

    #[test]
    fn infeasibilities_parse_pairs() {
        assert_eq!(parse_infeasibilities("No").unwrap(), None);
        let parsed = parse_infeasibilities("0:10_3:25").unwrap().unwrap();
        assert_eq!(parsed, BTreeMap::from([(0, 10), (3, 25)]));
        assert!(matches!(
            parse_infeasibilities("0-10"),
            Err(ScenarioError::InvalidInfeasibilities(_))
        ));
    }

    #[test]
    fn intervals_accept_hours_and_days() {
        assert_eq!("24H".parse::<Interval>().unwrap().as_hours(), 24);
        assert_eq!("1D".parse::<Interval>().unwrap().as_hours(), 24);
        assert_eq!("H".parse::<Interval>().unwrap().as_hours(), 1);
        assert!("0H".parse::<Interval>().is_err());
        assert!("3W".parse::<Interval>().is_err());
        assert!("".parse::<Interval>().is_err());
    }

    #[test]
    fn date_range_includes_aligned_end() {
        let info = info("6H", "No");
        let dates = info.dates();
        assert_eq!(dates.len(), 4);
        assert_eq!(dates[3], parse_timestamp("2016-01-01 18:00:00").unwrap());
        assert_eq!(info.hours().len(), 24);
    }

    #[test]
    fn profile_versions_come_from_base_columns() {
        let mut info = info("24H", "No");
        assert_eq!(info.profile_version("solar").unwrap(), "vJan2021");
        assert!(matches!(
            info.profile_version("demand_flexibility_up"),
            Err(ScenarioError::MissingField(field)) if field == "demand_flexibility_up"
        ));
        info.extras
            .insert("demand_flexibility_up".into(), "vFlex".into());
        assert_eq!(info.profile_version("demand_flexibility_up").unwrap(), "vFlex");
        assert!(info.profile_version("coal").is_err());
    }

    #[test]
    fn missing_columns_are_reported() {
        let fields = IndexMap::from([("id".to_owned(), "1".to_owned())]);
        assert!(matches!(
            ScenarioInfo::from_fields(fields),
            Err(ScenarioError::MissingField(field)) if field == "plan"
        ));
    }
}
