//! ---
//! psd_section: "05-scenario"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Load shed reconstructed from demand and infeasibilities."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use psd_data_access::{IndexValue, Table};
use psd_logging::{psd_info, LogContext};

use crate::info::{Infeasibilities, ScenarioInfo};
use crate::{Result, ScenarioError};

/// Hourly load shed per bus over the scenario period.
///
/// Without infeasibilities the table is all zeros. Otherwise, for every
/// reduced interval, the shed is `percent / 100` of the bus demand over the
/// hours of that interval. Columns are those of `bus_demand`, whose rows are
/// the scenario hours in order.
pub fn construct_load_shed(
    info: &ScenarioInfo,
    bus_demand: &Table,
    infeasibilities: Option<&Infeasibilities>,
) -> Result<Table> {
    let hours: Vec<IndexValue> = info.hours().into_iter().map(IndexValue::Time).collect();
    let n_hours = hours.len();
    let mut load_shed = Table::zeros(Some("UTC".into()), hours, bus_demand.columns().to_vec());

    let ctx = LogContext::new().with_scenario(&info.id);
    let Some(infeasibilities) = infeasibilities else {
        psd_info!(context = ctx, "No infeasibilities, constructing load shed");
        return Ok(load_shed);
    };
    psd_info!(context = ctx, "Infeasibilities, constructing load shed");

    let intervals = info.dates().len();
    let interval = info.interval.as_hours() as usize;
    let available = n_hours.min(bus_demand.n_rows());
    for (&index, &percent) in infeasibilities {
        if index >= intervals {
            return Err(ScenarioError::IntervalOutOfRange { index, intervals });
        }
        let start = (index * interval).min(available);
        let end = ((index + 1) * interval).min(available);
        let share = f64::from(percent) / 100.0;
        for row in start..end {
            for (column, demand) in bus_demand.row(row).iter().enumerate() {
                load_shed.set(row, column, demand * share);
            }
        }
    }
    Ok(load_shed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::tests::info;
    use psd_data_access::ColumnKey;

    fn bus_demand(n: usize) -> Table {
        Table::new(
            Some("UTC".into()),
            (0..n as i64).map(IndexValue::Int).collect(),
            vec![ColumnKey::Int(1), ColumnKey::Int(2)],
            (0..n).map(|h| vec![100.0 + h as f64, 10.0]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn feasible_scenario_sheds_nothing() {
        let info = info("24H", "No");
        let shed = construct_load_shed(&info, &bus_demand(24), None).unwrap();
        assert_eq!(shed.n_rows(), 24);
        assert_eq!(shed.index_name(), Some("UTC"));
        assert!((0..24).all(|row| shed.row(row) == [0.0, 0.0]));
    }

    #[test]
    fn shed_covers_infeasible_interval_only() {
        let info = info("6H", "1:50");
        let infeasibilities = info.parsed_infeasibilities().unwrap().unwrap();
        let shed = construct_load_shed(&info, &bus_demand(24), Some(&infeasibilities)).unwrap();
        assert_eq!(shed.row(5), &[0.0, 0.0]);
        assert_eq!(shed.row(6), &[53.0, 5.0]);
        assert_eq!(shed.row(11), &[55.5, 5.0]);
        assert_eq!(shed.row(12), &[0.0, 0.0]);
    }

    #[test]
    fn interval_past_the_period_is_rejected() {
        let daily = info("24H", "18446744073709551615:10");
        let infeasibilities = daily.parsed_infeasibilities().unwrap().unwrap();
        assert!(matches!(
            construct_load_shed(&daily, &bus_demand(24), Some(&infeasibilities)),
            Err(ScenarioError::IntervalOutOfRange { intervals: 1, .. })
        ));

        let six_hourly = info("6H", "4:10");
        let infeasibilities = six_hourly.parsed_infeasibilities().unwrap().unwrap();
        assert!(matches!(
            construct_load_shed(&six_hourly, &bus_demand(24), Some(&infeasibilities)),
            Err(ScenarioError::IntervalOutOfRange { index: 4, intervals: 4 })
        ));
    }
}
