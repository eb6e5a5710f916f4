//! Columnar trace of each optimization run, written through `tracing` so the
//! regular log pipeline picks it up. One header line with the run's params,
//! one row per published quarter.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::ScheduleEntry;
use crate::optimizer::params::Params;

pub fn render_params(params: &Params) -> String {
    let states = params
        .states
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "OPTIMIZER time={} essTotalEnergy={} essMinSocEnergy={} essMaxSocEnergy={} essInitialEnergy={} periods={} states={}",
        params.time.format("%Y-%m-%dT%H:%M:%SZ"),
        params.ess_total_energy,
        params.ess_min_soc_energy,
        params.ess_max_soc_energy,
        params.ess_initial_energy,
        params.number_of_periods(),
        states,
    )
}

pub fn render_schedule(entries: &BTreeMap<DateTime<Utc>, ScheduleEntry>) -> String {
    if entries.is_empty() {
        return "OPTIMIZER -> EMPTY SCHEDULE".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<21}{:<16}{:>10}{:>9}{:>8}{:>8}",
        "Time", "State", "EssInitial", "Price", "Ess", "Grid"
    );
    for entry in entries.values() {
        let _ = writeln!(
            out,
            "{:<21}{:<16}{:>10}{:>9.2}{:>8}{:>8}",
            entry.time.format("%Y-%m-%dT%H:%MZ"),
            entry.state.to_string(),
            entry.ess_initial,
            entry.price,
            entry.flow.ess,
            entry.flow.grid,
        );
    }
    out.pop();
    out
}

/// Writes the full trace of one run, one log line per rendered line so each
/// stays intact through line-oriented collectors.
pub fn log_schedule(params: &Params, entries: &BTreeMap<DateTime<Utc>, ScheduleEntry>) {
    info!(target: "optimizer", "{}", render_params(params));
    for line in render_schedule(entries).lines() {
        info!(target: "optimizer", "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ControlMode;
    use crate::energy_flow::test_support::{test_params, test_period};
    use crate::simulator::simulate_detailed;

    #[test]
    fn test_params_header_names_every_bound() {
        let header = render_params(&test_params());
        assert!(header.starts_with("OPTIMIZER time=2026-08-25T12:00:00Z"));
        assert!(header.contains("essTotalEnergy=22000"));
        assert!(header.contains("essMinSocEnergy=1000"));
        assert!(header.contains("essMaxSocEnergy=20000"));
        assert!(header.contains("states=BALANCING,DELAY_DISCHARGE,CHARGE_GRID"));
    }

    #[test]
    fn test_empty_schedule_renders_marker() {
        assert_eq!(render_schedule(&BTreeMap::new()), "OPTIMIZER -> EMPTY SCHEDULE");
    }

    #[test]
    fn test_one_row_per_quarter() {
        let mut params = test_params();
        params.periods = vec![
            test_period(0, 2000, 100.0),
            {
                let mut p = test_period(0, 2000, 150.0);
                p.time += chrono::TimeDelta::minutes(15);
                p
            },
        ];
        let entries = simulate_detailed(&params, &[ControlMode::Balancing, ControlMode::Balancing]);
        let rendered = render_schedule(&entries);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Time"));
        assert!(lines[1].contains("BALANCING"));
        assert!(lines[1].contains("2026-08-25T12:00Z"));
        assert!(lines[2].contains("2026-08-25T12:15Z"));
    }
}
