//! Heuristic starting candidates for the schedule search.
//!
//! Pure random initialization converges too slowly inside the wall-clock
//! budget. These candidates bias the population toward "charge while cheap,
//! discharge while expensive" without hard-coding the final answer.

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::domain::ControlMode;
use crate::optimizer::params::Params;
use crate::simulator::ScheduleCandidate;

/// Percentile pairs (charge-grid, delay-discharge) tried over the first
/// valley-to-peak price run.
const PERCENTILE_PAIRS: [(f64, f64); 4] = [(5.0, 50.0), (5.0, 75.0), (10.0, 50.0), (10.0, 75.0)];

/// Builds the seed population.
///
/// The all-BALANCING candidate always comes first: the search accepts only
/// strictly better candidates, so it wins whenever everything ties on cost.
pub fn seed_candidates(params: &Params) -> Vec<ScheduleCandidate> {
    let n = params.number_of_periods();
    let mut candidates = vec![vec![ControlMode::Balancing; n]];

    let aggressive_modes_allowed = params.states.contains(&ControlMode::ChargeGrid)
        && params.states.contains(&ControlMode::DelayDischarge);
    if !aggressive_modes_allowed {
        return candidates;
    }

    if let Some(previous) = remap_existing_schedule(params) {
        candidates.push(previous);
    }
    candidates.extend(percentile_candidates(params));
    candidates
}

/// The previous run's best schedule remapped onto the new horizon: stale
/// timestamps are dropped, new timestamps default to BALANCING. Skipped when
/// it contains nothing but BALANCING anyway.
fn remap_existing_schedule(params: &Params) -> Option<ScheduleCandidate> {
    if params.existing_schedule.is_empty() {
        return None;
    }
    let candidate: ScheduleCandidate = params
        .periods
        .iter()
        .map(|p| {
            params
                .existing_schedule
                .get(&p.time)
                .copied()
                .filter(|state| params.states.contains(state))
                .unwrap_or(ControlMode::Balancing)
        })
        .collect();
    candidate
        .iter()
        .any(|s| *s != ControlMode::Balancing)
        .then_some(candidate)
}

/// Price-percentile-driven charge/delay patterns over the sub-series from the
/// horizon start up to the first price peak after the first valley.
fn percentile_candidates(params: &Params) -> Vec<ScheduleCandidate> {
    let prices: Vec<f64> = params.periods.iter().map(|p| p.price).collect();
    let valley = find_first_valley_index(0, &prices);
    let peak = find_first_peak_index(valley, &prices);
    if prices.is_empty() {
        return Vec::new();
    }
    let sub_series = &prices[..=peak.min(prices.len() - 1)];

    PERCENTILE_PAIRS
        .iter()
        .map(|(charge_grid_pct, delay_discharge_pct)| {
            let charge_threshold = percentile(sub_series, *charge_grid_pct);
            let delay_threshold = percentile(sub_series, *delay_discharge_pct);
            prices
                .iter()
                .enumerate()
                .map(|(i, price)| {
                    if i >= sub_series.len() {
                        ControlMode::Balancing
                    } else if *price <= charge_threshold {
                        ControlMode::ChargeGrid
                    } else if *price <= delay_threshold {
                        ControlMode::DelayDischarge
                    } else {
                        ControlMode::Balancing
                    }
                })
                .collect()
        })
        .collect()
}

/// Index of the first local maximum at or after `from_index`; the last index
/// when prices keep rising.
pub(crate) fn find_first_peak_index(from_index: usize, values: &[f64]) -> usize {
    if values.len() <= from_index {
        return from_index;
    }
    let mut previous = values[from_index];
    for (i, value) in values.iter().enumerate().skip(from_index + 1) {
        if *value < previous {
            return i - 1;
        }
        previous = *value;
    }
    values.len() - 1
}

/// Index of the first local minimum at or after `from_index`; the last index
/// when prices keep falling.
pub(crate) fn find_first_valley_index(from_index: usize, values: &[f64]) -> usize {
    if values.len() <= from_index {
        return from_index;
    }
    let mut previous = values[from_index];
    for (i, value) in values.iter().enumerate().skip(from_index + 1) {
        if *value > previous {
            return i - 1;
        }
        previous = *value;
    }
    values.len() - 1
}

/// Nearest-rank percentile of a non-empty series.
fn percentile(values: &[f64], pct: f64) -> f64 {
    let sorted: Vec<f64> = values
        .iter()
        .copied()
        .sorted_by_key(|v| OrderedFloat(*v))
        .collect();
    let rank = ((pct / 100.0 * sorted.len() as f64).ceil() as usize).max(1);
    sorted[rank - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy_flow::test_support::{test_params, test_period};

    fn params_with_prices(prices: &[f64]) -> Params {
        let mut params = test_params();
        params.periods = prices
            .iter()
            .enumerate()
            .map(|(i, price)| {
                let mut p = test_period(0, 1000, *price);
                p.time = params.time + chrono::TimeDelta::minutes(15 * i as i64);
                p
            })
            .collect();
        params
    }

    #[test]
    fn test_first_peak_index() {
        assert_eq!(find_first_peak_index(0, &[]), 0);
        assert_eq!(find_first_peak_index(0, &[1.0]), 0);
        assert_eq!(find_first_peak_index(0, &[1.0, 0.0]), 0);
        assert_eq!(find_first_peak_index(0, &[0.0, 1.0, 0.0]), 1);
        assert_eq!(find_first_peak_index(0, &[0.0, 1.0, 0.0, 1.0]), 1);
        assert_eq!(find_first_peak_index(5, &[]), 5);
    }

    #[test]
    fn test_first_valley_index() {
        assert_eq!(find_first_valley_index(0, &[]), 0);
        assert_eq!(find_first_valley_index(0, &[1.0]), 0);
        assert_eq!(find_first_valley_index(0, &[1.0, 0.0]), 1);
        assert_eq!(find_first_valley_index(0, &[0.0, 1.0, 0.0]), 0);
        assert_eq!(find_first_valley_index(1, &[0.0, 1.0, 0.0, 1.0]), 2);
        assert_eq!(find_first_valley_index(5, &[]), 5);
    }

    #[test]
    fn test_all_balancing_comes_first() {
        let params = params_with_prices(&[50.0, 60.0, 40.0]);
        let candidates = seed_candidates(&params);
        assert_eq!(candidates[0], vec![ControlMode::Balancing; 3]);
    }

    #[test]
    fn test_restricted_states_yield_only_balancing_seed() {
        let mut params = params_with_prices(&[50.0, 60.0, 40.0]);
        params.states = vec![ControlMode::Balancing, ControlMode::DelayDischarge];
        let candidates = seed_candidates(&params);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_existing_schedule_is_remapped() {
        let mut params = params_with_prices(&[50.0, 60.0, 70.0]);
        // previous run covered one quarter earlier; its first entry is stale
        let q = chrono::TimeDelta::minutes(15);
        params.existing_schedule = [
            (params.time - q, ControlMode::ChargeGrid),
            (params.time, ControlMode::DelayDischarge),
            (params.time + q, ControlMode::ChargeGrid),
        ]
        .into_iter()
        .collect();

        let candidates = seed_candidates(&params);
        let remapped = &candidates[1];
        assert_eq!(
            remapped,
            &vec![
                ControlMode::DelayDischarge,
                ControlMode::ChargeGrid,
                ControlMode::Balancing,
            ]
        );
    }

    #[test]
    fn test_all_balancing_previous_schedule_is_not_seeded() {
        let mut params = params_with_prices(&[50.0, 60.0, 70.0]);
        params.existing_schedule =
            [(params.time, ControlMode::Balancing)].into_iter().collect();
        let candidates = seed_candidates(&params);
        // all-balancing + 4 percentile candidates, no remap candidate
        assert_eq!(candidates.len(), 5);
    }

    #[test]
    fn test_percentile_candidates_charge_in_the_valley() {
        // valley at the start, peak at index 3, then irrelevant tail
        let params = params_with_prices(&[30.0, 45.0, 80.0, 120.0, 20.0, 20.0]);
        let candidates = seed_candidates(&params);
        assert_eq!(candidates.len(), 5);

        // (5, 50): only the cheapest slot charges, slots at or below the
        // median delay, everything past the peak balances
        let c = &candidates[1];
        assert_eq!(c[0], ControlMode::ChargeGrid);
        assert_eq!(c[1], ControlMode::DelayDischarge);
        assert_eq!(c[2], ControlMode::Balancing);
        assert_eq!(c[3], ControlMode::Balancing);
        assert_eq!(c[4], ControlMode::Balancing);
        assert_eq!(c[5], ControlMode::Balancing);

        // (10, 75) delays up to the 75th percentile of the sub-series
        let c = &candidates[4];
        assert_eq!(c[0], ControlMode::ChargeGrid);
        assert_eq!(c[1], ControlMode::DelayDischarge);
        assert_eq!(c[2], ControlMode::DelayDischarge);
        assert_eq!(c[3], ControlMode::Balancing);
    }
}
