//! Walks a horizon applying the flow model period by period, carrying the
//! battery's state of energy forward.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::domain::{ControlMode, EnergyFlow, ScheduleEntry};
use crate::energy_flow::{compute_flow, cost};
use crate::optimizer::params::{Params, Period};

/// One full per-period assignment of control modes; the decision variable of
/// the optimization.
pub type ScheduleCandidate = Vec<ControlMode>;

/// Simulates one period and advances the stored-energy carry.
fn simulate_period(
    params: &Params,
    period: &Period,
    mode: ControlMode,
    carry: &mut i64,
) -> (EnergyFlow, f64) {
    let flow = compute_flow(params, period, mode, *carry);
    *carry -= flow.ess;
    (flow, cost(&flow, period.price))
}

/// Total monetary cost of a candidate across the horizon.
///
/// This is the fitness function of the search; it simulates at optimization
/// granularity and allocates nothing beyond the carry.
pub fn total_cost(params: &Params, candidate: &[ControlMode]) -> f64 {
    let mut carry = params.ess_initial_energy;
    params
        .periods
        .iter()
        .zip(candidate)
        .map(|(period, mode)| simulate_period(params, period, *mode, &mut carry).1)
        .sum()
}

/// Simulates a candidate at quarter granularity for publishing.
///
/// Hour periods are expanded into their constituent quarters, each inheriting
/// the hour's mode. Every record's state is post-processed: an aggressive
/// mode that had no behavioural effect over the gentler one is downgraded, so
/// the published schedule reports what actually happens. The downgrade is a
/// pure function of the three modes' flows, which makes re-optimization over
/// an unchanged horizon idempotent.
pub fn simulate_detailed(
    params: &Params,
    candidate: &[ControlMode],
) -> BTreeMap<DateTime<Utc>, ScheduleEntry> {
    let mut carry = params.ess_initial_energy;
    let mut entries = BTreeMap::new();
    for (period, mode) in params.periods.iter().zip(candidate) {
        for quarter in period.quarter_periods() {
            let ess_initial = carry.max(0);
            let (flow, _) = simulate_period(params, quarter, *mode, &mut carry);
            let state = postprocess_state(params, quarter, *mode, ess_initial);
            entries.insert(
                quarter.time,
                ScheduleEntry {
                    time: quarter.time,
                    state,
                    ess_initial,
                    price: quarter.price,
                    flow,
                },
            );
        }
    }
    entries
}

/// Replaces a state with the gentler state of identical behaviour, comparing
/// the net ESS energy each mode would produce for this slot.
fn postprocess_state(
    params: &Params,
    period: &Period,
    mode: ControlMode,
    ess_initial: i64,
) -> ControlMode {
    let mut state = mode;
    if state == ControlMode::ChargeGrid {
        let charge_grid = compute_flow(params, period, ControlMode::ChargeGrid, ess_initial);
        let delay = compute_flow(params, period, ControlMode::DelayDischarge, ess_initial);
        if charge_grid.ess >= delay.ess {
            state = ControlMode::DelayDischarge;
        }
    }
    if state == ControlMode::DelayDischarge {
        let delay = compute_flow(params, period, ControlMode::DelayDischarge, ess_initial);
        let balancing = compute_flow(params, period, ControlMode::Balancing, ess_initial);
        if delay.ess >= balancing.ess {
            state = ControlMode::Balancing;
        }
    }
    state
}
