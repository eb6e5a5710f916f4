use std::collections::BTreeMap;

use anyhow::{ensure, Result};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::warn;

use crate::domain::{ControlMode, QUARTERS_PER_HOUR};

/// Keep some buffer below full capacity to avoid scheduling errors because of
/// bad predictions. Grid-charging stops at this fraction of total capacity.
pub const ESS_MAX_SOC_PERCENT: i64 = 90;

/// C-rate (capacity divided by time) while grid-charging. With a C-rate of 0.5
/// the battery gets fully charged within 2 hours.
pub const ESS_CHARGE_C_RATE: f64 = 0.5;

/// Number of leading horizon hours optimized at quarter resolution. Slots
/// further out are optimized per hour; forecasts are coarser there anyway.
pub const QUARTER_RESOLUTION_HOURS: usize = 6;

const DEADLINE_BUFFER_SECONDS: i64 = 30;
const DEADLINE_MINIMUM_SECONDS: i64 = 60;

/// Resolution of one optimization slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodLength {
    Quarter,
    Hour,
}

/// One optimization slot with its forecast and per-slot limits.
///
/// All energies in [Wh] for the slot length, all positive. An `Hour` period
/// carries its four constituent quarter periods so the detailed simulation can
/// publish at quarter granularity.
#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    pub time: DateTime<Utc>,
    pub length: PeriodLength,
    pub ess_max_charge_energy: i64,
    pub ess_max_discharge_energy: i64,
    /// Precomputed grid-charge budget for CHARGE_GRID.
    pub ess_charge_in_charge_grid: i64,
    pub max_buy_from_grid: i64,
    pub production: i64,
    pub consumption: i64,
    /// Price in [currency/MWh]; may be negative.
    pub price: f64,
    /// Quarter-resolution constituents; empty for a `Quarter` period.
    pub quarters: Vec<Period>,
}

impl Period {
    /// The quarter-resolution view of this period: the period itself for a
    /// `Quarter`, the constituent quarters for an `Hour`.
    pub fn quarter_periods(&self) -> &[Period] {
        match self.length {
            PeriodLength::Quarter => std::slice::from_ref(self),
            PeriodLength::Hour => &self.quarters,
        }
    }
}

/// Immutable input of one optimization run.
#[derive(Debug, Clone)]
pub struct Params {
    /// Run start, rounded down to the quarter.
    pub time: DateTime<Utc>,
    pub ess_total_energy: i64,
    pub ess_min_soc_energy: i64,
    pub ess_max_soc_energy: i64,
    pub ess_initial_energy: i64,
    pub periods: Vec<Period>,
    /// Allowed control modes for this run; a run may restrict the set.
    pub states: Vec<ControlMode>,
    /// Result of the previous run, used only for seeding.
    pub existing_schedule: BTreeMap<DateTime<Utc>, ControlMode>,
}

impl Params {
    /// Validating constructor. SoC energies must be ordered; the reported
    /// initial energy is clamped into `[0, ess_total_energy]` rather than
    /// trusted blindly.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        time: DateTime<Utc>,
        ess_total_energy: i64,
        ess_min_soc_energy: i64,
        ess_max_soc_energy: i64,
        ess_initial_energy: i64,
        periods: Vec<Period>,
        states: Vec<ControlMode>,
        existing_schedule: BTreeMap<DateTime<Utc>, ControlMode>,
    ) -> Result<Self> {
        ensure!(ess_total_energy >= 0, "negative ESS capacity");
        ensure!(
            0 <= ess_min_soc_energy
                && ess_min_soc_energy <= ess_max_soc_energy
                && ess_max_soc_energy <= ess_total_energy,
            "SoC energies out of order: min={ess_min_soc_energy} max={ess_max_soc_energy} total={ess_total_energy}"
        );
        ensure!(!states.is_empty(), "no allowed control modes");
        Ok(Self {
            time,
            ess_total_energy,
            ess_min_soc_energy,
            ess_max_soc_energy,
            ess_initial_energy: ess_initial_energy.clamp(0, ess_total_energy),
            periods,
            states,
            existing_schedule,
        })
    }

    pub fn number_of_periods(&self) -> usize {
        self.periods.len()
    }
}

/// False when any answer is equally good: no periods, no meaningful forecast,
/// or prices that cannot be arbitraged. Skipping the search in these cases
/// keeps the budget for runs that can profit from it.
pub fn params_are_valid(p: &Params) -> bool {
    if p.periods.is_empty() {
        warn!("no periods are available");
        return false;
    }
    if p.periods.iter().all(|pp| pp.production == 0 && pp.consumption == 0) {
        warn!("production and consumption forecasts are all zero");
        return false;
    }
    if p.periods.iter().all(|pp| pp.price == p.periods[0].price) {
        warn!("prices are all the same");
        return false;
    }
    true
}

/// Interpolates a quarter-resolution series: a gap carries the last known
/// value forward, a missing head is backfilled with the first known value and
/// the series is truncated after the last known value. An all-missing series
/// becomes all-zero; the validity guard then skips the search.
pub fn interpolate<T: Copy + Default>(values: &[Option<T>]) -> Vec<T> {
    let Some(first) = values.iter().flatten().next().copied() else {
        return vec![T::default(); values.len()];
    };
    let last_known = values
        .iter()
        .rposition(Option::is_some)
        .unwrap_or(0);
    let mut last = first;
    values[..=last_known]
        .iter()
        .map(|v| {
            last = v.unwrap_or(last);
            last
        })
        .collect()
}

/// Pads the production prediction with zeroes up to the consumption
/// prediction length, so both series cover the same horizon.
pub fn pad_production(production: Vec<i64>, min_length: usize) -> Vec<i64> {
    let mut production = production;
    while production.len() < min_length {
        production.push(0);
    }
    production
}

/// Global per-quarter limits used to lay out the horizon.
#[derive(Debug, Clone, Copy)]
pub struct QuarterLimits {
    pub ess_max_charge_energy: i64,
    pub ess_max_discharge_energy: i64,
    pub ess_charge_in_charge_grid: i64,
    pub max_buy_from_grid: i64,
}

/// Builds the horizon: quarter periods for the first
/// [`QUARTER_RESOLUTION_HOURS`], hour periods (wrapping their four quarters)
/// beyond that. Energies of an hour period are the sums of its quarters, the
/// price is their mean. A trailing group shorter than an hour stays at
/// quarter resolution.
pub fn build_horizon(
    start: DateTime<Utc>,
    production: &[i64],
    consumption: &[i64],
    prices: &[f64],
    limits: QuarterLimits,
) -> Vec<Period> {
    let n = production.len().min(consumption.len()).min(prices.len());
    let quarter = |i: usize| Period {
        time: start + TimeDelta::minutes(15 * i as i64),
        length: PeriodLength::Quarter,
        ess_max_charge_energy: limits.ess_max_charge_energy,
        ess_max_discharge_energy: limits.ess_max_discharge_energy,
        ess_charge_in_charge_grid: limits.ess_charge_in_charge_grid,
        max_buy_from_grid: limits.max_buy_from_grid,
        production: production[i],
        consumption: consumption[i],
        price: prices[i],
        quarters: Vec::new(),
    };

    let quarter_slots = (QUARTER_RESOLUTION_HOURS * QUARTERS_PER_HOUR as usize).min(n);
    let mut periods: Vec<Period> = (0..quarter_slots).map(quarter).collect();

    let mut i = quarter_slots;
    while i < n {
        let remaining = n - i;
        if remaining < QUARTERS_PER_HOUR as usize {
            periods.extend((i..n).map(quarter));
            break;
        }
        let quarters: Vec<Period> = (i..i + QUARTERS_PER_HOUR as usize).map(quarter).collect();
        periods.push(Period {
            time: quarters[0].time,
            length: PeriodLength::Hour,
            ess_max_charge_energy: quarters.iter().map(|q| q.ess_max_charge_energy).sum(),
            ess_max_discharge_energy: quarters.iter().map(|q| q.ess_max_discharge_energy).sum(),
            ess_charge_in_charge_grid: quarters.iter().map(|q| q.ess_charge_in_charge_grid).sum(),
            max_buy_from_grid: quarters.iter().map(|q| q.max_buy_from_grid).sum(),
            production: quarters.iter().map(|q| q.production).sum(),
            consumption: quarters.iter().map(|q| q.consumption).sum(),
            price: quarters.iter().map(|q| q.price).sum::<f64>() / quarters.len() as f64,
            quarters,
        });
        i += QUARTERS_PER_HOUR as usize;
    }
    periods
}

/// Per-quarter grid-charge budget [Wh] derived from [`ESS_CHARGE_C_RATE`].
pub fn ess_charge_in_charge_grid(ess_total_energy: i64) -> i64 {
    (ess_total_energy as f64 * ESS_CHARGE_C_RATE / QUARTERS_PER_HOUR as f64) as i64
}

/// The wall-clock deadline of one optimization run: the next quarter boundary
/// minus a safety buffer. If less than a minimum window remains, the run gets
/// the following quarter as well.
pub fn calculate_deadline(now: DateTime<Utc>) -> DateTime<Utc> {
    let next_quarter = crate::domain::round_down_to_quarter(now) + TimeDelta::minutes(15)
        - TimeDelta::seconds(DEADLINE_BUFFER_SECONDS);
    if (next_quarter - now).num_seconds() >= DEADLINE_MINIMUM_SECONDS {
        next_quarter
    } else {
        next_quarter + TimeDelta::minutes(15)
    }
}
