use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Number of 15-minute scheduling slots per hour.
pub const QUARTERS_PER_HOUR: i64 = 4;

/// Control mode of the storage system for one scheduling slot.
///
/// The set is closed on purpose: the flow model matches exhaustively over it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMode {
    /// Let the battery freely absorb the production/consumption mismatch.
    Balancing,
    /// Allow charging from surplus, forbid discharging.
    DelayDischarge,
    /// Delay discharge plus an explicit grid-charge budget.
    ChargeGrid,
}

/// Physically consistent energy split of one simulated period.
///
/// All values are energies in [Wh] for the period. `ess` is positive when the
/// battery discharges, `grid` is positive on import. All `*_to_*` components
/// are non-negative except `grid_to_ess`, which goes negative when the battery
/// discharges through the grid accounting path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyFlow {
    pub production: i64,
    pub consumption: i64,
    pub ess: i64,
    pub grid: i64,
    pub production_to_consumption: i64,
    pub production_to_grid: i64,
    pub production_to_ess: i64,
    pub grid_to_consumption: i64,
    pub ess_to_consumption: i64,
    pub grid_to_ess: i64,
}

/// Rounds a timestamp down to the enclosing quarter-hour boundary.
pub fn round_down_to_quarter(t: DateTime<Utc>) -> DateTime<Utc> {
    // Truncation to 15 minutes never fails for in-range timestamps.
    t.duration_trunc(TimeDelta::minutes(15)).unwrap_or(t)
}

/// Converts power [W] to energy [Wh] of one quarter.
pub fn power_to_quarter_energy(power: i64) -> i64 {
    power / QUARTERS_PER_HOUR
}

/// Converts energy [Wh] of one quarter to power [W].
pub fn quarter_energy_to_power(energy: i64) -> i64 {
    energy * QUARTERS_PER_HOUR
}
