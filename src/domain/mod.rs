pub mod schedule;
pub mod types;

pub use schedule::{Schedule, ScheduleEntry};
pub use types::{
    power_to_quarter_energy, quarter_energy_to_power, round_down_to_quarter, ControlMode,
    EnergyFlow, QUARTERS_PER_HOUR,
};
