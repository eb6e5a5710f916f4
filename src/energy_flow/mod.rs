//! Pure per-period energy balance and cost functions. No state, no I/O.

pub mod cost;
pub mod model;

pub use cost::{cost, EFFICIENCY_FACTOR};
pub use model::compute_flow;

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use chrono::Utc;

    use crate::domain::ControlMode;
    use crate::optimizer::params::{Params, Period, PeriodLength};

    /// Params with the limits used by the worked examples:
    /// 22 kWh capacity, 1 kWh reserve, grid-charge ceiling at 20 kWh.
    pub fn test_params() -> Params {
        Params::new(
            Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap(),
            22000,
            1000,
            20000,
            10000,
            Vec::new(),
            vec![
                ControlMode::Balancing,
                ControlMode::DelayDischarge,
                ControlMode::ChargeGrid,
            ],
            BTreeMap::new(),
        )
        .expect("valid test params")
    }

    pub fn test_period(production: i64, consumption: i64, price: f64) -> Period {
        Period {
            time: Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap(),
            length: PeriodLength::Quarter,
            ess_max_charge_energy: 5000,
            ess_max_discharge_energy: 5000,
            ess_charge_in_charge_grid: 2750,
            max_buy_from_grid: 4000,
            production,
            consumption,
            price,
            quarters: Vec::new(),
        }
    }
}
