//! Self-contained input sources for demo and test runs. Profiles are shaped
//! like a typical residential PV household so the optimizer has something to
//! arbitrage against.

use std::f64::consts::PI;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Timelike;

use crate::clock::Clock;
use crate::domain::{power_to_quarter_energy, QUARTERS_PER_HOUR};
use crate::inputs::{
    EssAccessor, EssStatus, ForecastSource, GridLimitSource, PredictionChannel, PriceSource,
};

const HORIZON_QUARTERS: usize = 96;

/// Quarter-of-day of a source's clock, used to phase the daily profiles.
fn quarter_of_day(clock: &dyn Clock) -> usize {
    let now = clock.now();
    (now.hour() as usize * QUARTERS_PER_HOUR as usize) + now.minute() as usize / 15
}

/// Sine-bell PV production around midday plus a flat morning/evening
/// consumption base with an evening bump.
pub struct SimulatedForecast {
    clock: Arc<dyn Clock>,
    pub peak_production_w: i64,
    pub base_consumption_w: i64,
}

impl SimulatedForecast {
    pub fn new(clock: Arc<dyn Clock>, peak_production_w: i64, base_consumption_w: i64) -> Self {
        Self {
            clock,
            peak_production_w,
            base_consumption_w,
        }
    }

    fn production_at(&self, quarter_of_day: usize) -> i64 {
        let hour = quarter_of_day as f64 / QUARTERS_PER_HOUR as f64;
        if !(6.0..20.0).contains(&hour) {
            return 0;
        }
        let bell = ((hour - 6.0) / 14.0 * PI).sin();
        (self.peak_production_w as f64 * bell) as i64
    }

    fn consumption_at(&self, quarter_of_day: usize) -> i64 {
        let hour = quarter_of_day / QUARTERS_PER_HOUR as usize;
        let factor = match hour {
            0..=5 => 0.6,
            6..=8 | 17..=21 => 1.8,
            _ => 1.0,
        };
        (self.base_consumption_w as f64 * factor) as i64
    }
}

#[async_trait]
impl ForecastSource for SimulatedForecast {
    async fn get_prediction(&self, channel: PredictionChannel) -> Result<Vec<Option<i64>>> {
        let offset = quarter_of_day(self.clock.as_ref());
        Ok((0..HORIZON_QUARTERS)
            .map(|i| {
                let q = (offset + i) % HORIZON_QUARTERS;
                let power = match channel {
                    PredictionChannel::Production => self.production_at(q),
                    PredictionChannel::Consumption => self.consumption_at(q),
                };
                Some(power_to_quarter_energy(power))
            })
            .collect())
    }
}

/// Day-ahead prices with a midday valley and an evening peak.
pub struct SimulatedPrices {
    clock: Arc<dyn Clock>,
    pub base_price: f64,
    pub amplitude: f64,
}

impl SimulatedPrices {
    pub fn new(clock: Arc<dyn Clock>, base_price: f64, amplitude: f64) -> Self {
        Self {
            clock,
            base_price,
            amplitude,
        }
    }

    fn price_at(&self, quarter_of_day: usize) -> f64 {
        let hour = quarter_of_day as f64 / QUARTERS_PER_HOUR as f64;
        // cheapest around 13:00, most expensive around 19:00
        let shape = -(2.0 * PI * (hour - 1.0) / 24.0).cos() + 0.5 * (4.0 * PI * hour / 24.0).cos();
        self.base_price + self.amplitude * shape
    }
}

#[async_trait]
impl PriceSource for SimulatedPrices {
    async fn get_prices(&self) -> Result<Vec<Option<f64>>> {
        let offset = quarter_of_day(self.clock.as_ref());
        Ok((0..HORIZON_QUARTERS)
            .map(|i| Some(self.price_at((offset + i) % HORIZON_QUARTERS)))
            .collect())
    }
}

/// A battery with a fixed reported status.
pub struct SimulatedEss {
    status: parking_lot::Mutex<EssStatus>,
}

impl SimulatedEss {
    pub fn new(status: EssStatus) -> Self {
        Self {
            status: parking_lot::Mutex::new(status),
        }
    }

    pub fn set_soc(&self, soc_percent: i64) {
        self.status.lock().soc_percent = soc_percent;
    }
}

#[async_trait]
impl EssAccessor for SimulatedEss {
    async fn status(&self) -> Result<EssStatus> {
        Ok(self.status.lock().clone())
    }
}

/// A fixed grid connection limit, `None` for unconstrained.
pub struct StaticGridLimit(pub Option<i64>);

#[async_trait]
impl GridLimitSource for StaticGridLimit {
    async fn max_buy_power_w(&self) -> Result<Option<i64>> {
        Ok(self.0)
    }
}
