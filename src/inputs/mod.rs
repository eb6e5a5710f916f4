//! Collaborator interfaces the optimizer pulls its inputs from.
//!
//! Forecast series are quarter-indexed energies [Wh] starting at "now";
//! device accessors report instantaneous power [W]. Missing values stay
//! `None` and are interpolated by the caller. Implementations wrap real
//! devices and upstream services; the `sim` feature provides self-contained
//! stand-ins.

#[cfg(feature = "sim")]
pub mod sim;

use anyhow::Result;
use async_trait::async_trait;

/// Forecast channel of a [`ForecastSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionChannel {
    /// PV production.
    Production,
    /// Household consumption.
    Consumption,
}

#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Quarter-resolution energy prediction [Wh per quarter], indexed from
    /// the current quarter. Gaps are `None`.
    async fn get_prediction(&self, channel: PredictionChannel) -> Result<Vec<Option<i64>>>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Quarter-resolution day-ahead prices [currency/MWh], indexed from the
    /// current quarter. Quarters without a published price are `None`.
    async fn get_prices(&self) -> Result<Vec<Option<f64>>>;
}

/// Snapshot of the battery as reported by its accessor.
#[derive(Debug, Clone)]
pub struct EssStatus {
    /// Usable capacity [Wh].
    pub capacity_wh: i64,
    /// Current state of charge [%].
    pub soc_percent: i64,
    /// Reserve requests [%] from other controllers; the strictest one wins.
    pub min_soc_reserves_percent: Vec<i64>,
    /// Hardware charge limit [W].
    pub max_charge_power_w: i64,
    /// Hardware discharge limit [W].
    pub max_discharge_power_w: i64,
}

impl EssStatus {
    /// The effective minimum SoC [%]: the maximum of all reserve requests,
    /// zero when nobody reserves anything.
    pub fn min_soc_percent(&self) -> i64 {
        self.min_soc_reserves_percent.iter().copied().max().unwrap_or(0)
    }
}

#[async_trait]
pub trait EssAccessor: Send + Sync {
    async fn status(&self) -> Result<EssStatus>;
}

#[async_trait]
pub trait GridLimitSource: Send + Sync {
    /// Contracted grid import limit [W]; `None` means unconstrained.
    async fn max_buy_power_w(&self) -> Result<Option<i64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictest_reserve_wins() {
        let mut status = EssStatus {
            capacity_wh: 22000,
            soc_percent: 50,
            min_soc_reserves_percent: vec![5, 20, 10],
            max_charge_power_w: 10000,
            max_discharge_power_w: 10000,
        };
        assert_eq!(status.min_soc_percent(), 20);

        status.min_soc_reserves_percent.clear();
        assert_eq!(status.min_soc_percent(), 0);
    }
}
