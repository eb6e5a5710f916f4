//! The dispatch optimizer worker: one long-lived loop that gathers inputs,
//! runs the schedule search against the quarter deadline and publishes the
//! merged result.
//!
//! The loop alternates between two phases. While inputs are unavailable it
//! keeps retrying with a fixed backoff and clears the published schedule, so
//! downstream dispatch falls back to plain balancing rather than acting on a
//! stale plan. Once params build, it optimizes until the deadline and sleeps
//! into the next quarter.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::domain::{
    power_to_quarter_energy, quarter_energy_to_power, round_down_to_quarter, ControlMode,
    Schedule,
};
use crate::history::{HistoricalRecord, TelemetryStore};
use crate::inputs::{EssAccessor, ForecastSource, GridLimitSource, PredictionChannel, PriceSource};
use crate::optimizer::params::{
    build_horizon, calculate_deadline, ess_charge_in_charge_grid, interpolate, pad_production,
    Params, QuarterLimits, ESS_MAX_SOC_PERCENT,
};
use crate::optimizer::schedule_log;
use crate::optimizer::search::{run_search, SearchSettings};
use crate::simulator::simulate_detailed;

/// Grid-buy energy per quarter [Wh] standing in for "no contracted limit".
const UNCONSTRAINED_GRID_BUY: i64 = 1_000_000_000;

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Whether CHARGE_GRID may be scheduled at all; some tariffs forbid it.
    pub allow_charge_grid: bool,
    /// Fixed backoff between input retries.
    pub retry_backoff: Duration,
    /// Upper bound on the search budget, independent of the quarter deadline.
    pub search_budget_cap: Duration,
    pub search: SearchSettings,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            allow_charge_grid: true,
            retry_backoff: Duration::from_secs(30),
            search_budget_cap: Duration::from_secs(15 * 60),
            search: SearchSettings::default(),
        }
    }
}

/// State shared with the query API. Held behind one mutex; every critical
/// section is O(schedule length).
#[derive(Debug, Default)]
pub struct SharedState {
    pub schedule: Schedule,
    /// Params of the last successful run; `None` until the first one.
    pub params: Option<Params>,
}

/// One published dispatch decision, as consumed by the downstream controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DispatchSetpoint {
    pub time: DateTime<Utc>,
    pub state: ControlMode,
    /// Scheduled ESS energy [Wh] for the quarter, positive on discharge.
    pub ess_charge_discharge: i64,
}

pub struct DispatchOptimizer {
    forecasts: Arc<dyn ForecastSource>,
    prices: Arc<dyn PriceSource>,
    ess: Arc<dyn EssAccessor>,
    grid_limit: Arc<dyn GridLimitSource>,
    telemetry: Arc<dyn TelemetryStore>,
    clock: Arc<dyn Clock>,
    settings: WorkerSettings,
    shared: Arc<Mutex<SharedState>>,
    setpoints: watch::Sender<Vec<DispatchSetpoint>>,
}

impl DispatchOptimizer {
    pub fn new(
        forecasts: Arc<dyn ForecastSource>,
        prices: Arc<dyn PriceSource>,
        ess: Arc<dyn EssAccessor>,
        grid_limit: Arc<dyn GridLimitSource>,
        telemetry: Arc<dyn TelemetryStore>,
        clock: Arc<dyn Clock>,
        settings: WorkerSettings,
    ) -> Self {
        let (setpoints, _) = watch::channel(Vec::new());
        Self {
            forecasts,
            prices,
            ess,
            grid_limit,
            telemetry,
            clock,
            settings,
            shared: Arc::new(Mutex::new(SharedState::default())),
            setpoints,
        }
    }

    /// Handle for the query API.
    pub fn shared(&self) -> Arc<Mutex<SharedState>> {
        Arc::clone(&self.shared)
    }

    /// Subscribes the downstream dispatch consumer to published setpoints.
    pub fn subscribe(&self) -> watch::Receiver<Vec<DispatchSetpoint>> {
        self.setpoints.subscribe()
    }

    pub async fn run(&self) {
        info!("dispatch optimizer started");
        loop {
            self.cycle().await;
        }
    }

    /// One pass of the loop: either a failed input attempt followed by the
    /// backoff, or a full optimization run followed by the sleep to the next
    /// deadline.
    pub async fn cycle(&self) {
        let params = match self.build_params().await {
            Ok(params) => params,
            Err(e) => {
                warn!(error = %e, "optimizer inputs unavailable, clearing schedule");
                {
                    let mut shared = self.shared.lock();
                    shared.schedule.clear();
                    shared.params = None;
                }
                let _ = self.setpoints.send(Vec::new());
                let retry_at = self.clock.now()
                    + TimeDelta::from_std(self.settings.retry_backoff)
                        .unwrap_or_else(|_| TimeDelta::seconds(30));
                self.clock.sleep_until(retry_at).await;
                return;
            }
        };

        let deadline = calculate_deadline(self.clock.now());
        if let Err(e) = self.optimize_until(params, deadline).await {
            // previous schedule stays published
            error!(error = %e, "optimization run failed");
        }
        self.clock.sleep_until(deadline).await;
    }

    async fn optimize_until(&self, params: Params, deadline: DateTime<Utc>) -> Result<()> {
        let budget = (deadline - self.clock.now())
            .to_std()
            .unwrap_or_default()
            .min(self.settings.search_budget_cap);

        let search_params = params.clone();
        let search_settings = self.settings.search;
        let best = tokio::task::spawn_blocking(move || {
            let mut rng = StdRng::from_entropy();
            run_search(&search_params, budget, search_settings, &mut rng)
        })
        .await
        .context("schedule search panicked")?;

        let entries = simulate_detailed(&params, &best);
        schedule_log::log_schedule(&params, &entries);

        let total = params.ess_total_energy;
        let now = self.clock.now();
        let (setpoints, active) = {
            let mut shared = self.shared.lock();
            shared.schedule.merge(now, entries);
            let setpoints: Vec<DispatchSetpoint> = shared
                .schedule
                .iter()
                .map(|(time, entry)| DispatchSetpoint {
                    time: *time,
                    state: entry.state,
                    ess_charge_discharge: entry.flow.ess,
                })
                .collect();
            let active = shared.schedule.get(round_down_to_quarter(now)).copied();
            shared.params = Some(params);
            (setpoints, active)
        };
        let _ = self.setpoints.send(setpoints);

        if let Some(entry) = active {
            self.telemetry.record(HistoricalRecord {
                time: entry.time,
                soc_percent: (total > 0).then(|| entry.ess_initial * 100 / total),
                production_w: Some(quarter_energy_to_power(entry.flow.production)),
                consumption_w: Some(quarter_energy_to_power(entry.flow.consumption)),
                state: Some(entry.state),
                price: Some(entry.price),
                ess_power_w: Some(quarter_energy_to_power(entry.flow.ess)),
                grid_power_w: Some(quarter_energy_to_power(entry.flow.grid)),
            });
        }
        Ok(())
    }

    /// Gathers all collaborator inputs into [`Params`]. Any unavailable input
    /// fails the whole attempt.
    async fn build_params(&self) -> Result<Params> {
        let status = self.ess.status().await.context("ESS status unavailable")?;
        let production = interpolate(
            &self
                .forecasts
                .get_prediction(PredictionChannel::Production)
                .await
                .context("production prediction unavailable")?,
        );
        let consumption = interpolate(
            &self
                .forecasts
                .get_prediction(PredictionChannel::Consumption)
                .await
                .context("consumption prediction unavailable")?,
        );
        let prices = interpolate(
            &self
                .prices
                .get_prices()
                .await
                .context("day-ahead prices unavailable")?,
        );
        let max_buy_power = self
            .grid_limit
            .max_buy_power_w()
            .await
            .context("grid limit unavailable")?;

        ensure!(!consumption.is_empty(), "consumption prediction is empty");
        ensure!(!prices.is_empty(), "day-ahead prices are empty");

        let production = pad_production(production, consumption.len());
        let total = status.capacity_wh;
        let limits = QuarterLimits {
            ess_max_charge_energy: power_to_quarter_energy(status.max_charge_power_w),
            ess_max_discharge_energy: power_to_quarter_energy(status.max_discharge_power_w),
            ess_charge_in_charge_grid: ess_charge_in_charge_grid(total),
            max_buy_from_grid: max_buy_power
                .map(power_to_quarter_energy)
                .unwrap_or(UNCONSTRAINED_GRID_BUY),
        };

        let start = round_down_to_quarter(self.clock.now());
        let periods = build_horizon(start, &production, &consumption, &prices, limits);
        let states = if self.settings.allow_charge_grid {
            vec![
                ControlMode::Balancing,
                ControlMode::DelayDischarge,
                ControlMode::ChargeGrid,
            ]
        } else {
            vec![ControlMode::Balancing, ControlMode::DelayDischarge]
        };
        let existing_schedule = self.shared.lock().schedule.states();

        Params::new(
            start,
            total,
            total * status.min_soc_percent() / 100,
            total * ESS_MAX_SOC_PERCENT / 100,
            total * status.soc_percent / 100,
            periods,
            states,
            existing_schedule,
        )
    }
}
