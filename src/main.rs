use std::sync::Arc;

use anyhow::Result;
use energy_dispatch_controller::{
    api, clock::SystemClock, config::Config, history::MemoryTelemetryStore,
    optimizer::DispatchOptimizer, telemetry,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let cfg = Config::load()?;
    let clock = Arc::new(SystemClock);
    let telemetry_store = Arc::new(MemoryTelemetryStore::default());

    let optimizer = Arc::new(build_optimizer(&cfg, clock.clone(), telemetry_store.clone())?);

    let app_state = api::AppState {
        shared: optimizer.shared(),
        telemetry: telemetry_store,
        clock,
    };
    let app = api::router(app_state, &cfg);

    let addr = cfg.server.socket_addr()?;
    if cfg.server.host == "0.0.0.0" {
        warn!("server binding to 0.0.0.0 - service will be accessible from the network");
    }
    info!(%addr, "starting energy dispatch controller");

    let worker = optimizer.clone();
    tokio::spawn(async move { worker.run().await });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}

#[cfg(feature = "sim")]
fn build_optimizer(
    cfg: &Config,
    clock: Arc<SystemClock>,
    telemetry_store: Arc<MemoryTelemetryStore>,
) -> Result<DispatchOptimizer> {
    use energy_dispatch_controller::inputs::sim::{
        SimulatedEss, SimulatedForecast, SimulatedPrices, StaticGridLimit,
    };
    use energy_dispatch_controller::inputs::EssStatus;

    let ess = SimulatedEss::new(EssStatus {
        capacity_wh: cfg.ess.capacity_wh,
        soc_percent: cfg.ess.initial_soc_percent,
        min_soc_reserves_percent: vec![cfg.ess.min_soc_percent],
        max_charge_power_w: cfg.ess.max_charge_power_w,
        max_discharge_power_w: cfg.ess.max_discharge_power_w,
    });

    Ok(DispatchOptimizer::new(
        Arc::new(SimulatedForecast::new(
            clock.clone(),
            cfg.forecast.peak_production_w,
            cfg.forecast.base_consumption_w,
        )),
        Arc::new(SimulatedPrices::new(
            clock.clone(),
            cfg.prices.base_price,
            cfg.prices.amplitude,
        )),
        Arc::new(ess),
        Arc::new(StaticGridLimit(cfg.grid.max_buy_power_w)),
        telemetry_store,
        clock,
        cfg.optimizer.worker_settings(),
    ))
}

#[cfg(not(feature = "sim"))]
fn build_optimizer(
    _cfg: &Config,
    _clock: Arc<SystemClock>,
    _telemetry_store: Arc<MemoryTelemetryStore>,
) -> Result<DispatchOptimizer> {
    anyhow::bail!("no input sources configured; build with the 'sim' feature")
}
