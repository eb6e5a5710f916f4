use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::optimizer::search::SearchSettings;
use crate::optimizer::worker::WorkerSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub optimizer: OptimizerConfig,
    pub ess: EssConfig,
    pub forecast: ForecastConfig,
    pub prices: PricesConfig,
    pub grid: GridConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerConfig {
    pub allow_charge_grid: bool,
    pub retry_backoff_secs: u64,
    pub search_budget_cap_secs: u64,
    pub population_size: usize,
    pub tournament_size: usize,
}

impl OptimizerConfig {
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            allow_charge_grid: self.allow_charge_grid,
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
            search_budget_cap: Duration::from_secs(self.search_budget_cap_secs),
            search: SearchSettings {
                population_size: self.population_size,
                tournament_size: self.tournament_size,
            },
        }
    }
}

/// Simulated battery parameters; a deployment against real hardware replaces
/// the accessor, not this config.
#[derive(Debug, Clone, Deserialize)]
pub struct EssConfig {
    pub capacity_wh: i64,
    pub initial_soc_percent: i64,
    pub min_soc_percent: i64,
    pub max_charge_power_w: i64,
    pub max_discharge_power_w: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    pub peak_production_w: i64,
    pub base_consumption_w: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricesConfig {
    pub base_price: f64,
    pub amplitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    /// Contracted import limit [W]; absent means unconstrained.
    pub max_buy_power_w: Option<i64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("EDC__").split("__"));
        Ok(figment.extract()?)
    }
}
