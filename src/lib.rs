//! Day-ahead dispatch scheduling for a battery storage system against
//! time-of-use tariffs.
//!
//! The optimizer assigns one control mode per 15-minute slot over the
//! forecast horizon, searching for the cheapest schedule under the battery's
//! physical limits, and publishes it for the downstream dispatch controller
//! and the query API.

pub mod api;
pub mod clock;
pub mod config;
pub mod domain;
pub mod energy_flow;
pub mod history;
pub mod inputs;
pub mod optimizer;
pub mod simulator;
pub mod telemetry;
