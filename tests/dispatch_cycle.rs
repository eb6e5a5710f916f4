//! End-to-end dispatch cycles against simulated inputs and simulated time.
//! No wall-clock sleeps; the only real time spent is the capped search
//! budget.
#![cfg(feature = "sim")]

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Json, State};
use axum::response::IntoResponse;
use chrono::{TimeDelta, TimeZone, Utc};
use energy_dispatch_controller::api::schedule::{query_schedule, ScheduleQueryRequest};
use energy_dispatch_controller::api::{health::health_check, AppState};
use energy_dispatch_controller::clock::{Clock, SimulatedClock};
use energy_dispatch_controller::history::MemoryTelemetryStore;
use energy_dispatch_controller::inputs::sim::{
    SimulatedEss, SimulatedForecast, SimulatedPrices, StaticGridLimit,
};
use energy_dispatch_controller::inputs::EssStatus;
use energy_dispatch_controller::optimizer::{DispatchOptimizer, WorkerSettings};

const CAPACITY_WH: i64 = 22000;

struct World {
    optimizer: DispatchOptimizer,
    clock: Arc<SimulatedClock>,
    telemetry: Arc<MemoryTelemetryStore>,
}

fn world() -> World {
    let clock = Arc::new(SimulatedClock::starting_at(
        Utc.with_ymd_and_hms(2026, 8, 25, 12, 2, 0).unwrap(),
    ));
    let telemetry = Arc::new(MemoryTelemetryStore::default());
    let optimizer = DispatchOptimizer::new(
        Arc::new(SimulatedForecast::new(clock.clone(), 5000, 600)),
        Arc::new(SimulatedPrices::new(clock.clone(), 100.0, 40.0)),
        Arc::new(SimulatedEss::new(EssStatus {
            capacity_wh: CAPACITY_WH,
            soc_percent: 45,
            min_soc_reserves_percent: vec![5],
            max_charge_power_w: 10000,
            max_discharge_power_w: 10000,
        })),
        Arc::new(StaticGridLimit(None)),
        telemetry.clone(),
        clock.clone(),
        WorkerSettings {
            search_budget_cap: Duration::from_millis(50),
            ..WorkerSettings::default()
        },
    );
    World {
        optimizer,
        clock,
        telemetry,
    }
}

#[tokio::test]
async fn test_cycle_publishes_quarter_aligned_horizon() {
    let world = world();
    world.optimizer.cycle().await;

    let shared = world.optimizer.shared();
    let shared = shared.lock();
    // 24h of forecast at quarter resolution
    assert_eq!(shared.schedule.len(), 96);

    let start = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();
    let mut expected = start;
    for (time, entry) in shared.schedule.iter() {
        assert_eq!(*time, expected);
        assert!(entry.ess_initial >= 0 && entry.ess_initial <= CAPACITY_WH);
        expected += TimeDelta::minutes(15);
    }
}

#[tokio::test]
async fn test_reoptimization_preserves_active_quarter() {
    let world = world();
    world.optimizer.cycle().await;

    let active_quarter = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();
    let before = *world
        .optimizer
        .shared()
        .lock()
        .schedule
        .get(active_quarter)
        .unwrap();

    // the first cycle slept to 12:14:30; the second run lands in the same
    // quarter and must not change its decision
    assert!(world.clock.now() < active_quarter + TimeDelta::minutes(15));
    world.optimizer.cycle().await;

    let after = *world
        .optimizer
        .shared()
        .lock()
        .schedule
        .get(active_quarter)
        .unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_setpoints_follow_the_published_schedule() {
    let world = world();
    let mut receiver = world.optimizer.subscribe();
    assert!(receiver.borrow().is_empty());

    world.optimizer.cycle().await;

    let setpoints = receiver.borrow_and_update().clone();
    assert_eq!(setpoints.len(), 96);
    let shared = world.optimizer.shared();
    let shared = shared.lock();
    for setpoint in &setpoints {
        let entry = shared.schedule.get(setpoint.time).unwrap();
        assert_eq!(setpoint.state, entry.state);
        assert_eq!(setpoint.ess_charge_discharge, entry.flow.ess);
    }
}

#[tokio::test]
async fn test_schedule_query_covers_past_and_future() {
    let world = world();
    world.optimizer.cycle().await;

    let state = AppState {
        shared: world.optimizer.shared(),
        telemetry: world.telemetry.clone(),
        clock: world.clock.clone(),
    };

    let start = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();
    let request = ScheduleQueryRequest {
        request_id: uuid::Uuid::new_v4(),
        from: start - TimeDelta::minutes(30),
        to: start + TimeDelta::hours(1),
    };
    let request_id = request.request_id;
    let response = query_schedule(State(state), Json(request)).await.unwrap();
    let data = response.0.data.unwrap();

    assert_eq!(data.request_id, request_id);
    assert_eq!(data.entries.len(), 6);
    // nothing was recorded before the first cycle
    assert!(data.entries[0].state.is_none());
    assert!(data.entries[1].state.is_none());
    // planned quarters carry full rows
    for row in &data.entries[2..] {
        assert!(row.state.is_some());
        assert!(row.soc.is_some());
        assert!(row.price.is_some());
    }
}

#[tokio::test]
async fn test_query_rejects_inverted_window() {
    let world = world();
    let state = AppState {
        shared: world.optimizer.shared(),
        telemetry: world.telemetry.clone(),
        clock: world.clock.clone(),
    };
    let t = world.clock.now();
    let request = ScheduleQueryRequest {
        request_id: uuid::Uuid::new_v4(),
        from: t,
        to: t - TimeDelta::minutes(15),
    };
    assert!(query_schedule(State(state), Json(request)).await.is_err());
}

#[tokio::test]
async fn test_health_reflects_published_schedule() {
    let world = world();
    let state = AppState {
        shared: world.optimizer.shared(),
        telemetry: world.telemetry.clone(),
        clock: world.clock.clone(),
    };

    let response = health_check(State(state.clone())).await.into_response();
    assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);

    world.optimizer.cycle().await;
    let response = health_check(State(state)).await.into_response();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}
