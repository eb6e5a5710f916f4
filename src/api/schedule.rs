use axum::{extract::State, Json};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{error::ApiError, response::ApiResponse, AppState},
    domain::{quarter_energy_to_power, round_down_to_quarter, ControlMode, Schedule},
    history::TelemetryStore,
    optimizer::worker::SharedState,
};

const MAX_QUERY_DAYS: i64 = 7;

/// Request for a schedule window
#[derive(Debug, Deserialize)]
pub struct ScheduleQueryRequest {
    pub request_id: Uuid,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Schedule query response: one row per quarter slot in the window
#[derive(Debug, Serialize)]
pub struct ScheduleQueryResponse {
    pub request_id: Uuid,
    pub entries: Vec<ScheduleQueryRow>,
}

/// One quarter slot. Values the system does not know are explicit nulls, so
/// consumers can distinguish "no data" from zero.
#[derive(Debug, Serialize, PartialEq)]
pub struct ScheduleQueryRow {
    pub timestamp: DateTime<Utc>,
    /// State of charge [%]
    pub soc: Option<i64>,
    /// Production power [W]
    pub production: Option<i64>,
    /// Consumption power [W]
    pub consumption: Option<i64>,
    pub state: Option<ControlMode>,
    /// Price [currency/MWh]
    pub price: Option<f64>,
    /// ESS power [W], positive on discharge
    pub ess: Option<i64>,
    /// Grid power [W], positive on import
    pub grid: Option<i64>,
}

impl ScheduleQueryRow {
    fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            soc: None,
            production: None,
            consumption: None,
            state: None,
            price: None,
            ess: None,
            grid: None,
        }
    }
}

/// POST /api/v1/schedule/query - Past and planned dispatch for a time window
pub async fn query_schedule(
    State(state): State<AppState>,
    Json(request): Json<ScheduleQueryRequest>,
) -> Result<Json<ApiResponse<ScheduleQueryResponse>>, ApiError> {
    if request.to <= request.from {
        return Err(ApiError::BadRequest(
            "window end must be after window start".to_string(),
        ));
    }
    if request.to - request.from > TimeDelta::days(MAX_QUERY_DAYS) {
        return Err(ApiError::BadRequest(format!(
            "window longer than {MAX_QUERY_DAYS} days"
        )));
    }

    let now = state.clock.now();
    let entries = {
        let shared = state.shared.lock();
        build_rows(
            now,
            request.from,
            request.to,
            &shared,
            state.telemetry.as_ref(),
        )
    };

    Ok(Json(ApiResponse::success(ScheduleQueryResponse {
        request_id: request.request_id,
        entries,
    })))
}

/// Assembles the window: recorded telemetry for past quarters, the published
/// schedule for the active quarter onwards, nulls where neither knows.
fn build_rows(
    now: DateTime<Utc>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    shared: &SharedState,
    telemetry: &dyn TelemetryStore,
) -> Vec<ScheduleQueryRow> {
    let this_quarter = round_down_to_quarter(now);
    let total = shared.params.as_ref().map_or(0, |p| p.ess_total_energy);
    let history: std::collections::BTreeMap<_, _> = telemetry
        .query(from, to)
        .into_iter()
        .map(|r| (r.time, r))
        .collect();

    let mut rows = Vec::new();
    let mut slot = round_down_to_quarter(from);
    while slot < to {
        let row = if slot < this_quarter {
            match history.get(&slot) {
                Some(r) => ScheduleQueryRow {
                    timestamp: slot,
                    soc: r.soc_percent,
                    production: r.production_w,
                    consumption: r.consumption_w,
                    state: r.state,
                    price: r.price,
                    ess: r.ess_power_w,
                    grid: r.grid_power_w,
                },
                None => ScheduleQueryRow::empty(slot),
            }
        } else {
            match shared.schedule.get(slot) {
                Some(entry) => ScheduleQueryRow {
                    timestamp: slot,
                    soc: (total > 0).then(|| entry.ess_initial * 100 / total),
                    production: Some(quarter_energy_to_power(entry.flow.production)),
                    consumption: Some(quarter_energy_to_power(entry.flow.consumption)),
                    state: Some(entry.state),
                    price: Some(entry.price),
                    ess: Some(quarter_energy_to_power(entry.flow.ess)),
                    grid: Some(quarter_energy_to_power(entry.flow.grid)),
                },
                None => ScheduleQueryRow::empty(slot),
            }
        };
        rows.push(row);
        slot += TimeDelta::minutes(15);
    }
    rows
}

/// Published setpoint view of one quarter
#[derive(Debug, Serialize)]
pub struct CurrentScheduleRow {
    pub timestamp: DateTime<Utc>,
    pub state: ControlMode,
    /// Scheduled ESS energy [Wh] for the quarter, positive on discharge
    pub ess_charge_discharge: i64,
    pub price: f64,
}

/// GET /api/v1/schedule/current - The currently published schedule
pub async fn get_current_schedule(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CurrentScheduleRow>>>, ApiError> {
    let shared = state.shared.lock();
    let rows = schedule_rows(&shared.schedule);
    Ok(Json(ApiResponse::success(rows)))
}

fn schedule_rows(schedule: &Schedule) -> Vec<CurrentScheduleRow> {
    schedule
        .iter()
        .map(|(time, entry)| CurrentScheduleRow {
            timestamp: *time,
            state: entry.state,
            ess_charge_discharge: entry.flow.ess,
            price: entry.price,
        })
        .collect()
}
