use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::api::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    optimizer: ComponentHealth,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl ComponentHealth {
    fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            detail: None,
        }
    }

    fn degraded(detail: String) -> Self {
        Self {
            status: "degraded".to_string(),
            detail: Some(detail),
        }
    }
}

/// GET /health - Health check endpoint
///
/// Degraded while no schedule has been published, which covers both startup
/// and the input-retry phase.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let optimizer = {
        let shared = state.shared.lock();
        if shared.schedule.is_empty() {
            ComponentHealth::degraded("no schedule published".to_string())
        } else {
            ComponentHealth::healthy()
        }
    };

    let all_healthy = optimizer.status == "healthy";
    let response = HealthResponse {
        status: if all_healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        timestamp: chrono::Utc::now(),
        checks: HealthChecks { optimizer },
    };

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response))
}

/// GET /health/live - Liveness probe
pub async fn liveness_check() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_health_states() {
        let health = ComponentHealth::healthy();
        assert_eq!(health.status, "healthy");
        assert!(health.detail.is_none());

        let health = ComponentHealth::degraded("no schedule published".to_string());
        assert_eq!(health.status, "degraded");
        assert!(health.detail.is_some());
    }
}
