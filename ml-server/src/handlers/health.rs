//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use cropdoc_core::constants;
use cropdoc_core::{HealthReport, HealthStatus};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct RootResponse {
    message: String,
    version: &'static str,
    status: &'static str,
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: format!("{} ML Server", constants::APP_NAME),
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

/// Health report; 503 while unhealthy so orchestrators can act on it
pub async fn check(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.service.health();
    let status = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (status, Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_reports_running() {
        let Json(body) = tokio_test::block_on(root());
        assert_eq!(body.status, "running");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }
}
