//! Health endpoint exposing the shared cache connection state.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::connection::ConnectionState;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub cache: ConnectionState,
}

pub async fn get_health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let manager = &state.services.manager;
    let healthy = manager.health_check().await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthReport {
            status: if healthy { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            cache: manager.state(),
        }),
    )
}
