use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::{db, ApiResponse, AppState};

/// Liveness plus a database ping. A failed ping answers 503.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };
    let healthy = database == "healthy";
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "checks": { "database": database },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    (status, Json(ApiResponse::success(body)))
}
