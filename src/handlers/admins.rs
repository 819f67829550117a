use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    auth::AdminPrincipal,
    entities::admin::AdminView,
    errors::ServiceError,
    services::{
        admins::{CreateAdminRequest, UpdateAdminRequest},
        customers::PushTokenRequest,
    },
    ApiResponse, ApiResult, AppState,
};

/// Mounted under `/api/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admins", post(create_admin))
        .route("/admins/:id", put(update_admin))
        .route("/push-token", post(register_push_token))
}

pub async fn create_admin(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
    Json(payload): Json<CreateAdminRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let admin = state.services.admins.create_admin(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(admin))))
}

pub async fn update_admin(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAdminRequest>,
) -> ApiResult<AdminView> {
    let admin = state.services.admins.update_admin(id, payload).await?;
    Ok(Json(ApiResponse::success(admin)))
}

pub async fn register_push_token(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    Json(payload): Json<PushTokenRequest>,
) -> ApiResult<Value> {
    state
        .services
        .admins
        .register_push_token(admin.id, &payload.token)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "registered": true }))))
}
