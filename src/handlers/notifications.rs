use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::LimitQuery;
use crate::{
    auth::{AdminPrincipal, AnyPrincipal, CustomerPrincipal},
    entities::notification::Model as NotificationModel,
    models::NotificationRecipient,
    ApiResponse, ApiResult, AppState,
};

/// Mounted under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications/admin", get(admin_inbox))
        .route("/notifications/admin/unread-count", get(admin_unread_count))
        .route("/notifications/admin/mark-all-read", put(admin_mark_all_read))
        .route("/notifications/customer", get(customer_inbox))
        .route(
            "/notifications/customer/unread-count",
            get(customer_unread_count),
        )
        .route(
            "/notifications/customer/mark-all-read",
            put(customer_mark_all_read),
        )
        .route("/notifications/:id/read", put(mark_read))
}

pub async fn admin_inbox(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<NotificationModel>> {
    let inbox = state.services.notifications.admin_inbox(query.limit).await?;
    Ok(Json(ApiResponse::success(inbox)))
}

pub async fn admin_unread_count(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
) -> ApiResult<Value> {
    let count = state
        .services
        .notifications
        .unread_count(NotificationRecipient::Admin, None)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "count": count }))))
}

pub async fn admin_mark_all_read(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
) -> ApiResult<Value> {
    let updated = state
        .services
        .notifications
        .mark_all_read(NotificationRecipient::Admin, None)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "updated": updated }))))
}

pub async fn customer_inbox(
    State(state): State<AppState>,
    CustomerPrincipal(customer): CustomerPrincipal,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<NotificationModel>> {
    let inbox = state
        .services
        .notifications
        .customer_inbox(customer.id, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(inbox)))
}

pub async fn customer_unread_count(
    State(state): State<AppState>,
    CustomerPrincipal(customer): CustomerPrincipal,
) -> ApiResult<Value> {
    let count = state
        .services
        .notifications
        .unread_count(NotificationRecipient::Customer, Some(customer.id))
        .await?;
    Ok(Json(ApiResponse::success(json!({ "count": count }))))
}

pub async fn customer_mark_all_read(
    State(state): State<AppState>,
    CustomerPrincipal(customer): CustomerPrincipal,
) -> ApiResult<Value> {
    let updated = state
        .services
        .notifications
        .mark_all_read(NotificationRecipient::Customer, Some(customer.id))
        .await?;
    Ok(Json(ApiResponse::success(json!({ "updated": updated }))))
}

pub async fn mark_read(
    State(state): State<AppState>,
    principal: AnyPrincipal,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let scope = match principal {
        AnyPrincipal::Customer(customer) => Some(customer.id),
        AnyPrincipal::Admin(_) => None,
    };
    state.services.notifications.mark_read(id, scope).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id, "is_read": true }))))
}
