use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    auth::{AdminPrincipal, CustomerPrincipal},
    entities::customer::CustomerView,
    errors::ServiceError,
    models::CustomerStatus,
    services::customers::{
        ChangePasswordRequest, CreateCustomerRequest, PushTokenRequest, UpdateCustomerRequest,
    },
    ApiResponse, ApiResult, AppState,
};

/// Customer account management, mounted under `/api/admin`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/customers", post(create_customer).get(list_customers))
        .route(
            "/customers/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/customers/:id/password", put(change_password))
}

/// Routes a signed-in customer calls for their own account, mounted under `/api`.
pub fn customer_routes() -> Router<AppState> {
    Router::new().route("/customers/push-token", post(register_push_token))
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerListQuery {
    pub status: Option<CustomerStatus>,
}

pub async fn create_customer(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer = state
        .services
        .customers
        .create_customer(payload, Some(admin.id))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(customer))))
}

pub async fn list_customers(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
    Query(query): Query<CustomerListQuery>,
) -> ApiResult<Vec<CustomerView>> {
    let customers = state.services.customers.list(query.status).await?;
    Ok(Json(ApiResponse::success(customers)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
) -> ApiResult<CustomerView> {
    let customer = state.services.customers.get(id).await?;
    Ok(Json(ApiResponse::success(customer)))
}

pub async fn update_customer(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> ApiResult<CustomerView> {
    let customer = state.services.customers.update_customer(id, payload).await?;
    Ok(Json(ApiResponse::success(customer)))
}

pub async fn change_password(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<Value> {
    state.services.customers.change_password(id, payload).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id }))))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let deleted_orders = state.services.customers.delete_customer(id).await?;
    Ok(Json(ApiResponse::success(json!({
        "id": id,
        "deleted_orders": deleted_orders,
    }))))
}

pub async fn register_push_token(
    State(state): State<AppState>,
    CustomerPrincipal(customer): CustomerPrincipal,
    Json(payload): Json<PushTokenRequest>,
) -> ApiResult<Value> {
    state
        .services
        .customers
        .register_push_token(customer.id, &payload.token)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "registered": true }))))
}
