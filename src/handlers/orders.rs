use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::{AdminPrincipal, CustomerPrincipal},
    entities::order::Model as OrderModel,
    errors::ServiceError,
    models::{MainArea, OrderStatus},
    services::orders::{CreateOrderRequest, OrderFilter, UpdateOrderStatusRequest},
    ApiResponse, ApiResult, AppState,
};

/// Customer-facing order routes, mounted under `/api`.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/my-orders", get(my_orders))
        .route("/orders/:id", get(get_my_order))
        .route("/orders/:id/cancel", post(cancel_order))
}

/// Admin order routes, mounted under `/api/admin`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", put(update_order_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub area: Option<MainArea>,
    pub limit: Option<u64>,
}

impl OrderListQuery {
    fn status(&self) -> Result<Option<OrderStatus>, ServiceError> {
        self.status.as_deref().map(OrderStatus::parse).transpose()
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    CustomerPrincipal(customer): CustomerPrincipal,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.create_order(&customer, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

pub async fn my_orders(
    State(state): State<AppState>,
    CustomerPrincipal(customer): CustomerPrincipal,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<Vec<OrderModel>> {
    let orders = state
        .services
        .orders
        .list_customer_orders(customer.id, query.status()?)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn get_my_order(
    State(state): State<AppState>,
    CustomerPrincipal(customer): CustomerPrincipal,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderModel> {
    let order = state
        .services
        .orders
        .get_customer_order(customer.id, id)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    CustomerPrincipal(customer): CustomerPrincipal,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderModel> {
    let order = state
        .services
        .orders
        .cancel_by_customer(id, customer.id)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<Vec<OrderModel>> {
    let filter = OrderFilter {
        status: query.status()?,
        area: query.area,
        limit: query.limit,
    };
    let orders = state.services.orders.list_orders(filter).await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn get_order(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderModel> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> ApiResult<OrderModel> {
    tracing::debug!(admin_id = %admin.admin_id, order_id = %id, status = %payload.status, "Status update requested");
    let order = state.services.orders.update_status(id, &payload.status).await?;
    Ok(Json(ApiResponse::success(order)))
}
