use axum::{extract::State, routing::{get, post}, Json, Router};

use crate::{
    auth::CustomerPrincipal,
    entities::customer::CustomerView,
    errors::ServiceError,
    services::{
        admins::{AdminLoginRequest, AdminLoginResponse},
        customers::{CustomerLoginRequest, CustomerLoginResponse},
    },
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/customer/login", post(customer_login))
        .route("/auth/admin/login", post(admin_login))
        .route("/auth/customer/profile", get(customer_profile))
}

pub async fn customer_login(
    State(state): State<AppState>,
    Json(payload): Json<CustomerLoginRequest>,
) -> ApiResult<CustomerLoginResponse> {
    let response = state.services.customers.login(payload).await?;
    Ok(Json(ApiResponse::success(response)))
}

pub async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLoginRequest>,
) -> ApiResult<AdminLoginResponse> {
    let response = state.services.admins.login(payload).await?;
    Ok(Json(ApiResponse::success(response)))
}

pub async fn customer_profile(
    CustomerPrincipal(customer): CustomerPrincipal,
) -> Result<Json<ApiResponse<CustomerView>>, ServiceError> {
    Ok(Json(ApiResponse::success(customer.into())))
}
