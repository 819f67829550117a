use super::{AuthError, Claims};
use crate::{
    entities::{admin, customer},
    errors::ServiceError,
    models::{CustomerStatus, UserType},
    AppState,
};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

fn claims_for(parts: &Parts, state: &AppState, expected: UserType) -> Result<Claims, ServiceError> {
    let claims = state.services.auth.decode_token(bearer_token(parts)?)?;
    if claims.user_type != expected {
        debug!(expected = %expected, got = %claims.user_type, "Token issued to another principal kind");
        return Err(ServiceError::Forbidden(format!("{} access required", expected)));
    }
    Ok(claims)
}

/// Active customer resolved from the bearer token.
#[derive(Debug, Clone)]
pub struct CustomerPrincipal(pub customer::Model);

#[axum::async_trait]
impl FromRequestParts<AppState> for CustomerPrincipal {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = claims_for(parts, state, UserType::Customer)?;
        resolve_customer(&claims, state).await.map(CustomerPrincipal)
    }
}

async fn resolve_customer(claims: &Claims, state: &AppState) -> Result<customer::Model, ServiceError> {
    let customer = state
        .services
        .customers
        .find(claims.subject_id()?)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("account no longer exists".into()))?;

    if customer.status != CustomerStatus::Active {
        return Err(ServiceError::Forbidden(format!(
            "account is {}",
            customer.status
        )));
    }
    Ok(customer)
}

/// Active admin resolved from the bearer token.
#[derive(Debug, Clone)]
pub struct AdminPrincipal(pub admin::Model);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminPrincipal {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = claims_for(parts, state, UserType::Admin)?;
        resolve_admin(&claims, state).await.map(AdminPrincipal)
    }
}

async fn resolve_admin(claims: &Claims, state: &AppState) -> Result<admin::Model, ServiceError> {
    let admin = state
        .services
        .admins
        .find(claims.subject_id()?)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("account no longer exists".into()))?;

    if !admin.is_active {
        return Err(ServiceError::Forbidden("admin account is disabled".into()));
    }
    Ok(admin)
}

/// Either kind of principal, for routes both audiences share.
#[derive(Debug, Clone)]
pub enum AnyPrincipal {
    Customer(customer::Model),
    Admin(admin::Model),
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AnyPrincipal {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = state.services.auth.decode_token(bearer_token(parts)?)?;
        match claims.user_type {
            UserType::Customer => resolve_customer(&claims, state).await.map(AnyPrincipal::Customer),
            UserType::Admin => resolve_admin(&claims, state).await.map(AnyPrincipal::Admin),
        }
    }
}
