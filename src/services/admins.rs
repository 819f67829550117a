use crate::{
    auth::{AuthError, AuthService, IssuedToken},
    db::DbPool,
    entities::admin::{self, AdminView, Entity as AdminEntity, Model as AdminModel},
    errors::ServiceError,
    models::{AdminRole, UserType},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAdminRequest {
    #[serde(alias = "adminId")]
    #[validate(length(min = 3, max = 64, message = "admin id must be at least 3 characters"))]
    pub admin_id: String,
    #[serde(alias = "secretCode")]
    #[validate(length(min = 4, message = "secret code must be at least 4 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub name: String,
    #[serde(default = "default_role")]
    pub role: AdminRole,
}

fn default_role() -> AdminRole {
    AdminRole::Admin
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateAdminRequest {
    #[validate(length(min = 1, max = 200, message = "name must not be empty"))]
    pub name: Option<String>,
    pub role: Option<AdminRole>,
    #[serde(alias = "isActive")]
    pub is_active: Option<bool>,
    #[serde(alias = "secretCode")]
    #[validate(length(min = 4, message = "secret code must be at least 4 characters"))]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginRequest {
    #[serde(alias = "adminId")]
    pub admin_id: String,
    #[serde(alias = "secretCode", alias = "adminCode")]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginResponse {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub admin: AdminView,
}

#[derive(Clone)]
pub struct AdminService {
    db_pool: Arc<DbPool>,
    auth: Arc<AuthService>,
}

impl AdminService {
    pub fn new(db_pool: Arc<DbPool>, auth: Arc<AuthService>) -> Self {
        Self { db_pool, auth }
    }

    #[instrument(skip(self, request), fields(admin_id = %request.admin_id))]
    pub async fn create_admin(&self, request: CreateAdminRequest) -> Result<AdminView, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let model = admin::ActiveModel {
            id: Set(Uuid::new_v4()),
            admin_id: Set(request.admin_id.trim().to_string()),
            code_hash: Set(self.auth.hash_secret(&request.code).await?),
            name: Set(request.name.trim().to_string()),
            role: Set(request.role),
            is_active: Set(true),
            push_token: Set(None),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| ServiceError::from_write(e, "admin id"))?;

        info!(id = %model.id, "Admin created");
        Ok(model.into())
    }

    /// Partial update. A new code is re-hashed before it is stored.
    #[instrument(skip(self, request), fields(id = %id))]
    pub async fn update_admin(&self, id: Uuid, request: UpdateAdminRequest) -> Result<AdminView, ServiceError> {
        request.validate()?;
        let mut active = self.get_model(id).await?.into_active_model();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(role) = request.role {
            active.role = Set(role);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(code) = request.code {
            active.code_hash = Set(self.auth.hash_secret(&code).await?);
        }
        Ok(active.update(&*self.db_pool).await?.into())
    }

    #[instrument(skip(self, request), fields(admin_id = %request.admin_id))]
    pub async fn login(&self, request: AdminLoginRequest) -> Result<AdminLoginResponse, ServiceError> {
        let admin = AdminEntity::find()
            .filter(admin::Column::AdminId.eq(request.admin_id.trim()))
            .one(&*self.db_pool)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !admin.is_active || !self.auth.verify_secret(&request.code, &admin.code_hash).await {
            return Err(AuthError::InvalidCredentials.into());
        }

        let mut active = admin.into_active_model();
        active.last_login = Set(Some(Utc::now()));
        let admin = active.update(&*self.db_pool).await?;

        let token = self.auth.issue_token(admin.id, UserType::Admin)?;
        info!(id = %admin.id, "Admin logged in");
        Ok(AdminLoginResponse {
            token,
            admin: admin.into(),
        })
    }

    pub async fn register_push_token(&self, id: Uuid, token: &str) -> Result<(), ServiceError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ServiceError::ValidationError("token: push token is required".into()));
        }
        let mut active = self.get_model(id).await?.into_active_model();
        active.push_token = Set(Some(token.to_string()));
        active.update(&*self.db_pool).await?;
        Ok(())
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<AdminModel>, ServiceError> {
        Ok(AdminEntity::find_by_id(id).one(&*self.db_pool).await?)
    }

    async fn get_model(&self, id: Uuid) -> Result<AdminModel, ServiceError> {
        self.find(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Admin {} not found", id)))
    }
}
