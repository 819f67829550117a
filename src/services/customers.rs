use crate::{
    auth::{AuthError, AuthService, IssuedToken},
    db::DbPool,
    entities::{
        customer::{self, CustomerView, Entity as CustomerEntity, Model as CustomerModel},
        order,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::{CustomerStatus, MainArea, UserType},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[serde(alias = "storeName")]
    #[validate(length(min = 1, max = 200, message = "store name is required"))]
    pub store_name: String,
    #[serde(alias = "phoneNumber")]
    #[validate(length(min = 4, max = 32, message = "phone number is required"))]
    pub phone_number: String,
    #[validate(length(min = 4, message = "password must be at least 4 characters"))]
    pub password: String,
    pub area: MainArea,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[serde(default, alias = "storeName")]
    #[validate(length(min = 1, max = 200, message = "store name must not be empty"))]
    pub store_name: Option<String>,
    #[serde(default, alias = "phoneNumber")]
    #[validate(length(min = 4, max = 32, message = "phone number is too short"))]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub area: Option<MainArea>,
    #[serde(default)]
    pub status: Option<CustomerStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 4, message = "password must be at least 4 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerLoginRequest {
    #[serde(alias = "phoneNumber")]
    pub phone_number: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushTokenRequest {
    #[serde(alias = "pushToken")]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerLoginResponse {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub customer: CustomerView,
}

/// Customer accounts: credentials, profile, push token and cascade delete.
#[derive(Clone)]
pub struct CustomerService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    auth: Arc<AuthService>,
}

impl CustomerService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        auth: Arc<AuthService>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            auth,
        }
    }

    #[instrument(skip(self, request), fields(created_by = ?created_by))]
    pub async fn create_customer(
        &self,
        request: CreateCustomerRequest,
        created_by: Option<Uuid>,
    ) -> Result<CustomerView, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let password_hash = self.auth.hash_secret(&request.password).await?;

        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_name: Set(request.store_name.trim().to_string()),
            phone_number: Set(request.phone_number.trim().to_string()),
            password_hash: Set(password_hash),
            area: Set(request.area),
            status: Set(CustomerStatus::Active),
            total_orders: Set(0),
            last_order_date: Set(None),
            push_token: Set(None),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| ServiceError::from_write(e, "phone number"))?;

        info!(customer_id = %model.id, "Customer created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::CustomerRegistered(model.id)).await {
                warn!(error = %e, customer_id = %model.id, "Failed to send customer registered event");
            }
        }

        Ok(model.into())
    }

    #[instrument(skip(self, request), fields(customer_id = %customer_id))]
    pub async fn update_customer(
        &self,
        customer_id: Uuid,
        request: UpdateCustomerRequest,
    ) -> Result<CustomerView, ServiceError> {
        request.validate()?;
        let mut active = self.get_model(customer_id).await?.into_active_model();

        if let Some(store_name) = request.store_name {
            active.store_name = Set(store_name.trim().to_string());
        }
        if let Some(phone_number) = request.phone_number {
            active.phone_number = Set(phone_number.trim().to_string());
        }
        if let Some(area) = request.area {
            active.area = Set(area);
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }

        let model = active
            .update(&*self.db_pool)
            .await
            .map_err(|e| ServiceError::from_write(e, "phone number"))?;
        Ok(model.into())
    }

    #[instrument(skip(self, request), fields(customer_id = %customer_id))]
    pub async fn change_password(
        &self,
        customer_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        request.validate()?;
        let mut active = self.get_model(customer_id).await?.into_active_model();
        active.password_hash = Set(self.auth.hash_secret(&request.password).await?);
        active.update(&*self.db_pool).await?;
        info!("Customer password changed");
        Ok(())
    }

    /// Deletes the customer's orders, then the customer, in one transaction.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn delete_customer(&self, customer_id: Uuid) -> Result<u64, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let orders = order::Entity::delete_many()
            .filter(order::Column::CustomerId.eq(customer_id))
            .exec(&txn)
            .await?;
        let deleted = CustomerEntity::delete_by_id(customer_id).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            txn.rollback().await?;
            return Err(ServiceError::NotFound(format!(
                "Customer {} not found",
                customer_id
            )));
        }

        txn.commit().await?;
        info!(orders = orders.rows_affected, "Customer deleted with orders");
        Ok(orders.rows_affected)
    }

    #[instrument(skip(self, token), fields(customer_id = %customer_id))]
    pub async fn register_push_token(
        &self,
        customer_id: Uuid,
        token: &str,
    ) -> Result<(), ServiceError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ServiceError::ValidationError("token: push token is required".into()));
        }
        let mut active = self.get_model(customer_id).await?.into_active_model();
        active.push_token = Set(Some(token.to_string()));
        active.update(&*self.db_pool).await?;
        info!("Customer push token registered");
        Ok(())
    }

    #[instrument(skip(self, request))]
    pub async fn login(
        &self,
        request: CustomerLoginRequest,
    ) -> Result<CustomerLoginResponse, ServiceError> {
        let customer = CustomerEntity::find()
            .filter(customer::Column::PhoneNumber.eq(request.phone_number.trim()))
            .one(&*self.db_pool)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.auth.verify_secret(&request.password, &customer.password_hash).await {
            return Err(AuthError::InvalidCredentials.into());
        }
        if customer.status == CustomerStatus::Suspended {
            return Err(ServiceError::Forbidden("account is suspended".into()));
        }

        let token = self.auth.issue_token(customer.id, UserType::Customer)?;
        info!(customer_id = %customer.id, "Customer logged in");
        Ok(CustomerLoginResponse {
            token,
            customer: customer.into(),
        })
    }

    pub async fn find(&self, customer_id: Uuid) -> Result<Option<CustomerModel>, ServiceError> {
        Ok(CustomerEntity::find_by_id(customer_id)
            .one(&*self.db_pool)
            .await?)
    }

    pub async fn get(&self, customer_id: Uuid) -> Result<CustomerView, ServiceError> {
        Ok(self.get_model(customer_id).await?.into())
    }

    pub async fn list(&self, status: Option<CustomerStatus>) -> Result<Vec<CustomerView>, ServiceError> {
        let mut query = CustomerEntity::find();
        if let Some(status) = status {
            query = query.filter(customer::Column::Status.eq(status));
        }
        let customers = query
            .order_by_desc(customer::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        Ok(customers.into_iter().map(CustomerView::from).collect())
    }

    async fn get_model(&self, customer_id: Uuid) -> Result<CustomerModel, ServiceError> {
        self.find(customer_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))
    }
}
