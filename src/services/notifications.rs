use crate::{
    db::DbPool,
    entities::{
        admin, customer,
        notification::{self, Entity as NotificationEntity, Model as NotificationModel},
        order,
    },
    errors::ServiceError,
    events::{Event, EventHandler},
    models::{NotificationPriority, NotificationRecipient, NotificationType, OrderStatus},
    push::{DispatchResult, PushDispatcher, PushMessage},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const DEFAULT_INBOX_LIMIT: u64 = 50;
const MAX_INBOX_LIMIT: u64 = 200;

/// Input for a stored notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub recipient: NotificationRecipient,
    pub customer_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub priority: NotificationPriority,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestPushRequest {
    pub recipient: Option<NotificationRecipient>,
    #[serde(default, alias = "customerId")]
    pub customer_id: Option<Uuid>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Customer-facing wording for a status, `None` when the status has no dedicated copy.
pub fn status_message(status: OrderStatus) -> Option<&'static str> {
    match status {
        OrderStatus::Confirmed => Some("Your order has been confirmed"),
        OrderStatus::Preparing => Some("Your order is being prepared"),
        OrderStatus::Ready => Some("Your order is ready for delivery"),
        OrderStatus::Delivered => Some("Your order has been delivered successfully"),
        OrderStatus::Cancelled => Some("Your order has been cancelled"),
        _ => None,
    }
}

pub fn new_order_priority(total: Decimal) -> NotificationPriority {
    if total > Decimal::from(1000) {
        NotificationPriority::Urgent
    } else if total > Decimal::from(500) {
        NotificationPriority::High
    } else {
        NotificationPriority::Normal
    }
}

fn status_priority(status: OrderStatus) -> NotificationPriority {
    match status {
        OrderStatus::Ready | OrderStatus::Cancelled => NotificationPriority::High,
        _ => NotificationPriority::Normal,
    }
}

/// Turns domain events into stored notifications and push dispatches, and serves the
/// inboxes. A stored record never depends on push delivery succeeding.
#[derive(Clone)]
pub struct NotificationService {
    db_pool: Arc<DbPool>,
    dispatcher: Arc<PushDispatcher>,
}

impl NotificationService {
    pub fn new(db_pool: Arc<DbPool>, dispatcher: Arc<PushDispatcher>) -> Self {
        Self {
            db_pool,
            dispatcher,
        }
    }

    #[instrument(skip(self, new), fields(kind = %new.notification_type, recipient = %new.recipient))]
    pub async fn create_notification(
        &self,
        new: NewNotification,
    ) -> Result<NotificationModel, ServiceError> {
        let model = notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            notification_type: Set(new.notification_type),
            title: Set(new.title),
            message: Set(new.message),
            data: Set(new.data),
            recipient: Set(new.recipient),
            customer_id: Set(new.customer_id),
            order_id: Set(new.order_id),
            is_read: Set(false),
            priority: Set(new.priority),
            expires_at: Set(new.expires_at),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to store notification");
            ServiceError::DatabaseError(e)
        })?;

        info!(notification_id = %model.id, title = %model.title, "Notification created");
        Ok(model)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn notify_new_order(&self, order_id: Uuid) -> Result<NotificationModel, ServiceError> {
        let order = self.load_order(order_id).await?;

        let record = self
            .create_notification(NewNotification {
                notification_type: NotificationType::NewOrder,
                title: "New order!".to_string(),
                message: format!(
                    "New order from {} - order number: {}",
                    order.store_name, order.order_number
                ),
                data: json!({
                    "orderNumber": order.order_number,
                    "customerName": order.store_name,
                    "totalAmount": order.total_amount,
                    "area": order.area,
                }),
                recipient: NotificationRecipient::Admin,
                customer_id: Some(order.customer_id),
                order_id: Some(order.id),
                priority: new_order_priority(order.total_amount),
                expires_at: None,
            })
            .await?;

        let push = PushMessage::new(
            "🔔 New order!",
            format!(
                "New order from {}\nOrder number: {}\nAmount: {} IQD",
                order.store_name, order.order_number, order.total_amount
            ),
        )
        .with_data("type", "new_order")
        .with_data("orderId", order.id.to_string())
        .with_data("orderNumber", order.order_number.clone())
        .with_data("storeName", order.store_name.clone())
        .with_data("totalAmount", order.total_amount.to_string())
        .with_data("area", order.area.to_string());

        let tokens = self.active_admin_tokens().await;
        self.dispatch(&tokens, &push).await;

        Ok(record)
    }

    #[instrument(skip(self), fields(order_id = %order_id, status = %new_status))]
    pub async fn notify_order_status_update(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<NotificationModel, ServiceError> {
        let order = self.load_order(order_id).await?;

        let (message, body) = match status_message(new_status) {
            Some(message) => (
                message.to_string(),
                format!("Order #{}: {}", order.order_number, message),
            ),
            None => (
                "Order status updated".to_string(),
                format!("Order #{}: {}", order.order_number, new_status),
            ),
        };

        let record = self
            .create_notification(NewNotification {
                notification_type: NotificationType::OrderStatusUpdate,
                title: message.clone(),
                message: body,
                data: json!({
                    "orderNumber": order.order_number,
                    "status": new_status,
                    "orderId": order.id,
                }),
                recipient: NotificationRecipient::Customer,
                customer_id: Some(order.customer_id),
                order_id: Some(order.id),
                priority: status_priority(new_status),
                expires_at: None,
            })
            .await?;

        let push = PushMessage::new(
            "🔔 Order update",
            format!("{}\nOrder number: {}", message, order.order_number),
        )
        .with_data("type", "order_status_update")
        .with_data("orderId", order.id.to_string())
        .with_data("orderNumber", order.order_number.clone())
        .with_data("status", new_status.to_string());

        match self.customer_token(order.customer_id).await {
            Ok(Some(token)) => {
                self.dispatch(&[token], &push).await;
            }
            Ok(None) => debug!(customer_id = %order.customer_id, "Customer has no push token"),
            Err(e) => warn!(error = %e, "Failed to load customer push token"),
        }

        Ok(record)
    }

    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn notify_new_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<NotificationModel, ServiceError> {
        let customer = customer::Entity::find_by_id(customer_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;

        self.create_notification(NewNotification {
            notification_type: NotificationType::CustomerRegistered,
            title: "New customer!".to_string(),
            message: format!(
                "New customer registered: {} - {}",
                customer.store_name,
                customer.area.display_name()
            ),
            data: json!({
                "customerName": customer.store_name,
                "phoneNumber": customer.phone_number,
                "area": customer.area,
            }),
            recipient: NotificationRecipient::Admin,
            customer_id: Some(customer.id),
            order_id: None,
            priority: NotificationPriority::Normal,
            expires_at: None,
        })
        .await
    }

    /// Admin inbox: most pressing priority first, newest first within a priority.
    pub async fn admin_inbox(&self, limit: Option<u64>) -> Result<Vec<NotificationModel>, ServiceError> {
        let mut remaining = clamp_limit(limit);
        let mut inbox = Vec::new();
        let priorities = [
            NotificationPriority::Urgent,
            NotificationPriority::High,
            NotificationPriority::Normal,
            NotificationPriority::Low,
        ];

        for priority in priorities {
            if remaining == 0 {
                break;
            }
            let batch = live(NotificationEntity::find())
                .filter(notification::Column::Recipient.eq(NotificationRecipient::Admin))
                .filter(notification::Column::Priority.eq(priority))
                .order_by_desc(notification::Column::CreatedAt)
                .limit(remaining)
                .all(&*self.db_pool)
                .await?;
            remaining -= batch.len() as u64;
            inbox.extend(batch);
        }
        Ok(inbox)
    }

    /// A customer's own notifications plus broadcasts, newest first.
    pub async fn customer_inbox(
        &self,
        customer_id: Uuid,
        limit: Option<u64>,
    ) -> Result<Vec<NotificationModel>, ServiceError> {
        Ok(live(NotificationEntity::find())
            .filter(customer_visible(customer_id))
            .order_by_desc(notification::Column::CreatedAt)
            .limit(clamp_limit(limit))
            .all(&*self.db_pool)
            .await?)
    }

    /// Flags one notification read. With `customer_id` set the update only
    /// touches records that customer can see; anything else is NotFound.
    pub async fn mark_read(
        &self,
        notification_id: Uuid,
        customer_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut update = NotificationEntity::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::Id.eq(notification_id));
        if let Some(customer_id) = customer_id {
            update = update.filter(customer_visible(customer_id));
        }
        let result = update.exec(&*self.db_pool).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Notification {} not found",
                notification_id
            )));
        }
        Ok(())
    }

    /// Marks the recipient's unread notifications read. Broadcasts are left alone.
    pub async fn mark_all_read(
        &self,
        recipient: NotificationRecipient,
        customer_id: Option<Uuid>,
    ) -> Result<u64, ServiceError> {
        let mut update = NotificationEntity::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::Recipient.eq(recipient))
            .filter(notification::Column::IsRead.eq(false));
        if let Some(customer_id) = customer_id {
            update = update.filter(notification::Column::CustomerId.eq(customer_id));
        }
        let result = update.exec(&*self.db_pool).await?;
        Ok(result.rows_affected)
    }

    pub async fn unread_count(
        &self,
        recipient: NotificationRecipient,
        customer_id: Option<Uuid>,
    ) -> Result<u64, ServiceError> {
        let query = live(NotificationEntity::find()).filter(notification::Column::IsRead.eq(false));
        let query = match (recipient, customer_id) {
            (NotificationRecipient::Customer, Some(customer_id)) => {
                query.filter(customer_visible(customer_id))
            }
            _ => query.filter(notification::Column::Recipient.eq(recipient)),
        };
        Ok(query.count(&*self.db_pool).await?)
    }

    /// Sends a one-off push to a customer's token or to the first active admin's.
    #[instrument(skip(self, request))]
    pub async fn send_test_push(&self, request: TestPushRequest) -> Result<DispatchResult, ServiceError> {
        let recipient = request.recipient.unwrap_or(NotificationRecipient::Admin);
        let token = match recipient {
            NotificationRecipient::Customer => {
                let customer_id = request.customer_id.ok_or_else(|| {
                    ServiceError::ValidationError("customer_id: required for customer pushes".into())
                })?;
                self.customer_token(customer_id).await?
            }
            NotificationRecipient::Admin | NotificationRecipient::All => {
                self.active_admin_tokens().await.into_iter().next()
            }
        };
        let token = token.ok_or_else(|| {
            ServiceError::NotFound(format!("No push token registered for {}", recipient))
        })?;

        let mut push = PushMessage::new(
            request.title.unwrap_or_else(|| "Test notification".to_string()),
            request
                .message
                .unwrap_or_else(|| "This is a test notification".to_string()),
        )
        .with_data("type", "test");
        if let Some(data) = request.data {
            push.data.extend(data);
        }

        Ok(self.dispatch(&[token], &push).await)
    }

    async fn load_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn customer_token(&self, customer_id: Uuid) -> Result<Option<String>, ServiceError> {
        let customer = customer::Entity::find_by_id(customer_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;
        Ok(customer.push_token)
    }

    async fn active_admin_tokens(&self) -> Vec<String> {
        let admins = admin::Entity::find()
            .filter(admin::Column::IsActive.eq(true))
            .filter(admin::Column::PushToken.is_not_null())
            .order_by_asc(admin::Column::CreatedAt)
            .all(&*self.db_pool)
            .await;
        match admins {
            Ok(admins) => admins.into_iter().filter_map(|a| a.push_token).collect(),
            Err(e) => {
                error!(error = %e, "Failed to load admin push tokens");
                Vec::new()
            }
        }
    }

    async fn dispatch(&self, tokens: &[String], push: &PushMessage) -> DispatchResult {
        if tokens.is_empty() {
            debug!(title = %push.title, "No push tokens to notify");
            return DispatchResult::default();
        }
        let result = self.dispatcher.send(tokens, push).await;
        if result.failure_count > 0 {
            warn!(
                success = result.success_count,
                failure = result.failure_count,
                "Push notification partially failed"
            );
        }
        result
    }
}

#[async_trait]
impl EventHandler for NotificationService {
    async fn handle_event(&self, event: Event) -> Result<(), String> {
        let result = match event {
            Event::NewOrder(order_id) => self.notify_new_order(order_id).await,
            Event::OrderStatusUpdated {
                order_id,
                new_status,
            } => self.notify_order_status_update(order_id, new_status).await,
            Event::CustomerRegistered(customer_id) => self.notify_new_customer(customer_id).await,
        };
        result.map(|_| ()).map_err(|e| e.to_string())
    }
}

fn clamp_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_INBOX_LIMIT).clamp(1, MAX_INBOX_LIMIT)
}

/// Drops notifications past their expiry.
fn live(query: Select<NotificationEntity>) -> Select<NotificationEntity> {
    query.filter(
        Condition::any()
            .add(notification::Column::ExpiresAt.is_null())
            .add(notification::Column::ExpiresAt.gt(Utc::now())),
    )
}

fn customer_visible(customer_id: Uuid) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(notification::Column::Recipient.eq(NotificationRecipient::Customer))
                .add(notification::Column::CustomerId.eq(customer_id)),
        )
        .add(notification::Column::Recipient.eq(NotificationRecipient::All))
}
