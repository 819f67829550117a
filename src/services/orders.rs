use crate::{
    db::DbPool,
    entities::{
        customer,
        order::{self, Entity as OrderEntity, Model as OrderModel},
        sub_area,
    },
    errors::{is_unique_violation, ServiceError},
    events::{Event, EventSender},
    models::{order::validate_amount, Actor, MainArea, OrderItem, OrderItems, OrderStatus, Timeline},
};
use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelBehavior, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

static CLIENT_PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^07[0-9]{9}$").expect("client phone pattern compiles"));

const ORDER_NUMBER_ATTEMPTS: u32 = 3;
const DEFAULT_LIST_LIMIT: u64 = 100;
const MAX_LIST_LIMIT: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(custom = "validate_items")]
    pub items: Vec<OrderItem>,
    #[serde(alias = "deliveryAddress")]
    #[validate(custom(function = "not_blank", message = "delivery address is required"))]
    pub delivery_address: String,
    #[serde(alias = "subArea")]
    #[validate(custom(function = "not_blank", message = "sub-area is required"))]
    pub sub_area: String,
    #[serde(alias = "clientPhone")]
    #[validate(regex(
        path = "CLIENT_PHONE",
        message = "client phone must start with 07 and have 11 digits"
    ))]
    pub client_phone: String,
    #[validate(length(max = 500, message = "notes must be at most 500 characters"))]
    pub notes: Option<String>,
    #[serde(default, alias = "deliveryTime")]
    pub delivery_time: Option<String>,
    #[serde(default, alias = "deliveryFee")]
    #[validate(custom = "validate_amount")]
    pub delivery_fee: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

/// Admin listing filter. There is no paging; `limit` caps the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub area: Option<MainArea>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSource {
    /// Catch-all zone: the client's fee is taken as-is.
    CatchAll,
    SubArea,
    CrossZoneSubArea,
    ClientSupplied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeResolution {
    pub fee: Decimal,
    pub sub_area_id: Option<Uuid>,
    pub source: FeeSource,
}

#[derive(Debug, Clone, Default)]
pub struct OrderServiceOptions {
    /// Reject admin transitions out of `completed`/`cancelled`.
    pub lock_terminal_states: bool,
}

/// Order lifecycle: creation, fee resolution and the status state machine.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    options: OrderServiceOptions,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
            options: OrderServiceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OrderServiceOptions) -> Self {
        self.options = options;
        self
    }

    /// Creates an order for `customer`, resolving its delivery fee from the sub-area table.
    #[instrument(skip(self, customer, request), fields(customer_id = %customer.id, items = request.items.len()))]
    pub async fn create_order(
        &self,
        customer: &customer::Model,
        request: CreateOrderRequest,
    ) -> Result<OrderModel, ServiceError> {
        request.validate()?;

        let sub_area_name = request.sub_area.trim().to_string();
        let fee = self
            .resolve_delivery_fee(customer.area, &sub_area_name, request.delivery_fee)
            .await?;

        let items = OrderItems(request.items);
        let total_amount = items
            .subtotal()
            .and_then(|subtotal| subtotal.checked_add(fee.fee))
            .ok_or_else(|| {
                ServiceError::ValidationError("items: total amount is out of range".into())
            })?;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let build = |order_number: String| order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number),
            customer_id: Set(customer.id),
            customer_phone: Set(customer.phone_number.clone()),
            client_phone: Set(request.client_phone.trim().to_string()),
            store_name: Set(customer.store_name.clone()),
            items: Set(items.clone()),
            total_amount: Set(total_amount),
            delivery_fee: Set(fee.fee),
            delivery_address: Set(request.delivery_address.trim().to_string()),
            delivery_time: Set(request.delivery_time.clone()),
            sub_area: Set(sub_area_name.clone()),
            sub_area_id: Set(fee.sub_area_id),
            sub_area_price: Set(fee.fee),
            notes: Set(request.notes.clone()),
            area: Set(customer.area),
            status: Set(OrderStatus::Pending),
            timeline: Set(Timeline::created(now)),
            delivered_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(1),
        };

        let db = &*self.db_pool;
        let mut attempt = 1;
        let order = loop {
            match build(generate_order_number()).insert(db).await {
                Ok(model) => break model,
                Err(e) if is_unique_violation(&e) && attempt < ORDER_NUMBER_ATTEMPTS => {
                    warn!(attempt, "Order number collision, regenerating");
                    attempt += 1;
                }
                Err(e) => {
                    error!(error = %e, order_id = %order_id, "Failed to create order in database");
                    return Err(ServiceError::from_write(e, "order number"));
                }
            }
        };

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            fee_source = ?fee.source,
            "Order created successfully"
        );

        tokio::join!(
            self.record_customer_order(customer.id),
            self.emit(Event::NewOrder(order.id)),
        );

        Ok(order)
    }

    /// Fee policy, first match wins: catch-all zone takes the client fee, then an
    /// active sub-area in the customer's zone, then one in any zone, then the client fee.
    #[instrument(skip(self))]
    pub async fn resolve_delivery_fee(
        &self,
        area: MainArea,
        sub_area_name: &str,
        client_fee: Option<Decimal>,
    ) -> Result<FeeResolution, ServiceError> {
        let client_fee = client_fee.unwrap_or(Decimal::ZERO);
        if area.is_catch_all() {
            return Ok(FeeResolution {
                fee: client_fee,
                sub_area_id: None,
                source: FeeSource::CatchAll,
            });
        }

        let db = &*self.db_pool;
        let active_named = || {
            sub_area::Entity::find()
                .filter(sub_area::Column::Name.eq(sub_area_name))
                .filter(sub_area::Column::IsActive.eq(true))
        };

        if let Some(found) = active_named()
            .filter(sub_area::Column::MainArea.eq(area))
            .one(db)
            .await?
        {
            return Ok(FeeResolution {
                fee: found.price,
                sub_area_id: Some(found.id),
                source: FeeSource::SubArea,
            });
        }

        if let Some(found) = active_named()
            .order_by_asc(sub_area::Column::CreatedAt)
            .one(db)
            .await?
        {
            info!(
                sub_area = sub_area_name,
                requested_area = %area,
                matched_area = %found.main_area,
                "Sub-area resolved outside the customer's zone"
            );
            return Ok(FeeResolution {
                fee: found.price,
                sub_area_id: Some(found.id),
                source: FeeSource::CrossZoneSubArea,
            });
        }

        Ok(FeeResolution {
            fee: client_fee,
            sub_area_id: None,
            source: FeeSource::ClientSupplied,
        })
    }

    /// Admin transition to any known status.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: &str,
    ) -> Result<OrderModel, ServiceError> {
        let new_status = OrderStatus::parse(new_status)?;
        let order = self.get_order(order_id).await?;

        if order.status.is_terminal() {
            if self.options.lock_terminal_states {
                return Err(ServiceError::InvalidState(format!(
                    "order {} is {} and can no longer change status",
                    order.order_number, order.status
                )));
            }
            warn!(
                order_number = %order.order_number,
                from = %order.status,
                to = %new_status,
                "Admin moving order out of a terminal status"
            );
        }

        let note = format!("status changed from {} to {}", order.status, new_status);
        let updated = self
            .apply_transition(order, new_status, Actor::Admin, note)
            .await?;

        self.emit(Event::OrderStatusUpdated {
            order_id,
            new_status,
        })
        .await;
        Ok(updated)
    }

    /// Customer-initiated cancellation. Someone else's order reads as missing.
    #[instrument(skip(self), fields(order_id = %order_id, customer_id = %customer_id))]
    pub async fn cancel_by_customer(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.get_customer_order(customer_id, order_id).await?;

        if order.status.is_terminal() {
            return Err(ServiceError::InvalidState(format!(
                "order {} is already {} and cannot be cancelled",
                order.order_number, order.status
            )));
        }

        let note = format!("cancelled by customer (previous status: {})", order.status);
        let updated = self
            .apply_transition(order, OrderStatus::Cancelled, Actor::Customer, note)
            .await?;

        self.emit(Event::OrderStatusUpdated {
            order_id,
            new_status: OrderStatus::Cancelled,
        })
        .await;
        Ok(updated)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    pub async fn get_customer_order(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .filter(order::Column::CustomerId.eq(customer_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    pub async fn list_customer_orders(
        &self,
        customer_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        let mut query = OrderEntity::find().filter(order::Column::CustomerId.eq(customer_id));
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        Ok(query
            .order_by_desc(order::Column::CreatedAt)
            .limit(MAX_LIST_LIMIT)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<OrderModel>, ServiceError> {
        let mut query = OrderEntity::find();
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(area) = filter.area {
            query = query.filter(order::Column::Area.eq(area));
        }
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        Ok(query
            .order_by_desc(order::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db_pool)
            .await?)
    }

    /// Writes one transition guarded by the version read alongside `order`.
    async fn apply_transition(
        &self,
        order: OrderModel,
        to: OrderStatus,
        actor: Actor,
        note: String,
    ) -> Result<OrderModel, ServiceError> {
        let now = Utc::now();
        let timeline = order
            .timeline
            .with_transition(order.status, to, actor, note, now);
        let delivered_at = if to.marks_delivery() {
            Some(now)
        } else {
            order.delivered_at
        };
        let version = order.version + 1;

        let mut changes = order::ActiveModel::new();
        changes.status = Set(to);
        changes.timeline = Set(timeline.clone());
        changes.delivered_at = Set(delivered_at);
        changes.updated_at = Set(now);
        changes.version = Set(version);

        let result = OrderEntity::update_many()
            .set(changes)
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::Version.eq(order.version))
            .exec(&*self.db_pool)
            .await?;

        if result.rows_affected == 0 {
            warn!(order_id = %order.id, version = order.version, "Stale order version, update rejected");
            return Err(ServiceError::ConcurrentModification(order.id));
        }

        info!(order_id = %order.id, from = %order.status, to = %to, actor = %actor, "Order status changed");

        Ok(OrderModel {
            status: to,
            timeline,
            delivered_at,
            updated_at: now,
            version,
            ..order
        })
    }

    async fn record_customer_order(&self, customer_id: Uuid) {
        let result = customer::Entity::update_many()
            .col_expr(
                customer::Column::TotalOrders,
                Expr::col(customer::Column::TotalOrders).add(1),
            )
            .col_expr(customer::Column::LastOrderDate, Expr::value(Some(Utc::now())))
            .filter(customer::Column::Id.eq(customer_id))
            .exec(&*self.db_pool)
            .await;
        if let Err(e) = result {
            error!(error = %e, customer_id = %customer_id, "Failed to update customer order counter");
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            let name = event.name();
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, event = name, "Failed to enqueue event");
            }
        }
    }
}

/// `ZJ` + last six digits of the epoch milliseconds + a three digit random suffix.
pub fn generate_order_number() -> String {
    let millis = Utc::now().timestamp_millis().rem_euclid(1_000_000);
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("ZJ{:06}{:03}", millis, suffix)
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn validate_items(items: &[OrderItem]) -> Result<(), ValidationError> {
    if items.is_empty() {
        let mut err = ValidationError::new("empty");
        err.message = Some("at least one item is required".into());
        return Err(err);
    }
    for (index, item) in items.iter().enumerate() {
        if let Err(errors) = item.validate() {
            let mut err = ValidationError::new("item");
            err.message = Some(
                format!(
                    "item {}: {}",
                    index + 1,
                    crate::errors::format_validation_errors(&errors)
                )
                .into(),
            );
            return Err(err);
        }
    }
    Ok(())
}
