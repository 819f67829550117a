use async_trait::async_trait;
use crate::models::{CustomerStatus, MainArea};
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_name: String,
    #[sea_orm(unique)]
    pub phone_number: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub area: MainArea,
    pub status: CustomerStatus,
    pub total_orders: i32,
    pub last_order_date: Option<DateTime<Utc>>,
    pub push_token: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    #[sea_orm(has_many = "super::notification::Entity")]
    Notifications,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert {
            self.updated_at = sea_orm::ActiveValue::Set(Utc::now());
        }
        Ok(self)
    }
}

/// Customer as returned to clients. Never carries the password hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerView {
    pub id: Uuid,
    pub store_name: String,
    pub phone_number: String,
    pub area: MainArea,
    pub status: CustomerStatus,
    pub total_orders: i32,
    pub last_order_date: Option<DateTime<Utc>>,
    pub has_push_token: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Model> for CustomerView {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            store_name: model.store_name,
            phone_number: model.phone_number,
            area: model.area,
            status: model.status,
            total_orders: model.total_orders,
            last_order_date: model.last_order_date,
            has_push_token: model.push_token.is_some(),
            created_at: model.created_at,
        }
    }
}
