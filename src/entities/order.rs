use crate::models::{MainArea, OrderItems, OrderStatus, Timeline};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub customer_id: Uuid,
    pub customer_phone: String,
    pub client_phone: String,
    pub store_name: String,
    #[sea_orm(column_type = "Json")]
    pub items: OrderItems,
    pub total_amount: Decimal,
    pub delivery_fee: Decimal,
    pub delivery_address: String,
    pub delivery_time: Option<String>,
    pub sub_area: String,
    pub sub_area_id: Option<Uuid>,
    pub sub_area_price: Decimal,
    pub notes: Option<String>,
    pub area: MainArea,
    pub status: OrderStatus,
    #[sea_orm(column_type = "Json")]
    pub timeline: Timeline,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_delete = "Cascade"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::sub_area::Entity",
        from = "Column::SubAreaId",
        to = "super::sub_area::Column::Id",
        on_delete = "SetNull"
    )]
    SubArea,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::sub_area::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubArea.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
