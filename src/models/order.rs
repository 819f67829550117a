use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Lifecycle states of an order. `completed` and `cancelled` are terminal.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "preparing")]
    Preparing,
    #[sea_orm(string_value = "ready")]
    Ready,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Statuses that stamp `delivered_at` when entered.
    pub fn marks_delivery(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Completed)
    }

    /// Parses a client-supplied status, rejecting anything outside the state machine.
    pub fn parse(value: &str) -> Result<Self, crate::errors::ServiceError> {
        value.trim().parse::<OrderStatus>().map_err(|_| {
            let allowed: Vec<String> = Self::ALL.iter().map(|s| s.to_string()).collect();
            crate::errors::ServiceError::ValidationError(format!(
                "status: '{}' is not one of {}",
                value,
                allowed.join(", ")
            ))
        })
    }
}

/// Top-level delivery zones. `OtherBasra` is the catch-all zone whose orders skip the
/// sub-area price lookup.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum MainArea {
    #[sea_orm(string_value = "tuwaisa")]
    #[serde(alias = "الطويسة")]
    #[strum(to_string = "tuwaisa", serialize = "الطويسة")]
    Tuwaisa,
    #[sea_orm(string_value = "al_jazair")]
    #[serde(alias = "الجزائر")]
    #[strum(to_string = "al_jazair", serialize = "الجزائر")]
    AlJazair,
    #[sea_orm(string_value = "al_jubaila")]
    #[serde(alias = "الجبيلة", alias = "القبيلة")]
    #[strum(to_string = "al_jubaila", serialize = "الجبيلة", serialize = "القبيلة")]
    AlJubaila,
    #[sea_orm(string_value = "al_junaina")]
    #[serde(alias = "الجنينة")]
    #[strum(to_string = "al_junaina", serialize = "الجنينة")]
    AlJunaina,
    #[sea_orm(string_value = "al_tannuma")]
    #[serde(alias = "التنومة")]
    #[strum(to_string = "al_tannuma", serialize = "التنومة")]
    AlTannuma,
    #[sea_orm(string_value = "other_basra")]
    #[serde(alias = "مناطق البصرة الاخرى")]
    #[strum(to_string = "other_basra", serialize = "مناطق البصرة الاخرى")]
    OtherBasra,
}

impl MainArea {
    pub fn is_catch_all(self) -> bool {
        self == MainArea::OtherBasra
    }

    /// Name shown to people in notification copy.
    pub fn display_name(self) -> &'static str {
        match self {
            MainArea::Tuwaisa => "الطويسة",
            MainArea::AlJazair => "الجزائر",
            MainArea::AlJubaila => "الجبيلة",
            MainArea::AlJunaina => "الجنينة",
            MainArea::AlTannuma => "التنومة",
            MainArea::OtherBasra => "مناطق البصرة الاخرى",
        }
    }
}

/// Who caused a timeline transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Actor {
    Customer,
    Admin,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct OrderItem {
    #[validate(length(min = 1, max = 200, message = "item name is required"))]
    pub name: String,
    #[validate(range(min = 1, message = "item quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(custom = "validate_amount")]
    pub price: Decimal,
}

impl OrderItem {
    /// `None` when price times quantity leaves the decimal range.
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Line items persisted as a JSON column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct OrderItems(pub Vec<OrderItem>);

impl OrderItems {
    pub fn subtotal(&self) -> Option<Decimal> {
        self.0
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.line_total()?))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<OrderStatus>,
    pub note: String,
    pub updated_by: Actor,
    pub updated_at: DateTime<Utc>,
}

/// Append-only status history persisted as a JSON column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct Timeline(pub Vec<TimelineEntry>);

impl Timeline {
    pub fn created(at: DateTime<Utc>) -> Self {
        Timeline(vec![TimelineEntry {
            status: OrderStatus::Pending,
            previous_status: None,
            note: "order created".to_string(),
            updated_by: Actor::Customer,
            updated_at: at,
        }])
    }

    /// Returns a copy with one transition appended.
    pub fn with_transition(
        &self,
        from: OrderStatus,
        to: OrderStatus,
        actor: Actor,
        note: String,
        at: DateTime<Utc>,
    ) -> Self {
        let mut entries = self.0.clone();
        entries.push(TimelineEntry {
            status: to,
            previous_status: Some(from),
            note,
            updated_by: actor,
            updated_at: at,
        });
        Timeline(entries)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&TimelineEntry> {
        self.0.last()
    }
}

/// Upper bound for a single price or delivery fee, in dinars.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

pub(crate) fn validate_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("negative");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    if *value > MAX_AMOUNT {
        let mut err = ValidationError::new("too_large");
        err.message = Some("exceeds the maximum allowed amount".into());
        return Err(err);
    }
    Ok(())
}
