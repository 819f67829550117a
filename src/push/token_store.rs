use crate::{
    db::DbPool,
    entities::{admin, customer},
    errors::ServiceError,
};
use async_trait::async_trait;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{info, instrument};

/// Removes push tokens the providers rejected permanently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushTokenStore: Send + Sync {
    /// Nulls every stored token equal to one of `tokens`. Returns the rows touched.
    async fn clear_tokens(&self, tokens: &[String]) -> Result<u64, ServiceError>;
}

#[derive(Clone)]
pub struct DbPushTokenStore {
    db_pool: Arc<DbPool>,
}

impl DbPushTokenStore {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PushTokenStore for DbPushTokenStore {
    #[instrument(skip(self, tokens), fields(tokens = tokens.len()))]
    async fn clear_tokens(&self, tokens: &[String]) -> Result<u64, ServiceError> {
        if tokens.is_empty() {
            return Ok(0);
        }
        let db = &*self.db_pool;

        let customers = customer::Entity::update_many()
            .col_expr(
                customer::Column::PushToken,
                Expr::value(Option::<String>::None),
            )
            .filter(customer::Column::PushToken.is_in(tokens.iter().cloned()))
            .exec(db)
            .await?;

        let admins = admin::Entity::update_many()
            .col_expr(admin::Column::PushToken, Expr::value(Option::<String>::None))
            .filter(admin::Column::PushToken.is_in(tokens.iter().cloned()))
            .exec(db)
            .await?;

        let cleared = customers.rows_affected + admins.rows_affected;
        info!(
            customers = customers.rows_affected,
            admins = admins.rows_affected,
            "Cleared dead push tokens"
        );
        Ok(cleared)
    }
}
