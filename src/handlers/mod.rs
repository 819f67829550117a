pub mod admins;
pub mod auth;
pub mod customers;
pub mod health;
pub mod notifications;
pub mod orders;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    push::dispatcher::PushDispatcher,
    services::{
        admins::AdminService,
        customers::CustomerService,
        notifications::NotificationService,
        orders::{OrderService, OrderServiceOptions},
    },
};
use serde::Deserialize;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub customers: Arc<CustomerService>,
    pub admins: Arc<AdminService>,
    pub notifications: Arc<NotificationService>,
    pub auth: Arc<AuthService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        dispatcher: Arc<PushDispatcher>,
        config: &AppConfig,
    ) -> Self {
        let auth = Arc::new(AuthService::from_config(config));
        let orders = Arc::new(
            OrderService::new(db_pool.clone(), event_sender.clone()).with_options(
                OrderServiceOptions {
                    lock_terminal_states: config.orders.lock_terminal_states,
                },
            ),
        );
        let customers = Arc::new(CustomerService::new(
            db_pool.clone(),
            event_sender,
            auth.clone(),
        ));
        let admins = Arc::new(AdminService::new(db_pool.clone(), auth.clone()));
        let notifications = Arc::new(NotificationService::new(db_pool, dispatcher));

        Self {
            orders,
            customers,
            admins,
            notifications,
            auth,
        }
    }
}

/// `?limit=` for the list endpoints that cap their output.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u64>,
}
