#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;
use zajel_api::{
    config::AppConfig,
    db::{self, DbConfig, DbPool},
    entities::{admin, customer, notification, sub_area},
    events::{self, EventHandler, EventSender},
    handlers::AppServices,
    models::{AdminRole, MainArea, UserType},
    push::{
        classifier::TokenKind,
        dispatcher::PushDispatcher,
        token_store::{DbPushTokenStore, PushTokenStore},
        DeliveryStatus, PushError, PushMessage, PushTransport,
    },
    services::{admins::CreateAdminRequest, customers::CreateCustomerRequest},
    AppState,
};

pub const TEST_JWT_SECRET: &str = "k3v9zq81mmx20pl4tt7eyy2wrr5cb6n8";
pub const CUSTOMER_PASSWORD: &str = "s3cret-pass";
pub const ADMIN_CODE: &str = "9731";

/// Expo token shape accepted by the classifier.
pub fn expo_token(tag: &str) -> String {
    format!("ExponentPushToken[{}]", tag)
}

/// Long enough to classify as an FCM registration token.
pub fn fcm_token(tag: &str) -> String {
    format!("fcm-{}-{}", tag, "a".repeat(40))
}

/// How a [`RecordingTransport`] answers.
#[derive(Clone, Debug)]
pub enum TransportBehavior {
    Deliver,
    /// Whole channel errors, e.g. the provider is down.
    FailChannel,
    /// The listed tokens come back as unregistered, the rest are delivered.
    Unregistered(Vec<String>),
}

/// Push channel that records every call instead of talking to a provider.
pub struct RecordingTransport {
    kind: TokenKind,
    behavior: Mutex<TransportBehavior>,
    sent: Mutex<Vec<(Vec<String>, PushMessage)>>,
}

impl RecordingTransport {
    pub fn new(kind: TokenKind, behavior: TransportBehavior) -> Arc<Self> {
        Arc::new(Self {
            kind,
            behavior: Mutex::new(behavior),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn set_behavior(&self, behavior: TransportBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn sent(&self) -> Vec<(Vec<String>, PushMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    fn kind(&self) -> TokenKind {
        self.kind
    }

    async fn deliver(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<Vec<DeliveryStatus>, PushError> {
        self.sent
            .lock()
            .unwrap()
            .push((tokens.to_vec(), message.clone()));
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            TransportBehavior::Deliver => Ok(vec![DeliveryStatus::Delivered; tokens.len()]),
            TransportBehavior::FailChannel => Err(PushError::UnexpectedResponse {
                status: 503,
                body: "service unavailable".into(),
            }),
            TransportBehavior::Unregistered(dead) => Ok(tokens
                .iter()
                .map(|t| {
                    if dead.contains(t) {
                        DeliveryStatus::Failed {
                            error: "registration-token-not-registered".into(),
                            dead: true,
                        }
                    } else {
                        DeliveryStatus::Delivered
                    }
                })
                .collect()),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TestOptions {
    pub lock_terminal_states: bool,
    /// Run the event worker so notifications follow requests asynchronously.
    pub with_event_worker: bool,
}

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub db: Arc<DbPool>,
    pub expo: Arc<RecordingTransport>,
    pub fcm: Arc<RecordingTransport>,
    _event_task: Option<tokio::task::JoinHandle<()>>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let pool = db::establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.orders.lock_terminal_states = options.lock_terminal_states;

        let expo = RecordingTransport::new(TokenKind::Expo, TransportBehavior::Deliver);
        let fcm = RecordingTransport::new(TokenKind::Fcm, TransportBehavior::Deliver);
        let token_store: Arc<dyn PushTokenStore> = Arc::new(DbPushTokenStore::new(db_arc.clone()));
        let dispatcher = Arc::new(
            PushDispatcher::new()
                .with_transport(expo.clone())
                .with_transport(fcm.clone())
                .with_token_store(token_store),
        );

        let (event_sender, event_task) = if options.with_event_worker {
            let (sender, rx) = EventSender::channel(64);
            (Some(Arc::new(sender)), Some(rx))
        } else {
            (None, None)
        };

        let services = AppServices::new(db_arc.clone(), event_sender.clone(), dispatcher, &cfg);
        let event_task = event_task.map(|rx| {
            let handler: Arc<dyn EventHandler> = services.notifications.clone();
            tokio::spawn(events::process_events(rx, handler))
        });

        let state = AppState {
            db: db_arc.clone(),
            config: cfg,
            event_sender,
            services,
        };

        Self {
            router: zajel_api::app_router(state.clone()),
            state,
            db: db_arc,
            expo,
            fcm,
            _event_task: event_task,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_sub_area(&self, name: &str, area: MainArea, price: i64) -> sub_area::Model {
        sub_area::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            main_area: Set(area),
            price: Set(Decimal::from(price)),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("seed sub-area")
    }

    /// Creates an active customer and returns it with a bearer token.
    pub async fn seed_customer(&self, phone: &str, area: MainArea) -> (customer::Model, String) {
        let view = self
            .services()
            .customers
            .create_customer(
                CreateCustomerRequest {
                    store_name: format!("Store {}", phone),
                    phone_number: phone.to_string(),
                    password: CUSTOMER_PASSWORD.to_string(),
                    area,
                },
                None,
            )
            .await
            .expect("seed customer");
        let model = customer::Entity::find_by_id(view.id)
            .one(&*self.db)
            .await
            .expect("load customer")
            .expect("customer exists");
        let token = self
            .services()
            .auth
            .issue_token(model.id, UserType::Customer)
            .expect("issue customer token")
            .token;
        (model, token)
    }

    pub async fn seed_admin(&self, admin_id: &str) -> (admin::Model, String) {
        let view = self
            .services()
            .admins
            .create_admin(CreateAdminRequest {
                admin_id: admin_id.to_string(),
                code: ADMIN_CODE.to_string(),
                name: format!("Admin {}", admin_id),
                role: AdminRole::Admin,
            })
            .await
            .expect("seed admin");
        let model = admin::Entity::find_by_id(view.id)
            .one(&*self.db)
            .await
            .expect("load admin")
            .expect("admin exists");
        let token = self
            .services()
            .auth
            .issue_token(model.id, UserType::Admin)
            .expect("issue admin token")
            .token;
        (model, token)
    }

    pub async fn reload_customer(&self, id: Uuid) -> customer::Model {
        customer::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .expect("load customer")
            .expect("customer exists")
    }

    pub async fn reload_admin(&self, id: Uuid) -> admin::Model {
        admin::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .expect("load admin")
            .expect("admin exists")
    }

    pub async fn notification_count(&self) -> u64 {
        notification::Entity::find()
            .count(&*self.db)
            .await
            .expect("count notifications")
    }

    /// Polls until at least `expected` notifications exist; the event worker runs detached.
    pub async fn wait_for_notifications(&self, expected: u64) -> u64 {
        let mut count = 0;
        for _ in 0..100 {
            count = self.notification_count().await;
            if count >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        count
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(task) = &self._event_task {
            task.abort();
        }
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
