//! Multi-channel push delivery.
//!
//! Tokens are classified into Expo or FCM registrations, fanned out through one
//! [`PushTransport`] per channel by the [`PushDispatcher`], and tokens the providers
//! reject permanently are cleared through a [`PushTokenStore`].

pub mod classifier;
pub mod dispatcher;
pub mod expo;
pub mod fcm;
pub mod token_store;

use crate::config::PushConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

pub use classifier::{classify, ClassifiedToken, TokenKind};
pub use dispatcher::PushDispatcher;
pub use expo::ExpoTransport;
pub use fcm::{FcmBackend, FcmHttpClient, FcmTransport, MessagingClient};
pub use token_store::{DbPushTokenStore, PushTokenStore};

#[derive(Debug, Error)]
pub enum PushError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response ({status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Payload delivered to every token of a dispatch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl PushMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: serde_json::Map::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// FCM only carries string values in `data`. Strings pass through, everything
    /// else is rendered as JSON text.
    pub fn stringified_data(&self) -> BTreeMap<String, String> {
        self.data
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Failed { error: String, dead: bool },
    Skipped { reason: String },
}

impl DeliveryStatus {
    pub fn is_dead(&self) -> bool {
        matches!(self, DeliveryStatus::Failed { dead: true, .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOutcome {
    pub token: String,
    pub kind: TokenKind,
    #[serde(flatten)]
    pub status: DeliveryStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub outcomes: Vec<TokenOutcome>,
}

impl DispatchResult {
    pub fn dead_tokens(&self) -> impl Iterator<Item = &TokenOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_dead())
    }
}

/// One delivery channel. `deliver` returns exactly one status per input token, in order.
#[async_trait]
pub trait PushTransport: Send + Sync {
    fn kind(&self) -> TokenKind;

    async fn deliver(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<Vec<DeliveryStatus>, PushError>;
}

/// Wires the Expo and FCM channels from configuration.
///
/// A configured but unreadable FCM credentials file is logged and leaves the FCM
/// channel unconfigured, so Expo delivery still works.
pub fn build_dispatcher(
    config: &PushConfig,
    token_store: Option<Arc<dyn PushTokenStore>>,
) -> Result<PushDispatcher, PushError> {
    let expo = ExpoTransport::new(config.expo_endpoint.clone(), config.request_timeout())?;

    let fcm_backend = match config.fcm_credentials_path.as_deref() {
        Some(path) => match FcmHttpClient::from_credentials_file(
            path,
            config.fcm_project_id.clone(),
            config.request_timeout(),
        ) {
            Ok(client) => {
                info!(project_id = %client.project_id(), "FCM messaging configured");
                FcmBackend::Configured(Arc::new(client))
            }
            Err(e) => {
                error!(error = %e, path, "Failed to load FCM credentials, FCM delivery disabled");
                FcmBackend::Unconfigured
            }
        },
        None => {
            info!("No FCM credentials configured, FCM delivery disabled");
            FcmBackend::Unconfigured
        }
    };

    let mut dispatcher = PushDispatcher::new()
        .with_transport(Arc::new(expo))
        .with_transport(Arc::new(FcmTransport::new(fcm_backend)));
    if let Some(store) = token_store {
        dispatcher = dispatcher.with_token_store(store);
    }
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stringified_data_keeps_strings_and_renders_the_rest() {
        let message = PushMessage::new("t", "b")
            .with_data("orderId", "abc")
            .with_data("totalAmount", json!(250))
            .with_data("flag", json!(true));
        let data = message.stringified_data();
        assert_eq!(data["orderId"], "abc");
        assert_eq!(data["totalAmount"], "250");
        assert_eq!(data["flag"], "true");
    }

    #[test]
    fn outcome_serializes_flat() {
        let outcome = TokenOutcome {
            token: "tok".into(),
            kind: TokenKind::Fcm,
            status: DeliveryStatus::Failed {
                error: "registration-token-not-registered".into(),
                dead: true,
            },
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["kind"], "fcm");
        assert_eq!(value["state"], "failed");
        assert_eq!(value["dead"], true);
    }
}
