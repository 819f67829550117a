use super::{DeliveryStatus, PushError, PushMessage, PushTransport, TokenKind};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const DEFAULT_EXPO_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a serde_json::Map<String, serde_json::Value>,
    sound: &'static str,
    priority: &'static str,
    channel_id: &'static str,
    android: ExpoAndroid,
    apns: ExpoApns,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExpoAndroid {
    channel_id: &'static str,
    priority: &'static str,
    sound: &'static str,
}

#[derive(Debug, Serialize)]
struct ExpoApns {
    payload: ExpoApnsPayload,
}

#[derive(Debug, Serialize)]
struct ExpoApnsPayload {
    aps: ExpoAps,
}

#[derive(Debug, Serialize)]
struct ExpoAps {
    sound: &'static str,
    badge: u32,
}

impl<'a> ExpoMessage<'a> {
    fn new(to: &'a str, message: &'a PushMessage) -> Self {
        Self {
            to,
            title: &message.title,
            body: &message.body,
            data: &message.data,
            sound: "default",
            priority: "high",
            channel_id: "default",
            android: ExpoAndroid {
                channel_id: "default",
                priority: "high",
                sound: "default",
            },
            apns: ExpoApns {
                payload: ExpoApnsPayload {
                    aps: ExpoAps {
                        sound: "default",
                        badge: 1,
                    },
                },
            },
        }
    }
}

/// Sends Expo-hosted tokens as a single batch to the Expo push API.
#[derive(Clone, Debug)]
pub struct ExpoTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl ExpoTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PushError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PushTransport for ExpoTransport {
    fn kind(&self) -> TokenKind {
        TokenKind::Expo
    }

    /// The batch succeeds or fails as a whole: a 2xx answer carrying `data` delivers
    /// every token, anything else is an error for the caller to spread.
    #[instrument(skip(self, tokens, message), fields(tokens = tokens.len()))]
    async fn deliver(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<Vec<DeliveryStatus>, PushError> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let batch: Vec<ExpoMessage<'_>> = tokens
            .iter()
            .map(|token| ExpoMessage::new(token, message))
            .collect();

        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&batch)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Expo push batch rejected");
            return Err(PushError::UnexpectedResponse {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: Option<serde_json::Value> = serde_json::from_str(&body).ok();
        match parsed.as_ref().and_then(|v| v.get("data")) {
            Some(data) => {
                debug!(tickets = %data, "Expo push batch accepted");
                Ok(vec![DeliveryStatus::Delivered; tokens.len()])
            }
            None => {
                warn!(status = status.as_u16(), "Expo push response carried no data");
                Err(PushError::UnexpectedResponse {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
