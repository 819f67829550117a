use super::{DeliveryStatus, PushError, PushMessage, PushTransport, TokenKind};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

pub const FCM_API_BASE: &str = "https://fcm.googleapis.com";
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

pub const INVALID_REGISTRATION_TOKEN: &str = "invalid-registration-token";
pub const TOKEN_NOT_REGISTERED: &str = "registration-token-not-registered";

/// Provider error codes that mean the token will never work again.
pub fn is_dead_token_error(code: &str) -> bool {
    let code = code.strip_prefix("messaging/").unwrap_or(code);
    code == INVALID_REGISTRATION_TOKEN || code == TOKEN_NOT_REGISTERED
}

/// Notification content as FCM carries it: `data` values must be strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FcmMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl From<&PushMessage> for FcmMessage {
    fn from(message: &PushMessage) -> Self {
        Self {
            title: message.title.clone(),
            body: message.body.clone(),
            data: message.stringified_data(),
        }
    }
}

/// Multicast send. One result per token, in input order; `Err` holds the provider
/// error code.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &FcmMessage,
    ) -> Result<Vec<Result<(), String>>, PushError>;
}

#[derive(Clone)]
pub enum FcmBackend {
    Configured(Arc<dyn MessagingClient>),
    Unconfigured,
}

#[derive(Clone)]
pub struct FcmTransport {
    backend: FcmBackend,
}

impl FcmTransport {
    pub fn new(backend: FcmBackend) -> Self {
        Self { backend }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.backend, FcmBackend::Configured(_))
    }
}

#[async_trait]
impl PushTransport for FcmTransport {
    fn kind(&self) -> TokenKind {
        TokenKind::Fcm
    }

    #[instrument(skip(self, tokens, message), fields(tokens = tokens.len()))]
    async fn deliver(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<Vec<DeliveryStatus>, PushError> {
        let client = match &self.backend {
            FcmBackend::Configured(client) => client,
            FcmBackend::Unconfigured => {
                warn!(
                    tokens = tokens.len(),
                    "FCM is not configured, skipping native push tokens"
                );
                return Ok(tokens
                    .iter()
                    .map(|_| DeliveryStatus::Skipped {
                        reason: "fcm not configured".to_string(),
                    })
                    .collect());
            }
        };

        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let results = client
            .send_multicast(tokens, &FcmMessage::from(message))
            .await?;
        if results.len() != tokens.len() {
            return Err(PushError::UnexpectedResponse {
                status: 0,
                body: format!(
                    "messaging client returned {} results for {} tokens",
                    results.len(),
                    tokens.len()
                ),
            });
        }

        Ok(results
            .into_iter()
            .map(|result| match result {
                Ok(()) => DeliveryStatus::Delivered,
                Err(code) => DeliveryStatus::Failed {
                    dead: is_dead_token_error(&code),
                    error: code,
                },
            })
            .collect())
    }
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, PushError> {
        serde_json::from_str(raw)
            .map_err(|e| PushError::Credentials(format!("invalid service account JSON: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PushError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PushError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Clone, Debug)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// FCM HTTP v1 client authenticated with a service account.
pub struct FcmHttpClient {
    http: reqwest::Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    project_id: String,
    api_base: String,
    access_token: RwLock<Option<CachedToken>>,
}

impl FcmHttpClient {
    pub fn new(
        key: ServiceAccountKey,
        project_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PushError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let project_id = project_id.unwrap_or_else(|| key.project_id.clone());
        Ok(Self {
            http,
            key,
            encoding_key,
            project_id,
            api_base: FCM_API_BASE.to_string(),
            access_token: RwLock::new(None),
        })
    }

    pub fn from_credentials_file(
        path: impl AsRef<Path>,
        project_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PushError> {
        Self::new(ServiceAccountKey::from_file(path)?, project_id, timeout)
    }

    /// Points the client at another FCM host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.api_base, self.project_id
        )
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, PushError> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: FCM_SCOPE,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        Ok(encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Returns the cached access token, exchanging a fresh assertion shortly before
    /// the cached one expires.
    async fn access_token(&self) -> Result<String, PushError> {
        let now = Utc::now();
        if let Some(cached) = self.access_token.read().await.as_ref() {
            if cached.is_fresh(now) {
                return Ok(cached.value.clone());
            }
        }

        let mut slot = self.access_token.write().await;
        if let Some(cached) = slot.as_ref() {
            if cached.is_fresh(now) {
                return Ok(cached.value.clone());
            }
        }

        let assertion = self.signed_assertion(now)?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::UnexpectedResponse {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        debug!(expires_in = token.expires_in, "Obtained FCM access token");
        let cached = CachedToken {
            value: token.access_token,
            expires_at: now + ChronoDuration::seconds(token.expires_in),
        };
        let value = cached.value.clone();
        *slot = Some(cached);
        Ok(value)
    }

    async fn send_one(
        &self,
        access_token: &str,
        token: &str,
        message: &FcmMessage,
    ) -> Result<(), String> {
        let body = json!({
            "message": {
                "token": token,
                "notification": {"title": message.title, "body": message.body},
                "data": message.data,
                "android": {
                    "priority": "high",
                    "notification": {"channel_id": "default", "sound": "default"}
                },
                "apns": {"payload": {"aps": {"sound": "default", "badge": 1}}}
            }
        });

        let response = match self
            .http
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "FCM request failed");
                return Err("request-failed".to_string());
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(map_fcm_error(status.as_u16(), &text))
    }
}

#[async_trait]
impl MessagingClient for FcmHttpClient {
    #[instrument(skip(self, tokens, message), fields(tokens = tokens.len(), project_id = %self.project_id))]
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &FcmMessage,
    ) -> Result<Vec<Result<(), String>>, PushError> {
        let access_token = self.access_token().await?;
        let sends = tokens
            .iter()
            .map(|token| self.send_one(&access_token, token, message));
        Ok(join_all(sends).await)
    }
}

/// Maps an FCM v1 error response onto the provider's registration error codes.
pub fn map_fcm_error(status: u16, body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let detail_code = error
        .and_then(|e| e.get("details"))
        .and_then(|d| d.as_array())
        .and_then(|details| {
            details
                .iter()
                .find_map(|d| d.get("errorCode").and_then(|c| c.as_str()))
        });
    let status_code = error
        .and_then(|e| e.get("status"))
        .and_then(|s| s.as_str());
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match detail_code.or(status_code) {
        Some("UNREGISTERED") | Some("NOT_FOUND") => TOKEN_NOT_REGISTERED.to_string(),
        Some("INVALID_ARGUMENT") if message.contains("registration token") => {
            INVALID_REGISTRATION_TOKEN.to_string()
        }
        Some(code) => code.to_ascii_lowercase().replace('_', "-"),
        None => format!("http-{}", status),
    }
}
