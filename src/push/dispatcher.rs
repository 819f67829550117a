use super::{
    classify, DeliveryStatus, DispatchResult, PushMessage, PushTokenStore, PushTransport,
    TokenKind, TokenOutcome,
};
use futures::future::join_all;
use metrics::counter;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Fans a message out to classified tokens through one transport per token kind.
#[derive(Clone, Default)]
pub struct PushDispatcher {
    transports: HashMap<TokenKind, Arc<dyn PushTransport>>,
    token_store: Option<Arc<dyn PushTokenStore>>,
}

struct Pending {
    index: usize,
    normalized: String,
}

impl PushDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `transport` for the kind it reports, replacing any previous one.
    pub fn with_transport(mut self, transport: Arc<dyn PushTransport>) -> Self {
        self.transports.insert(transport.kind(), transport);
        self
    }

    pub fn with_token_store(mut self, store: Arc<dyn PushTokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Delivers `message` to every token. Channel failures become per-token failures;
    /// nothing here returns an error to the caller.
    #[instrument(skip(self, tokens, message), fields(tokens = tokens.len(), title = %message.title))]
    pub async fn send(&self, tokens: &[String], message: &PushMessage) -> DispatchResult {
        if tokens.is_empty() {
            return DispatchResult::default();
        }

        let mut outcomes: Vec<TokenOutcome> = Vec::with_capacity(tokens.len());
        let mut groups: HashMap<TokenKind, Vec<Pending>> = HashMap::new();

        for (index, raw) in tokens.iter().enumerate() {
            let classified = classify(raw);
            let status = match classified.kind {
                TokenKind::Invalid => DeliveryStatus::Failed {
                    error: "invalid push token".to_string(),
                    dead: true,
                },
                kind => {
                    groups.entry(kind).or_default().push(Pending {
                        index,
                        normalized: classified.normalized,
                    });
                    DeliveryStatus::Skipped {
                        reason: format!("no {} transport registered", kind),
                    }
                }
            };
            outcomes.push(TokenOutcome {
                token: raw.clone(),
                kind: classified.kind,
                status,
            });
        }

        let deliveries = groups.iter().filter_map(|(kind, pending)| {
            let transport = self.transports.get(kind)?.clone();
            let normalized: Vec<String> = pending.iter().map(|p| p.normalized.clone()).collect();
            Some(async move {
                let result = transport.deliver(&normalized, message).await;
                (*kind, result)
            })
        });

        for (kind, result) in join_all(deliveries).await {
            let pending = &groups[&kind];
            let statuses = match result {
                Ok(statuses) if statuses.len() == pending.len() => statuses,
                Ok(statuses) => {
                    error!(
                        channel = %kind,
                        expected = pending.len(),
                        got = statuses.len(),
                        "Push transport returned misaligned results"
                    );
                    vec![
                        DeliveryStatus::Failed {
                            error: "transport returned misaligned results".to_string(),
                            dead: false,
                        };
                        pending.len()
                    ]
                }
                Err(e) => {
                    warn!(channel = %kind, error = %e, "Push channel failed");
                    vec![
                        DeliveryStatus::Failed {
                            error: e.to_string(),
                            dead: false,
                        };
                        pending.len()
                    ]
                }
            };
            for (p, status) in pending.iter().zip(statuses) {
                outcomes[p.index].status = status;
            }
        }

        let mut result = DispatchResult {
            outcomes,
            ..Default::default()
        };
        for outcome in &result.outcomes {
            match outcome.status {
                DeliveryStatus::Delivered => result.success_count += 1,
                DeliveryStatus::Failed { .. } => result.failure_count += 1,
                DeliveryStatus::Skipped { .. } => {}
            }
        }

        counter!("zajel_push.sent", result.success_count as u64);
        counter!("zajel_push.failed", result.failure_count as u64);

        self.cleanup_dead_tokens(&result).await;

        debug!(
            success = result.success_count,
            failure = result.failure_count,
            "Push dispatch finished"
        );
        result
    }

    /// Both the raw and the normalized form are cleared, since either may be stored.
    async fn cleanup_dead_tokens(&self, result: &DispatchResult) {
        let dead: BTreeSet<String> = result
            .dead_tokens()
            .flat_map(|o| {
                let normalized = classify(&o.token).normalized;
                [o.token.clone(), normalized]
            })
            .filter(|t| !t.is_empty())
            .collect();
        if dead.is_empty() {
            return;
        }
        counter!("zajel_push.dead_tokens", result.dead_tokens().count() as u64);

        let Some(store) = &self.token_store else {
            debug!(count = dead.len(), "No token store registered, dead tokens kept");
            return;
        };
        let dead: Vec<String> = dead.into_iter().collect();
        if let Err(e) = store.clear_tokens(&dead).await {
            error!(error = %e, "Failed to clear dead push tokens");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use crate::push::token_store::MockPushTokenStore;
    use crate::push::{FcmBackend, FcmTransport, PushError};
    use async_trait::async_trait;

    const FCM_A: &str = "fcmAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const FCM_B: &str = "fcmBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
    const EXPO: &str = "ExponentPushToken[abc123]";

    /// Answers from a fixed table keyed by token.
    struct ScriptedTransport {
        kind: TokenKind,
        fail_channel: bool,
        dead: Vec<&'static str>,
    }

    #[async_trait]
    impl PushTransport for ScriptedTransport {
        fn kind(&self) -> TokenKind {
            self.kind
        }

        async fn deliver(
            &self,
            tokens: &[String],
            _message: &PushMessage,
        ) -> Result<Vec<DeliveryStatus>, PushError> {
            if self.fail_channel {
                return Err(PushError::UnexpectedResponse {
                    status: 503,
                    body: "down".into(),
                });
            }
            Ok(tokens
                .iter()
                .map(|t| {
                    if self.dead.contains(&t.as_str()) {
                        DeliveryStatus::Failed {
                            error: "registration-token-not-registered".into(),
                            dead: true,
                        }
                    } else {
                        DeliveryStatus::Delivered
                    }
                })
                .collect())
        }
    }

    fn transport(kind: TokenKind, fail_channel: bool, dead: Vec<&'static str>) -> Arc<dyn PushTransport> {
        Arc::new(ScriptedTransport {
            kind,
            fail_channel,
            dead,
        })
    }

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_input_does_no_io() {
        let mut store = MockPushTokenStore::new();
        store.expect_clear_tokens().times(0);
        let dispatcher = PushDispatcher::new()
            .with_transport(transport(TokenKind::Expo, true, vec![]))
            .with_token_store(Arc::new(store));

        let result = dispatcher.send(&[], &PushMessage::new("t", "b")).await;
        assert_eq!(result, DispatchResult::default());
    }

    #[tokio::test]
    async fn mixed_tokens_are_counted_and_dead_ones_cleared() {
        let mut store = MockPushTokenStore::new();
        store
            .expect_clear_tokens()
            .withf(|dead: &[String]| {
                dead.contains(&FCM_B.to_string())
                    && dead.contains(&"prefix:garbage".to_string())
                    && dead.contains(&"garbage".to_string())
                    && !dead.contains(&FCM_A.to_string())
            })
            .times(1)
            .returning(|dead| Ok(dead.len() as u64));

        let dispatcher = PushDispatcher::new()
            .with_transport(transport(TokenKind::Expo, false, vec![]))
            .with_transport(transport(TokenKind::Fcm, false, vec![FCM_B]))
            .with_token_store(Arc::new(store));

        let result = dispatcher
            .send(
                &tokens(&[EXPO, FCM_A, FCM_B, "prefix:garbage"]),
                &PushMessage::new("t", "b"),
            )
            .await;

        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 2);
        assert_eq!(result.outcomes[0].kind, TokenKind::Expo);
        assert_eq!(result.outcomes[3].kind, TokenKind::Invalid);
        assert_eq!(result.outcomes[3].token, "prefix:garbage");
        assert_eq!(result.dead_tokens().count(), 2);
    }

    #[tokio::test]
    async fn failing_channel_does_not_block_the_other() {
        let mut store = MockPushTokenStore::new();
        store.expect_clear_tokens().times(0);
        let dispatcher = PushDispatcher::new()
            .with_transport(transport(TokenKind::Expo, true, vec![]))
            .with_transport(transport(TokenKind::Fcm, false, vec![]))
            .with_token_store(Arc::new(store));

        let result = dispatcher
            .send(&tokens(&[EXPO, FCM_A]), &PushMessage::new("t", "b"))
            .await;

        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count, 1);
        assert!(matches!(
            result.outcomes[0].status,
            DeliveryStatus::Failed { dead: false, .. }
        ));
        assert_eq!(result.outcomes[1].status, DeliveryStatus::Delivered);
    }

    #[tokio::test]
    async fn unconfigured_fcm_counts_neither_way() {
        let mut store = MockPushTokenStore::new();
        store.expect_clear_tokens().times(0);
        let dispatcher = PushDispatcher::new()
            .with_transport(Arc::new(FcmTransport::new(FcmBackend::Unconfigured)))
            .with_token_store(Arc::new(store));

        let result = dispatcher
            .send(&tokens(&[FCM_A]), &PushMessage::new("t", "b"))
            .await;

        assert_eq!(result.success_count, 0);
        assert_eq!(result.failure_count, 0);
        assert!(matches!(
            result.outcomes[0].status,
            DeliveryStatus::Skipped { .. }
        ));
    }

    #[tokio::test]
    async fn cleanup_errors_are_swallowed() {
        let mut store = MockPushTokenStore::new();
        store
            .expect_clear_tokens()
            .times(1)
            .returning(|_| Err(ServiceError::InternalError("db down".into())));
        let dispatcher = PushDispatcher::new().with_token_store(Arc::new(store));

        let result = dispatcher
            .send(&tokens(&["not a token"]), &PushMessage::new("t", "b"))
            .await;
        assert_eq!(result.failure_count, 1);
    }

    #[tokio::test]
    async fn normalized_form_is_delivered_and_raw_reported() {
        let dispatcher =
            PushDispatcher::new().with_transport(transport(TokenKind::Fcm, false, vec![FCM_A]));
        let raw = format!("zajel:{}", FCM_A);

        let result = dispatcher
            .send(&[raw.clone()], &PushMessage::new("t", "b"))
            .await;
        assert_eq!(result.outcomes[0].token, raw);
        assert!(result.outcomes[0].status.is_dead());
    }
}
