//! Expo and FCM transports against mock HTTP endpoints, plus dead-token cleanup in
//! the principal tables.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{expo_token, fcm_token, TestApp, TransportBehavior};
use serde_json::{json, Value};
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};
use zajel_api::{
    config::PushConfig,
    models::{MainArea, NotificationRecipient},
    services::notifications::TestPushRequest,
    push::{
        build_dispatcher,
        classifier::TokenKind,
        dispatcher::PushDispatcher,
        expo::ExpoTransport,
        fcm::{FcmBackend, FcmHttpClient, FcmTransport, ServiceAccountKey, TOKEN_NOT_REGISTERED},
        DeliveryStatus, PushMessage, PushTransport,
    },
};

const TEST_KEY_PEM: &str = include_str!("fixtures/fcm_test_key.pem");

fn service_account(token_uri: &str) -> ServiceAccountKey {
    ServiceAccountKey::from_json(
        &json!({
            "type": "service_account",
            "project_id": "zajel-test",
            "private_key": TEST_KEY_PEM,
            "client_email": "push@zajel-test.iam.gserviceaccount.com",
            "token_uri": token_uri,
        })
        .to_string(),
    )
    .expect("service account parses")
}

#[tokio::test]
async fn expo_batch_is_posted_in_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/--/api/v2/push/send"))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"status": "ok", "id": "a"}, {"status": "ok", "id": "b"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = ExpoTransport::new(
        format!("{}/--/api/v2/push/send", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap();
    let tokens = vec![expo_token("a"), expo_token("b")];
    let message = PushMessage::new("🔔 New order!", "body").with_data("orderId", "42");

    let statuses = transport.deliver(&tokens, &message).await.unwrap();
    assert_eq!(statuses, vec![DeliveryStatus::Delivered; 2]);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let payload: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let batch = payload.as_array().expect("array body");
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0]["to"], json!(expo_token("a")));
    assert_eq!(batch[0]["title"], json!("🔔 New order!"));
    assert_eq!(batch[0]["data"]["orderId"], json!("42"));
    assert_eq!(batch[0]["sound"], json!("default"));
    assert_eq!(batch[0]["priority"], json!("high"));
    assert_eq!(batch[0]["channelId"], json!("default"));
    assert_eq!(batch[0]["android"]["channelId"], json!("default"));
    assert_eq!(batch[0]["apns"]["payload"]["aps"]["badge"], json!(1));
}

#[tokio::test]
async fn expo_rejection_fails_every_token_but_not_the_caller() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let transport = ExpoTransport::new(server.uri(), Duration::from_secs(5)).unwrap();
    let dispatcher = PushDispatcher::new().with_transport(Arc::new(transport));
    let tokens = vec![expo_token("a"), expo_token("b")];

    let result = dispatcher
        .send(&tokens, &PushMessage::new("t", "b"))
        .await;
    assert_eq!(result.success_count, 0);
    assert_eq!(result.failure_count, 2);
    assert!(result.dead_tokens().next().is_none());
}

#[tokio::test]
async fn fcm_client_exchanges_assertion_and_maps_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.test-token",
            "expires_in": 3600,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let good = fcm_token("good");
    let gone = fcm_token("gone");
    Mock::given(method("POST"))
        .and(path("/v1/projects/zajel-test/messages:send"))
        .and(header("authorization", "Bearer ya29.test-token"))
        .and(body_string_contains(good.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/zajel-test/messages/1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/projects/zajel-test/messages:send"))
        .and(body_string_contains(gone.as_str()))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND",
                "details": [{
                    "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                    "errorCode": "UNREGISTERED"
                }]
            }
        })))
        .mount(&server)
        .await;

    let client = FcmHttpClient::new(
        service_account(&format!("{}/token", server.uri())),
        None,
        Duration::from_secs(5),
    )
    .unwrap()
    .with_api_base(server.uri());
    assert_eq!(client.project_id(), "zajel-test");

    let transport = FcmTransport::new(FcmBackend::Configured(Arc::new(client)));
    let message = PushMessage::new("title", "body").with_data("count", 3);

    // Two sends share one cached access token.
    for _ in 0..2 {
        let statuses = transport
            .deliver(&[good.clone(), gone.clone()], &message)
            .await
            .unwrap();
        assert_eq!(statuses[0], DeliveryStatus::Delivered);
        assert_eq!(
            statuses[1],
            DeliveryStatus::Failed {
                error: TOKEN_NOT_REGISTERED.to_string(),
                dead: true,
            }
        );
    }
}

#[tokio::test]
async fn fcm_token_endpoint_failure_fails_the_channel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let client = FcmHttpClient::new(
        service_account(&format!("{}/token", server.uri())),
        Some("override-project".to_string()),
        Duration::from_secs(5),
    )
    .unwrap()
    .with_api_base(server.uri());
    assert_eq!(client.project_id(), "override-project");

    let dispatcher = PushDispatcher::new().with_transport(Arc::new(FcmTransport::new(
        FcmBackend::Configured(Arc::new(client)),
    )));
    let result = dispatcher
        .send(&[fcm_token("x")], &PushMessage::new("t", "b"))
        .await;
    assert_eq!(result.failure_count, 1);
    assert!(!result.outcomes[0].status.is_dead());
}

#[tokio::test]
async fn missing_fcm_credentials_leave_expo_working() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"status": "ok"}]})))
        .mount(&server)
        .await;

    let config = PushConfig {
        expo_endpoint: server.uri(),
        fcm_credentials_path: Some("/nonexistent/service-account.json".to_string()),
        ..PushConfig::default()
    };
    let dispatcher = build_dispatcher(&config, None).expect("dispatcher builds");

    let result = dispatcher
        .send(&[expo_token("a"), fcm_token("b")], &PushMessage::new("t", "b"))
        .await;
    assert_eq!(result.success_count, 1);
    assert_eq!(result.outcomes[0].kind, TokenKind::Expo);
    assert_eq!(result.outcomes[0].status, DeliveryStatus::Delivered);
    assert_eq!(result.outcomes[1].kind, TokenKind::Fcm);
    assert!(matches!(
        result.outcomes[1].status,
        DeliveryStatus::Skipped { .. }
    ));
}

#[tokio::test]
async fn unregistered_tokens_are_cleared_from_their_holders_only() {
    let app = TestApp::new().await;
    let (stale_customer, _) = app.seed_customer("07700000101", MainArea::Tuwaisa).await;
    let (live_customer, _) = app.seed_customer("07700000102", MainArea::Tuwaisa).await;
    let (stale_admin, _) = app.seed_admin("ops-stale").await;

    let stale = fcm_token("stale");
    let live = fcm_token("live");
    let customers = &app.services().customers;
    customers
        .register_push_token(stale_customer.id, &stale)
        .await
        .unwrap();
    customers
        .register_push_token(live_customer.id, &live)
        .await
        .unwrap();
    app.services()
        .admins
        .register_push_token(stale_admin.id, &format!("  {}  ", stale))
        .await
        .unwrap();

    app.fcm
        .set_behavior(TransportBehavior::Unregistered(vec![stale.clone()]));

    let result = app
        .services()
        .notifications
        .send_test_push(TestPushRequest {
            recipient: Some(NotificationRecipient::Customer),
            customer_id: Some(stale_customer.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(result.failure_count, 1);
    assert_eq!(result.dead_tokens().count(), 1);

    assert_eq!(app.reload_customer(stale_customer.id).await.push_token, None);
    assert_eq!(app.reload_admin(stale_admin.id).await.push_token, None);
    assert_eq!(
        app.reload_customer(live_customer.id).await.push_token,
        Some(live)
    );
}
