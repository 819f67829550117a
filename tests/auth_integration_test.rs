//! Login, bearer-token principals and account administration over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp, ADMIN_CODE, CUSTOMER_PASSWORD};
use serde_json::json;
use zajel_api::{
    auth::AuthService,
    models::{MainArea, UserType},
};

#[tokio::test]
async fn customer_login_returns_token_and_profile() {
    let app = TestApp::new().await;
    let (customer, _) = app.seed_customer("07700000301", MainArea::Tuwaisa).await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/customer/login",
            Some(json!({"phoneNumber": "07700000301", "password": CUSTOMER_PASSWORD})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["token_type"], json!("Bearer"));
    assert_eq!(body["data"]["customer"]["id"], json!(customer.id));
    assert!(body["data"]["customer"].get("password_hash").is_none());

    let token = body["data"]["token"].as_str().expect("token string").to_string();
    let profile = app
        .request(Method::GET, "/api/auth/customer/profile", None, Some(&token))
        .await;
    assert_eq!(profile.status(), StatusCode::OK);
    let profile = response_json(profile).await;
    assert_eq!(profile["data"]["phone_number"], json!("07700000301"));
}

#[tokio::test]
async fn wrong_password_and_unknown_phone_look_the_same() {
    let app = TestApp::new().await;
    app.seed_customer("07700000302", MainArea::Tuwaisa).await;

    for payload in [
        json!({"phone_number": "07700000302", "password": "nope"}),
        json!({"phone_number": "07799999999", "password": CUSTOMER_PASSWORD}),
    ] {
        let response = app
            .request(Method::POST, "/api/auth/customer/login", Some(payload), None)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response_json(response).await;
        assert_eq!(body["message"], json!("Unauthorized: invalid credentials"));
    }
}

#[tokio::test]
async fn suspended_customer_cannot_log_in_or_use_old_tokens() {
    let app = TestApp::new().await;
    let (customer, token) = app.seed_customer("07700000303", MainArea::Tuwaisa).await;
    let (_, admin_token) = app.seed_admin("ops-auth-1").await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/admin/customers/{}", customer.id),
            Some(json!({"status": "suspended"})),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let login = app
        .request(
            Method::POST,
            "/api/auth/customer/login",
            Some(json!({"phone_number": "07700000303", "password": CUSTOMER_PASSWORD})),
            None,
        )
        .await;
    assert_eq!(login.status(), StatusCode::FORBIDDEN);

    let profile = app
        .request(Method::GET, "/api/auth/customer/profile", None, Some(&token))
        .await;
    assert_eq!(profile.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_login_accepts_code_aliases_and_stamps_last_login() {
    let app = TestApp::new().await;
    let (admin, _) = app.seed_admin("ops-auth-2").await;
    assert!(admin.last_login.is_none());

    let response = app
        .request(
            Method::POST,
            "/api/auth/admin/login",
            Some(json!({"adminId": "ops-auth-2", "secretCode": ADMIN_CODE})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["admin"]["admin_id"], json!("ops-auth-2"));
    assert!(app.reload_admin(admin.id).await.last_login.is_some());

    let wrong = app
        .request(
            Method::POST,
            "/api/auth/admin/login",
            Some(json!({"admin_id": "ops-auth-2", "adminCode": "0000"})),
            None,
        )
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivated_admin_is_locked_out() {
    let app = TestApp::new().await;
    let (_, root_token) = app.seed_admin("ops-root").await;
    let (other, other_token) = app.seed_admin("ops-auth-3").await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/admin/admins/{}", other.id),
            Some(json!({"isActive": false})),
            Some(&root_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let login = app
        .request(
            Method::POST,
            "/api/auth/admin/login",
            Some(json!({"admin_id": "ops-auth-3", "code": ADMIN_CODE})),
            None,
        )
        .await;
    assert_eq!(login.status(), StatusCode::UNAUTHORIZED);

    let listing = app
        .request(Method::GET, "/api/admin/orders", None, Some(&other_token))
        .await;
    assert_eq!(listing.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn principals_are_not_interchangeable() {
    let app = TestApp::new().await;
    let (_, customer_token) = app.seed_customer("07700000304", MainArea::Tuwaisa).await;
    let (_, admin_token) = app.seed_admin("ops-auth-4").await;

    let as_customer = app
        .request(Method::GET, "/api/admin/orders", None, Some(&customer_token))
        .await;
    assert_eq!(as_customer.status(), StatusCode::FORBIDDEN);

    let as_admin = app
        .request(Method::GET, "/api/orders/my-orders", None, Some(&admin_token))
        .await;
    assert_eq!(as_admin.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_malformed_and_foreign_tokens_are_unauthorized() {
    let app = TestApp::new().await;
    let (customer, _) = app.seed_customer("07700000305", MainArea::Tuwaisa).await;

    let missing = app
        .request(Method::GET, "/api/orders/my-orders", None, None)
        .await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let garbage = app
        .request(Method::GET, "/api/orders/my-orders", None, Some("not.a.jwt"))
        .await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);

    let foreign = AuthService::new(
        "another-secret-entirely-0123456789",
        std::time::Duration::from_secs(3600),
    )
    .issue_token(customer.id, UserType::Customer)
    .unwrap();
    let response = app
        .request(Method::GET, "/api/orders/my-orders", None, Some(&foreign.token))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_accounts_are_rejected() {
    let app = TestApp::new().await;
    let (_, admin_token) = app.seed_admin("ops-auth-5").await;
    app.seed_customer("07700000306", MainArea::Tuwaisa).await;

    let customer = app
        .request(
            Method::POST,
            "/api/admin/customers",
            Some(json!({
                "storeName": "Second store",
                "phoneNumber": "07700000306",
                "password": "abcd",
                "area": "tuwaisa",
            })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(customer.status(), StatusCode::BAD_REQUEST);
    let body = response_json(customer).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("phone number already exists"));

    let admin = app
        .request(
            Method::POST,
            "/api/admin/admins",
            Some(json!({"admin_id": "ops-auth-5", "code": "1234", "name": "Dup"})),
            Some(&admin_token),
        )
        .await;
    assert_eq!(admin.status(), StatusCode::BAD_REQUEST);
    let body = response_json(admin).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("admin id already exists"));
}

#[tokio::test]
async fn admin_creates_customer_with_arabic_area_name() {
    let app = TestApp::new().await;
    let (admin, admin_token) = app.seed_admin("ops-auth-6").await;

    let response = app
        .request(
            Method::POST,
            "/api/admin/customers",
            Some(json!({
                "store_name": "Basra Sweets",
                "phone_number": "07700000307",
                "password": "abcd",
                "area": "الجبيلة",
            })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["area"], json!("al_jubaila"));
    assert_eq!(body["data"]["status"], json!("active"));

    let id = body["data"]["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(app.reload_customer(id).await.created_by, Some(admin.id));
}

#[tokio::test]
async fn admin_fetches_a_single_customer() {
    let app = TestApp::new().await;
    let (customer, customer_token) = app.seed_customer("07700000311", MainArea::AlJubaila).await;
    let (_, admin_token) = app.seed_admin("ops-auth-9").await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/admin/customers/{}", customer.id),
            None,
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["id"], json!(customer.id));
    assert_eq!(body["data"]["phone_number"], json!("07700000311"));
    assert!(body["data"].get("password_hash").is_none());

    let missing = app
        .request(
            Method::GET,
            &format!("/api/admin/customers/{}", uuid::Uuid::new_v4()),
            None,
            Some(&admin_token),
        )
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let as_customer = app
        .request(
            Method::GET,
            &format!("/api/admin/customers/{}", customer.id),
            None,
            Some(&customer_token),
        )
        .await;
    assert_eq!(as_customer.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn short_password_is_a_validation_error() {
    let app = TestApp::new().await;
    let (customer, _) = app.seed_customer("07700000308", MainArea::Tuwaisa).await;
    let (_, admin_token) = app.seed_admin("ops-auth-7").await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/admin/customers/{}/password", customer.id),
            Some(json!({"password": "abc"})),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/admin/customers/{}/password", customer.id),
            Some(json!({"password": "fresh-pass"})),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let login = app
        .request(
            Method::POST,
            "/api/auth/customer/login",
            Some(json!({"phone_number": "07700000308", "password": "fresh-pass"})),
            None,
        )
        .await;
    assert_eq!(login.status(), StatusCode::OK);
}

#[tokio::test]
async fn account_edits_refresh_updated_at() {
    let app = TestApp::new().await;
    let (customer, _) = app.seed_customer("07700000312", MainArea::Tuwaisa).await;
    let (admin, admin_token) = app.seed_admin("ops-auth-10").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/admin/customers/{}/password", customer.id),
            Some(json!({"password": "another-pass"})),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let after_password = app.reload_customer(customer.id).await.updated_at;
    assert!(after_password > customer.updated_at);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let response = app
        .request(
            Method::PUT,
            &format!("/api/admin/customers/{}", customer.id),
            Some(json!({"storeName": "Renamed store"})),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.reload_customer(customer.id).await.updated_at > after_password);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/admin/admins/{}", admin.id),
            Some(json!({"name": "Night shift"})),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.reload_admin(admin.id).await.updated_at > admin.updated_at);
}

#[tokio::test]
async fn deleting_a_customer_removes_their_orders() {
    let app = TestApp::new().await;
    let (customer, customer_token) = app.seed_customer("07700000309", MainArea::OtherBasra).await;
    let (_, admin_token) = app.seed_admin("ops-auth-8").await;

    for _ in 0..2 {
        let response = app
            .request(
                Method::POST,
                "/api/orders",
                Some(json!({
                    "items": [{"name": "Bread", "quantity": 2, "price": 1}],
                    "deliveryAddress": "Street 1",
                    "subArea": "Anywhere",
                    "clientPhone": "07811111111",
                    "deliveryFee": 3,
                })),
                Some(&customer_token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/admin/customers/{}", customer.id),
            None,
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["deleted_orders"], json!(2));

    let again = app
        .request(
            Method::DELETE,
            &format!("/api/admin/customers/{}", customer.id),
            None,
            Some(&admin_token),
        )
        .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    // a token for a deleted account no longer resolves
    let stale = app
        .request(Method::GET, "/api/orders/my-orders", None, Some(&customer_token))
        .await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn push_token_registration_trims_and_rejects_blank() {
    let app = TestApp::new().await;
    let (customer, token) = app.seed_customer("07700000310", MainArea::Tuwaisa).await;

    let blank = app
        .request(
            Method::POST,
            "/api/customers/push-token",
            Some(json!({"pushToken": "   "})),
            Some(&token),
        )
        .await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    assert!(app.reload_customer(customer.id).await.push_token.is_none());

    let ok = app
        .request(
            Method::POST,
            "/api/customers/push-token",
            Some(json!({"token": "  ExponentPushToken[abc]  "})),
            Some(&token),
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(
        app.reload_customer(customer.id).await.push_token.as_deref(),
        Some("ExponentPushToken[abc]")
    );
}
