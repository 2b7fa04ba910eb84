mod support;

use axum::body::Body;
use axum::http::{header::AUTHORIZATION, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use common_auth::{TokenCodec, TokenConfig};
use support::{admin_roles, diner_roles, franchisee_roles, test_app, token_for, TEST_SECRET};

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

fn with_json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = test_app();
    let response = app
        .router
        .oneshot(get("/healthz", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_endpoint_renders_counters() {
    let app = test_app();
    let response = app
        .router
        .oneshot(get("/metrics", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let text = std::str::from_utf8(&bytes).expect("utf8");
    assert!(text.contains("orders_created_total"));
}

#[tokio::test]
async fn me_requires_a_bearer_token() {
    let app = test_app();
    let response = app
        .router
        .oneshot(get("/api/user/me", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_the_token_identity() {
    let app = test_app();
    let token = token_for(&app.codec, 1, "bill", admin_roles());

    let response = app
        .router
        .oneshot(get("/api/user/me", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["name"], "bill");
    assert_eq!(body["id"], 1);
    assert_eq!(body["roles"][0]["role"], "admin");
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn issued_tokens_have_three_base64url_segments() {
    let app = test_app();
    let token = token_for(&app.codec, 1, "pizza diner", diner_roles());

    let segments: Vec<&str> = token.split('.').collect();
    assert_eq!(segments.len(), 3);
    for segment in segments {
        assert!(!segment.is_empty());
        assert!(segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}

#[tokio::test]
async fn anonymous_user_listing_is_unauthorized() {
    let app = test_app();
    let response = app
        .router
        .oneshot(get("/api/user", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn diner_cannot_create_a_franchise() {
    let app = test_app();
    let token = token_for(&app.codec, 4, "pizza diner", diner_roles());

    let request = with_json(
        "POST",
        "/api/franchise",
        Some(&token),
        json!({"name": "pizzaPocket", "admins": []}),
    );
    let response = app.router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn franchisee_scope_is_enforced_per_franchise() {
    let app = test_app();
    let token = token_for(&app.codec, 5, "franchise owner", franchisee_roles(1));

    // Scoped to franchise 1; creating a store under franchise 2 is denied
    // before any query runs.
    let request = with_json(
        "POST",
        "/api/franchise/2/store",
        Some(&token),
        json!({"name": "SLC"}),
    );
    let response = app.router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn diner_cannot_update_another_users_record() {
    let app = test_app();
    let token = token_for(&app.codec, 4, "pizza diner", diner_roles());

    let request = with_json(
        "PUT",
        "/api/user/9",
        Some(&token),
        json!({"name": "impostor"}),
    );
    let response = app.router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_revokes_the_token_and_stays_idempotent() {
    let app = test_app();
    let token = token_for(&app.codec, 4, "pizza diner", diner_roles());

    let first = app
        .router
        .clone()
        .oneshot(Request::builder()
            .method("DELETE")
            .uri("/api/auth")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request"))
        .await
        .expect("response");
    assert_eq!(first.status(), StatusCode::OK);
    let body = body_json(first).await;
    assert_eq!(body["message"], "logout successful");

    // Second logout with the same token: a no-op, not an error.
    let second = app
        .router
        .clone()
        .oneshot(Request::builder()
            .method("DELETE")
            .uri("/api/auth")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request"))
        .await
        .expect("response");
    assert_eq!(second.status(), StatusCode::OK);
    let body = body_json(second).await;
    assert_eq!(body["message"], "logout successful");

    // The revoked token no longer authenticates.
    let me = app
        .router
        .oneshot(get("/api/user/me", Some(&token)))
        .await
        .expect("response");
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let app = test_app();
    let stale_codec = TokenCodec::new(TokenConfig::new(TEST_SECRET).with_ttl(-10));
    let token = token_for(&stale_codec, 4, "pizza diner", diner_roles());

    let response = app
        .router
        .oneshot(get("/api/user/me", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let app = test_app();
    let foreign_codec = TokenCodec::new(TokenConfig::new("some other secret"));
    let token = token_for(&foreign_codec, 4, "pizza diner", diner_roles());

    let response = app
        .router
        .oneshot(get("/api/user/me", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_token_is_rejected_on_logout() {
    let app = test_app();
    let request = Request::builder()
        .method("DELETE")
        .uri("/api/auth")
        .header(AUTHORIZATION, "Bearer not.a.token")
        .body(Body::empty())
        .expect("request");
    let response = app.router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn diner_token_cannot_provision_roles_at_registration() {
    let app = test_app();
    let token = token_for(&app.codec, 4, "pizza diner", diner_roles());

    let request = with_json(
        "POST",
        "/api/auth",
        Some(&token),
        json!({
            "name": "new franchisee",
            "email": "newbie@test.com",
            "password": "a",
            "roles": [{"role": "franchisee", "objectId": 1}]
        }),
    );
    let response = app.router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn public_registration_cannot_claim_admin_roles() {
    let app = test_app();
    let request = with_json(
        "POST",
        "/api/auth",
        None,
        json!({
            "name": "sneaky",
            "email": "sneaky@test.com",
            "password": "a",
            "roles": [{"role": "admin"}]
        }),
    );
    let response = app.router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
