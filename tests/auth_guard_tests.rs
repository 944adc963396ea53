// SPDX-License-Identifier: MIT

//! Auth guard tests: token extraction, verification, and identity loading.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use tower::ServiceExt;

mod common;

use common::read_json;

/// Hand-built JWT so tests can control expiry and subject.
fn make_jwt(sub: &str, exp_offset_secs: i64, secret: &[u8]) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
        jti: String,
    }

    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: sub.to_string(),
        iat: (now - 10) as usize,
        exp: (now + exp_offset_secs) as usize,
        jti: "test".to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .unwrap()
}

fn me_request() -> axum::http::request::Builder {
    Request::builder().method("GET").uri("/api/v1/users/me")
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(me_request().body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "unauthorized");
}

#[tokio::test]
async fn test_bearer_header_is_accepted() {
    let (app, _) = common::create_test_app();
    let (access, _) =
        common::register_and_login(&app, "alice", "alice@example.com", "hunter22").await;

    let response = app
        .oneshot(
            me_request()
                .header(header::AUTHORIZATION, format!("Bearer {access}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["data"]["username"], "alice");
}

#[tokio::test]
async fn test_cookie_is_accepted_and_takes_precedence() {
    let (app, _) = common::create_test_app();
    let (access, _) =
        common::register_and_login(&app, "bob", "bob@example.com", "hunter22").await;

    // Valid cookie plus a garbage Authorization header: the cookie wins.
    let response = app
        .clone()
        .oneshot(
            me_request()
                .header(header::COOKIE, format!("accessToken={access}"))
                .header(header::AUTHORIZATION, "Bearer garbage")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Garbage cookie plus a valid header: the cookie still wins, so 401.
    let response = app
        .oneshot(
            me_request()
                .header(header::COOKIE, "accessToken=garbage")
                .header(header::AUTHORIZATION, format!("Bearer {access}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_access_token_is_rejected() {
    let (app, state) = common::create_test_app();
    common::register_and_login(&app, "carol", "carol@example.com", "hunter22").await;

    let expired = make_jwt("carol", -3600, &state.config.access_token_secret);
    let response = app
        .oneshot(
            me_request()
                .header(header::AUTHORIZATION, format!("Bearer {expired}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_wrong_secret_is_rejected() {
    let (app, _) = common::create_test_app();
    common::register_and_login(&app, "dana", "dana@example.com", "hunter22").await;

    let forged = make_jwt("dana", 3600, b"some-other-secret");
    let response = app
        .oneshot(
            me_request()
                .header(header::AUTHORIZATION, format!("Bearer {forged}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_deleted_user_is_unauthorized() {
    let (app, state) = common::create_test_app();

    // Valid signature and expiry, but no such user exists.
    let ghost = make_jwt("ghost", 3600, &state.config.access_token_secret);
    let response = app
        .oneshot(
            me_request()
                .header(header::AUTHORIZATION, format!("Bearer {ghost}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
