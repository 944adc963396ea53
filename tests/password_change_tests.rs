// SPDX-License-Identifier: MIT

//! Change-password flow tests.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{json_request, read_json};

fn change_password_request(access: &str, old: &str, new: &str) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri("/api/v1/users/update-password")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, format!("accessToken={access}"))
        .body(Body::from(
            serde_json::to_vec(&json!({ "oldPassword": old, "newPassword": new })).unwrap(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_wrong_old_password_is_bad_request() {
    let (app, _) = common::create_test_app();
    let (access, _) =
        common::register_and_login(&app, "alice", "alice@example.com", "hunter22").await;

    let response = app
        .clone()
        .oneshot(change_password_request(&access, "not-the-password", "newpass99"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["message"], "invalid old password");

    // The old password still works.
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/users/login",
            json!({ "email": "alice@example.com", "password": "hunter22" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_successful_change_swaps_which_password_verifies() {
    let (app, _) = common::create_test_app();
    let (access, _) =
        common::register_and_login(&app, "bob", "bob@example.com", "hunter22").await;

    let response = app
        .clone()
        .oneshot(change_password_request(&access, "hunter22", "newpass99"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // New password verifies.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/users/login",
            json!({ "email": "bob@example.com", "password": "newpass99" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Old password no longer does.
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/users/login",
            json!({ "email": "bob@example.com", "password": "hunter22" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["message"], "invalid credentials");
}

#[tokio::test]
async fn test_new_password_keeps_surrounding_whitespace() {
    let (app, _) = common::create_test_app();
    let (access, _) =
        common::register_and_login(&app, "dana", "dana@example.com", "hunter22").await;

    let response = app
        .clone()
        .oneshot(change_password_request(&access, "hunter22", " newpass99 "))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The password verifies only with the exact submitted bytes.
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/users/login",
            json!({ "email": "dana@example.com", "password": " newpass99 " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_empty_new_password_is_bad_request() {
    let (app, _) = common::create_test_app();
    let (access, _) =
        common::register_and_login(&app, "carol", "carol@example.com", "hunter22").await;

    let response = app
        .oneshot(change_password_request(&access, "hunter22", "   "))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_change_password_requires_auth() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(json_request(
            "PATCH",
            "/api/v1/users/update-password",
            json!({ "oldPassword": "a", "newPassword": "b" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
