// SPDX-License-Identifier: MIT

//! Shared helpers for router-level integration tests.

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;
use vidtube::config::Config;
use vidtube::db::FirestoreDb;
use vidtube::routes::create_router;
use vidtube::services::{MediaStorage, TokenService};
use vidtube::AppState;

pub const BOUNDARY: &str = "vidtube-test-boundary";

/// Create a test app with the in-memory database and recording mock storage.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = FirestoreDb::new_mem();
    let storage = MediaStorage::new_mock();
    let tokens = TokenService::new(&config);

    let state = Arc::new(AppState {
        config,
        db,
        storage,
        tokens,
    });

    (create_router(state.clone()), state)
}

/// Build a multipart/form-data body from text fields and file parts.
#[allow(dead_code)]
pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    for (name, filename, bytes) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Registration request with an avatar for `username`.
#[allow(dead_code)]
pub fn register_request(username: &str, email: &str, password: &str) -> Request<Body> {
    let body = multipart_body(
        &[
            ("fullname", &format!("{username} fullname")),
            ("email", email),
            ("username", username),
            ("password", password),
        ],
        &[("avatar", &format!("{username}.png"), b"fake image bytes")],
    );
    Request::builder()
        .method("POST")
        .uri("/api/v1/users/register")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// JSON POST request.
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

/// Read a JSON response body.
#[allow(dead_code)]
pub async fn read_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// All Set-Cookie header values of a response.
#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// The full Set-Cookie line for `name`, panicking if absent.
#[allow(dead_code)]
pub fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}

/// The bare value of cookie `name` from a response.
#[allow(dead_code)]
pub fn cookie_value(response: &Response<Body>, name: &str) -> String {
    let line = find_cookie(&set_cookie_headers(response), name);
    line.split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, v)| v.to_string())
        .unwrap()
}

/// Register a user and log them in; returns (access token, refresh token).
#[allow(dead_code)]
pub async fn register_and_login(
    app: &axum::Router,
    username: &str,
    email: &str,
    password: &str,
) -> (String, String) {
    let response = app
        .clone()
        .oneshot(register_request(username, email, password))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/users/login",
            serde_json::json!({ "email": email, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let access = cookie_value(&response, "accessToken");
    let refresh = cookie_value(&response, "refreshToken");
    (access, refresh)
}
