// SPDX-License-Identifier: MIT

//! Account use-cases: register, login, logout, refresh, password and
//! profile-asset updates.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{patch, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::CurrentUser;
use crate::models::User;
use crate::routes::ApiResponse;
use crate::services::UploadResult;
use crate::AppState;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/users/register", post(register))
        .route("/api/v1/users/login", post(login))
        .route("/api/v1/users/refresh-token", post(refresh_access_token))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/users/logout", post(logout))
        .route("/api/v1/users/update-password", patch(change_password))
        .route(
            "/api/v1/users/update-account-details",
            patch(update_account_details),
        )
        .route("/api/v1/users/update-avatar", patch(update_avatar))
        .route("/api/v1/users/update-cover", patch(update_cover))
}

// ─── Cookies ─────────────────────────────────────────────────

/// Build an auth cookie. HttpOnly always; Secure only in production.
fn auth_cookie(name: &'static str, value: String, production: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(production)
        .build()
}

/// Removal cookie with the same attributes plus Max-Age=0.
fn removal_cookie(name: &'static str, production: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(production)
        .max_age(time::Duration::ZERO)
        .build()
}

fn set_token_cookies(
    jar: CookieJar,
    access_token: &str,
    refresh_token: &str,
    production: bool,
) -> CookieJar {
    jar.add(auth_cookie("accessToken", access_token.to_string(), production))
        .add(auth_cookie(
            "refreshToken",
            refresh_token.to_string(),
            production,
        ))
}

// ─── Register ────────────────────────────────────────────────

/// Fields collected from the multipart registration form.
#[derive(Default)]
struct RegisterForm {
    fullname: String,
    email: String,
    username: String,
    password: String,
    avatar: Option<(String, Vec<u8>)>,
    cover_image: Option<(String, Vec<u8>)>,
}

async fn read_register_form(mut multipart: Multipart) -> Result<RegisterForm> {
    let mut form = RegisterForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(|n| n.to_string()) else {
            continue;
        };
        match name.as_str() {
            "fullname" | "email" | "username" | "password" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid field {name}: {e}")))?;
                match name.as_str() {
                    "fullname" => form.fullname = value,
                    "email" => form.email = value,
                    "username" => form.username = value,
                    _ => form.password = value,
                }
            }
            "avatar" | "coverImage" => {
                let filename = field
                    .file_name()
                    .unwrap_or("upload.bin")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid file {name}: {e}")))?
                    .to_vec();
                if name == "avatar" {
                    form.avatar = Some((filename, bytes));
                } else {
                    form.cover_image = Some((filename, bytes));
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// POST /api/v1/users/register (multipart)
///
/// Order matters: validation and the duplicate check run before any external
/// upload, and a post-upload failure deletes whatever was uploaded before
/// surfacing the error.
async fn register(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = read_register_form(multipart).await?;

    let fullname = form.fullname.trim().to_string();
    let email = form.email.trim().to_string();
    let username = form.username.trim().to_lowercase();

    // Emptiness is judged on the trimmed value, but the password is hashed
    // exactly as submitted so the same bytes verify at login.
    if fullname.is_empty()
        || email.is_empty()
        || username.is_empty()
        || form.password.trim().is_empty()
    {
        return Err(AppError::BadRequest("all fields are required".to_string()));
    }

    // Hash before any upload: every failure past this point is either before
    // the uploads or covered by the compensation branches below.
    let password_hash = crate::services::password::hash_password(&form.password)?;

    if state
        .db
        .find_user_by_username_or_email(&username, &email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("user already exists".to_string()));
    }

    let Some((avatar_name, avatar_bytes)) = form.avatar else {
        return Err(AppError::BadRequest("missing avatar file".to_string()));
    };

    let avatar = state.storage.upload(&avatar_name, avatar_bytes).await?;

    let cover: Option<UploadResult> = match form.cover_image {
        Some((cover_name, cover_bytes)) => {
            match state.storage.upload(&cover_name, cover_bytes).await {
                Ok(uploaded) => Some(uploaded),
                Err(e) => {
                    // The avatar is already out there; clean it up before
                    // surfacing the error.
                    state.storage.delete_best_effort(&avatar.handle).await;
                    return Err(e);
                }
            }
        }
        None => None,
    };

    let now = chrono::Utc::now().to_rfc3339();
    let user = User {
        username: username.clone(),
        email,
        fullname,
        password_hash,
        avatar_url: avatar.url.clone(),
        avatar_handle: avatar.handle.clone(),
        cover_image_url: cover.as_ref().map(|c| c.url.clone()),
        cover_image_handle: cover.as_ref().map(|c| c.handle.clone()),
        refresh_token: None,
        watch_history: vec![],
        created_at: now.clone(),
        updated_at: now,
    };

    if let Err(e) = state.db.create_user(&user).await {
        // Compensating action: the uploads succeeded but the record did not
        // become durable, so remove the assets (best effort).
        state.storage.delete_best_effort(&avatar.handle).await;
        if let Some(cover) = &cover {
            state.storage.delete_best_effort(&cover.handle).await;
        }
        return Err(e);
    }

    tracing::info!(username = %user.username, "User registered");

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        user.profile(),
        "user registered successfully",
    ))
}

// ─── Login / Logout / Refresh ────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

/// POST /api/v1/users/login
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(input): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let Some(email) = input.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) else {
        return Err(AppError::BadRequest("email is required".to_string()));
    };
    let username = input
        .username
        .as_deref()
        .map(|u| u.trim().to_lowercase())
        .unwrap_or_default();

    let user = state
        .db
        .find_user_by_username_or_email(&username, email)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    let valid = crate::services::password::verify_password(&input.password, &user.password_hash)?;
    if !valid {
        return Err(AppError::Unauthorized("invalid credentials".to_string()));
    }

    let pair = state.tokens.issue_pair(&state.db, &user.username).await?;

    tracing::info!(username = %user.username, "User logged in");

    let jar = set_token_cookies(
        jar,
        &pair.access_token,
        &pair.refresh_token,
        state.config.is_production(),
    );

    Ok((
        jar,
        ApiResponse::new(
            StatusCode::OK,
            json!({
                "user": user.profile(),
                "refreshToken": pair.refresh_token,
            }),
            "user logged in successfully",
        ),
    ))
}

/// POST /api/v1/users/logout
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    state.tokens.revoke(&state.db, &current.username).await?;

    let production = state.config.is_production();
    let jar = jar
        .add(removal_cookie("accessToken", production))
        .add(removal_cookie("refreshToken", production));

    Ok((
        jar,
        ApiResponse::new(StatusCode::OK, json!({}), "user logged out successfully"),
    ))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
}

/// POST /api/v1/users/refresh-token
///
/// Runs the rotation protocol: the presented token must verify and must
/// equal the user's stored slot; the slot is then swapped for a new token.
async fn refresh_access_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: std::result::Result<Json<RefreshRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<impl IntoResponse> {
    let presented = jar
        .get("refreshToken")
        .map(|c| c.value().to_string())
        .or_else(|| body.ok().and_then(|Json(b)| b.refresh_token))
        .ok_or_else(|| AppError::Unauthorized("refresh token is required".to_string()))?;

    let pair = state.tokens.rotate(&state.db, &presented).await?;

    let jar = set_token_cookies(
        jar,
        &pair.access_token,
        &pair.refresh_token,
        state.config.is_production(),
    );

    Ok((
        jar,
        ApiResponse::new(
            StatusCode::OK,
            pair,
            "access token refreshed successfully",
        ),
    ))
}

// ─── Password & account details ──────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// PATCH /api/v1/users/update-password
async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse> {
    if input.new_password.trim().is_empty() {
        return Err(AppError::BadRequest("new password is required".to_string()));
    }

    let mut user = state
        .db
        .get_user(&current.username)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    let valid =
        crate::services::password::verify_password(&input.old_password, &user.password_hash)?;
    if !valid {
        return Err(AppError::BadRequest("invalid old password".to_string()));
    }

    user.password_hash = crate::services::password::hash_password(&input.new_password)?;
    user.updated_at = chrono::Utc::now().to_rfc3339();
    state.db.upsert_user(&user).await?;

    Ok(ApiResponse::new(
        StatusCode::OK,
        json!({}),
        "password changed successfully",
    ))
}

#[derive(Deserialize)]
pub struct UpdateAccountRequest {
    pub fullname: String,
    pub email: String,
}

/// PATCH /api/v1/users/update-account-details
async fn update_account_details(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<UpdateAccountRequest>,
) -> Result<impl IntoResponse> {
    let fullname = input.fullname.trim();
    let email = input.email.trim();
    if fullname.is_empty() || email.is_empty() {
        return Err(AppError::BadRequest(
            "fullname and email are required".to_string(),
        ));
    }

    let mut user = state
        .db
        .get_user(&current.username)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    let previous_email = user.email.clone();
    user.fullname = fullname.to_string();
    user.email = email.to_string();
    user.updated_at = chrono::Utc::now().to_rfc3339();

    // Fails with `Conflict` if the new email belongs to someone else; the
    // uniqueness check and the write are atomic.
    state.db.update_user_account(&user, &previous_email).await?;

    Ok(ApiResponse::new(
        StatusCode::OK,
        user.profile(),
        "account details updated successfully",
    ))
}

// ─── Profile assets ──────────────────────────────────────────

async fn read_single_file(mut multipart: Multipart) -> Result<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload.bin").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("invalid file: {e}")))?
                .to_vec();
            return Ok((filename, bytes));
        }
    }
    Err(AppError::BadRequest("missing file".to_string()))
}

/// PATCH /api/v1/users/update-avatar
async fn update_avatar(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let (filename, bytes) = read_single_file(multipart).await?;
    let uploaded = state.storage.upload(&filename, bytes).await?;

    let mut user = state
        .db
        .get_user(&current.username)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    let previous_handle = std::mem::replace(&mut user.avatar_handle, uploaded.handle.clone());
    user.avatar_url = uploaded.url.clone();
    user.updated_at = chrono::Utc::now().to_rfc3339();

    if let Err(e) = state.db.upsert_user(&user).await {
        state.storage.delete_best_effort(&uploaded.handle).await;
        return Err(e);
    }

    // The record now points at the new asset; retire the old one.
    state.storage.delete_best_effort(&previous_handle).await;

    Ok(ApiResponse::new(
        StatusCode::OK,
        user.profile(),
        "avatar updated successfully",
    ))
}

/// PATCH /api/v1/users/update-cover
async fn update_cover(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let (filename, bytes) = read_single_file(multipart).await?;
    let uploaded = state.storage.upload(&filename, bytes).await?;

    let mut user = state
        .db
        .get_user(&current.username)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    let previous_handle = user.cover_image_handle.replace(uploaded.handle.clone());
    user.cover_image_url = Some(uploaded.url.clone());
    user.updated_at = chrono::Utc::now().to_rfc3339();

    if let Err(e) = state.db.upsert_user(&user).await {
        state.storage.delete_best_effort(&uploaded.handle).await;
        return Err(e);
    }

    if let Some(previous) = previous_handle {
        state.storage.delete_best_effort(&previous).await;
    }

    Ok(ApiResponse::new(
        StatusCode::OK,
        user.profile(),
        "cover image updated successfully",
    ))
}
