// SPDX-License-Identifier: MIT

//! Access-token authentication middleware.
//!
//! A pure authorization gate: extracts a bearer token (cookie first, then
//! the Authorization header), verifies it, resolves the user, and attaches
//! the sanitized identity to the request. No rotation, no side effects.

use crate::error::AppError;
use crate::models::UserProfile;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Authenticated caller, attached as a request extension by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Username (document ID) of the caller
    pub username: String,
    /// Sanitized profile resolved during authentication
    pub profile: UserProfile,
}

/// Middleware that requires a valid access token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Cookie takes precedence over the Authorization header.
    let token = if let Some(cookie) = jar.get("accessToken") {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
            _ => return Err(AppError::Unauthorized("unauthorized".to_string())),
        }
    };

    let claims = state.tokens.verify_access(&token)?;

    // The user may have been deleted after the token was issued; that is an
    // authorization failure from the caller's point of view, not a 404.
    let user = state
        .db
        .get_user(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid access token".to_string()))?;

    let current = CurrentUser {
        username: user.username.clone(),
        profile: user.profile(),
    };
    request.extensions_mut().insert(current);

    Ok(next.run(request).await)
}
