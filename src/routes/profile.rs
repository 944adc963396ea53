// SPDX-License-Identifier: MIT

//! Read-only profile queries: current user, channel profile, watch history.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::CurrentUser;
use crate::models::video::OwnerProjection;
use crate::models::WatchHistoryEntry;
use crate::routes::ApiResponse;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/users/me", get(get_me))
        .route(
            "/api/v1/users/channel-profile/{username}",
            get(get_channel_profile),
        )
        .route("/api/v1/users/watch-history", get(get_watch_history))
}

/// GET /api/v1/users/me
async fn get_me(Extension(current): Extension<CurrentUser>) -> Result<impl IntoResponse> {
    Ok(ApiResponse::new(
        StatusCode::OK,
        current.profile,
        "current user fetched successfully",
    ))
}

/// Channel profile with social-graph aggregates.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub username: String,
    pub fullname: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
    pub subscriber_count: u64,
    pub channels_subscribed_to_count: u64,
    pub is_subscribed: bool,
}

/// GET /api/v1/users/channel-profile/{username}
async fn get_channel_profile(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(AppError::BadRequest("username is required".to_string()));
    }

    let channel = state
        .db
        .get_user(&username)
        .await?
        .ok_or_else(|| AppError::NotFound("channel not found".to_string()))?;

    let subscriber_count = state.db.subscriber_count(&channel.username).await?;
    let channels_subscribed_to_count =
        state.db.subscribed_to_count(&channel.username).await?;
    let is_subscribed = state
        .db
        .is_subscribed(&current.username, &channel.username)
        .await?;

    Ok(ApiResponse::new(
        StatusCode::OK,
        ChannelProfile {
            username: channel.username,
            fullname: channel.fullname,
            avatar_url: channel.avatar_url,
            cover_image_url: channel.cover_image_url,
            subscriber_count,
            channels_subscribed_to_count,
            is_subscribed,
        },
        "channel profile fetched successfully",
    ))
}

/// GET /api/v1/users/watch-history
///
/// Joins the user's ordered video references with the video documents and a
/// denormalized projection of each owner.
async fn get_watch_history(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let user = state
        .db
        .get_user(&current.username)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    let videos = state.db.get_videos_by_ids(&user.watch_history).await?;

    // Resolve each distinct owner once.
    let mut owners: HashMap<String, OwnerProjection> = HashMap::new();
    let mut history = Vec::with_capacity(videos.len());
    for video in videos {
        if !owners.contains_key(&video.owner) {
            let Some(owner) = state.db.get_user(&video.owner).await? else {
                // Owner account deleted; drop their videos from the view.
                continue;
            };
            owners.insert(
                video.owner.clone(),
                OwnerProjection {
                    username: owner.username,
                    fullname: owner.fullname,
                    avatar_url: owner.avatar_url,
                },
            );
        }
        let owner = owners[&video.owner].clone();
        history.push(WatchHistoryEntry {
            id: video.id,
            title: video.title,
            thumbnail_url: video.thumbnail_url,
            video_url: video.video_url,
            duration_secs: video.duration_secs,
            views: video.views,
            owner,
        });
    }

    Ok(ApiResponse::new(
        StatusCode::OK,
        history,
        "watch history fetched successfully",
    ))
}
