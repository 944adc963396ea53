//! Video model and the denormalized watch-history projection.

use serde::{Deserialize, Serialize};

/// Video document. Only the fields watch-history needs; the upload pipeline
/// for videos themselves lives outside this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    /// Document ID
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub video_url: String,
    pub thumbnail_url: String,
    /// Owner username
    pub owner: String,
    pub duration_secs: f64,
    pub views: u64,
    pub created_at: String,
}

/// One watch-history row: a video joined with a projection of its owner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchHistoryEntry {
    pub id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub video_url: String,
    pub duration_secs: f64,
    pub views: u64,
    pub owner: OwnerProjection,
}

/// Denormalized owner fields embedded in each watch-history row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerProjection {
    pub username: String,
    pub fullname: String,
    pub avatar_url: String,
}
