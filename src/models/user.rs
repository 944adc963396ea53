//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// User record stored in Firestore. The document ID is the lowercased
/// username, which is what token claims and subscription edges refer to.
///
/// This struct never leaves the storage boundary: responses use
/// [`UserProfile`], which has no password or refresh-token fields at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique username (doubles as document ID)
    pub username: String,
    /// Unique email address
    pub email: String,
    /// Display name
    pub fullname: String,
    /// Argon2id PHC hash of the password
    pub password_hash: String,
    /// Avatar image URL (required at registration)
    pub avatar_url: String,
    /// Storage handle of the avatar, used to delete the old asset on update
    pub avatar_handle: String,
    /// Cover image URL
    pub cover_image_url: Option<String>,
    /// Storage handle of the cover image
    pub cover_image_handle: Option<String>,
    /// Currently valid refresh token. Single slot: issuing a new one
    /// invalidates all prior ones, logout clears it.
    pub refresh_token: Option<String>,
    /// Ordered video IDs, most recently watched last
    pub watch_history: Vec<String>,
    /// When the account was created (RFC 3339)
    pub created_at: String,
    /// Last mutation timestamp (RFC 3339)
    pub updated_at: String,
}

impl User {
    /// The sanitized view of this user, safe for any response body.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            username: self.username.clone(),
            email: self.email.clone(),
            fullname: self.fullname.clone(),
            avatar_url: self.avatar_url.clone(),
            cover_image_url: self.cover_image_url.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

/// Public user view. Credentials and the refresh token are not fields here,
/// so they cannot serialize into a response by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
    pub created_at: String,
}
