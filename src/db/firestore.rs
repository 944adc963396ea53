// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (credential records, refresh-token slot, watch history)
//! - Subscriptions (subscriber/channel edges)
//! - Videos (watch-history lookups)
//!
//! Backed by Firestore in production and by an in-memory store in tests, so
//! the full register/login/refresh flows can run against the router without
//! an emulator.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Subscription, User, Video};
use futures_util::{stream, FutureExt, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 10;

/// Document database client.
#[derive(Clone)]
pub struct FirestoreDb {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Firestore(firestore::FirestoreDb),
    Memory(std::sync::Arc<MemStore>),
}

/// In-memory backend used by tests. Per-entry dashmap locking stands in for
/// Firestore's per-document atomicity.
#[derive(Default)]
struct MemStore {
    users: dashmap::DashMap<String, User>,
    // email -> owning username, mirroring the email_index collection
    emails: dashmap::DashMap<String, String>,
    subscriptions: dashmap::DashMap<String, Subscription>,
    videos: dashmap::DashMap<String, Video>,
}

/// Claim document keyed by email address; its existence reserves the address
/// for `username`. Written in the same transaction as the user document so
/// email uniqueness holds at write time, not just at check time.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
struct EmailClaim {
    username: String,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create an in-memory database for tests.
    pub fn new_mem() -> Self {
        Self {
            backend: Backend::Memory(std::sync::Arc::new(MemStore::default())),
        }
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by username (the document ID).
    pub async fn get_user(&self, username: &str) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Memory(mem) => Ok(mem.users.get(username).map(|u| u.value().clone())),
            Backend::Firestore(client) => client
                .fluent()
                .select()
                .by_id_in(collections::USERS)
                .obj()
                .one(username)
                .await
                .map_err(|e| AppError::Database(e.to_string())),
        }
    }

    /// Find a user by username or email (login and duplicate checks).
    pub async fn find_user_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        if !username.is_empty() {
            if let Some(user) = self.get_user(username).await? {
                return Ok(Some(user));
            }
        }
        match &self.backend {
            Backend::Memory(mem) => Ok(mem
                .users
                .iter()
                .find(|u| u.email == email)
                .map(|u| u.value().clone())),
            Backend::Firestore(client) => {
                let email = email.to_string();
                let matches: Vec<User> = client
                    .fluent()
                    .select()
                    .from(collections::USERS)
                    .filter(move |q| q.field("email").eq(email.clone()))
                    .limit(1)
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(matches.into_iter().next())
            }
        }
    }

    /// Create a user. Fails with `Conflict` if the username or the email is
    /// already taken; both are enforced at write time.
    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        match &self.backend {
            Backend::Memory(mem) => {
                use dashmap::mapref::entry::Entry;
                // Claim the email first, then the username; roll the email
                // claim back if the username loses its race.
                match mem.emails.entry(user.email.clone()) {
                    Entry::Occupied(_) => {
                        return Err(AppError::Conflict("user already exists".to_string()));
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(user.username.clone());
                    }
                }
                match mem.users.entry(user.username.clone()) {
                    Entry::Occupied(_) => {
                        mem.emails.remove(&user.email);
                        Err(AppError::Conflict("user already exists".to_string()))
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(user.clone());
                        Ok(())
                    }
                }
            }
            Backend::Firestore(client) => {
                let user = user.clone();
                let created: bool = client
                    .run_transaction(|db, tx| {
                        let user = user.clone();
                        async move {
                            let existing: Option<User> = db
                                .fluent()
                                .select()
                                .by_id_in(collections::USERS)
                                .obj()
                                .one(&user.username)
                                .await?;
                            if existing.is_some() {
                                return Ok(false);
                            }

                            let claimed: Option<EmailClaim> = db
                                .fluent()
                                .select()
                                .by_id_in(collections::EMAIL_INDEX)
                                .obj()
                                .one(&user.email)
                                .await?;
                            if claimed.is_some() {
                                return Ok(false);
                            }

                            db.fluent()
                                .update()
                                .in_col(collections::USERS)
                                .document_id(&user.username)
                                .object(&user)
                                .add_to_transaction(tx)?;
                            db.fluent()
                                .update()
                                .in_col(collections::EMAIL_INDEX)
                                .document_id(&user.email)
                                .object(&EmailClaim {
                                    username: user.username.clone(),
                                })
                                .add_to_transaction(tx)?;

                            Ok(true)
                        }
                        .boxed()
                    })
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                if !created {
                    return Err(AppError::Conflict("user already exists".to_string()));
                }
                Ok(())
            }
        }
    }

    /// Update a user record that may carry a new email address. If the email
    /// changed, the new address is claimed and the old claim released in the
    /// same atomic step as the record write; fails with `Conflict` if the new
    /// address belongs to another user.
    pub async fn update_user_account(
        &self,
        user: &User,
        previous_email: &str,
    ) -> Result<(), AppError> {
        if user.email == previous_email {
            return self.upsert_user(user).await;
        }
        match &self.backend {
            Backend::Memory(mem) => {
                use dashmap::mapref::entry::Entry;
                match mem.emails.entry(user.email.clone()) {
                    Entry::Occupied(_) => {
                        return Err(AppError::Conflict("email already in use".to_string()));
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(user.username.clone());
                    }
                }
                mem.emails.remove(previous_email);
                mem.users.insert(user.username.clone(), user.clone());
                Ok(())
            }
            Backend::Firestore(client) => {
                let user = user.clone();
                let previous_email = previous_email.to_string();
                let moved: bool = client
                    .run_transaction(|db, tx| {
                        let user = user.clone();
                        let previous_email = previous_email.clone();
                        async move {
                            let claimed: Option<EmailClaim> = db
                                .fluent()
                                .select()
                                .by_id_in(collections::EMAIL_INDEX)
                                .obj()
                                .one(&user.email)
                                .await?;
                            if claimed.is_some() {
                                return Ok(false);
                            }

                            db.fluent()
                                .update()
                                .in_col(collections::EMAIL_INDEX)
                                .document_id(&user.email)
                                .object(&EmailClaim {
                                    username: user.username.clone(),
                                })
                                .add_to_transaction(tx)?;
                            db.fluent()
                                .delete()
                                .from(collections::EMAIL_INDEX)
                                .document_id(&previous_email)
                                .add_to_transaction(tx)?;
                            db.fluent()
                                .update()
                                .in_col(collections::USERS)
                                .document_id(&user.username)
                                .object(&user)
                                .add_to_transaction(tx)?;

                            Ok(true)
                        }
                        .boxed()
                    })
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                if !moved {
                    return Err(AppError::Conflict("email already in use".to_string()));
                }
                Ok(())
            }
        }
    }

    /// Overwrite a user record.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        match &self.backend {
            Backend::Memory(mem) => {
                mem.users.insert(user.username.clone(), user.clone());
                Ok(())
            }
            Backend::Firestore(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::USERS)
                    .document_id(&user.username)
                    .object(user)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// Set or clear the user's single refresh-token slot.
    pub async fn set_refresh_token(
        &self,
        username: &str,
        token: Option<String>,
    ) -> Result<(), AppError> {
        match &self.backend {
            Backend::Memory(mem) => {
                let mut user = mem
                    .users
                    .get_mut(username)
                    .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
                user.refresh_token = token;
                user.updated_at = chrono::Utc::now().to_rfc3339();
                Ok(())
            }
            Backend::Firestore(client) => {
                let mut user = self
                    .get_user(username)
                    .await?
                    .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
                user.refresh_token = token;
                user.updated_at = chrono::Utc::now().to_rfc3339();
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::USERS)
                    .document_id(username)
                    .object(&user)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// Replace the refresh token only if the stored value still equals
    /// `expected` (compare-and-swap). Returns whether the swap happened.
    ///
    /// Two concurrent refresh calls presenting the same still-valid token can
    /// both pass the handler-level equality check; this conditional write is
    /// what guarantees at most one of them wins.
    pub async fn rotate_refresh_token(
        &self,
        username: &str,
        expected: &str,
        new_token: &str,
    ) -> Result<bool, AppError> {
        match &self.backend {
            Backend::Memory(mem) => {
                // get_mut holds the shard write lock across check and write.
                let Some(mut user) = mem.users.get_mut(username) else {
                    return Ok(false);
                };
                if user.refresh_token.as_deref() != Some(expected) {
                    return Ok(false);
                }
                user.refresh_token = Some(new_token.to_string());
                user.updated_at = chrono::Utc::now().to_rfc3339();
                Ok(true)
            }
            Backend::Firestore(client) => {
                let username = username.to_string();
                let expected = expected.to_string();
                let new_token = new_token.to_string();
                let swapped: bool = client
                    .run_transaction(|db, tx| {
                        let username = username.clone();
                        let expected = expected.clone();
                        let new_token = new_token.clone();
                        async move {
                            let user: Option<User> = db
                                .fluent()
                                .select()
                                .by_id_in(collections::USERS)
                                .obj()
                                .one(&username)
                                .await?;

                            let Some(mut user) = user else { return Ok(false) };
                            if user.refresh_token.as_deref() != Some(expected.as_str()) {
                                return Ok(false);
                            }

                            user.refresh_token = Some(new_token.clone());
                            user.updated_at = chrono::Utc::now().to_rfc3339();

                            db.fluent()
                                .update()
                                .in_col(collections::USERS)
                                .document_id(&username)
                                .object(&user)
                                .add_to_transaction(tx)?;

                            Ok(true)
                        }
                        .boxed()
                    })
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(swapped)
            }
        }
    }

    // ─── Subscription Operations ─────────────────────────────────

    /// Create a subscription edge (idempotent by document ID).
    pub async fn upsert_subscription(&self, sub: &Subscription) -> Result<(), AppError> {
        let doc_id = Subscription::doc_id(&sub.subscriber, &sub.channel);
        match &self.backend {
            Backend::Memory(mem) => {
                mem.subscriptions.insert(doc_id, sub.clone());
                Ok(())
            }
            Backend::Firestore(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::SUBSCRIPTIONS)
                    .document_id(doc_id)
                    .object(sub)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// Number of subscribers a channel has.
    pub async fn subscriber_count(&self, channel: &str) -> Result<u64, AppError> {
        match &self.backend {
            Backend::Memory(mem) => Ok(mem
                .subscriptions
                .iter()
                .filter(|s| s.channel == channel)
                .count() as u64),
            Backend::Firestore(client) => {
                let channel = channel.to_string();
                let edges: Vec<Subscription> = client
                    .fluent()
                    .select()
                    .from(collections::SUBSCRIPTIONS)
                    .filter(move |q| q.field("channel").eq(channel.clone()))
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(edges.len() as u64)
            }
        }
    }

    /// Number of channels a user is subscribed to.
    pub async fn subscribed_to_count(&self, subscriber: &str) -> Result<u64, AppError> {
        match &self.backend {
            Backend::Memory(mem) => Ok(mem
                .subscriptions
                .iter()
                .filter(|s| s.subscriber == subscriber)
                .count() as u64),
            Backend::Firestore(client) => {
                let subscriber = subscriber.to_string();
                let edges: Vec<Subscription> = client
                    .fluent()
                    .select()
                    .from(collections::SUBSCRIPTIONS)
                    .filter(move |q| q.field("subscriber").eq(subscriber.clone()))
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(edges.len() as u64)
            }
        }
    }

    /// Whether `subscriber` is subscribed to `channel`.
    pub async fn is_subscribed(&self, subscriber: &str, channel: &str) -> Result<bool, AppError> {
        let doc_id = Subscription::doc_id(subscriber, channel);
        match &self.backend {
            Backend::Memory(mem) => Ok(mem.subscriptions.contains_key(&doc_id)),
            Backend::Firestore(client) => {
                let edge: Option<Subscription> = client
                    .fluent()
                    .select()
                    .by_id_in(collections::SUBSCRIPTIONS)
                    .obj()
                    .one(&doc_id)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(edge.is_some())
            }
        }
    }

    // ─── Video Operations ────────────────────────────────────────

    /// Store a video document (used by seeds and tests).
    pub async fn upsert_video(&self, video: &Video) -> Result<(), AppError> {
        match &self.backend {
            Backend::Memory(mem) => {
                mem.videos.insert(video.id.clone(), video.clone());
                Ok(())
            }
            Backend::Firestore(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::VIDEOS)
                    .document_id(&video.id)
                    .object(video)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// Get a video by ID.
    pub async fn get_video(&self, video_id: &str) -> Result<Option<Video>, AppError> {
        match &self.backend {
            Backend::Memory(mem) => Ok(mem.videos.get(video_id).map(|v| v.value().clone())),
            Backend::Firestore(client) => client
                .fluent()
                .select()
                .by_id_in(collections::VIDEOS)
                .obj()
                .one(video_id)
                .await
                .map_err(|e| AppError::Database(e.to_string())),
        }
    }

    /// Fetch videos by ID, preserving order and skipping ones that have been
    /// deleted since they were watched.
    pub async fn get_videos_by_ids(&self, ids: &[String]) -> Result<Vec<Video>, AppError> {
        // Owned ids, so each future borrows only `self` and not the closure
        // argument.
        let results: Vec<Result<Option<Video>, AppError>> = stream::iter(ids.to_vec())
            .map(|id| async move { self.get_video(&id).await })
            .buffered(MAX_CONCURRENT_DB_OPS)
            .collect()
            .await;

        let mut videos = Vec::with_capacity(ids.len());
        for result in results {
            if let Some(video) = result? {
                videos.push(video);
            }
        }
        Ok(videos)
    }
}
