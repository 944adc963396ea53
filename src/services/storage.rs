// SPDX-License-Identifier: MIT

//! Media storage client (Cloudinary-style HTTP API).
//!
//! The service's contract is two calls: upload returns a handle + URL or
//! fails, delete removes by handle. Requests are signed with SHA-256 over
//! the sorted parameters plus the API secret.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::AppError;

/// Result of a successful upload: the storage handle (used for deletion)
/// and the public URL.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub handle: String,
    pub url: String,
}

/// Client for the external media storage service.
#[derive(Clone)]
pub struct MediaStorage {
    mode: Mode,
}

#[derive(Clone)]
enum Mode {
    Remote {
        http: reqwest::Client,
        base_url: String,
        cloud_name: String,
        api_key: String,
        api_secret: String,
    },
    /// Records calls instead of making them; tests assert on upload order
    /// and compensation deletes.
    Mock(Arc<MockState>),
}

#[derive(Default)]
struct MockState {
    uploads: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    /// Fail uploads once this many have succeeded.
    fail_after: Mutex<Option<usize>>,
}

/// Upload response from the storage API.
#[derive(Deserialize)]
struct RemoteUploadResponse {
    public_id: String,
    secure_url: String,
}

impl MediaStorage {
    /// Create a client against the real storage API.
    pub fn new(config: &Config) -> Self {
        Self {
            mode: Mode::Remote {
                http: reqwest::Client::new(),
                base_url: "https://api.cloudinary.com/v1_1".to_string(),
                cloud_name: config.storage_cloud_name.clone(),
                api_key: config.storage_api_key.clone(),
                api_secret: config.storage_api_secret.clone(),
            },
        }
    }

    /// Create a recording mock for tests.
    pub fn new_mock() -> Self {
        Self {
            mode: Mode::Mock(Arc::new(MockState::default())),
        }
    }

    /// Upload an asset; returns its handle and public URL.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadResult, AppError> {
        match &self.mode {
            Mode::Mock(state) => {
                let mut uploads = state.uploads.lock().unwrap();
                if let Some(limit) = *state.fail_after.lock().unwrap() {
                    if uploads.len() >= limit {
                        return Err(AppError::Internal(anyhow::anyhow!("mock upload failure")));
                    }
                }
                let handle = format!("mock/{filename}");
                uploads.push(handle.clone());
                Ok(UploadResult {
                    url: format!("https://mock.storage.example/{handle}"),
                    handle,
                })
            }
            Mode::Remote {
                http,
                base_url,
                cloud_name,
                api_key,
                api_secret,
            } => {
                let timestamp = chrono::Utc::now().timestamp().to_string();
                let signature = sign_params(&[("timestamp", &timestamp)], api_secret);

                let part = reqwest::multipart::Part::bytes(bytes)
                    .file_name(filename.to_string());
                let form = reqwest::multipart::Form::new()
                    .part("file", part)
                    .text("api_key", api_key.clone())
                    .text("timestamp", timestamp)
                    .text("signature", signature)
                    .text("signature_algorithm", "sha256");

                let url = format!("{base_url}/{cloud_name}/auto/upload");
                let response = http
                    .post(&url)
                    .multipart(form)
                    .send()
                    .await
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("upload request: {e}")))?;

                if !response.status().is_success() {
                    let status = response.status();
                    return Err(AppError::Internal(anyhow::anyhow!(
                        "storage upload failed with status {status}"
                    )));
                }

                let body: RemoteUploadResponse = response
                    .json()
                    .await
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("upload response: {e}")))?;

                Ok(UploadResult {
                    handle: body.public_id,
                    url: body.secure_url,
                })
            }
        }
    }

    /// Delete an asset by handle.
    pub async fn delete(&self, handle: &str) -> Result<(), AppError> {
        match &self.mode {
            Mode::Mock(state) => {
                state.deletes.lock().unwrap().push(handle.to_string());
                Ok(())
            }
            Mode::Remote {
                http,
                base_url,
                cloud_name,
                api_key,
                api_secret,
            } => {
                let timestamp = chrono::Utc::now().timestamp().to_string();
                let signature = sign_params(
                    &[("public_id", handle), ("timestamp", &timestamp)],
                    api_secret,
                );

                let url = format!("{base_url}/{cloud_name}/image/destroy");
                let response = http
                    .post(&url)
                    .form(&[
                        ("public_id", handle),
                        ("api_key", api_key),
                        ("timestamp", &timestamp),
                        ("signature", &signature),
                        ("signature_algorithm", "sha256"),
                    ])
                    .send()
                    .await
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("delete request: {e}")))?;

                if !response.status().is_success() {
                    let status = response.status();
                    return Err(AppError::Internal(anyhow::anyhow!(
                        "storage delete failed with status {status}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Best-effort delete for compensation paths; failures are logged, never
    /// propagated.
    pub async fn delete_best_effort(&self, handle: &str) {
        if let Err(e) = self.delete(handle).await {
            tracing::warn!(handle, error = %e, "Failed to delete asset during cleanup");
        }
    }

    // ─── Mock inspection (tests) ─────────────────────────────────

    /// Handles uploaded so far (mock mode only).
    pub fn mock_uploads(&self) -> Vec<String> {
        match &self.mode {
            Mode::Mock(state) => state.uploads.lock().unwrap().clone(),
            Mode::Remote { .. } => Vec::new(),
        }
    }

    /// Handles deleted so far (mock mode only).
    pub fn mock_deletes(&self) -> Vec<String> {
        match &self.mode {
            Mode::Mock(state) => state.deletes.lock().unwrap().clone(),
            Mode::Remote { .. } => Vec::new(),
        }
    }

    /// Make mock uploads fail after `succeed_first` successes (mock mode only).
    pub fn mock_fail_uploads_after(&self, succeed_first: usize) {
        if let Mode::Mock(state) = &self.mode {
            *state.fail_after.lock().unwrap() = Some(succeed_first);
        }
    }
}

/// Signature over `key=value` pairs sorted by key, concatenated with `&`,
/// with the API secret appended.
fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<(&str, &str)> = params.to_vec();
    sorted.sort_by_key(|(k, _)| *k);

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
