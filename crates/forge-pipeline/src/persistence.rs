//! Status persistence boundary.
//!
//! The pipeline reports every status change through a
//! [`PersistenceGateway`]. Each write is bounded by a timeout; failures and
//! timeouts are logged here and never reach the pipeline's own success
//! determination.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use forge_schema::Document;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{FailureReason, PersistenceError};
use crate::request::RequestStatus;
use crate::synthesizer::AssetResult;

/// Fields recorded with one status change.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// The new status.
    pub status: RequestStatus,
    /// The accepted document, when one is available.
    pub document: Option<Document>,
    /// Diagnostics from the last rejected attempt.
    pub diagnostics: Option<Vec<String>>,
    /// Why the request failed.
    pub failure: Option<FailureReason>,
    /// Generated assets.
    pub assets: Option<Vec<AssetResult>>,
}

impl StatusUpdate {
    /// Creates an update carrying only a status.
    #[must_use]
    pub const fn new(status: RequestStatus) -> Self {
        Self {
            status,
            document: None,
            diagnostics: None,
            failure: None,
            assets: None,
        }
    }

    /// Attaches the accepted document.
    #[must_use]
    pub fn with_document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    /// Attaches diagnostics.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Vec<String>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Attaches a failure reason.
    #[must_use]
    pub const fn with_failure(mut self, reason: FailureReason) -> Self {
        self.failure = Some(reason);
        self
    }

    /// Attaches generated assets.
    #[must_use]
    pub fn with_assets(mut self, assets: Vec<AssetResult>) -> Self {
        self.assets = Some(assets);
        self
    }
}

/// Stores status changes for a request.
pub trait PersistenceGateway: Send + Sync {
    /// Records one status change.
    fn record_status(
        &self,
        request_id: &str,
        update: StatusUpdate,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

/// Sends one update, waiting at most `timeout` for the gateway.
///
/// A failed or stalled write is logged and abandoned. Never retries and
/// never fails.
pub async fn record_fire_and_forget<P: PersistenceGateway>(
    gateway: &P,
    request_id: &str,
    update: StatusUpdate,
    timeout: Duration,
) {
    let status = update.status;
    let call = gateway.record_status(request_id, update);
    let result = match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(PersistenceError::new(
            request_id,
            format!("status write timed out after {}ms", timeout.as_millis()),
        )),
    };

    match result {
        Ok(()) => debug!(request_id, %status, "Status recorded"),
        Err(err) => warn!(request_id, %status, error = %err, "Status update not persisted"),
    }
}

/// Gateway that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGateway;

impl PersistenceGateway for NullGateway {
    async fn record_status(&self, _request_id: &str, _update: StatusUpdate) -> Result<(), PersistenceError> {
        Ok(())
    }
}

// ============================================================================
// FsGateway
// ============================================================================

/// Gateway that writes each request under `<root>/<request_id>/`.
///
/// Layout:
/// - `status.json`: the latest status, diagnostics and asset manifest
/// - `document.json`: the accepted document
/// - `assets/block-<index>.<ext>`: one file per generated asset
#[derive(Debug, Clone)]
pub struct FsGateway {
    root: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusRecord<'a> {
    request_id: &'a str,
    status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    assets: Vec<AssetEntry>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetEntry {
    block_index: usize,
    media_type: String,
    file: String,
    bytes: usize,
}

impl FsGateway {
    /// Creates a gateway rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one request's files.
    #[must_use]
    pub fn request_dir(&self, request_id: &str) -> PathBuf {
        self.root.join(request_id)
    }

    async fn write(&self, request_id: &str, update: &StatusUpdate) -> std::io::Result<()> {
        let dir = self.request_dir(request_id);
        tokio::fs::create_dir_all(&dir).await?;

        let document_path = dir.join("document.json");
        if let Some(document) = &update.document {
            tokio::fs::write(&document_path, serde_json::to_vec_pretty(document)?).await?;
        }

        let mut assets = Vec::new();
        if let Some(results) = &update.assets {
            let asset_dir = dir.join("assets");
            tokio::fs::create_dir_all(&asset_dir).await?;
            for asset in results {
                let name = format!(
                    "block-{}.{}",
                    asset.block_index,
                    extension_for(&asset.media_type)
                );
                tokio::fs::write(asset_dir.join(&name), &asset.data).await?;
                assets.push(AssetEntry {
                    block_index: asset.block_index,
                    media_type: asset.media_type.clone(),
                    file: format!("assets/{name}"),
                    bytes: asset.data.len(),
                });
            }
            assets.sort_by_key(|entry| entry.block_index);
        }

        let has_document = tokio::fs::try_exists(&document_path).await?;
        let record = StatusRecord {
            request_id,
            status: update.status,
            failure: update.failure,
            diagnostics: update.diagnostics.as_deref(),
            document: has_document.then_some("document.json"),
            assets,
            updated_at: Utc::now(),
        };
        tokio::fs::write(dir.join("status.json"), serde_json::to_vec_pretty(&record)?).await
    }
}

impl PersistenceGateway for FsGateway {
    async fn record_status(&self, request_id: &str, update: StatusUpdate) -> Result<(), PersistenceError> {
        if request_id.is_empty()
            || request_id.starts_with('.')
            || request_id.contains(['/', '\\'])
        {
            return Err(PersistenceError::new(
                request_id,
                "request id is not a valid directory name",
            ));
        }
        self.write(request_id, &update)
            .await
            .map_err(|e| PersistenceError::new(request_id, e))
    }
}

/// File extension for a media type.
#[must_use]
pub fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}
