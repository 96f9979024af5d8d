//! Content request state.
//!
//! A [`ContentRequest`] is the caller-owned record of one lesson being
//! produced. The pipeline only mutates its in-memory projection; durable
//! storage goes through [`crate::PersistenceGateway`].

use chrono::{DateTime, Utc};
use forge_schema::Document;
use serde::{Deserialize, Serialize};

use crate::error::{FailureReason, ForgeError, Result};
use crate::synthesizer::EnrichmentOutcome;

// ============================================================================
// RequestStatus
// ============================================================================

/// Lifecycle status of a content request.
///
/// The status transitions through these states:
/// - `Generating` -> `ContentReady` | `Failed`
/// - `ContentReady` -> `AssetEnriching`
/// - `AssetEnriching` -> `Complete` (every asset succeeded) | `Degraded` (some failed)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// The retry loop is producing content.
    #[default]
    Generating,
    /// A document was accepted; enrichment has not started.
    ContentReady,
    /// Assets are being generated.
    AssetEnriching,
    /// Document and every requested asset are available.
    Complete,
    /// Document is available but some assets are missing.
    Degraded,
    /// No document was accepted.
    Failed,
}

impl RequestStatus {
    /// Returns `true` if this status represents a terminal state.
    ///
    /// # Examples
    ///
    /// ```
    /// use forge_pipeline::RequestStatus;
    ///
    /// assert!(RequestStatus::Degraded.is_terminal());
    /// assert!(!RequestStatus::AssetEnriching.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Degraded | Self::Failed)
    }

    /// Returns `true` if a document is available in this status.
    #[must_use]
    pub const fn has_document(&self) -> bool {
        matches!(
            self,
            Self::ContentReady | Self::AssetEnriching | Self::Complete | Self::Degraded
        )
    }

    /// Returns `true` if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Generating, Self::ContentReady | Self::Failed)
                | (Self::ContentReady, Self::AssetEnriching)
                | (Self::AssetEnriching, Self::Complete | Self::Degraded)
        )
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generating => write!(f, "generating"),
            Self::ContentReady => write!(f, "content_ready"),
            Self::AssetEnriching => write!(f, "asset_enriching"),
            Self::Complete => write!(f, "complete"),
            Self::Degraded => write!(f, "degraded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ============================================================================
// ContentRequest
// ============================================================================

/// One lesson request and its in-memory projection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    /// Caller-assigned identifier.
    pub id: String,

    /// The topic outline to generate from.
    pub outline: String,

    /// Current lifecycle status.
    pub status: RequestStatus,

    /// Generation attempts used so far.
    pub attempts: u32,

    /// Diagnostics from the last rejected attempt, if the session failed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,

    /// The accepted document. Only set once validation has succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,

    /// Why the request failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,

    /// Asset outcome, once enrichment has run.
    #[serde(skip)]
    pub enrichment: Option<EnrichmentOutcome>,

    /// When the request was created.
    pub created_at: DateTime<Utc>,

    /// When the request was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ContentRequest {
    /// Creates a new request in the `Generating` status.
    ///
    /// # Examples
    ///
    /// ```
    /// use forge_pipeline::{ContentRequest, RequestStatus};
    ///
    /// let request = ContentRequest::new("lesson-1", "Intro to loops");
    /// assert_eq!(request.status, RequestStatus::Generating);
    /// assert!(request.document.is_none());
    /// ```
    #[must_use]
    pub fn new(id: impl Into<String>, outline: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            outline: outline.into(),
            status: RequestStatus::Generating,
            attempts: 0,
            diagnostics: Vec::new(),
            document: None,
            failure: None,
            enrichment: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a request with an identifier derived from the current time.
    #[must_use]
    pub fn with_generated_id(outline: impl Into<String>) -> Self {
        let id = format!("lesson-{}", Utc::now().format("%Y%m%d-%H%M%S-%3f"));
        Self::new(id, outline)
    }

    /// Moves the request to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: RequestStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ForgeError::invalid_transition(self.status, next));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Updates the `updated_at` timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Returns the duration since the request was created.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}
