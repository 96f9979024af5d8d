//! Seams toward the external model providers.

use std::future::Future;

use crate::error::{AssetGenerationError, GenerationError};
use crate::session::ConversationMessage;

/// Raw text produced by one generation attempt. Untrusted until validated.
pub type CandidateDocument = String;

/// Produces a candidate document from a transcript.
///
/// One call is one model request. Implementations must not retry; the
/// controller owns the retry policy.
pub trait ContentGenerator: Send + Sync {
    /// Generates one candidate from the full transcript.
    fn generate(
        &self,
        transcript: &[ConversationMessage],
    ) -> impl Future<Output = Result<CandidateDocument, GenerationError>> + Send;
}

/// Binary media returned by an [`AssetGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAsset {
    /// Encoded media bytes.
    pub data: Vec<u8>,
    /// MIME type of `data`, e.g. `image/png`.
    pub media_type: String,
}

/// Produces one media asset from a prompt.
pub trait AssetGenerator: Send + Sync {
    /// Generates one asset. `size_hint` is `WIDTHxHEIGHT`.
    fn generate_asset(
        &self,
        prompt_text: &str,
        size_hint: &str,
    ) -> impl Future<Output = Result<GeneratedAsset, AssetGenerationError>> + Send;
}
