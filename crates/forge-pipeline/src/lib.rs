//! lessonforge pipeline
//!
//! Turns a topic outline into a validated lesson document and then enriches
//! it with generated media:
//!
//! 1. [`RetryFeedbackController`] asks a [`ContentGenerator`] for a
//!    candidate, validates it with a [`forge_schema::CandidateValidator`],
//!    and feeds diagnostics back until a candidate is accepted or the
//!    attempts run out.
//! 2. [`extract_asset_prompts`] collects the media directives of the
//!    accepted [`forge_schema::Document`].
//! 3. [`ConcurrentAssetSynthesizer`] generates every asset at once and
//!    settles all of them, counting failures instead of propagating them.
//!
//! [`Pipeline`] runs the stages for one [`ContentRequest`] and reports each
//! status change to a [`PersistenceGateway`].

pub mod config;
pub mod controller;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod openai;
pub mod persistence;
pub mod pipeline;
pub mod prompts;
pub mod request;
pub mod session;
pub mod synthesizer;

pub use config::{AssetConfig, Config, GenerationConfig, PersistenceConfig};
pub use controller::{ControllerSettings, Failure, RetryFeedbackController, SessionOutcome};
pub use error::{
    AssetGenerationError, FailureReason, ForgeError, GenerationError, GenerationErrorKind,
    PersistenceError, Result,
};
pub use extractor::{extract_asset_prompts, AssetPrompt, MediaKind};
pub use generator::{AssetGenerator, CandidateDocument, ContentGenerator, GeneratedAsset};
pub use openai::{OpenAiAssetGenerator, OpenAiContentGenerator};
pub use persistence::{
    record_fire_and_forget, FsGateway, NullGateway, PersistenceGateway, StatusUpdate,
};
pub use pipeline::{Pipeline, PipelineReport};
pub use request::{ContentRequest, RequestStatus};
pub use session::{
    AttemptOutcome, AttemptRecord, ConversationMessage, GenerationSession, Role, SessionState,
};
pub use synthesizer::{AssetResult, ConcurrentAssetSynthesizer, EnrichmentOutcome};
