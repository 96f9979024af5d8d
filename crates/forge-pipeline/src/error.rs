//! Error types for the lessonforge pipeline.
//!
//! Errors are split by how far they are allowed to travel:
//! [`GenerationError`] ends a session, [`AssetGenerationError`] is counted
//! and contained inside the enrichment stage, [`PersistenceError`] is logged
//! at the gateway boundary, and [`ForgeError`] covers setup problems that
//! stop the process before any model call is made.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A specialized `Result` type for pipeline setup operations.
pub type Result<T> = std::result::Result<T, ForgeError>;

/// Errors raised while configuring or driving the pipeline.
///
/// Variants include actionable suggestions where possible.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your forge.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Provider Setup Errors
    // ========================================================================
    /// The API key environment variable is unset or empty.
    #[error("API key not found in environment variable '{env_var}'\n\nSuggestion: Export {env_var} or point apiKeyEnv in forge.json at the variable holding your key")]
    MissingApiKey {
        /// Name of the environment variable that was read.
        env_var: String,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {message}")]
    HttpClient {
        /// Description of the builder failure.
        message: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid request status transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current status.
        from: String,
        /// The attempted target status.
        to: String,
    },
}

impl ForgeError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `MissingApiKey` error.
    #[must_use]
    pub fn missing_api_key(env_var: impl Into<String>) -> Self {
        Self::MissingApiKey {
            env_var: env_var.into(),
        }
    }

    /// Creates a new `HttpClient` error.
    #[must_use]
    pub fn http_client(message: impl fmt::Display) -> Self {
        Self::HttpClient {
            message: message.to_string(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl fmt::Display, to: impl fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

// ============================================================================
// Provider call errors
// ============================================================================

/// Categories of failed provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// The request never produced an HTTP response.
    Transport,
    /// The provider answered with a non-success status code.
    Status(u16),
    /// The response body could not be decoded.
    Decode,
    /// The response decoded but carried no usable content.
    Empty,
    /// The call did not finish within its deadline.
    Timeout,
}

impl fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::Decode => write!(f, "decode"),
            Self::Empty => write!(f, "empty"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl GenerationErrorKind {
    /// Returns `true` if retrying the same call later could succeed.
    ///
    /// The controller never retries on its own; this feeds logging and
    /// callers that schedule whole-request retries.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport | Self::Timeout => true,
            Self::Status(code) => *code == 429 || *code >= 500,
            Self::Decode | Self::Empty => false,
        }
    }

    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Status(401 | 403) => "Check your API key or credentials",
            Self::Status(429) => "Wait and retry, or reduce request frequency",
            Self::Status(_) => "Retry later; the model service may be experiencing issues",
            Self::Transport => "Check your network connection and the configured endpoint",
            Self::Decode | Self::Empty => "Check that the endpoint speaks the OpenAI API",
            Self::Timeout => "Raise callTimeoutSecs in forge.json or retry later",
        }
    }
}

/// A failed content generation call. Fatal to the enclosing session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Content generation failed ({kind}): {message}")]
pub struct GenerationError {
    /// What kind of failure occurred.
    pub kind: GenerationErrorKind,
    /// Detail from the transport or provider.
    pub message: String,
}

impl GenerationError {
    /// Creates a new `GenerationError`.
    #[must_use]
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a timeout error for a call that exceeded `limit`.
    #[must_use]
    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            GenerationErrorKind::Timeout,
            format!("no response within {}s", limit.as_secs()),
        )
    }
}

/// A failed asset generation call. Counted, logged and otherwise contained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Asset generation failed ({kind}): {message}")]
pub struct AssetGenerationError {
    /// What kind of failure occurred.
    pub kind: GenerationErrorKind,
    /// Detail from the transport or provider.
    pub message: String,
}

impl AssetGenerationError {
    /// Creates a new `AssetGenerationError`.
    #[must_use]
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a timeout error for a call that exceeded `limit`.
    #[must_use]
    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            GenerationErrorKind::Timeout,
            format!("no response within {}s", limit.as_secs()),
        )
    }
}

/// A status update the persistence collaborator could not store.
#[derive(Debug, thiserror::Error)]
#[error("Failed to persist status for request '{request_id}': {message}")]
pub struct PersistenceError {
    /// The request whose update was lost.
    pub request_id: String,
    /// Description of the failure.
    pub message: String,
}

impl PersistenceError {
    /// Creates a new `PersistenceError`.
    #[must_use]
    pub fn new(request_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            request_id: request_id.into(),
            message: message.to_string(),
        }
    }
}

// ============================================================================
// FailureReason
// ============================================================================

/// Why a session ended without an accepted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Every attempt produced a candidate the validator rejected.
    ValidationExhausted,
    /// The generator failed, timed out, or the session deadline passed.
    GenerationError,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationExhausted => write!(f, "validation_exhausted"),
            Self::GenerationError => write!(f, "generation_error"),
        }
    }
}
