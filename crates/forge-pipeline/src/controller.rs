//! The validated generation retry loop.
//!
//! [`RetryFeedbackController`] runs one [`GenerationSession`]: it asks the
//! generator for a candidate, validates it, and on rejection appends the
//! diagnostics and the rejected text to the transcript before trying again.
//! Attempts are strictly sequential since each one must see the feedback
//! from the one before it.

use std::time::Duration;

use forge_schema::{CandidateValidator, Document, ValidationResult, SCHEMA_VERSION};
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::error::{FailureReason, GenerationError, GenerationErrorKind};
use crate::generator::{CandidateDocument, ContentGenerator};
use crate::prompts;
use crate::session::GenerationSession;

/// Limits applied to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Maximum generate-then-validate attempts.
    pub max_attempts: u32,
    /// Timeout for one generator call.
    pub call_timeout: Duration,
    /// Deadline for the whole session.
    pub session_deadline: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for ControllerSettings {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            call_timeout: config.call_timeout(),
            session_deadline: config.session_deadline(),
        }
    }
}

/// Why a session produced no document, with enough detail to report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Reason code.
    pub reason: FailureReason,
    /// Human-readable detail.
    pub message: String,
    /// Diagnostics from the last rejected attempt, if any.
    pub diagnostics: Vec<String>,
    /// Operator hint for a provider failure.
    pub suggestion: Option<&'static str>,
}

/// Result of one session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// A candidate passed validation.
    Accepted(Document),
    /// The session ended without an accepted candidate.
    Failed(Failure),
}

impl SessionOutcome {
    /// Returns the failure reason, if the session failed.
    #[must_use]
    pub const fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Accepted(_) => None,
            Self::Failed(failure) => Some(failure.reason),
        }
    }

    fn generation_error(err: &GenerationError) -> Self {
        Self::Failed(Failure {
            reason: FailureReason::GenerationError,
            message: err.to_string(),
            diagnostics: Vec::new(),
            suggestion: Some(err.kind.suggestion()),
        })
    }
}

/// Drives generate-then-validate attempts until acceptance or exhaustion.
#[derive(Debug)]
pub struct RetryFeedbackController<G, V> {
    generator: G,
    validator: V,
    settings: ControllerSettings,
}

impl<G: ContentGenerator, V: CandidateValidator> RetryFeedbackController<G, V> {
    /// Creates a controller with explicit limits.
    pub const fn new(generator: G, validator: V, settings: ControllerSettings) -> Self {
        Self {
            generator,
            validator,
            settings,
        }
    }

    /// Returns the limits in use.
    pub const fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Runs a session for `outline` and returns only its outcome.
    pub async fn run(&self, outline: &str) -> SessionOutcome {
        self.run_session(outline).await.1
    }

    /// Runs a session for `outline`, returning the session state with the
    /// outcome so callers can inspect the transcript and attempt history.
    pub async fn run_session(&self, outline: &str) -> (GenerationSession, SessionOutcome) {
        let mut session = GenerationSession::new(outline, self.settings.max_attempts);
        info!(
            max_attempts = self.settings.max_attempts,
            schema_version = SCHEMA_VERSION,
            outline_len = outline.len(),
            "Starting generation session"
        );

        let bounded = tokio::time::timeout(self.settings.session_deadline, self.drive(&mut session)).await;
        let outcome = match bounded {
            Ok(outcome) => outcome,
            Err(_) => {
                let err = GenerationError::new(
                    GenerationErrorKind::Timeout,
                    format!(
                        "session deadline of {}s exceeded",
                        self.settings.session_deadline.as_secs()
                    ),
                );
                warn!(attempt = session.attempts_used(), error = %err, "Aborting session");
                session.abort();
                SessionOutcome::generation_error(&err)
            }
        };
        (session, outcome)
    }

    async fn drive(&self, session: &mut GenerationSession) -> SessionOutcome {
        if session.attempts_remaining() == 0 {
            warn!(max_attempts = session.max_attempts(), "No generation attempts allowed");
            session.exhaust();
            return SessionOutcome::Failed(Failure {
                reason: FailureReason::ValidationExhausted,
                message: "no generation attempts allowed (max_attempts is 0)".to_string(),
                diagnostics: Vec::new(),
                suggestion: None,
            });
        }

        loop {
            let attempt = session.begin_attempt();
            debug!(attempt, transcript_len = session.transcript().len(), "Requesting candidate");

            let candidate = match self.generate(session).await {
                Ok(candidate) => candidate,
                Err(err) => {
                    warn!(
                        attempt,
                        transient = err.kind.is_transient(),
                        error = %err,
                        "Content generation failed; aborting session"
                    );
                    session.abort();
                    return SessionOutcome::generation_error(&err);
                }
            };
            session.candidate_received();

            match self.validator.validate(&candidate) {
                ValidationResult::Valid(document) => {
                    info!(attempt, blocks = document.blocks.len(), "Candidate accepted");
                    session.accept(candidate.len());
                    return SessionOutcome::Accepted(document);
                }
                ValidationResult::Invalid(diagnostics) => {
                    let messages: Vec<String> =
                        diagnostics.iter().map(ToString::to_string).collect();
                    info!(attempt, diagnostics = messages.len(), "Candidate rejected");

                    let feedback = prompts::retry_feedback(&messages, &candidate);
                    session.reject(candidate.len(), messages.clone(), feedback);
                    if session.state().is_terminal() {
                        warn!(attempts = attempt, "Validation attempts exhausted");
                        return SessionOutcome::Failed(Failure {
                            reason: FailureReason::ValidationExhausted,
                            message: format!("candidate rejected on all {attempt} attempts"),
                            diagnostics: messages,
                            suggestion: None,
                        });
                    }
                }
            }
        }
    }

    async fn generate(&self, session: &GenerationSession) -> Result<CandidateDocument, GenerationError> {
        let call = self.generator.generate(session.transcript());
        match tokio::time::timeout(self.settings.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::timeout(self.settings.call_timeout)),
        }
    }
}
