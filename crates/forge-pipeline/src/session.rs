//! Generation session state.
//!
//! A [`GenerationSession`] is the explicit, inspectable state of one retry
//! loop: the append-only transcript, the attempt counter, the controller
//! state and one [`AttemptRecord`] per attempt. Mutation is restricted to
//! the controller; everything is readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::prompts;

// ============================================================================
// ConversationMessage
// ============================================================================

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fixed instructions.
    System,
    /// The outline and every feedback message.
    User,
}

/// One transcript entry. Serializes in the chat-completions message shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Who authored the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ConversationMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ============================================================================
// SessionState
// ============================================================================

/// Controller state.
///
/// `AwaitingGeneration` -> `AwaitingValidation` -> `Accepted`, back to
/// `AwaitingGeneration` while attempts remain, or `Exhausted`. A generator
/// failure from either waiting state ends in `Aborted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Ready to request the next candidate.
    #[default]
    AwaitingGeneration,
    /// A candidate was received and is being validated.
    AwaitingValidation,
    /// A candidate passed validation.
    Accepted,
    /// Every attempt was rejected.
    Exhausted,
    /// The generator failed or the session deadline passed.
    Aborted,
}

impl SessionState {
    /// Returns `true` if the session has ended.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Exhausted | Self::Aborted)
    }
}

// ============================================================================
// AttemptRecord
// ============================================================================

/// How one attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The candidate was accepted.
    Accepted,
    /// The candidate was rejected with diagnostics.
    Rejected,
    /// No candidate was produced.
    GenerationFailed,
}

/// Record of a single generate-then-validate attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// The attempt number (1-indexed).
    pub attempt: u32,

    /// How the attempt ended.
    pub outcome: AttemptOutcome,

    /// Length of the candidate in bytes (0 if none was produced).
    pub candidate_len: usize,

    /// Rendered diagnostics, in validator order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,

    /// When this attempt started.
    pub started_at: DateTime<Utc>,

    /// When this attempt ended.
    pub ended_at: DateTime<Utc>,
}

// ============================================================================
// GenerationSession
// ============================================================================

/// State of one retry loop.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSession {
    state: SessionState,
    max_attempts: u32,
    attempt: u32,
    transcript: Vec<ConversationMessage>,
    history: Vec<AttemptRecord>,
    #[serde(skip)]
    attempt_started_at: Option<DateTime<Utc>>,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GenerationSession {
    /// Creates a session seeded with the system prompt and the outline.
    #[must_use]
    pub fn new(outline: &str, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            state: SessionState::AwaitingGeneration,
            max_attempts,
            attempt: 0,
            transcript: vec![
                ConversationMessage::system(prompts::system_prompt()),
                ConversationMessage::user(prompts::outline_message(outline)),
            ],
            history: Vec::new(),
            attempt_started_at: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Current controller state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Attempt limit for this session.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Attempts started so far.
    #[must_use]
    pub const fn attempts_used(&self) -> u32 {
        self.attempt
    }

    /// Attempts that may still be started.
    #[must_use]
    pub const fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt)
    }

    /// The full transcript, in order.
    #[must_use]
    pub fn transcript(&self) -> &[ConversationMessage] {
        &self.transcript
    }

    /// One record per finished attempt.
    #[must_use]
    pub fn history(&self) -> &[AttemptRecord] {
        &self.history
    }

    /// Returns the duration since the session started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }

    pub(crate) fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.state = SessionState::AwaitingGeneration;
        self.attempt_started_at = Some(Utc::now());
        self.touch();
        self.attempt
    }

    pub(crate) fn candidate_received(&mut self) {
        self.state = SessionState::AwaitingValidation;
        self.touch();
    }

    pub(crate) fn accept(&mut self, candidate_len: usize) {
        self.finish_attempt(AttemptOutcome::Accepted, candidate_len, Vec::new());
        self.state = SessionState::Accepted;
    }

    /// Records a rejection. With attempts left the feedback message is
    /// appended and the session waits for the next candidate; otherwise it
    /// is exhausted and nothing is appended.
    pub(crate) fn reject(&mut self, candidate_len: usize, diagnostics: Vec<String>, feedback: String) {
        self.finish_attempt(AttemptOutcome::Rejected, candidate_len, diagnostics);
        if self.attempts_remaining() == 0 {
            self.state = SessionState::Exhausted;
        } else {
            self.transcript.push(ConversationMessage::user(feedback));
            self.state = SessionState::AwaitingGeneration;
        }
    }

    /// Ends the session without starting an attempt, when none are allowed.
    pub(crate) fn exhaust(&mut self) {
        self.state = SessionState::Exhausted;
        self.touch();
    }

    /// Ends the session after a generator failure. The in-flight attempt,
    /// if any, is recorded as failed.
    pub(crate) fn abort(&mut self) {
        if self.attempt_started_at.is_some() {
            self.finish_attempt(AttemptOutcome::GenerationFailed, 0, Vec::new());
        }
        self.state = SessionState::Aborted;
    }

    fn finish_attempt(&mut self, outcome: AttemptOutcome, candidate_len: usize, diagnostics: Vec<String>) {
        let ended_at = Utc::now();
        self.history.push(AttemptRecord {
            attempt: self.attempt,
            outcome,
            candidate_len,
            diagnostics,
            started_at: self.attempt_started_at.take().unwrap_or(ended_at),
            ended_at,
        });
        self.updated_at = ended_at;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
