//! The candidate validator.
//!
//! [`SchemaValidator`] turns untrusted model output into either a compiled
//! [`Document`] or an ordered list of [`Diagnostic`]s. Validity is decided by
//! static parsing and type checking only; the candidate is never evaluated.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::checker;
use crate::diagnostic::{self, Diagnostic};
use crate::document::Document;
use crate::parser::{self, CONTRACT_TYPE};

/// Maximum accepted candidate size in bytes (256KB).
pub const MAX_CANDIDATE_BYTES: usize = 256 * 1024;

/// Matches the `const lesson` binding regardless of spacing.
#[allow(clippy::expect_used)]
static BINDING_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bconst\s+lesson\b").expect("binding pattern is a valid regex"));

// ============================================================================
// ValidationResult
// ============================================================================

/// Outcome of validating one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    /// The candidate matched the schema and compiled to a document.
    Valid(Document),
    /// The candidate was rejected. Never empty.
    Invalid(Vec<Diagnostic>),
}

impl ValidationResult {
    /// Builds a rejection from bare messages, with no source positions.
    #[must_use]
    pub fn rejected<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Invalid(messages.into_iter().map(Diagnostic::unpositioned).collect())
    }

    /// Returns `true` if the candidate was accepted.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Returns the compiled document, if the candidate was accepted.
    #[must_use]
    pub const fn compiled_document(&self) -> Option<&Document> {
        match self {
            Self::Valid(document) => Some(document),
            Self::Invalid(_) => None,
        }
    }

    /// Consumes the result, returning the compiled document if accepted.
    #[must_use]
    pub fn into_compiled_document(self) -> Option<Document> {
        match self {
            Self::Valid(document) => Some(document),
            Self::Invalid(_) => None,
        }
    }

    /// Returns the diagnostics. Empty when valid.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Valid(_) => &[],
            Self::Invalid(diagnostics) => diagnostics,
        }
    }

    /// Returns the diagnostics rendered as `line:column: message` strings.
    #[must_use]
    pub fn diagnostic_messages(&self) -> Vec<String> {
        self.diagnostics().iter().map(ToString::to_string).collect()
    }
}

// ============================================================================
// Validators
// ============================================================================

/// Anything that can judge a candidate document.
///
/// [`SchemaValidator`] is the production implementation; tests substitute
/// scripted validators to drive the retry loop deterministically.
pub trait CandidateValidator {
    /// Validates one candidate.
    fn validate(&self, candidate: &str) -> ValidationResult;
}

/// Static validator for the lesson declaration contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    /// Creates a validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a candidate supplied as raw bytes.
    ///
    /// Bytes that are not UTF-8 are rejected before any other check.
    #[must_use]
    pub fn validate_bytes(&self, bytes: &[u8]) -> ValidationResult {
        std::str::from_utf8(bytes).map_or_else(
            |_| ValidationResult::rejected(["Candidate is not valid UTF-8 text"]),
            |text| self.check(text),
        )
    }

    fn check(self, candidate: &str) -> ValidationResult {
        if let Some(rejection) = prefilter(candidate) {
            return ValidationResult::Invalid(vec![rejection]);
        }

        let root = match parser::parse_declaration(candidate) {
            Ok(root) => root,
            Err(err) => return ValidationResult::Invalid(vec![err.into()]),
        };

        let mut diagnostics = checker::check(&root);
        if !diagnostics.is_empty() {
            diagnostic::normalize(&mut diagnostics);
            return ValidationResult::Invalid(diagnostics);
        }

        match serde_json::from_value::<Document>(checker::to_json(&root)) {
            Ok(document) => ValidationResult::Valid(document),
            Err(err) => ValidationResult::rejected([format!(
                "Compiled lesson does not match the document model: {err}"
            )]),
        }
    }
}

impl CandidateValidator for SchemaValidator {
    fn validate(&self, candidate: &str) -> ValidationResult {
        self.check(candidate)
    }
}

/// Cheap rejections applied before parsing.
fn prefilter(candidate: &str) -> Option<Diagnostic> {
    if candidate.trim().is_empty() {
        return Some(Diagnostic::unpositioned("Candidate is empty"));
    }
    if candidate.len() > MAX_CANDIDATE_BYTES {
        return Some(Diagnostic::unpositioned(format!(
            "Candidate exceeds {MAX_CANDIDATE_BYTES} bytes"
        )));
    }

    if !BINDING_MARKER.is_match(candidate) || !candidate.contains(CONTRACT_TYPE) {
        return Some(Diagnostic::unpositioned(format!(
            "Code must contain \"const lesson: {CONTRACT_TYPE}\""
        )));
    }
    None
}
