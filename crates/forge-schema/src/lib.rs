//! lessonforge document schema
//!
//! Defines the lesson document model and the static validator that accepts
//! or rejects model-written candidates. A candidate is a single TypeScript
//! declaration of the form
//!
//! ```text
//! const lesson: GeneratedLessonContent = { ... };
//! ```
//!
//! Validation parses the declaration, checks it structurally against
//! [`SCHEMA_DEFINITION`], and returns either a typed [`Document`] or a sorted
//! list of positioned [`Diagnostic`]s. Candidates are never executed.

pub mod checker;
pub mod diagnostic;
pub mod document;
pub mod lexer;
pub mod parser;
mod validator;

pub use diagnostic::{Diagnostic, Position};
pub use document::{
    Block, CodeBlock, CodeLanguage, Document, ExplanationBlock, ImageBlock, QuizBlock,
    QuizQuestion,
};
pub use validator::{CandidateValidator, SchemaValidator, ValidationResult, MAX_CANDIDATE_BYTES};

/// Version of the lesson schema. Bump when [`SCHEMA_DEFINITION`] changes.
pub const SCHEMA_VERSION: &str = "1";

/// The schema contract, in the form given to the content model.
pub const SCHEMA_DEFINITION: &str = r#"type GeneratedLessonContent = {
  title: string;
  blocks: GeneratedLessonBlock[];
};

type GeneratedLessonBlock = ExplanationBlock | QuizBlock | CodeBlock | ImageBlock;

type ExplanationBlock = {
  kind: "explanation";
  heading?: string;
  body: string;
  // Describe a diagram to be generated as an SVG illustration.
  svgGenerationPrompt?: string;
};

type QuizBlock = {
  kind: "quiz";
  description?: string;
  questions: QuizQuestion[];
};

type QuizQuestion = {
  question: string;
  options: string[];
  // Zero-based index into options.
  answer: number;
  explanation?: string;
};

type CodeBlock = {
  kind: "code";
  language: "ts" | "js" | "python";
  code: string;
  output?: string;
};

type ImageBlock = {
  kind: "image";
  alt: string;
  url?: string;
  // Describe an illustration to be generated as a raster image.
  imageGenerationPrompt?: string;
};"#;

/// A lexical or grammatical error in a candidate. Parsing stops at the first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{position}: {message}")]
pub struct SyntaxError {
    /// Where the error was detected.
    pub position: Position,
    /// What went wrong.
    pub message: String,
}

impl SyntaxError {
    /// Creates a syntax error at `position`.
    pub fn new(position: Position, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

impl From<SyntaxError> for Diagnostic {
    fn from(err: SyntaxError) -> Self {
        Self::at(err.position, err.message)
    }
}
