//! The compiled lesson document.
//!
//! These types are the only representation of a lesson that downstream
//! stages consume. They are produced by [`crate::SchemaValidator`] after a
//! candidate has passed the full schema check, never by parsing model output
//! directly.

use serde::{Deserialize, Serialize};

// ============================================================================
// Document
// ============================================================================

/// A validated lesson: a title followed by an ordered list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Lesson title.
    pub title: String,

    /// Content blocks in presentation order.
    pub blocks: Vec<Block>,
}

impl Document {
    /// Returns the number of blocks of each kind, in schema order
    /// (explanation, quiz, code, image).
    #[must_use]
    pub fn kind_counts(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for block in &self.blocks {
            let slot = match block {
                Block::Explanation(_) => 0,
                Block::Quiz(_) => 1,
                Block::Code(_) => 2,
                Block::Image(_) => 3,
            };
            counts[slot] += 1;
        }
        counts
    }
}

// ============================================================================
// Block
// ============================================================================

/// One content block, discriminated by its `kind` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    /// Prose explaining a concept, optionally illustrated by a diagram.
    Explanation(ExplanationBlock),
    /// A set of multiple-choice questions.
    Quiz(QuizBlock),
    /// A code sample with optional expected output.
    Code(CodeBlock),
    /// An illustration.
    Image(ImageBlock),
}

impl Block {
    /// Returns the `kind` discriminant as it appears in the schema.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Explanation(_) => "explanation",
            Self::Quiz(_) => "quiz",
            Self::Code(_) => "code",
            Self::Image(_) => "image",
        }
    }
}

/// An `explanation` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationBlock {
    /// Optional section heading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,

    /// Explanation text.
    pub body: String,

    /// Directive asking for a generated SVG diagram.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svg_generation_prompt: Option<String>,
}

/// A `quiz` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizBlock {
    /// Optional introduction shown above the questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The questions, in order.
    pub questions: Vec<QuizQuestion>,
}

/// A single multiple-choice question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    /// The question text.
    pub question: String,

    /// Answer choices.
    pub options: Vec<String>,

    /// Index of the correct entry in `options`.
    pub answer: usize,

    /// Optional explanation revealed after answering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QuizQuestion {
    /// Returns the text of the correct option.
    #[must_use]
    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.answer).map(String::as_str)
    }
}

/// A `code` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    /// Source language of the sample.
    pub language: CodeLanguage,

    /// The code itself.
    pub code: String,

    /// Expected output when the sample runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Languages accepted in a `code` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    /// TypeScript.
    Ts,
    /// JavaScript.
    Js,
    /// Python.
    Python,
}

impl CodeLanguage {
    /// All accepted language tags, as they appear in the schema.
    pub const TAGS: &'static [&'static str] = &["ts", "js", "python"];
}

impl std::fmt::Display for CodeLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ts => write!(f, "ts"),
            Self::Js => write!(f, "js"),
            Self::Python => write!(f, "python"),
        }
    }
}

/// An `image` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlock {
    /// Alternative text.
    pub alt: String,

    /// Location of an existing image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Directive asking for a generated raster image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_generation_prompt: Option<String>,
}
