//! Positioned validation diagnostics.

use serde::{Deserialize, Serialize};

/// A 1-based line/column location inside a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number, starting at 1.
    pub line: usize,
    /// Column number in characters, starting at 1.
    pub column: usize,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One human-readable validation message.
///
/// Diagnostics produced by the checker always carry a position. Pre-filter
/// rejections and scripted test diagnostics may not, in which case the
/// rendered form is the bare message.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Where the problem was found, if anywhere in particular.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Description of the problem.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic anchored at `position`.
    #[must_use]
    pub fn at(position: Position, message: impl Into<String>) -> Self {
        Self {
            position: Some(position),
            message: message.into(),
        }
    }

    /// Creates a diagnostic with no source position.
    #[must_use]
    pub fn unpositioned(message: impl Into<String>) -> Self {
        Self {
            position: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.position {
            Some(position) => write!(f, "{position}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Sorts diagnostics by position then message and drops exact duplicates.
///
/// Unpositioned diagnostics sort first.
pub fn normalize(diagnostics: &mut Vec<Diagnostic>) {
    diagnostics.sort();
    diagnostics.dedup();
}
