//! Fixed prompt text for the content model.

use forge_schema::SCHEMA_DEFINITION;

const RULES: &str = r#"Rules:
1. Output ONLY a TypeScript variable declaration: const lesson: GeneratedLessonContent = {...}
2. The object must satisfy the GeneratedLessonContent type below exactly. Do not add properties the type does not declare.
3. Use only literal data: strings, numbers, booleans, arrays and objects. No function calls, variables, expressions or template interpolation.

Content guidelines:
- Generate 6-8 blocks in total.
- Use explanation blocks for concepts and theory.
- Use code blocks ONLY when demonstrating actual code examples.
- Use quiz blocks for testing understanding. A quiz answer is the zero-based index of the correct option.
- Use image blocks sparingly, only when a visual aid is truly helpful, and describe the image in imageGenerationPrompt.
- Set svgGenerationPrompt on an explanation block only when a simple diagram would clarify it.
- Keep every block relevant to the lesson outline.

Output format:
- Start with "const lesson: GeneratedLessonContent = "
- End with ";"
- NO Markdown or fenced code blocks
- NO extra text or comments"#;

/// Returns the system message that opens every session.
#[must_use]
pub fn system_prompt() -> String {
    format!(
        "You are a code generator that produces TypeScript lessons.\n\n{RULES}\n\nSchema:\n{SCHEMA_DEFINITION}\n\nYour task: given a lesson outline, generate the lesson variable declaration."
    )
}

/// Returns the user message carrying the outline.
#[must_use]
pub fn outline_message(outline: &str) -> String {
    format!("Lesson outline: \"{outline}\"")
}

/// Returns the feedback message appended after a rejected attempt.
///
/// Carries every diagnostic from that attempt, in order, and the candidate
/// exactly as the model produced it.
#[must_use]
pub fn retry_feedback(diagnostics: &[String], previous_candidate: &str) -> String {
    format!(
        "The previous TypeScript code failed with these errors:\n{}\n\nPrevious generated code:\n```typescript\n{previous_candidate}\n```\n\nPlease regenerate valid code that fixes these issues.",
        diagnostics.join("\n")
    )
}
