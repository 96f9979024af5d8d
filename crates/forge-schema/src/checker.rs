//! Structural type check of a parsed declaration against the lesson schema.
//!
//! The schema is encoded as static tables mirroring
//! [`crate::SCHEMA_DEFINITION`]. Checking is total: every property of every
//! object is visited, every block is checked against the variant its `kind`
//! names, and all problems are reported rather than stopping at the first.

use std::collections::BTreeSet;

use crate::diagnostic::{Diagnostic, Position};
use crate::document::CodeLanguage;
use crate::parser::{Node, Property, Value};

// ============================================================================
// Schema tables
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum FieldType {
    Text,
    TextList,
    AnswerIndex,
    Language,
    Questions,
    Blocks,
}

impl FieldType {
    const fn label(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::TextList => "string[]",
            Self::AnswerIndex => "number",
            Self::Language => r#""ts" | "js" | "python""#,
            Self::Questions => "QuizQuestion[]",
            Self::Blocks => "GeneratedLessonBlock[]",
        }
    }
}

#[derive(Debug)]
struct FieldSpec {
    name: &'static str,
    required: bool,
    ty: FieldType,
}

const fn required(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        required: true,
        ty,
    }
}

const fn optional(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        required: false,
        ty,
    }
}

#[derive(Debug)]
struct ObjectSpec {
    type_name: &'static str,
    fields: &'static [FieldSpec],
}

const LESSON: ObjectSpec = ObjectSpec {
    type_name: "GeneratedLessonContent",
    fields: &[
        required("title", FieldType::Text),
        required("blocks", FieldType::Blocks),
    ],
};

const QUESTION: ObjectSpec = ObjectSpec {
    type_name: "QuizQuestion",
    fields: &[
        required("question", FieldType::Text),
        required("options", FieldType::TextList),
        required("answer", FieldType::AnswerIndex),
        optional("explanation", FieldType::Text),
    ],
};

/// Block variants keyed by their `kind` discriminant. The `kind` property
/// itself is handled by [`Checker::block`].
const BLOCK_VARIANTS: &[(&str, ObjectSpec)] = &[
    (
        "explanation",
        ObjectSpec {
            type_name: "ExplanationBlock",
            fields: &[
                optional("heading", FieldType::Text),
                required("body", FieldType::Text),
                optional("svgGenerationPrompt", FieldType::Text),
            ],
        },
    ),
    (
        "quiz",
        ObjectSpec {
            type_name: "QuizBlock",
            fields: &[
                optional("description", FieldType::Text),
                required("questions", FieldType::Questions),
            ],
        },
    ),
    (
        "code",
        ObjectSpec {
            type_name: "CodeBlock",
            fields: &[
                required("language", FieldType::Language),
                required("code", FieldType::Text),
                optional("output", FieldType::Text),
            ],
        },
    ),
    (
        "image",
        ObjectSpec {
            type_name: "ImageBlock",
            fields: &[
                required("alt", FieldType::Text),
                optional("url", FieldType::Text),
                optional("imageGenerationPrompt", FieldType::Text),
            ],
        },
    ),
];

const KIND_UNION: &str = r#""explanation" | "quiz" | "code" | "image""#;

// ============================================================================
// Checker
// ============================================================================

/// Checks the declaration initializer and returns every diagnostic found,
/// in traversal order. An empty result means the tree matches the schema.
pub fn check(root: &Node) -> Vec<Diagnostic> {
    let mut checker = Checker::default();
    checker.object(root, &LESSON, &[]);
    checker.diagnostics
}

#[derive(Default)]
struct Checker {
    diagnostics: Vec<Diagnostic>,
}

impl Checker {
    fn report(&mut self, position: Position, message: String) {
        self.diagnostics.push(Diagnostic::at(position, message));
    }

    fn mismatch(&mut self, node: &Node, expected: &str, property: Option<&str>) {
        let found = match &node.value {
            Value::String(s) if expected.starts_with('"') => format!("\"{s}\""),
            other => other.type_name().to_string(),
        };
        let message = match property {
            Some(name) => format!(
                "Type '{found}' is not assignable to type '{expected}' in property '{name}'"
            ),
            None => format!("Type '{found}' is not assignable to type '{expected}'"),
        };
        self.report(node.position, message);
    }

    /// Checks an object literal against `spec`. Property names listed in
    /// `handled` are accepted without further checks.
    fn object(&mut self, node: &Node, spec: &ObjectSpec, handled: &[&str]) {
        let Value::Object(properties) = &node.value else {
            self.mismatch(node, spec.type_name, None);
            return;
        };

        let mut seen = BTreeSet::new();
        for property in properties {
            if !seen.insert(property.key.as_str()) {
                self.report(
                    property.key_position,
                    format!(
                        "An object literal cannot have multiple properties with the same name '{}'",
                        property.key
                    ),
                );
                continue;
            }
            if handled.contains(&property.key.as_str()) {
                continue;
            }
            match spec.fields.iter().find(|f| f.name == property.key) {
                Some(field) => self.field(property, field),
                None => self.report(
                    property.key_position,
                    format!(
                        "Object literal may only specify known properties, and '{}' does not exist in type '{}'",
                        property.key, spec.type_name
                    ),
                ),
            }
        }

        for field in spec.fields.iter().filter(|f| f.required) {
            if !seen.contains(field.name) {
                self.report(
                    node.position,
                    format!(
                        "Property '{}' is missing but required in type '{}'",
                        field.name, spec.type_name
                    ),
                );
            }
        }
    }

    fn field(&mut self, property: &Property, field: &FieldSpec) {
        let node = &property.value;
        if matches!(node.value, Value::Null) && !field.required {
            let expected = format!("{} | undefined", field.ty.label());
            self.mismatch(node, &expected, Some(field.name));
            return;
        }

        match field.ty {
            FieldType::Text => {
                if !matches!(node.value, Value::String(_)) {
                    self.mismatch(node, field.ty.label(), Some(field.name));
                }
            }
            FieldType::TextList => match &node.value {
                Value::Array(items) => {
                    for item in items {
                        if !matches!(item.value, Value::String(_)) {
                            self.mismatch(item, "string", None);
                        }
                    }
                }
                _ => self.mismatch(node, field.ty.label(), Some(field.name)),
            },
            FieldType::AnswerIndex => match node.value {
                Value::Number(n) if !is_index(n) => self.report(
                    node.position,
                    format!("Quiz answer must be a non-negative integer index into options, found {n}"),
                ),
                Value::Number(_) => {}
                _ => self.mismatch(node, field.ty.label(), Some(field.name)),
            },
            FieldType::Language => match &node.value {
                Value::String(tag) if CodeLanguage::TAGS.contains(&tag.as_str()) => {}
                _ => self.mismatch(node, field.ty.label(), Some(field.name)),
            },
            FieldType::Questions => match &node.value {
                Value::Array(items) => {
                    for item in items {
                        self.object(item, &QUESTION, &[]);
                        self.answer_in_range(item);
                    }
                }
                _ => self.mismatch(node, field.ty.label(), Some(field.name)),
            },
            FieldType::Blocks => match &node.value {
                Value::Array(items) => {
                    for item in items {
                        self.block(item);
                    }
                }
                _ => self.mismatch(node, field.ty.label(), Some(field.name)),
            },
        }
    }

    fn block(&mut self, node: &Node) {
        let Value::Object(properties) = &node.value else {
            self.mismatch(node, "GeneratedLessonBlock", None);
            return;
        };

        let Some(kind) = properties.iter().find(|p| p.key == "kind") else {
            self.report(
                node.position,
                "Block is missing discriminant property 'kind'".to_string(),
            );
            return;
        };

        let Value::String(tag) = &kind.value.value else {
            self.mismatch(&kind.value, KIND_UNION, Some("kind"));
            return;
        };

        match BLOCK_VARIANTS.iter().find(|(name, _)| name == tag) {
            Some((_, spec)) => self.object(node, spec, &["kind"]),
            None => self.report(
                kind.value.position,
                format!("Unknown block kind '{tag}'; expected one of {KIND_UNION}"),
            ),
        }
    }

    /// Reports an `answer` that does not index into `options`. Type errors
    /// in either property are reported by [`Checker::object`] and skipped here.
    #[allow(clippy::cast_precision_loss)]
    fn answer_in_range(&mut self, question: &Node) {
        let Value::Object(properties) = &question.value else {
            return;
        };
        let find = |name: &str| properties.iter().find(|p| p.key == name);
        let (Some(options), Some(answer)) = (find("options"), find("answer")) else {
            return;
        };
        if let (Value::Array(items), Value::Number(n)) = (&options.value.value, &answer.value.value)
        {
            if is_index(*n) && *n >= items.len() as f64 {
                self.report(
                    answer.value.position,
                    format!(
                        "Quiz answer {n} is out of range for {} option(s)",
                        items.len()
                    ),
                );
            }
        }
    }
}

fn is_index(n: f64) -> bool {
    n.is_finite() && n >= 0.0 && n.fract() == 0.0
}

// ============================================================================
// Materialization
// ============================================================================

/// Converts a checked tree into JSON for typed deserialization.
pub fn to_json(node: &Node) -> serde_json::Value {
    match &node.value {
        Value::Object(properties) => serde_json::Value::Object(
            properties
                .iter()
                .map(|p| (p.key.clone(), to_json(&p.value)))
                .collect(),
        ),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Number(n) => number_to_json(*n),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Null => serde_json::Value::Null,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn number_to_json(n: f64) -> serde_json::Value {
    // 2^53: beyond this, f64 no longer represents every integer.
    if is_index(n) && n <= 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as u64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}
