//! Fixture-driven checks for configuration loading and offline validation.

use std::path::PathBuf;

use forge_pipeline::{extract_asset_prompts, Config, ControllerSettings, MediaKind};
use forge_schema::{Block, CandidateValidator, SchemaValidator};

/// Path to the fixtures directory.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn read_fixture(name: &str) -> String {
    let path = fixture_path().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("fixture {path:?}: {e}"))
}

#[test]
fn test_sample_config_loads() {
    let config_path = fixture_path().join("forge.json");
    let config = Config::load_from_file(&config_path).expect("Failed to load config");

    assert_eq!(config.generation.model, "gpt-4o-mini");
    assert_eq!(config.generation.max_attempts, 3);
    assert_eq!(config.assets.size_hint, "512x512");
    assert_eq!(config.assets.model, "dall-e-3");
    assert_eq!(config.api_key_env, "OPENAI_API_KEY");
    assert_eq!(config.output_dir, "out");
    assert_eq!(config.persistence.call_timeout().as_secs(), 10);

    let settings = ControllerSettings::from(&config.generation);
    assert_eq!(settings.max_attempts, 3);
    assert_eq!(settings.call_timeout.as_secs(), 30);
    assert_eq!(settings.session_deadline.as_secs(), 120);
}

#[test]
fn test_config_dir_without_file_uses_defaults() {
    let config = Config::load_from_dir(&fixture_path().join("missing")).unwrap();
    assert_eq!(config.generation.max_attempts, 5);
    assert_eq!(config.output_dir, "lessons");
    assert_eq!(config.persistence.call_timeout_secs, 30);
}

#[test]
fn test_sample_lesson_validates() {
    let result = SchemaValidator::new().validate(&read_fixture("intro-to-loops.ts"));
    let document = result.into_compiled_document().expect("fixture should validate");

    assert_eq!(document.title, "Intro to loops");
    let kinds: Vec<&str> = document.blocks.iter().map(Block::kind).collect();
    assert_eq!(kinds, ["explanation", "code", "image", "quiz"]);

    let prompts = extract_asset_prompts(&document);
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0].block_index, 0);
    assert_eq!(prompts[0].media_kind, MediaKind::Diagram);
    assert_eq!(prompts[1].block_index, 2);
    assert_eq!(prompts[1].media_kind, MediaKind::Image);
}

#[test]
fn test_wrong_kind_fixture_is_rejected_with_positions() {
    let candidate = read_fixture("wrong-kind.ts");
    let validator = SchemaValidator::new();
    let result = validator.validate(&candidate);

    assert!(!result.is_valid());
    let messages = result.diagnostic_messages();
    assert_eq!(
        messages,
        vec![
            "4:13: Unknown block kind 'video'; expected one of \"explanation\" | \"quiz\" | \"code\" | \"image\"".to_string(),
            "5:86: Quiz answer 2 is out of range for 2 option(s)".to_string(),
        ]
    );

    // Same input, same list.
    assert_eq!(validator.validate(&candidate), result);
}

#[test]
fn test_validate_bytes_rejects_non_utf8() {
    let result = SchemaValidator::new().validate_bytes(&[0xff, 0xfe, 0x00]);
    assert_eq!(
        result.diagnostic_messages(),
        vec!["Candidate is not valid UTF-8 text".to_string()]
    );
}
