//! End-to-end integration tests for the lesson pipeline.
//!
//! Every external collaborator is scripted: the content generator replays a
//! queue of candidates, the validator can be told to reject the first few
//! attempts, the asset generator fails or stalls on request, and the
//! gateways record or refuse status updates.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use forge_pipeline::{
    extract_asset_prompts, AssetGenerationError, AssetGenerator, AssetPrompt, CandidateDocument,
    ConcurrentAssetSynthesizer, ContentGenerator, ContentRequest, ControllerSettings,
    ConversationMessage, FailureReason, FsGateway, GeneratedAsset, GenerationError,
    GenerationErrorKind, MediaKind, PersistenceError, PersistenceGateway, Pipeline,
    RequestStatus, RetryFeedbackController, Role, SessionOutcome, StatusUpdate,
};
use forge_schema::{CandidateValidator, Document, SchemaValidator, ValidationResult};

const OUTLINE: &str = "Intro to loops";

// ============================================================================
// Scripted collaborators
// ============================================================================

/// Replays queued responses and records the transcript of every call.
struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<CandidateDocument, GenerationError>>>,
    seen: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl ScriptedGenerator {
    fn new(responses: Vec<Result<CandidateDocument, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Returns `candidate` for every call.
    fn repeating(candidate: &str, times: usize) -> Self {
        Self::new(vec![Ok(candidate.to_string()); times])
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn transcripts(&self) -> Vec<Vec<ConversationMessage>> {
        self.seen.lock().unwrap().clone()
    }
}

impl ContentGenerator for &ScriptedGenerator {
    async fn generate(
        &self,
        transcript: &[ConversationMessage],
    ) -> Result<CandidateDocument, GenerationError> {
        self.seen.lock().unwrap().push(transcript.to_vec());
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Err(GenerationError::new(
                GenerationErrorKind::Empty,
                "script exhausted",
            ))
        })
    }
}

/// Rejects the first `reject` candidates with distinct diagnostics, then
/// defers to the schema validator.
struct RejectFirst {
    reject: usize,
    calls: AtomicUsize,
}

impl RejectFirst {
    fn new(reject: usize) -> Self {
        Self {
            reject,
            calls: AtomicUsize::new(0),
        }
    }

    fn diagnostics_for(attempt: usize) -> Vec<String> {
        vec![
            format!("{attempt}:1: Property 'title' is missing in attempt {attempt}"),
            format!("{attempt}:9: Unknown block kind 'slide-{attempt}'"),
        ]
    }
}

impl CandidateValidator for RejectFirst {
    fn validate(&self, candidate: &str) -> ValidationResult {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.reject {
            return ValidationResult::rejected(Self::diagnostics_for(attempt));
        }
        SchemaValidator::new().validate(candidate)
    }
}

/// Asset generator whose behavior is keyed on the prompt text.
///
/// Prompts containing `FAIL` fail, prompts containing `STALL` never finish
/// within the test timeouts. Delays are taken from `delays` in dispatch
/// order so completion order can be shuffled.
struct ScriptedAssets {
    delays: Vec<u64>,
    dispatched: AtomicUsize,
}

impl ScriptedAssets {
    fn new() -> Self {
        Self::with_delays(Vec::new())
    }

    fn with_delays(delays: Vec<u64>) -> Self {
        Self {
            delays,
            dispatched: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }
}

impl AssetGenerator for &ScriptedAssets {
    async fn generate_asset(
        &self,
        prompt_text: &str,
        _size_hint: &str,
    ) -> Result<GeneratedAsset, AssetGenerationError> {
        let slot = self.dispatched.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.get(slot).copied().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if prompt_text.contains("STALL") {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if prompt_text.contains("FAIL") {
            return Err(AssetGenerationError::new(
                GenerationErrorKind::Status(500),
                "provider unavailable",
            ));
        }
        Ok(GeneratedAsset {
            data: prompt_text.as_bytes().to_vec(),
            media_type: "image/png".to_string(),
        })
    }
}

/// Records every status update.
#[derive(Default)]
struct RecordingGateway {
    updates: Mutex<Vec<(String, StatusUpdate)>>,
}

impl RecordingGateway {
    fn statuses(&self) -> Vec<RequestStatus> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|(_, update)| update.status)
            .collect()
    }

    fn last(&self) -> StatusUpdate {
        self.updates.lock().unwrap().last().unwrap().1.clone()
    }
}

impl PersistenceGateway for &RecordingGateway {
    async fn record_status(
        &self,
        request_id: &str,
        update: StatusUpdate,
    ) -> Result<(), PersistenceError> {
        self.updates
            .lock()
            .unwrap()
            .push((request_id.to_string(), update));
        Ok(())
    }
}

/// Refuses every status update.
struct FailingGateway;

impl PersistenceGateway for FailingGateway {
    async fn record_status(
        &self,
        request_id: &str,
        _update: StatusUpdate,
    ) -> Result<(), PersistenceError> {
        Err(PersistenceError::new(request_id, "storage offline"))
    }
}

/// Accepts status updates but never finishes writing them.
struct HangingGateway;

impl PersistenceGateway for HangingGateway {
    async fn record_status(
        &self,
        _request_id: &str,
        _update: StatusUpdate,
    ) -> Result<(), PersistenceError> {
        std::future::pending().await
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds a lesson whose explanation blocks carry the given SVG directives,
/// followed by image blocks carrying the given image directives.
fn lesson(diagrams: &[&str], images: &[&str]) -> String {
    let mut blocks = Vec::new();
    for directive in diagrams {
        blocks.push(format!(
            "    {{ kind: \"explanation\", body: \"Loops repeat work.\", svgGenerationPrompt: \"{directive}\" }},"
        ));
    }
    blocks.push(
        "    { kind: \"code\", language: \"python\", code: \"for i in range(3):\\n    print(i)\" },"
            .to_string(),
    );
    for directive in images {
        blocks.push(format!(
            "    {{ kind: \"image\", alt: \"illustration\", imageGenerationPrompt: \"{directive}\" }},"
        ));
    }
    format!(
        "const lesson: GeneratedLessonContent = {{\n  title: \"{OUTLINE}\",\n  blocks: [\n{}\n  ],\n}};",
        blocks.join("\n")
    )
}

fn settings() -> ControllerSettings {
    ControllerSettings {
        max_attempts: 5,
        call_timeout: Duration::from_secs(5),
        session_deadline: Duration::from_secs(30),
    }
}

fn synthesizer(assets: &ScriptedAssets) -> ConcurrentAssetSynthesizer<&ScriptedAssets> {
    ConcurrentAssetSynthesizer::new(assets, "1024x1024", Duration::from_millis(500))
}

fn prompts(texts: &[&str]) -> Vec<AssetPrompt> {
    texts
        .iter()
        .enumerate()
        .map(|(block_index, text)| AssetPrompt {
            prompt_text: (*text).to_string(),
            block_index,
            media_kind: MediaKind::Image,
        })
        .collect()
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test]
async fn test_scenario_a_accepted_first_attempt_all_assets_succeed() {
    let generator = ScriptedGenerator::repeating(
        &lesson(&["a circular arrow"], &["a conveyor belt of boxes"]),
        1,
    );
    let assets = ScriptedAssets::new();
    let gateway = RecordingGateway::default();
    let pipeline = Pipeline::new(
        RetryFeedbackController::new(&generator, RejectFirst::new(0), settings()),
        synthesizer(&assets),
        &gateway,
    );

    let mut request = ContentRequest::new("scenario-a", OUTLINE);
    let report = pipeline.run(&mut request).await.unwrap();

    assert_eq!(report.status, RequestStatus::Complete);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.asset_prompts, 2);
    assert_eq!(report.assets_generated, 2);
    assert_eq!(report.asset_failures, 0);
    assert_eq!(generator.calls(), 1);
    assert_eq!(assets.calls(), 2);

    assert_eq!(request.status, RequestStatus::Complete);
    assert_eq!(request.document.as_ref().unwrap().title, OUTLINE);
    let enrichment = request.enrichment.as_ref().unwrap();
    assert_eq!(enrichment.failure_count, 0);
    assert!(enrichment.is_complete());

    assert_eq!(
        gateway.statuses(),
        vec![
            RequestStatus::ContentReady,
            RequestStatus::AssetEnriching,
            RequestStatus::Complete,
        ]
    );
    let last = gateway.last();
    assert!(last.document.is_some());
    assert_eq!(last.assets.unwrap().len(), 2);
}

#[tokio::test]
async fn test_scenario_b_every_attempt_rejected() {
    let generator = ScriptedGenerator::new(
        (1..=5)
            .map(|n| Ok(format!("candidate number {n}")))
            .collect(),
    );
    let assets = ScriptedAssets::new();
    let gateway = RecordingGateway::default();
    let controller = RetryFeedbackController::new(&generator, RejectFirst::new(5), settings());

    let (session, outcome) = controller.run_session(OUTLINE).await;
    assert_eq!(outcome.failure_reason(), Some(FailureReason::ValidationExhausted));
    assert_eq!(session.transcript().len(), 6);
    assert_eq!(generator.calls(), 5);

    let generator = ScriptedGenerator::new(
        (1..=5)
            .map(|n| Ok(format!("candidate number {n}")))
            .collect(),
    );
    let pipeline = Pipeline::new(
        RetryFeedbackController::new(&generator, RejectFirst::new(5), settings()),
        synthesizer(&assets),
        &gateway,
    );
    let mut request = ContentRequest::new("scenario-b", OUTLINE);
    let report = pipeline.run(&mut request).await.unwrap();

    assert_eq!(report.status, RequestStatus::Failed);
    assert_eq!(report.failure, Some(FailureReason::ValidationExhausted));
    assert_eq!(report.attempts, 5);
    assert_eq!(report.transcript_len, 6);
    assert_eq!(generator.calls(), 5);
    assert_eq!(assets.calls(), 0);

    assert!(request.document.is_none());
    assert_eq!(request.diagnostics, RejectFirst::diagnostics_for(5));
    assert_eq!(gateway.statuses(), vec![RequestStatus::Failed]);
    let last = gateway.last();
    assert_eq!(last.failure, Some(FailureReason::ValidationExhausted));
    assert!(last.document.is_none());
}

#[tokio::test]
async fn test_scenario_c_one_asset_fails() {
    let generator = ScriptedGenerator::repeating(
        &lesson(&["a flowchart", "FAIL a broken diagram"], &["a spinning wheel"]),
        1,
    );
    let assets = ScriptedAssets::new();
    let gateway = RecordingGateway::default();
    let pipeline = Pipeline::new(
        RetryFeedbackController::new(&generator, RejectFirst::new(0), settings()),
        synthesizer(&assets),
        &gateway,
    );

    let mut request = ContentRequest::new("scenario-c", OUTLINE);
    let report = pipeline.run(&mut request).await.unwrap();

    assert_eq!(report.status, RequestStatus::Degraded);
    assert_eq!(report.assets_generated, 2);
    assert_eq!(report.asset_failures, 1);

    let enrichment = request.enrichment.as_ref().unwrap();
    assert_eq!(enrichment.successes.len(), 2);
    assert_eq!(enrichment.failure_count, 1);
    let merged = enrichment.merged_by_block();
    assert_eq!(merged.keys().copied().collect::<Vec<_>>(), vec![0, 3]);

    assert_eq!(gateway.statuses().last(), Some(&RequestStatus::Degraded));
    assert!(request.document.is_some());
}

// ============================================================================
// Retry loop properties
// ============================================================================

#[tokio::test]
async fn test_accept_on_attempt_k_calls_generator_k_times() {
    let candidate = lesson(&[], &[]);
    for k in 1..=5 {
        let generator = ScriptedGenerator::repeating(&candidate, 10);
        let controller =
            RetryFeedbackController::new(&generator, RejectFirst::new(k - 1), settings());

        let (session, outcome) = controller.run_session(OUTLINE).await;

        assert!(matches!(outcome, SessionOutcome::Accepted(_)), "k = {k}");
        assert_eq!(generator.calls(), k, "k = {k}");
        assert_eq!(session.attempts_used() as usize, k);
        assert_eq!(session.transcript().len(), 2 + (k - 1));
    }
}

#[tokio::test]
async fn test_feedback_carries_only_the_preceding_attempt() {
    let generator = ScriptedGenerator::new(vec![
        Ok("first candidate".to_string()),
        Ok("second candidate".to_string()),
        Ok(lesson(&[], &[])),
    ]);
    let controller = RetryFeedbackController::new(&generator, RejectFirst::new(2), settings());

    let outcome = controller.run(OUTLINE).await;
    assert!(matches!(outcome, SessionOutcome::Accepted(_)));

    let transcripts = generator.transcripts();
    assert_eq!(transcripts.len(), 3);
    assert_eq!(transcripts[0].len(), 2);
    assert_eq!(transcripts[0][0].role, Role::System);
    assert_eq!(transcripts[0][1].content, format!("Lesson outline: \"{OUTLINE}\""));

    let third = &transcripts[2];
    assert_eq!(third.len(), 4);
    assert!(third.iter().skip(1).all(|m| m.role == Role::User));

    let first_feedback = &third[2].content;
    assert!(first_feedback.contains(&RejectFirst::diagnostics_for(1).join("\n")));
    assert!(first_feedback.contains("first candidate"));
    assert!(!first_feedback.contains("second candidate"));

    let second_feedback = &third[3].content;
    assert!(second_feedback.contains(&RejectFirst::diagnostics_for(2).join("\n")));
    assert!(second_feedback.contains("second candidate"));
    assert!(!second_feedback.contains("first candidate"));
    assert!(!second_feedback.contains(&RejectFirst::diagnostics_for(1)[0]));
}

#[tokio::test]
async fn test_generation_error_on_attempt_k_stops_the_session() {
    for k in 1..=3 {
        let mut responses: Vec<Result<CandidateDocument, GenerationError>> = (1..k)
            .map(|n| Ok(format!("rejected candidate {n}")))
            .collect();
        responses.push(Err(GenerationError::new(
            GenerationErrorKind::Status(503),
            "upstream overloaded",
        )));
        responses.push(Ok(lesson(&[], &[])));

        let generator = ScriptedGenerator::new(responses);
        let controller =
            RetryFeedbackController::new(&generator, RejectFirst::new(5), settings());

        let outcome = controller.run(OUTLINE).await;

        assert_eq!(generator.calls(), k, "k = {k}");
        let SessionOutcome::Failed(failure) = outcome else {
            panic!("expected failure for k = {k}");
        };
        assert_eq!(failure.reason, FailureReason::GenerationError);
        assert!(failure.message.contains("upstream overloaded"));
    }
}

#[tokio::test]
async fn test_real_validator_drives_the_loop() {
    let broken = "const lesson: GeneratedLessonContent = { title: \"Loops\", blocks: [{ kind: \"video\" }] };";
    let generator = ScriptedGenerator::new(vec![Ok(broken.to_string()), Ok(lesson(&[], &[]))]);
    let controller = RetryFeedbackController::new(&generator, SchemaValidator::new(), settings());

    let (session, outcome) = controller.run_session(OUTLINE).await;

    assert!(matches!(outcome, SessionOutcome::Accepted(_)));
    assert_eq!(session.attempts_used(), 2);
    let feedback = &session.transcript()[2].content;
    assert!(feedback.contains("Unknown block kind 'video'"));
    assert!(feedback.contains(broken));
}

// ============================================================================
// Asset synthesis properties
// ============================================================================

#[tokio::test]
async fn test_success_plus_failure_count_equals_prompt_count() {
    let cases: [&[&str]; 4] = [
        &[],
        &["one"],
        &["FAIL one", "two", "FAIL three"],
        &["one", "STALL two", "three", "FAIL four"],
    ];
    for texts in cases {
        let assets = ScriptedAssets::new();
        let outcome = synthesizer(&assets).synthesize(&prompts(texts)).await;

        assert_eq!(
            outcome.successes.len() + outcome.failure_count,
            texts.len(),
            "prompts: {texts:?}"
        );
        assert_eq!(outcome.total(), texts.len());
        assert_eq!(assets.calls(), texts.len());
    }
}

#[tokio::test]
async fn test_merge_is_independent_of_completion_order() {
    let texts = ["zero", "one", "FAIL two", "three"];
    let orders: [[u64; 4]; 4] = [
        [0, 0, 0, 0],
        [80, 60, 40, 20],
        [20, 80, 0, 40],
        [60, 0, 80, 20],
    ];

    let mut merged_runs: Vec<BTreeMap<usize, Vec<u8>>> = Vec::new();
    for delays in orders {
        let assets = ScriptedAssets::with_delays(delays.to_vec());
        let outcome = synthesizer(&assets).synthesize(&prompts(&texts)).await;
        assert_eq!(outcome.failure_count, 1);
        merged_runs.push(
            outcome
                .merged_by_block()
                .into_iter()
                .map(|(index, result)| (index, result.data.clone()))
                .collect(),
        );
    }

    let expected: BTreeMap<usize, Vec<u8>> = [(0, "zero"), (1, "one"), (3, "three")]
        .into_iter()
        .map(|(index, text)| (index, text.as_bytes().to_vec()))
        .collect();
    for merged in merged_runs {
        assert_eq!(merged, expected);
    }
}

#[tokio::test]
async fn test_stalled_asset_counts_as_one_failure() {
    let generator = ScriptedGenerator::repeating(&lesson(&["STALL forever"], &["a quick sketch"]), 1);
    let assets = ScriptedAssets::new();
    let gateway = RecordingGateway::default();
    let pipeline = Pipeline::new(
        RetryFeedbackController::new(&generator, RejectFirst::new(0), settings()),
        synthesizer(&assets),
        &gateway,
    );

    let started = std::time::Instant::now();
    let mut request = ContentRequest::new("stalled", OUTLINE);
    let report = pipeline.run(&mut request).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(report.status, RequestStatus::Degraded);
    assert_eq!(report.assets_generated, 1);
    assert_eq!(report.asset_failures, 1);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_persistence_failures_do_not_change_outcome() {
    let candidate = lesson(&["a flowchart", "FAIL diagram"], &[]);

    let recorded = {
        let generator = ScriptedGenerator::repeating(&candidate, 2);
        let assets = ScriptedAssets::new();
        let gateway = RecordingGateway::default();
        let pipeline = Pipeline::new(
            RetryFeedbackController::new(&generator, RejectFirst::new(1), settings()),
            synthesizer(&assets),
            &gateway,
        );
        let mut request = ContentRequest::new("persisted", OUTLINE);
        pipeline.run(&mut request).await.unwrap()
    };

    let generator = ScriptedGenerator::repeating(&candidate, 2);
    let assets = ScriptedAssets::new();
    let pipeline = Pipeline::new(
        RetryFeedbackController::new(&generator, RejectFirst::new(1), settings()),
        synthesizer(&assets),
        FailingGateway,
    );
    let mut request = ContentRequest::new("unpersisted", OUTLINE);
    let unrecorded = pipeline.run(&mut request).await.unwrap();

    assert_eq!(unrecorded.status, RequestStatus::Degraded);
    assert_eq!(unrecorded.status, recorded.status);
    assert_eq!(unrecorded.attempts, recorded.attempts);
    assert_eq!(unrecorded.assets_generated, recorded.assets_generated);
    assert_eq!(unrecorded.asset_failures, recorded.asset_failures);
    assert!(request.document.is_some());
}

#[tokio::test]
async fn test_hanging_store_does_not_block_the_run() {
    let generator = ScriptedGenerator::repeating(&lesson(&["a flowchart"], &["a photo"]), 1);
    let assets = ScriptedAssets::new();
    let pipeline = Pipeline::new(
        RetryFeedbackController::new(&generator, RejectFirst::new(0), settings()),
        synthesizer(&assets),
        HangingGateway,
    )
    .with_persistence_timeout(Duration::from_millis(100));

    let mut request = ContentRequest::new("hanging-store", OUTLINE);
    let report = tokio::time::timeout(Duration::from_secs(5), pipeline.run(&mut request))
        .await
        .expect("run should not wait on a stalled store")
        .unwrap();

    assert_eq!(report.status, RequestStatus::Complete);
    assert_eq!(report.assets_generated, 2);
    assert_eq!(generator.calls(), 1);
    assert!(request.document.is_some());
    assert_eq!(request.status, RequestStatus::Complete);
}

#[tokio::test]
async fn test_fs_gateway_end_to_end() {
    let root = std::env::temp_dir().join(format!("forge_e2e_{}", std::process::id()));
    std::fs::remove_dir_all(&root).ok();

    let generator =
        ScriptedGenerator::repeating(&lesson(&["a flowchart"], &["FAIL a photo"]), 1);
    let assets = ScriptedAssets::new();
    let pipeline = Pipeline::new(
        RetryFeedbackController::new(&generator, RejectFirst::new(0), settings()),
        synthesizer(&assets),
        FsGateway::new(&root),
    );

    let mut request = ContentRequest::new("lesson-e2e", OUTLINE);
    let report = pipeline.run(&mut request).await.unwrap();
    assert_eq!(report.status, RequestStatus::Degraded);

    let dir = pipeline.gateway().request_dir("lesson-e2e");
    let saved: Document =
        serde_json::from_slice(&std::fs::read(dir.join("document.json")).unwrap()).unwrap();
    assert_eq!(Some(&saved), request.document.as_ref());
    assert_eq!(extract_asset_prompts(&saved).len(), 2);

    let status: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.join("status.json")).unwrap()).unwrap();
    assert_eq!(status["status"], "degraded");
    assert_eq!(status["requestId"], "lesson-e2e");
    assert_eq!(status["assets"].as_array().unwrap().len(), 1);
    assert_eq!(status["assets"][0]["blockIndex"], 0);
    assert!(dir.join("assets/block-0.png").exists());

    std::fs::remove_dir_all(&root).ok();
}
