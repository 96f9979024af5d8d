//! End-to-end driver: retry loop, then asset enrichment.

use std::time::Duration;

use forge_schema::CandidateValidator;
use serde::Serialize;
use tracing::info;

use crate::config::PersistenceConfig;
use crate::controller::{RetryFeedbackController, SessionOutcome};
use crate::error::{FailureReason, Result};
use crate::extractor::extract_asset_prompts;
use crate::generator::{AssetGenerator, ContentGenerator};
use crate::persistence::{record_fire_and_forget, PersistenceGateway, StatusUpdate};
use crate::request::{ContentRequest, RequestStatus};
use crate::synthesizer::ConcurrentAssetSynthesizer;

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    /// The request that was run.
    pub request_id: String,
    /// Final request status.
    pub status: RequestStatus,
    /// Generation attempts used.
    pub attempts: u32,
    /// Transcript length when the session ended.
    pub transcript_len: usize,
    /// Why the request failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    /// Failure detail, if the request failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    /// What the operator can do about a provider failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_suggestion: Option<String>,
    /// Asset directives found in the document.
    pub asset_prompts: usize,
    /// Assets generated.
    pub assets_generated: usize,
    /// Assets that failed.
    pub asset_failures: usize,
}

/// Default bound on one status write.
const DEFAULT_PERSISTENCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Wires the controller, the synthesizer and a persistence gateway.
#[derive(Debug)]
pub struct Pipeline<G, V, A, P> {
    controller: RetryFeedbackController<G, V>,
    synthesizer: ConcurrentAssetSynthesizer<A>,
    gateway: P,
    persistence_timeout: Duration,
}

impl<G, V, A, P> Pipeline<G, V, A, P>
where
    G: ContentGenerator,
    V: CandidateValidator,
    A: AssetGenerator,
    P: PersistenceGateway,
{
    /// Creates a pipeline from its stages.
    pub const fn new(
        controller: RetryFeedbackController<G, V>,
        synthesizer: ConcurrentAssetSynthesizer<A>,
        gateway: P,
    ) -> Self {
        Self {
            controller,
            synthesizer,
            gateway,
            persistence_timeout: DEFAULT_PERSISTENCE_TIMEOUT,
        }
    }

    /// Sets the bound on each status write.
    #[must_use]
    pub const fn with_persistence_timeout(mut self, timeout: Duration) -> Self {
        self.persistence_timeout = timeout;
        self
    }

    /// Applies the persistence section of the configuration.
    #[must_use]
    pub const fn with_persistence_config(self, config: &PersistenceConfig) -> Self {
        self.with_persistence_timeout(config.call_timeout())
    }

    /// The persistence gateway.
    pub const fn gateway(&self) -> &P {
        &self.gateway
    }

    /// Runs `request` from `generating` to a terminal status.
    ///
    /// The request's document is only set once a candidate has passed
    /// validation; on `failed` it stays `None`.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::InvalidStateTransition` if the request is not in
    /// the `generating` status.
    pub async fn run(&self, request: &mut ContentRequest) -> Result<PipelineReport> {
        if !request.status.can_transition_to(RequestStatus::ContentReady) {
            return Err(crate::ForgeError::invalid_transition(
                request.status,
                RequestStatus::ContentReady,
            ));
        }
        info!(request_id = %request.id, "Running lesson pipeline");

        let (session, outcome) = self.controller.run_session(&request.outline).await;
        request.attempts = session.attempts_used();
        let mut report = PipelineReport {
            request_id: request.id.clone(),
            status: request.status,
            attempts: session.attempts_used(),
            transcript_len: session.transcript().len(),
            failure: None,
            failure_message: None,
            failure_suggestion: None,
            asset_prompts: 0,
            assets_generated: 0,
            asset_failures: 0,
        };

        let document = match outcome {
            SessionOutcome::Failed(failure) => {
                request.transition(RequestStatus::Failed)?;
                request.failure = Some(failure.reason);
                request.diagnostics.clone_from(&failure.diagnostics);
                self.record(
                    request,
                    StatusUpdate::new(RequestStatus::Failed)
                        .with_failure(failure.reason)
                        .with_diagnostics(failure.diagnostics),
                )
                .await;

                info!(request_id = %request.id, reason = %failure.reason, "Request failed");
                report.status = request.status;
                report.failure = Some(failure.reason);
                report.failure_message = Some(failure.message);
                report.failure_suggestion = failure.suggestion.map(str::to_string);
                return Ok(report);
            }
            SessionOutcome::Accepted(document) => document,
        };

        request.transition(RequestStatus::ContentReady)?;
        request.document = Some(document.clone());
        self.record(
            request,
            StatusUpdate::new(RequestStatus::ContentReady).with_document(document.clone()),
        )
        .await;

        request.transition(RequestStatus::AssetEnriching)?;
        self.record(request, StatusUpdate::new(RequestStatus::AssetEnriching))
            .await;

        let prompts = extract_asset_prompts(&document);
        let enrichment = self.synthesizer.synthesize(&prompts).await;

        let final_status = if enrichment.is_complete() {
            RequestStatus::Complete
        } else {
            RequestStatus::Degraded
        };
        request.transition(final_status)?;
        self.record(
            request,
            StatusUpdate::new(final_status)
                .with_document(document)
                .with_assets(enrichment.successes.clone()),
        )
        .await;

        info!(
            request_id = %request.id,
            status = %final_status,
            assets = enrichment.successes.len(),
            failed = enrichment.failure_count,
            "Request finished"
        );
        report.status = final_status;
        report.asset_prompts = prompts.len();
        report.assets_generated = enrichment.successes.len();
        report.asset_failures = enrichment.failure_count;
        request.enrichment = Some(enrichment);
        Ok(report)
    }

    async fn record(&self, request: &ContentRequest, update: StatusUpdate) {
        record_fire_and_forget(&self.gateway, &request.id, update, self.persistence_timeout).await;
    }
}
