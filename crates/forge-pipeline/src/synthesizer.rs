//! Concurrent asset synthesis.
//!
//! Every prompt is dispatched at once and the stage waits for all of them to
//! settle. One failure never cancels or hides a sibling's result.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::AssetConfig;
use crate::error::AssetGenerationError;
use crate::extractor::AssetPrompt;
use crate::generator::{AssetGenerator, GeneratedAsset};

/// One successfully generated asset, keyed by its originating block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetResult {
    /// Position of the originating block in the document.
    pub block_index: usize,
    /// Encoded media bytes.
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub media_type: String,
}

/// Aggregate result of one enrichment run.
///
/// `successes.len() + failure_count` always equals the number of prompts.
/// The order of `successes` carries no meaning; merge by `block_index`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentOutcome {
    /// Assets that were generated.
    pub successes: Vec<AssetResult>,
    /// Prompts whose call failed or timed out.
    pub failure_count: usize,
}

impl EnrichmentOutcome {
    /// Number of prompts this outcome accounts for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.successes.len() + self.failure_count
    }

    /// Returns `true` if no asset failed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failure_count == 0
    }

    /// Indexes the successes by block position.
    #[must_use]
    pub fn merged_by_block(&self) -> BTreeMap<usize, &AssetResult> {
        self.successes
            .iter()
            .map(|asset| (asset.block_index, asset))
            .collect()
    }
}

/// Fans asset prompts out to an [`AssetGenerator`] and gathers every outcome.
#[derive(Debug)]
pub struct ConcurrentAssetSynthesizer<A> {
    generator: A,
    size_hint: String,
    call_timeout: Duration,
}

impl<A: AssetGenerator> ConcurrentAssetSynthesizer<A> {
    /// Creates a synthesizer with an explicit size hint and per-call timeout.
    pub fn new(generator: A, size_hint: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            generator,
            size_hint: size_hint.into(),
            call_timeout,
        }
    }

    /// Creates a synthesizer from the `assets` config section.
    pub fn from_config(generator: A, config: &AssetConfig) -> Self {
        Self::new(generator, config.size_hint.clone(), config.call_timeout())
    }

    /// Generates one asset per prompt, concurrently, and waits for all.
    ///
    /// Never fails as a whole: each failed or timed-out call adds one to
    /// `failure_count` and is logged.
    pub async fn synthesize(&self, prompts: &[AssetPrompt]) -> EnrichmentOutcome {
        if prompts.is_empty() {
            debug!("No asset prompts; skipping enrichment");
            return EnrichmentOutcome::default();
        }

        info!(prompts = prompts.len(), size = %self.size_hint, "Dispatching asset generation");
        let settled = join_all(prompts.iter().map(|prompt| self.dispatch(prompt))).await;

        let mut outcome = EnrichmentOutcome::default();
        for (prompt, result) in prompts.iter().zip(settled) {
            match result {
                Ok(asset) => {
                    debug!(
                        block_index = prompt.block_index,
                        media_type = %asset.media_type,
                        bytes = asset.data.len(),
                        "Asset generated"
                    );
                    outcome.successes.push(AssetResult {
                        block_index: prompt.block_index,
                        data: asset.data,
                        media_type: asset.media_type,
                    });
                }
                Err(err) => {
                    warn!(
                        block_index = prompt.block_index,
                        media_kind = %prompt.media_kind,
                        transient = err.kind.is_transient(),
                        error = %err,
                        "Asset generation failed"
                    );
                    outcome.failure_count += 1;
                }
            }
        }

        info!(
            generated = outcome.successes.len(),
            failed = outcome.failure_count,
            "Asset generation settled"
        );
        outcome
    }

    async fn dispatch(&self, prompt: &AssetPrompt) -> Result<GeneratedAsset, AssetGenerationError> {
        let call = self
            .generator
            .generate_asset(&prompt.prompt_text, &self.size_hint);
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AssetGenerationError::timeout(self.call_timeout)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::GenerationErrorKind;
    use crate::extractor::MediaKind;

    /// Answers each prompt after a per-prompt delay; prompts containing
    /// "fail" are rejected.
    struct DelayedGenerator {
        delays_ms: HashMap<String, u64>,
        calls: AtomicUsize,
    }

    impl DelayedGenerator {
        fn new(delays_ms: &[(&str, u64)]) -> Self {
            Self {
                delays_ms: delays_ms
                    .iter()
                    .map(|(p, d)| ((*p).to_string(), *d))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl AssetGenerator for DelayedGenerator {
        async fn generate_asset(
            &self,
            prompt_text: &str,
            size_hint: &str,
        ) -> Result<GeneratedAsset, AssetGenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delays_ms.get(prompt_text).copied().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if prompt_text.contains("fail") {
                return Err(AssetGenerationError::new(
                    GenerationErrorKind::Status(500),
                    "upstream error",
                ));
            }
            Ok(GeneratedAsset {
                data: format!("{prompt_text}@{size_hint}").into_bytes(),
                media_type: "image/png".to_string(),
            })
        }
    }

    fn prompt(text: &str, block_index: usize) -> AssetPrompt {
        AssetPrompt {
            prompt_text: text.to_string(),
            block_index,
            media_kind: MediaKind::Image,
        }
    }

    fn synthesizer(generator: DelayedGenerator) -> ConcurrentAssetSynthesizer<DelayedGenerator> {
        ConcurrentAssetSynthesizer::new(generator, "1024x1024", Duration::from_secs(5))
    }

    #[test]
    fn test_empty_prompts_make_no_calls() {
        let synth = synthesizer(DelayedGenerator::new(&[]));
        let outcome = tokio_test::block_on(synth.synthesize(&[]));

        assert_eq!(outcome, EnrichmentOutcome::default());
        assert_eq!(outcome.total(), 0);
        assert_eq!(synth.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_hide_siblings() {
        let synth = synthesizer(DelayedGenerator::new(&[("a", 30), ("fail", 0), ("c", 10)]));
        let prompts = [prompt("a", 1), prompt("fail", 3), prompt("c", 5)];
        let outcome = synth.synthesize(&prompts).await;

        assert_eq!(outcome.successes.len(), 2);
        assert_eq!(outcome.failure_count, 1);
        assert_eq!(outcome.total(), prompts.len());
        assert!(!outcome.is_complete());

        let merged = outcome.merged_by_block();
        assert_eq!(merged.keys().copied().collect::<Vec<_>>(), vec![1, 5]);
        assert_eq!(merged[&5].data, b"c@1024x1024");
    }

    #[tokio::test]
    async fn test_merge_is_independent_of_completion_order() {
        let prompts = [prompt("p0", 0), prompt("p2", 2), prompt("p4", 4)];
        let orders: [[u64; 3]; 3] = [[10, 20, 30], [30, 20, 10], [20, 30, 10]];

        let mut merged_runs = Vec::new();
        for delays in orders {
            let synth = synthesizer(DelayedGenerator::new(&[
                ("p0", delays[0]),
                ("p2", delays[1]),
                ("p4", delays[2]),
            ]));
            let outcome = synth.synthesize(&prompts).await;
            let merged: Vec<(usize, Vec<u8>)> = outcome
                .merged_by_block()
                .into_iter()
                .map(|(index, asset)| (index, asset.data.clone()))
                .collect();
            merged_runs.push(merged);
        }

        assert_eq!(merged_runs[0], merged_runs[1]);
        assert_eq!(merged_runs[1], merged_runs[2]);
    }

    #[tokio::test]
    async fn test_calls_run_concurrently() {
        let synth = synthesizer(DelayedGenerator::new(&[("a", 200), ("b", 200), ("c", 200)]));
        let started = std::time::Instant::now();
        let outcome = synth
            .synthesize(&[prompt("a", 0), prompt("b", 1), prompt("c", 2)])
            .await;

        assert_eq!(outcome.successes.len(), 3);
        assert!(started.elapsed() < Duration::from_millis(550));
    }

    #[tokio::test]
    async fn test_timed_out_call_counts_as_failure() {
        let synth = ConcurrentAssetSynthesizer::new(
            DelayedGenerator::new(&[("slow", 5_000), ("fast", 0)]),
            "512x512",
            Duration::from_millis(50),
        );
        let outcome = synth
            .synthesize(&[prompt("slow", 0), prompt("fast", 1)])
            .await;

        assert_eq!(outcome.failure_count, 1);
        assert_eq!(outcome.successes.len(), 1);
        assert_eq!(outcome.successes[0].block_index, 1);
    }
}
