//! Item analysis runner.
//!
//! Fans out every registered analyzer against one recorded answer's
//! evidence, waits for all of them (fan-out/fan-in barrier, not a
//! pipeline), and folds the collected results into an
//! [`ItemAnalysisResult`].
//!
//! Each analyzer call is isolated: an error, panic, or timeout in one
//! analyzer degrades that one metric to a confidence-0 result and never
//! aborts the others. Fan-in reads the *set* of results sorted by metric,
//! so aggregation is deterministic regardless of completion order.

use crate::analysis::aggregate_item;
use crate::analyzer::{AnalyzerRegistry, Evidence};
use crate::config::{EngineConfig, WeightTaxonomy};
use crate::models::{ItemAnalysisResult, MetricResult, SCHEMA_VERSION};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Runs all registered analyzers against single-item evidence.
pub struct ItemRunner {
    registry: Arc<AnalyzerRegistry>,
    taxonomy: Arc<WeightTaxonomy>,
    config: EngineConfig,
}

impl ItemRunner {
    pub fn new(
        registry: Arc<AnalyzerRegistry>,
        taxonomy: Arc<WeightTaxonomy>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            taxonomy,
            config,
        }
    }

    /// Invokes every registered analyzer concurrently against the same
    /// evidence, collects the per-metric results, and aggregates them
    /// into the item's category and overall scores.
    ///
    /// When a `cancel` signal is supplied, each pending analyzer call is
    /// cut short as soon as the signal fires and its metric degrades to
    /// a confidence-0 result tagged "cancelled".
    pub async fn run_item(
        &self,
        session_id: &str,
        item_index: u32,
        evidence: &Evidence,
        cancel: Option<watch::Receiver<bool>>,
    ) -> ItemAnalysisResult {
        let timeout = Duration::from_secs(self.config.analyzer_timeout_seconds);

        info!(
            "Running {} analyzers for session '{}' item {}",
            self.registry.len(),
            session_id,
            item_index
        );

        let mut handles = Vec::with_capacity(self.registry.len());
        for (metric, analyzer) in self.registry.iter() {
            let analyzer = Arc::clone(analyzer);
            let evidence = evidence.clone();
            let model = analyzer.model().to_string();
            let version = analyzer.version().to_string();
            let task_model = model.clone();
            let task_version = version.clone();
            let mut cancel = cancel.clone();

            let handle = tokio::spawn(async move {
                let start = Instant::now();
                let outcome = match cancel.as_mut() {
                    Some(rx) => tokio::select! {
                        outcome = tokio::time::timeout(timeout, analyzer.analyze(&evidence)) => {
                            Some(outcome)
                        }
                        _ = rx.wait_for(|cancelled| *cancelled) => None,
                    },
                    None => Some(tokio::time::timeout(timeout, analyzer.analyze(&evidence)).await),
                };
                match outcome {
                    Some(Ok(Ok(result))) => sanitize(result),
                    Some(Ok(Err(e))) => {
                        warn!("Analyzer {} failed: {:#}", metric, e);
                        tagged_failure(
                            MetricResult::failed(
                                metric,
                                &task_model,
                                &task_version,
                                format!("analyzer error: {e:#}"),
                            ),
                            "error",
                            start,
                        )
                    }
                    Some(Err(_)) => {
                        warn!(
                            "Analyzer {} timed out after {}s",
                            metric,
                            timeout.as_secs()
                        );
                        tagged_failure(
                            MetricResult::failed(
                                metric,
                                &task_model,
                                &task_version,
                                format!("timed out after {}s", timeout.as_secs()),
                            ),
                            "timeout",
                            start,
                        )
                    }
                    None => {
                        debug!("Analyzer {} cancelled: session abandoned", metric);
                        tagged_failure(
                            MetricResult::failed(
                                metric,
                                &task_model,
                                &task_version,
                                "session abandoned",
                            ),
                            "cancelled",
                            start,
                        )
                    }
                }
            });
            handles.push((metric, model, version, handle));
        }

        // Fan-in barrier: wait for every analyzer before aggregating.
        let joined = join_all(
            handles
                .into_iter()
                .map(|(metric, model, version, handle)| async move {
                    (metric, model, version, handle.await)
                }),
        )
        .await;

        let mut results = Vec::with_capacity(joined.len());
        for (metric, model, version, outcome) in joined {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    // A panicking analyzer degrades its own metric only.
                    warn!("Analyzer {} panicked: {}", metric, e);
                    let mut result =
                        MetricResult::failed(metric, &model, &version, "analyzer panicked");
                    result.details = Some(serde_json::json!({ "tag": "panic" }));
                    results.push(result);
                }
            }
        }

        // Deterministic fan-in: order by metric, never by completion.
        results.sort_by_key(|r| r.metric);

        let scored = results.iter().filter(|r| r.is_scored()).count();
        debug!(
            "Item {} of session '{}': {}/{} metrics scored",
            item_index,
            session_id,
            scored,
            results.len()
        );

        let scores = aggregate_item(&results, &self.taxonomy);

        ItemAnalysisResult {
            session_id: session_id.to_string(),
            item_index,
            metrics: results,
            categories: scores.categories,
            overall: scores.overall,
            schema_version: SCHEMA_VERSION,
            pipeline_version: self.config.pipeline_version.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Clamps out-of-range analyzer output instead of trusting it blindly.
/// Non-finite output cannot be clamped; it degrades the metric to an
/// unscored result so NaN never reaches the weighted means.
fn sanitize(mut result: MetricResult) -> MetricResult {
    if !result.score.is_finite() || !result.confidence.is_finite() {
        warn!(
            "Analyzer {} returned non-finite output (score {}, confidence {})",
            result.metric, result.score, result.confidence
        );
        let mut failed = MetricResult::failed(
            result.metric,
            &result.model,
            &result.version,
            "non-finite analyzer output",
        );
        failed.duration_ms = result.duration_ms;
        failed.details = Some(serde_json::json!({ "tag": "invalid" }));
        return failed;
    }
    if !(0.0..=100.0).contains(&result.score) {
        warn!(
            "Analyzer {} returned out-of-range score {}; clamping",
            result.metric, result.score
        );
        result.score = result.score.clamp(0.0, 100.0);
    }
    if !(0.0..=1.0).contains(&result.confidence) {
        warn!(
            "Analyzer {} returned out-of-range confidence {}; clamping",
            result.metric, result.confidence
        );
        result.confidence = result.confidence.clamp(0.0, 1.0);
    }
    result
}

fn tagged_failure(mut result: MetricResult, tag: &str, start: Instant) -> MetricResult {
    result.details = Some(serde_json::json!({ "tag": tag }));
    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::registry::RegistryBuilder;
    use crate::analyzer::{Analyzer, Metric};
    use anyhow::Result;
    use async_trait::async_trait;

    struct FixedAnalyzer {
        metric: Metric,
        score: f64,
        confidence: f64,
    }

    #[async_trait]
    impl Analyzer for FixedAnalyzer {
        fn metric(&self) -> Metric {
            self.metric
        }
        fn model(&self) -> &str {
            "fixed"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        async fn analyze(&self, _evidence: &Evidence) -> Result<MetricResult> {
            Ok(MetricResult {
                metric: self.metric,
                score: self.score,
                confidence: self.confidence,
                model: "fixed".to_string(),
                version: "1.0.0".to_string(),
                duration_ms: 1,
                details: None,
                errors: None,
            })
        }
    }

    struct FailingAnalyzer {
        metric: Metric,
    }

    #[async_trait]
    impl Analyzer for FailingAnalyzer {
        fn metric(&self) -> Metric {
            self.metric
        }
        fn model(&self) -> &str {
            "failing"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        async fn analyze(&self, _evidence: &Evidence) -> Result<MetricResult> {
            anyhow::bail!("backend unavailable")
        }
    }

    struct SlowAnalyzer {
        metric: Metric,
    }

    #[async_trait]
    impl Analyzer for SlowAnalyzer {
        fn metric(&self) -> Metric {
            self.metric
        }
        fn model(&self) -> &str {
            "slow"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        async fn analyze(&self, _evidence: &Evidence) -> Result<MetricResult> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(MetricResult::failed(self.metric, "slow", "1.0.0", "never"))
        }
    }

    struct PanickyAnalyzer {
        metric: Metric,
    }

    #[async_trait]
    impl Analyzer for PanickyAnalyzer {
        fn metric(&self) -> Metric {
            self.metric
        }
        fn model(&self) -> &str {
            "panicky"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        async fn analyze(&self, _evidence: &Evidence) -> Result<MetricResult> {
            panic!("boom")
        }
    }

    fn runner_with(analyzers: Vec<Arc<dyn Analyzer>>, timeout_seconds: u64) -> ItemRunner {
        let mut builder = RegistryBuilder::new();
        for analyzer in analyzers {
            builder = builder.register(analyzer).unwrap();
        }
        ItemRunner::new(
            Arc::new(builder.build()),
            Arc::new(WeightTaxonomy::default()),
            EngineConfig {
                analyzer_timeout_seconds: timeout_seconds,
                pipeline_version: "test".to_string(),
            },
        )
    }

    fn evidence() -> Evidence {
        Evidence::Url("https://media.example/answer.webm".to_string())
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_metric() {
        let runner = runner_with(
            vec![
                Arc::new(FixedAnalyzer {
                    metric: Metric::SpeechStyle,
                    score: 80.0,
                    confidence: 1.0,
                }),
                Arc::new(FailingAnalyzer {
                    metric: Metric::GrammarMl,
                }),
            ],
            5,
        );

        let item = runner.run_item("s1", 0, &evidence(), None).await;

        let grammar = item.metric(Metric::GrammarMl).unwrap();
        assert!(!grammar.is_scored());
        assert_eq!(grammar.details.as_ref().unwrap()["tag"], "error");

        // The healthy analyzer is unaffected; the category renormalizes
        // around the broken one.
        let verbal = &item.categories["verbal"];
        assert!((verbal.score.unwrap() - 80.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_tagged_and_does_not_block() {
        let runner = runner_with(
            vec![
                Arc::new(FixedAnalyzer {
                    metric: Metric::Tone,
                    score: 60.0,
                    confidence: 1.0,
                }),
                Arc::new(SlowAnalyzer {
                    metric: Metric::ContentAnswerQuality,
                }),
            ],
            1,
        );

        let item = runner.run_item("s1", 0, &evidence(), None).await;

        let stuck = item.metric(Metric::ContentAnswerQuality).unwrap();
        assert!(!stuck.is_scored());
        assert_eq!(stuck.details.as_ref().unwrap()["tag"], "timeout");

        let interaction = &item.categories["interaction"];
        assert!((interaction.score.unwrap() - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_panic_is_isolated_per_metric() {
        let runner = runner_with(
            vec![
                Arc::new(PanickyAnalyzer {
                    metric: Metric::EyeContact,
                }),
                Arc::new(FixedAnalyzer {
                    metric: Metric::HeadPose,
                    score: 75.0,
                    confidence: 1.0,
                }),
            ],
            5,
        );

        let item = runner.run_item("s1", 0, &evidence(), None).await;

        let eye = item.metric(Metric::EyeContact).unwrap();
        assert!(!eye.is_scored());
        assert_eq!(eye.details.as_ref().unwrap()["tag"], "panic");
        assert!(item.metric(Metric::HeadPose).unwrap().is_scored());
    }

    #[tokio::test]
    async fn test_results_sorted_and_stamped() {
        let runner = runner_with(
            vec![
                Arc::new(FixedAnalyzer {
                    metric: Metric::SpeechStyle,
                    score: 50.0,
                    confidence: 1.0,
                }),
                Arc::new(FixedAnalyzer {
                    metric: Metric::EyeContact,
                    score: 50.0,
                    confidence: 1.0,
                }),
            ],
            5,
        );

        let item = runner.run_item("s1", 3, &evidence(), None).await;

        let metrics: Vec<Metric> = item.metrics.iter().map(|r| r.metric).collect();
        assert_eq!(metrics, vec![Metric::EyeContact, Metric::SpeechStyle]);
        assert_eq!(item.schema_version, SCHEMA_VERSION);
        assert_eq!(item.pipeline_version, "test");
        assert_eq!(item.item_index, 3);
    }

    #[tokio::test]
    async fn test_out_of_range_output_is_clamped() {
        let runner = runner_with(
            vec![Arc::new(FixedAnalyzer {
                metric: Metric::Tone,
                score: 140.0,
                confidence: 1.5,
            })],
            5,
        );

        let item = runner.run_item("s1", 0, &evidence(), None).await;
        let tone = item.metric(Metric::Tone).unwrap();
        assert_eq!(tone.score, 100.0);
        assert_eq!(tone.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_non_finite_output_degrades_to_unscored() {
        let runner = runner_with(
            vec![
                Arc::new(FixedAnalyzer {
                    metric: Metric::Tone,
                    score: f64::NAN,
                    confidence: 1.0,
                }),
                Arc::new(FixedAnalyzer {
                    metric: Metric::ContentAnswerQuality,
                    score: 90.0,
                    confidence: 1.0,
                }),
            ],
            5,
        );

        let item = runner.run_item("s1", 0, &evidence(), None).await;

        let tone = item.metric(Metric::Tone).unwrap();
        assert!(!tone.is_scored());
        assert_eq!(tone.details.as_ref().unwrap()["tag"], "invalid");

        // The category renormalizes around the invalid metric; NaN never
        // reaches the weighted means.
        let interaction = &item.categories["interaction"];
        assert!((interaction.score.unwrap() - 90.0).abs() < 1e-9);
        assert!(item.overall.as_ref().unwrap().score.is_finite());
    }

    #[tokio::test]
    async fn test_cancel_signal_degrades_pending_metrics() {
        let runner = runner_with(
            vec![Arc::new(SlowAnalyzer {
                metric: Metric::Tone,
            })],
            60,
        );

        let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
        cancel_tx.send(true).unwrap();

        // The analyzer would sleep for 30s; the fired cancel signal must
        // cut it short immediately.
        let item = runner.run_item("s1", 0, &evidence(), Some(cancel_rx)).await;

        let tone = item.metric(Metric::Tone).unwrap();
        assert!(!tone.is_scored());
        assert_eq!(tone.details.as_ref().unwrap()["tag"], "cancelled");
    }
}
