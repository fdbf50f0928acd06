//! Replay analyzer backed by recorded analyzer output.
//!
//! Used by the offline re-scoring CLI and by tests: the evidence handle
//! points at a JSON document mapping metric names to previously recorded
//! results, and each replay analyzer serves its own metric's entry from
//! that document. Re-running a session through a new weight taxonomy
//! needs no model backends this way.

use crate::analyzer::{Analyzer, Evidence, Metric};
use crate::models::MetricResult;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Instant;

const REPLAY_MODEL: &str = "replay";

/// One recorded metric entry in a fixture document.
///
/// Mirrors the shape analyzers persist: `score` and `confidence` are the
/// aggregation inputs, the rest is provenance and diagnostics.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordedMetric {
    pub score: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
}

fn default_confidence() -> f64 {
    1.0
}

/// Serves one metric from recorded analyzer output.
pub struct ReplayAnalyzer {
    metric: Metric,
}

impl ReplayAnalyzer {
    pub fn new(metric: Metric) -> Self {
        Self { metric }
    }
}

#[async_trait]
impl Analyzer for ReplayAnalyzer {
    fn metric(&self) -> Metric {
        self.metric
    }

    fn model(&self) -> &str {
        REPLAY_MODEL
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn analyze(&self, evidence: &Evidence) -> Result<MetricResult> {
        let start = Instant::now();

        let path = match evidence {
            Evidence::Path(p) => p,
            Evidence::Url(url) => {
                // Replay only works on local fixture documents.
                anyhow::bail!("replay analyzer cannot resolve URL evidence: {}", url);
            }
        };

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read recorded item: {}", path.display()))?;

        let recorded: BTreeMap<String, RecordedMetric> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse recorded item: {}", path.display()))?;

        let Some(entry) = recorded.get(self.metric.as_str()) else {
            // No recorded output for this metric is an expected condition,
            // not a failure: confidence 0, explanation attached.
            return Ok(MetricResult::failed(
                self.metric,
                REPLAY_MODEL,
                self.version(),
                format!("no recorded output for '{}'", self.metric),
            ));
        };

        Ok(MetricResult {
            metric: self.metric,
            score: entry.score,
            confidence: entry.confidence,
            model: entry.model.clone().unwrap_or_else(|| REPLAY_MODEL.to_string()),
            version: entry.version.clone().unwrap_or_default(),
            duration_ms: start.elapsed().as_millis() as u64,
            details: entry.details.clone(),
            errors: entry.errors.clone(),
        })
    }
}
