//! Analyzer backed by a remote model-serving endpoint.
//!
//! Posts the evidence reference to an inference service and maps the
//! response into a [`MetricResult`]. The engine only cares about the
//! `analyze(evidence)` contract; what runs behind the endpoint (a CV
//! model, a speech-to-text pipeline, an LLM judge) is opaque to it.

use crate::analyzer::{Analyzer, Evidence, Metric};
use crate::models::MetricResult;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Configuration for one remote analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAnalyzerConfig {
    /// Inference endpoint URL, e.g. `http://models.internal/eye-contact`.
    pub endpoint: String,
    /// Model name reported in results.
    pub model: String,
    /// Model version reported in results.
    #[serde(default = "default_version")]
    pub version: String,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_version() -> String {
    "unknown".to_string()
}

fn default_timeout() -> u64 {
    300
}

/// Request body sent to the inference backend.
#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    metric: Metric,
    evidence: &'a Evidence,
}

/// Response body expected from the inference backend.
///
/// A backend reporting an expected condition (no face detected, empty
/// transcript) returns `confidence: 0` with a `reason`; that is a valid
/// result, not a transport failure.
#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    score: f64,
    confidence: f64,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

/// Scores one metric by delegating to a model-serving backend.
pub struct RemoteAnalyzer {
    metric: Metric,
    config: RemoteAnalyzerConfig,
    http_client: reqwest::Client,
}

impl RemoteAnalyzer {
    pub fn new(metric: Metric, config: RemoteAnalyzerConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            metric,
            config,
            http_client,
        })
    }
}

#[async_trait]
impl Analyzer for RemoteAnalyzer {
    fn metric(&self) -> Metric {
        self.metric
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn version(&self) -> &str {
        &self.config.version
    }

    async fn analyze(&self, evidence: &Evidence) -> Result<MetricResult> {
        let start = Instant::now();

        debug!(
            "Requesting {} inference from {}",
            self.metric, self.config.endpoint
        );

        let request = InferenceRequest {
            metric: self.metric,
            evidence,
        };

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!(
                        "Inference request timed out after {}s",
                        self.config.timeout_seconds
                    )
                } else if e.is_connect() {
                    anyhow::anyhow!("Cannot connect to backend at {}", self.config.endpoint)
                } else {
                    anyhow::anyhow!("Failed to send inference request: {}", e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Backend error {}: {}", status, body));
        }

        let inference: InferenceResponse = response
            .json()
            .await
            .context("Failed to parse backend response")?;

        let duration_ms = start.elapsed().as_millis() as u64;

        if !inference.score.is_finite() || !inference.confidence.is_finite() {
            let mut result = MetricResult::failed(
                self.metric,
                &self.config.model,
                &self.config.version,
                "backend returned non-finite values",
            );
            result.duration_ms = duration_ms;
            result.details = inference.details;
            return Ok(result);
        }

        if inference.confidence <= 0.0 {
            let reason = inference
                .reason
                .unwrap_or_else(|| "backend reported no usable evidence".to_string());
            let mut result =
                MetricResult::failed(self.metric, &self.config.model, &self.config.version, reason);
            result.duration_ms = duration_ms;
            result.details = inference.details;
            return Ok(result);
        }

        Ok(MetricResult {
            metric: self.metric,
            score: inference.score.clamp(0.0, 100.0),
            confidence: inference.confidence.clamp(0.0, 1.0),
            model: self.config.model.clone(),
            version: self.config.version.clone(),
            duration_ms,
            details: inference.details,
            errors: None,
        })
    }
}
