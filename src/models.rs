//! Data models for the assessment engine.
//!
//! This module contains the core data structures flowing through the
//! pipeline: per-metric analyzer results, per-item breakdowns, and the
//! final session document handed to the persistence layer.
//!
//! All serialized maps are `BTreeMap`s so that a finalized session
//! serializes byte-for-byte identically every time it is rendered.

use crate::analyzer::Metric;
use crate::config::WeightTaxonomy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version stamped into every persisted document.
pub const SCHEMA_VERSION: u32 = 2;

/// Output of one analyzer for one recorded answer.
///
/// A result with `confidence == 0.0` carries no usable evidence: its
/// `score` must never enter a weighted mean, only trigger weight
/// renormalization over the remaining metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricResult {
    /// Metric this result scores (e.g. eye contact).
    pub metric: Metric,
    /// Normalized score in 0..=100. Meaningful only when `confidence > 0`.
    pub score: f64,
    /// Evidence quality in 0..=1. Zero means "no usable evidence".
    pub confidence: f64,
    /// Underlying model name, for provenance.
    pub model: String,
    /// Model/logic version, for provenance.
    pub version: String,
    /// Analyzer wall-clock runtime in milliseconds.
    pub duration_ms: u64,
    /// Free-form diagnostic payload. Never used in aggregation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Error messages when the analyzer could not produce evidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl MetricResult {
    /// Creates a confidence-0 result for an analyzer that failed outright
    /// (backend error, timeout, panic). The score value is a placeholder
    /// and is excluded from aggregation.
    pub fn failed(metric: Metric, model: &str, version: &str, reason: impl Into<String>) -> Self {
        Self {
            metric,
            score: 0.0,
            confidence: 0.0,
            model: model.to_string(),
            version: version.to_string(),
            duration_ms: 0,
            details: None,
            errors: Some(vec![reason.into()]),
        }
    }

    /// Whether this result carries usable evidence.
    pub fn is_scored(&self) -> bool {
        self.confidence > 0.0
    }
}

/// Weighted combination of a category's member metrics.
///
/// `score` is `None` when no member metric had usable evidence. That is
/// an explicit "unscored" marker, deliberately distinct from zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl CategoryScore {
    /// An unscored category (no confident member metric).
    pub fn unscored() -> Self {
        Self {
            score: None,
            confidence: None,
        }
    }
}

/// Overall score at item or session level. Present only when at least one
/// category was scored; absence marks the item/session as unscored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallScore {
    pub score: f64,
    pub confidence: f64,
}

/// One recorded answer's full breakdown. Created once, immediately after
/// all analyzers ran against the answer, and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemAnalysisResult {
    /// Session this answer belongs to.
    pub session_id: String,
    /// Caller-supplied index of the answer within the session.
    pub item_index: u32,
    /// Raw per-metric results, sorted by metric for determinism.
    pub metrics: Vec<MetricResult>,
    /// Category scores computed from `metrics`.
    pub categories: BTreeMap<String, CategoryScore>,
    /// Overall item score; `None` when no category was scorable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<OverallScore>,
    pub schema_version: u32,
    pub pipeline_version: String,
    pub timestamp: DateTime<Utc>,
}

impl ItemAnalysisResult {
    /// Looks up a metric's raw result.
    pub fn metric(&self, metric: Metric) -> Option<&MetricResult> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

/// Per-metric aggregate over all items of a session: confidence-weighted
/// mean score, mean confidence, and the latest version string seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAggregate {
    pub score: f64,
    pub confidence: f64,
    pub version: String,
}

/// Session-level metadata block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Total number of items recorded, including unscored ones.
    pub num_items: u32,
    pub schema_version: u32,
    pub pipeline_version: String,
    /// The exact weight taxonomy the scores were computed with.
    pub weights: WeightTaxonomy,
    pub timestamp: DateTime<Utc>,
}

/// The finalized assessment for a whole session. Produced exactly once at
/// finalization and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: String,
    /// Mean of the scored items' overall scores; `None` if every item was
    /// unscored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<OverallScore>,
    /// Per-category means over items where the category was scored.
    /// Categories unscored in every item are omitted entirely.
    pub categories: BTreeMap<String, CategoryScore>,
    /// Confidence-weighted per-metric aggregates across all items.
    pub metrics: BTreeMap<Metric, MetricAggregate>,
    /// The ordered per-item breakdowns.
    pub items: Vec<ItemAnalysisResult>,
    /// Human-readable summary of the session scores.
    pub summary_text: String,
    pub meta: SessionMeta,
}

impl SessionResult {
    /// Whether the session produced any computable score at all.
    pub fn is_scored(&self) -> bool {
        self.overall.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_is_unscored() {
        let result = MetricResult::failed(Metric::Tone, "none", "0.0.0", "backend timeout");
        assert!(!result.is_scored());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(
            result.errors.as_deref(),
            Some(&["backend timeout".to_string()][..])
        );
    }

    #[test]
    fn test_unscored_category_serializes_without_score() {
        let json = serde_json::to_string(&CategoryScore::unscored()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_metric_result_roundtrip() {
        let result = MetricResult {
            metric: Metric::EyeContact,
            score: 82.5,
            confidence: 0.9,
            model: "MediaPipeFaceMesh".to_string(),
            version: "1.2.0".to_string(),
            duration_ms: 340,
            details: Some(serde_json::json!({"frames_with_face": 118})),
            errors: None,
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"metric\":\"eye_contact\""));

        let back: MetricResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.metric, Metric::EyeContact);
        assert_eq!(back.score, 82.5);
    }
}
