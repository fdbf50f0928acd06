//! Analyzer contract and metric taxonomy.
//!
//! Every perceptual/linguistic analyzer implements the [`Analyzer`] trait
//! and is keyed by an enumerated [`Metric`] identifier. The orchestration
//! layer never imports concrete analyzers; it only talks to the registry.

pub mod registry;
pub mod remote;
pub mod replay;

pub use registry::AnalyzerRegistry;

use crate::error::EngineError;
use crate::models::MetricResult;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The metrics the engine knows how to score.
///
/// Adding a new metric means adding a variant here and registering an
/// analyzer for it; the runner and aggregator need no changes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    EyeContact,
    HeadPose,
    Tone,
    SpeechToText,
    GrammarMl,
    FacialExpression,
    SpeechStyle,
    ContentAnswerQuality,
}

impl Metric {
    /// All known metrics, in canonical order.
    pub const ALL: &'static [Metric] = &[
        Metric::EyeContact,
        Metric::HeadPose,
        Metric::Tone,
        Metric::SpeechToText,
        Metric::GrammarMl,
        Metric::FacialExpression,
        Metric::SpeechStyle,
        Metric::ContentAnswerQuality,
    ];

    /// The canonical wire name of the metric.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::EyeContact => "eye_contact",
            Metric::HeadPose => "head_pose",
            Metric::Tone => "tone",
            Metric::SpeechToText => "speech_to_text",
            Metric::GrammarMl => "grammar_ml",
            Metric::FacialExpression => "facial_expression",
            Metric::SpeechStyle => "speech_style",
            Metric::ContentAnswerQuality => "content_answer_quality",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .find(|m| m.as_str() == s)
            .copied()
            .ok_or_else(|| EngineError::UnknownMetric(s.to_string()))
    }
}

/// An opaque, read-only reference to already-extracted recorded media.
///
/// Supplied by the upload/storage collaborator; the engine never opens it
/// itself, it only hands it to analyzers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evidence {
    /// A resolvable local file path.
    Path(PathBuf),
    /// A resolvable URL served by the storage collaborator.
    Url(String),
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evidence::Path(p) => write!(f, "{}", p.display()),
            Evidence::Url(u) => f.write_str(u),
        }
    }
}

/// The capability contract every analyzer implements.
///
/// Analyzers must be side-effect-free with respect to orchestration state.
/// Expected conditions (no face detected, empty transcript) are returned
/// as `Ok` results with `confidence = 0` and an explanatory `errors`
/// entry. Only truly exceptional conditions (unreadable file, backend
/// unavailable) propagate as `Err`; the runner isolates those per metric.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// The metric this analyzer scores.
    fn metric(&self) -> Metric;

    /// Underlying model name, stamped into results for provenance.
    fn model(&self) -> &str;

    /// Model/logic version, stamped into results for provenance.
    fn version(&self) -> &str;

    /// Runs the analysis against the evidence and returns a normalized
    /// result. Implementations may call out to external inference
    /// services; those calls are the analyzer's concern, not the runner's.
    async fn analyze(&self, evidence: &Evidence) -> Result<MetricResult>;
}
