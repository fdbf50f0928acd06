//! SpeakScore - scoring engine for recorded speaking sessions.
//!
//! The crate runs a set of pluggable metric analyzers against each
//! recorded answer of a session, aggregates their results through a
//! validated weight taxonomy, and folds the per-item results into one
//! immutable session document.
//!
//! The main pieces:
//! - [`analyzer`]: the [`analyzer::Analyzer`] trait, the metric registry,
//!   and the bundled remote/replay implementations.
//! - [`config`]: the weight taxonomy and engine settings.
//! - [`runner`]: per-item fan-out/fan-in over all registered analyzers.
//! - [`session`]: session accumulation and the OPEN → CLOSED lifecycle.
//! - [`engine`]: the facade tying it all together behind
//!   `run_item` / `finalize` / `abandon`.
//! - [`report`]: Markdown/JSON rendering of finalized sessions.

pub mod analysis;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod report;
pub mod runner;
pub mod session;

pub use analyzer::{Analyzer, AnalyzerRegistry, Evidence, Metric};
pub use config::{EngineConfig, WeightTaxonomy};
pub use engine::AssessmentEngine;
pub use error::{EngineError, EngineResult};
pub use models::{ItemAnalysisResult, MetricResult, SessionResult};
