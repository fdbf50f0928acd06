//! Score aggregation.
//!
//! This module folds raw per-metric results into category and overall
//! scores, at item level and across a whole session.

pub mod aggregator;

pub use aggregator::{aggregate_item, aggregate_metrics, aggregate_session, ItemScores, SessionScores};
