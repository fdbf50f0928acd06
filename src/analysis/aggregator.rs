//! Confidence-aware weighted aggregation.
//!
//! The central correctness property: configured weights are renormalized
//! over the entries actually *present* at each level, so a missing or
//! zero-confidence analyzer is excluded from the weighted mean rather
//! than averaged in as an implicit zero. "No evidence" must never read
//! as "worst possible performance".
//!
//! Scores stay as unrounded `f64`s through both aggregation levels;
//! rounding to display precision happens only in the report layer.

use crate::analyzer::Metric;
use crate::config::WeightTaxonomy;
use crate::models::{
    CategoryScore, ItemAnalysisResult, MetricAggregate, MetricResult, OverallScore,
};
use std::collections::BTreeMap;

/// Category and overall scores for a single item.
#[derive(Debug, Clone)]
pub struct ItemScores {
    pub categories: BTreeMap<String, CategoryScore>,
    pub overall: Option<OverallScore>,
}

/// Category and overall scores across a session's items.
#[derive(Debug, Clone)]
pub struct SessionScores {
    pub categories: BTreeMap<String, CategoryScore>,
    pub overall: Option<OverallScore>,
}

/// Weighted mean over (weight, score, confidence) triples, with weights
/// renormalized over the given entries. Returns `None` when the slice is
/// empty or the configured weights of the present entries sum to zero
/// (nothing to renormalize over).
fn renormalized_mean(entries: &[(f64, f64, f64)]) -> Option<(f64, f64)> {
    let weight_sum: f64 = entries.iter().map(|(w, _, _)| w).sum();
    if entries.is_empty() || weight_sum <= 0.0 {
        return None;
    }

    let mut score = 0.0;
    let mut confidence = 0.0;
    for (weight, entry_score, entry_confidence) in entries {
        let normalized = weight / weight_sum;
        score += normalized * entry_score;
        confidence += normalized * entry_confidence;
    }
    Some((score, confidence))
}

/// Folds one item's raw metric results into category scores and an
/// overall score, renormalizing over present entries at both levels.
pub fn aggregate_item(results: &[MetricResult], taxonomy: &WeightTaxonomy) -> ItemScores {
    let mut categories: BTreeMap<String, CategoryScore> = BTreeMap::new();

    for (category, metric_weights) in &taxonomy.categories {
        let present: Vec<(f64, f64, f64)> = metric_weights
            .iter()
            .filter_map(|(metric, weight)| {
                results
                    .iter()
                    .find(|r| r.metric == *metric && r.is_scored())
                    .map(|r| (*weight, r.score, r.confidence))
            })
            .collect();

        let category_score = match renormalized_mean(&present) {
            Some((score, confidence)) => CategoryScore {
                score: Some(score),
                confidence: Some(confidence),
            },
            None => CategoryScore::unscored(),
        };
        categories.insert(category.clone(), category_score);
    }

    let overall = aggregate_overall(&categories, taxonomy);

    ItemScores {
        categories,
        overall,
    }
}

/// One level up: weighted sum over categories with a defined score, with
/// the overall weights renormalized over those present categories.
fn aggregate_overall(
    categories: &BTreeMap<String, CategoryScore>,
    taxonomy: &WeightTaxonomy,
) -> Option<OverallScore> {
    let present: Vec<(f64, f64, f64)> = taxonomy
        .overall
        .iter()
        .filter_map(|(category, weight)| {
            let cat = categories.get(category)?;
            let score = cat.score?;
            Some((*weight, score, cat.confidence.unwrap_or(0.0)))
        })
        .collect();

    renormalized_mean(&present).map(|(score, confidence)| OverallScore { score, confidence })
}

/// Session-level aggregation over the items' category/overall scores.
///
/// Plain mean over the items where the score is defined; an item that was
/// unscored for a category (or overall) is skipped, not counted as zero.
/// A category unscored in every item is omitted from the result entirely.
pub fn aggregate_session(items: &[ItemAnalysisResult], taxonomy: &WeightTaxonomy) -> SessionScores {
    let mut categories: BTreeMap<String, CategoryScore> = BTreeMap::new();

    for category in taxonomy.categories.keys() {
        let scored: Vec<&CategoryScore> = items
            .iter()
            .filter_map(|item| item.categories.get(category))
            .filter(|c| c.score.is_some())
            .collect();

        if scored.is_empty() {
            continue;
        }

        let n = scored.len() as f64;
        let score = scored.iter().filter_map(|c| c.score).sum::<f64>() / n;
        let confidence = scored
            .iter()
            .map(|c| c.confidence.unwrap_or(0.0))
            .sum::<f64>()
            / n;

        categories.insert(
            category.clone(),
            CategoryScore {
                score: Some(score),
                confidence: Some(confidence),
            },
        );
    }

    let scored_overalls: Vec<&OverallScore> =
        items.iter().filter_map(|item| item.overall.as_ref()).collect();

    let overall = if scored_overalls.is_empty() {
        None
    } else {
        let n = scored_overalls.len() as f64;
        Some(OverallScore {
            score: scored_overalls.iter().map(|o| o.score).sum::<f64>() / n,
            confidence: scored_overalls.iter().map(|o| o.confidence).sum::<f64>() / n,
        })
    };

    SessionScores {
        categories,
        overall,
    }
}

/// Per-metric aggregates across a session's items: confidence-weighted
/// mean score and mean confidence over the items where the metric carried
/// evidence, plus the latest version string seen. Metrics with no
/// confident result in any item are omitted.
pub fn aggregate_metrics(items: &[ItemAnalysisResult]) -> BTreeMap<Metric, MetricAggregate> {
    let mut buckets: BTreeMap<Metric, Vec<&MetricResult>> = BTreeMap::new();
    for item in items {
        for result in item.metrics.iter().filter(|r| r.is_scored()) {
            buckets.entry(result.metric).or_default().push(result);
        }
    }

    buckets
        .into_iter()
        .map(|(metric, results)| {
            let confidence_sum: f64 = results.iter().map(|r| r.confidence).sum();
            let score = results
                .iter()
                .map(|r| r.score * r.confidence)
                .sum::<f64>()
                / confidence_sum;
            let confidence = confidence_sum / results.len() as f64;
            let version = results
                .last()
                .map(|r| r.version.clone())
                .unwrap_or_default();

            (
                metric,
                MetricAggregate {
                    score,
                    confidence,
                    version,
                },
            )
        })
        .collect()
}
