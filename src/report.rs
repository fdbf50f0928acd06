//! Session report generation.
//!
//! Renders a finalized [`SessionResult`] as Markdown or JSON, and builds
//! the short human-readable summary stored on the result itself.
//!
//! Scores are kept at full precision everywhere else in the crate;
//! rounding to display precision happens here only.

use crate::analyzer::Metric;
use crate::models::{MetricAggregate, OverallScore, SessionResult};
use anyhow::Result;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

const TIP_THRESHOLD: f64 = 75.0;

/// Builds the one-paragraph coaching summary from session-level metric
/// aggregates: one tip per weak delivery metric, or an encouragement
/// when nothing is weak.
pub fn build_summary(
    overall: &Option<OverallScore>,
    metrics: &BTreeMap<Metric, MetricAggregate>,
) -> String {
    let below = |metric: Metric| {
        metrics
            .get(&metric)
            .map(|aggregate| aggregate.score < TIP_THRESHOLD)
            .unwrap_or(false)
    };

    let mut tips = Vec::new();
    if below(Metric::SpeechStyle) {
        tips.push("Reduce filler words and keep sentences concise.");
    }
    if below(Metric::Tone) {
        tips.push("Slow down slightly and emphasize key points.");
    }
    if below(Metric::EyeContact) {
        tips.push("Maintain stable eye contact with the camera.");
    }
    if below(Metric::FacialExpression) {
        tips.push("Use more expressive facial cues to convey engagement.");
    }

    if overall.is_none() {
        return "Session summary: no metric produced a usable score.".to_string();
    }

    let base = "Session summary: solid progress overall.";
    if tips.is_empty() {
        format!("{base} Keep it up!")
    } else {
        format!("{base} {}", tips.join(" "))
    }
}

/// Generate a complete Markdown report for a finalized session.
pub fn generate_markdown_report(result: &SessionResult) -> String {
    let mut output = String::new();

    output.push_str("# Session Assessment Report\n\n");

    output.push_str(&generate_meta_section(result));
    output.push_str(&generate_overall_section(result));
    output.push_str(&generate_categories_section(result));
    output.push_str(&generate_metrics_section(result));
    output.push_str(&generate_items_section(result));

    output.push_str("---\n\n");
    output.push_str(&format!("{}\n", result.summary_text));

    output
}

fn generate_meta_section(result: &SessionResult) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Session:** `{}`\n", result.session_id));
    section.push_str(&format!(
        "- **Finalized:** {}\n",
        result.meta.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Items:** {}\n", result.meta.num_items));
    section.push_str(&format!(
        "- **Pipeline:** `{}` (schema v{})\n",
        result.meta.pipeline_version, result.meta.schema_version
    ));
    section.push('\n');

    section
}

fn generate_overall_section(result: &SessionResult) -> String {
    let mut section = String::new();

    section.push_str("## Overall\n\n");
    match &result.overall {
        Some(overall) => {
            section.push_str(&format!(
                "**{:.2} / 100** (confidence {:.2})\n\n",
                overall.score, overall.confidence
            ));
        }
        None => {
            section.push_str("*Unscored: no metric produced a usable result.*\n\n");
        }
    }

    section
}

fn generate_categories_section(result: &SessionResult) -> String {
    if result.categories.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Categories\n\n");
    section.push_str("| Category | Score | Confidence |\n");
    section.push_str("|----------|-------|------------|\n");
    for (name, category) in &result.categories {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            name,
            category
                .score
                .map(|s| format!("{s:.2}"))
                .unwrap_or_else(|| "—".to_string()),
            category
                .confidence
                .map(|c| format!("{c:.2}"))
                .unwrap_or_else(|| "—".to_string()),
        ));
    }
    section.push('\n');

    section
}

fn generate_metrics_section(result: &SessionResult) -> String {
    if result.metrics.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Metrics\n\n");
    section.push_str("| Metric | Score | Confidence | Version |\n");
    section.push_str("|--------|-------|------------|--------|\n");
    for (metric, aggregate) in &result.metrics {
        section.push_str(&format!(
            "| {} | {:.2} | {:.2} | `{}` |\n",
            metric, aggregate.score, aggregate.confidence, aggregate.version
        ));
    }
    section.push('\n');

    section
}

fn generate_items_section(result: &SessionResult) -> String {
    let mut section = String::new();

    section.push_str("## Items\n\n");
    for item in &result.items {
        match &item.overall {
            Some(overall) => {
                section.push_str(&format!(
                    "- **Item {}:** {:.2} (confidence {:.2})\n",
                    item.item_index, overall.score, overall.confidence
                ));
            }
            None => {
                section.push_str(&format!("- **Item {}:** unscored\n", item.item_index));
            }
        }
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(result: &SessionResult) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(Into::into)
}

/// Write a Markdown report to a file.
pub fn write_markdown_report(result: &SessionResult, path: &Path) -> Result<()> {
    let content = generate_markdown_report(result);

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

/// Write a JSON report to a file.
pub fn write_json_report(result: &SessionResult, path: &Path) -> Result<()> {
    let content = generate_json_report(result)?;

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
