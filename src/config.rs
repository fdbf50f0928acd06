//! Weight taxonomy and engine configuration.
//!
//! The taxonomy is loaded once per process, validated against the
//! analyzer registry, and treated as immutable afterwards. Changing
//! weights means loading a new structure and swapping it atomically,
//! never editing in place.

use crate::analyzer::{AnalyzerRegistry, Metric};
use crate::error::{EngineError, EngineResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Nominal weight sums may drift from 1.0; beyond this we log a warning.
const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Hierarchical weighting policy: overall → category → metric.
///
/// Weights are non-negative and nominally sum to 1.0 per level, but the
/// aggregator always renormalizes over the entries actually present, so
/// an inexact sum degrades nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTaxonomy {
    /// Category name → weight in the overall score.
    pub overall: BTreeMap<String, f64>,
    /// Category name → (metric → weight within the category).
    pub categories: BTreeMap<String, BTreeMap<Metric, f64>>,
}

impl Default for WeightTaxonomy {
    fn default() -> Self {
        let mut overall = BTreeMap::new();
        overall.insert("verbal".to_string(), 0.2);
        overall.insert("body_language".to_string(), 0.3);
        overall.insert("interaction".to_string(), 0.5);

        let mut verbal = BTreeMap::new();
        verbal.insert(Metric::SpeechStyle, 0.5);
        verbal.insert(Metric::GrammarMl, 0.5);

        let mut body_language = BTreeMap::new();
        body_language.insert(Metric::EyeContact, 0.34);
        body_language.insert(Metric::HeadPose, 0.33);
        body_language.insert(Metric::FacialExpression, 0.33);

        let mut interaction = BTreeMap::new();
        interaction.insert(Metric::Tone, 0.2);
        interaction.insert(Metric::ContentAnswerQuality, 0.8);

        let mut categories = BTreeMap::new();
        categories.insert("verbal".to_string(), verbal);
        categories.insert("body_language".to_string(), body_language);
        categories.insert("interaction".to_string(), interaction);

        Self {
            overall,
            categories,
        }
    }
}

impl WeightTaxonomy {
    /// Loads a taxonomy from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read weights file: {}", path.display()))?;

        let taxonomy: WeightTaxonomy = toml::from_str(&content)
            .with_context(|| format!("Failed to parse weights file: {}", path.display()))?;

        Ok(taxonomy)
    }

    /// Validates the taxonomy against the registry.
    ///
    /// Rejects empty maps, negative weights, metrics without a registered
    /// analyzer, and overall entries naming undefined categories. A
    /// nominal sum far from 1.0 is only warned about: the aggregator
    /// renormalizes over present entries regardless.
    pub fn validate(&self, registry: &AnalyzerRegistry) -> EngineResult<()> {
        if self.overall.is_empty() {
            return Err(EngineError::EmptyOverall);
        }

        for (category, weight) in &self.overall {
            if *weight < 0.0 {
                return Err(EngineError::NegativeWeight {
                    scope: "overall".to_string(),
                    entry: category.clone(),
                    weight: *weight,
                });
            }
            if !self.categories.contains_key(category) {
                return Err(EngineError::UnknownCategory(category.clone()));
            }
        }

        for (category, metric_weights) in &self.categories {
            if metric_weights.is_empty() {
                return Err(EngineError::EmptyCategory {
                    category: category.clone(),
                });
            }
            for (metric, weight) in metric_weights {
                if *weight < 0.0 {
                    return Err(EngineError::NegativeWeight {
                        scope: category.clone(),
                        entry: metric.to_string(),
                        weight: *weight,
                    });
                }
                if !registry.contains(*metric) {
                    return Err(EngineError::UnregisteredMetric {
                        category: category.clone(),
                        metric: *metric,
                    });
                }
            }
            if !self.overall.contains_key(category) {
                warn!(
                    "Category '{}' is defined but carries no overall weight",
                    category
                );
            }
        }

        self.warn_on_inexact_sums();
        Ok(())
    }

    /// The metrics belonging to a category, with their configured weights.
    pub fn category_weights(&self, category: &str) -> Option<&BTreeMap<Metric, f64>> {
        self.categories.get(category)
    }

    fn warn_on_inexact_sums(&self) {
        let overall_sum: f64 = self.overall.values().sum();
        if (overall_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            warn!(
                "Overall weights sum to {:.4}, not 1.0; scores are renormalized over present categories",
                overall_sum
            );
        }
        for (category, metric_weights) in &self.categories {
            let sum: f64 = metric_weights.values().sum();
            if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                warn!(
                    "Weights for category '{}' sum to {:.4}, not 1.0; scores are renormalized over present metrics",
                    category, sum
                );
            }
        }
    }
}

/// Runtime settings for the item analysis runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-analyzer call timeout in seconds. A timed-out analyzer is
    /// treated like a failed one: confidence 0, tagged "timeout".
    #[serde(default = "default_analyzer_timeout")]
    pub analyzer_timeout_seconds: u64,

    /// Pipeline version stamped into every produced document.
    #[serde(default = "default_pipeline_version")]
    pub pipeline_version: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyzer_timeout_seconds: default_analyzer_timeout(),
            pipeline_version: default_pipeline_version(),
        }
    }
}

fn default_analyzer_timeout() -> u64 {
    120
}

fn default_pipeline_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::replay::ReplayAnalyzer;
    use crate::analyzer::registry::RegistryBuilder;
    use std::io::Write;
    use std::sync::Arc;

    fn full_registry() -> AnalyzerRegistry {
        let mut builder = RegistryBuilder::new();
        for metric in Metric::ALL {
            builder = builder
                .register(Arc::new(ReplayAnalyzer::new(*metric)))
                .unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_default_taxonomy_validates() {
        let taxonomy = WeightTaxonomy::default();
        taxonomy.validate(&full_registry()).unwrap();
    }

    #[test]
    fn test_empty_category_is_rejected() {
        let mut taxonomy = WeightTaxonomy::default();
        taxonomy
            .categories
            .insert("verbal".to_string(), BTreeMap::new());

        let err = taxonomy.validate(&full_registry()).unwrap_err();
        assert!(matches!(err, EngineError::EmptyCategory { .. }));
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        let mut taxonomy = WeightTaxonomy::default();
        taxonomy
            .categories
            .get_mut("verbal")
            .unwrap()
            .insert(Metric::GrammarMl, -0.1);

        let err = taxonomy.validate(&full_registry()).unwrap_err();
        assert!(matches!(err, EngineError::NegativeWeight { .. }));
    }

    #[test]
    fn test_unregistered_metric_is_rejected() {
        let registry = RegistryBuilder::new()
            .register(Arc::new(ReplayAnalyzer::new(Metric::Tone)))
            .unwrap()
            .build();

        let err = WeightTaxonomy::default().validate(&registry).unwrap_err();
        assert!(matches!(err, EngineError::UnregisteredMetric { .. }));
    }

    #[test]
    fn test_overall_must_reference_defined_categories() {
        let mut taxonomy = WeightTaxonomy::default();
        taxonomy.overall.insert("stage_presence".to_string(), 0.1);

        let err = taxonomy.validate(&full_registry()).unwrap_err();
        assert!(matches!(err, EngineError::UnknownCategory(_)));
    }

    #[test]
    fn test_load_from_toml() {
        let toml_content = r#"
[overall]
verbal = 0.5
interaction = 0.5

[categories.verbal]
speech_style = 0.4
grammar_ml = 0.6

[categories.interaction]
tone = 0.3
content_answer_quality = 0.7
"#;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let taxonomy = WeightTaxonomy::load(file.path()).unwrap();
        assert_eq!(taxonomy.overall.len(), 2);
        assert_eq!(
            taxonomy.categories["verbal"][&Metric::GrammarMl],
            0.6
        );
        taxonomy.validate(&full_registry()).unwrap();
    }

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.analyzer_timeout_seconds, 120);
        assert!(!config.pipeline_version.is_empty());
    }
}
