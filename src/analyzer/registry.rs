//! Startup-time analyzer registry.
//!
//! Maps each [`Metric`] to the analyzer instance that computes it. Built
//! once at startup via [`RegistryBuilder`] and read-only afterwards, so
//! lookups need no locking. Registering two analyzers under the same
//! metric is a configuration error, rejected at build time.

use crate::analyzer::{Analyzer, Metric};
use crate::error::{EngineError, EngineResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Incrementally collects analyzer registrations.
#[derive(Default)]
pub struct RegistryBuilder {
    analyzers: BTreeMap<Metric, Arc<dyn Analyzer>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an analyzer under its own metric key.
    ///
    /// Fails with [`EngineError::DuplicateAnalyzer`] if the key is taken.
    pub fn register(mut self, analyzer: Arc<dyn Analyzer>) -> EngineResult<Self> {
        let metric = analyzer.metric();
        if self.analyzers.contains_key(&metric) {
            return Err(EngineError::DuplicateAnalyzer(metric));
        }
        debug!(
            "Registered analyzer for {}: {} v{}",
            metric,
            analyzer.model(),
            analyzer.version()
        );
        self.analyzers.insert(metric, analyzer);
        Ok(self)
    }

    /// Finishes the build. The resulting registry is immutable.
    pub fn build(self) -> AnalyzerRegistry {
        AnalyzerRegistry {
            analyzers: self.analyzers,
        }
    }
}

/// Read-only mapping from metric to analyzer instance.
pub struct AnalyzerRegistry {
    analyzers: BTreeMap<Metric, Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Looks up the analyzer for a metric.
    pub fn get(&self, metric: Metric) -> Option<&Arc<dyn Analyzer>> {
        self.analyzers.get(&metric)
    }

    /// Whether an analyzer is registered for the metric.
    pub fn contains(&self, metric: Metric) -> bool {
        self.analyzers.contains_key(&metric)
    }

    /// The registered metrics, in canonical order.
    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.analyzers.keys().copied()
    }

    /// All registered analyzers, in canonical metric order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, &Arc<dyn Analyzer>)> {
        self.analyzers.iter().map(|(m, a)| (*m, a))
    }

    /// Number of registered analyzers.
    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }
}
