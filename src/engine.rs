//! The assessment engine facade.
//!
//! Wires the analyzer registry, the weight taxonomy, the item runner,
//! and the session store behind the two caller-facing operations:
//! `run_item(session_id, item_index, evidence)` and
//! `finalize(session_id)`. An external route layer sits in front of
//! these; persistence receives the documents they return.

use crate::analyzer::{AnalyzerRegistry, Evidence};
use crate::config::{EngineConfig, WeightTaxonomy};
use crate::error::{EngineError, EngineResult};
use crate::models::{ItemAnalysisResult, SessionResult};
use crate::runner::ItemRunner;
use crate::session::SessionStore;
use std::sync::Arc;
use tracing::info;

pub struct AssessmentEngine {
    runner: ItemRunner,
    taxonomy: Arc<WeightTaxonomy>,
    config: EngineConfig,
    store: SessionStore,
}

impl AssessmentEngine {
    /// Builds an engine from a registry and a weight taxonomy.
    ///
    /// The taxonomy is validated against the registry here; the process
    /// must refuse to serve with an inconsistent configuration rather
    /// than silently degrading.
    pub fn new(
        registry: AnalyzerRegistry,
        taxonomy: WeightTaxonomy,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        taxonomy.validate(&registry)?;

        info!(
            "Engine ready: {} analyzers, {} categories, pipeline {}",
            registry.len(),
            taxonomy.categories.len(),
            config.pipeline_version
        );

        let registry = Arc::new(registry);
        let taxonomy = Arc::new(taxonomy);
        let runner = ItemRunner::new(Arc::clone(&registry), Arc::clone(&taxonomy), config.clone());

        Ok(Self {
            runner,
            taxonomy,
            config,
            store: SessionStore::new(),
        })
    }

    /// Analyzes one recorded answer and records the result in its
    /// session, opening the session on first use.
    pub async fn run_item(
        &self,
        session_id: &str,
        item_index: u32,
        evidence: &Evidence,
    ) -> EngineResult<ItemAnalysisResult> {
        let handle = self.store.open_or_get(session_id);

        // Cheap protocol check before the expensive fan-out. The
        // authoritative check runs again under the lock at append time.
        {
            let accumulator = handle.accumulator.lock().await;
            if accumulator.is_closed() {
                return Err(EngineError::SessionClosed(session_id.to_string()));
            }
            if accumulator.has_item(item_index) {
                return Err(EngineError::DuplicateItem {
                    session_id: session_id.to_string(),
                    item_index,
                });
            }
        }

        // The spawned analyzer tasks watch the same signal, so abandonment
        // cuts them short instead of leaving them running to timeout.
        let mut cancelled = handle.cancelled();
        let item = tokio::select! {
            item = self.runner.run_item(session_id, item_index, evidence, Some(handle.cancelled())) => item,
            _ = cancelled.wait_for(|abandoned| *abandoned) => {
                return Err(EngineError::SessionAbandoned(session_id.to_string()));
            }
        };

        let mut accumulator = handle.accumulator.lock().await;
        accumulator.add_item(item.clone())?;
        Ok(item)
    }

    /// Finalizes the session into its immutable result document.
    /// Idempotent; see [`crate::session::SessionAccumulator::finalize`].
    pub async fn finalize(&self, session_id: &str) -> EngineResult<SessionResult> {
        let handle = self.store.get(session_id)?;
        let mut accumulator = handle.accumulator.lock().await;
        accumulator.finalize(&self.taxonomy, &self.config)
    }

    /// Drops an abandoned session and cooperatively cancels its in-flight
    /// item analyses.
    pub fn abandon(&self, session_id: &str) -> EngineResult<()> {
        self.store.abandon(session_id)
    }

    /// The taxonomy this engine scores with.
    pub fn taxonomy(&self) -> &WeightTaxonomy {
        &self.taxonomy
    }
}
