//! Session accumulation and lifecycle.
//!
//! A [`SessionAccumulator`] collects per-item results for one session and
//! produces the final [`SessionResult`] exactly once. The [`SessionStore`]
//! keys accumulators by session id behind a per-session async mutex, so
//! duplicate-index detection and append are atomic together.
//!
//! State machine per session: OPEN → (add item)* → CLOSED. `finalize` is
//! one-shot; a second call returns the cached result unchanged, and
//! `add_item` after finalize is a protocol error.

use crate::analysis::{aggregate_metrics, aggregate_session};
use crate::config::{EngineConfig, WeightTaxonomy};
use crate::error::{EngineError, EngineResult};
use crate::models::{ItemAnalysisResult, SessionMeta, SessionResult, SCHEMA_VERSION};
use crate::report;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info};

/// Collects one session's per-item results until finalization.
pub struct SessionAccumulator {
    session_id: String,
    items: BTreeMap<u32, ItemAnalysisResult>,
    finalized: Option<SessionResult>,
}

impl SessionAccumulator {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            items: BTreeMap::new(),
            finalized: None,
        }
    }

    /// Records one item's result.
    ///
    /// A duplicate item index is rejected: it signals a client retry bug
    /// and must surface instead of silently overwriting the stored item.
    pub fn add_item(&mut self, item: ItemAnalysisResult) -> EngineResult<()> {
        if self.finalized.is_some() {
            return Err(EngineError::SessionClosed(self.session_id.clone()));
        }
        if self.items.contains_key(&item.item_index) {
            return Err(EngineError::DuplicateItem {
                session_id: self.session_id.clone(),
                item_index: item.item_index,
            });
        }
        debug!(
            "Session '{}': recorded item {} ({})",
            self.session_id,
            item.item_index,
            if item.overall.is_some() {
                "scored"
            } else {
                "unscored"
            }
        );
        self.items.insert(item.item_index, item);
        Ok(())
    }

    /// Whether an item with this index was already recorded.
    pub fn has_item(&self, item_index: u32) -> bool {
        self.items.contains_key(&item_index)
    }

    /// Number of recorded items.
    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// Whether the session was finalized.
    pub fn is_closed(&self) -> bool {
        self.finalized.is_some()
    }

    /// One-shot finalization: folds all recorded items into the final
    /// session document. Idempotent; repeated calls return the cached
    /// result without recomputation, byte-for-byte identical.
    pub fn finalize(
        &mut self,
        taxonomy: &WeightTaxonomy,
        config: &EngineConfig,
    ) -> EngineResult<SessionResult> {
        if let Some(result) = &self.finalized {
            debug!("Session '{}': finalize replayed from cache", self.session_id);
            return Ok(result.clone());
        }
        if self.items.is_empty() {
            return Err(EngineError::EmptySession(self.session_id.clone()));
        }

        // BTreeMap iteration gives the items back in index order.
        let items: Vec<ItemAnalysisResult> = self.items.values().cloned().collect();

        let scores = aggregate_session(&items, taxonomy);
        let metrics = aggregate_metrics(&items);
        let summary_text = report::build_summary(&scores.overall, &metrics);

        let result = SessionResult {
            session_id: self.session_id.clone(),
            overall: scores.overall,
            categories: scores.categories,
            metrics,
            items,
            summary_text,
            meta: SessionMeta {
                num_items: self.items.len() as u32,
                schema_version: SCHEMA_VERSION,
                pipeline_version: config.pipeline_version.clone(),
                weights: taxonomy.clone(),
                timestamp: Utc::now(),
            },
        };

        info!(
            "Session '{}' finalized: {} items, overall {}",
            self.session_id,
            result.meta.num_items,
            result
                .overall
                .as_ref()
                .map(|o| format!("{:.2}", o.score))
                .unwrap_or_else(|| "unscored".to_string())
        );

        self.finalized = Some(result.clone());
        Ok(result)
    }
}

/// Handle to one live session: its accumulator plus the abandonment
/// signal observed by in-flight item analyses.
#[derive(Clone)]
pub struct SessionHandle {
    pub accumulator: Arc<tokio::sync::Mutex<SessionAccumulator>>,
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    fn new(session_id: &str) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            accumulator: Arc::new(tokio::sync::Mutex::new(SessionAccumulator::new(session_id))),
            cancel_tx: Arc::new(cancel_tx),
        }
    }

    /// Subscribes to the abandonment signal.
    pub fn cancelled(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }

    fn cancel(&self) {
        // Receivers may all be gone already; nothing to do then.
        let _ = self.cancel_tx.send(true);
    }
}

/// All active sessions, keyed by session id.
///
/// The outer map lock is held only for lookups/insertions; per-session
/// work happens under the session's own async mutex.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session's handle, opening the session if it is new.
    pub fn open_or_get(&self, session_id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!("Opening session '{}'", session_id);
                SessionHandle::new(session_id)
            })
            .clone()
    }

    /// Returns the session's handle, or an error for an unknown id.
    pub fn get(&self, session_id: &str) -> EngineResult<SessionHandle> {
        let sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))
    }

    /// Drops the session and signals in-flight item analyses to stop.
    /// Best-effort: a straggling analyzer that completes afterwards is
    /// simply discarded.
    pub fn abandon(&self, session_id: &str) -> EngineResult<()> {
        let handle = {
            let mut sessions = self.sessions.lock().expect("session store lock poisoned");
            sessions
                .remove(session_id)
                .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?
        };
        info!("Abandoning session '{}'", session_id);
        handle.cancel();
        Ok(())
    }
}
