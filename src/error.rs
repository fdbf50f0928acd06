//! Error types for the assessment engine.
//!
//! Configuration errors are fatal at startup: the process must refuse to
//! serve with an inconsistent registry or weight taxonomy. Protocol
//! errors are caller-visible and never silently coerced into defaults.
//! "No confident evidence" is deliberately NOT an error; it is modeled as
//! `None` scores in [`crate::models`].

use crate::analyzer::Metric;
use thiserror::Error;

/// All errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Two analyzers registered under the same metric key.
    #[error("analyzer already registered for metric '{0}'")]
    DuplicateAnalyzer(Metric),

    /// A category in the weight taxonomy has no metric weights.
    #[error("weight config: category '{category}' has an empty metric weight map")]
    EmptyCategory { category: String },

    /// A configured weight is negative.
    #[error("weight config: negative weight {weight} for '{entry}' in '{scope}'")]
    NegativeWeight {
        scope: String,
        entry: String,
        weight: f64,
    },

    /// The taxonomy references a metric no analyzer is registered for.
    #[error("weight config: metric '{metric}' in category '{category}' has no registered analyzer")]
    UnregisteredMetric { category: String, metric: Metric },

    /// The overall weight map is empty.
    #[error("weight config: overall weight map is empty")]
    EmptyOverall,

    /// The overall weight map references a category with no definition.
    #[error("weight config: overall references undefined category '{0}'")]
    UnknownCategory(String),

    /// A metric name that is not part of the metric taxonomy.
    #[error("unknown metric name '{0}'")]
    UnknownMetric(String),

    /// `add_item` was called twice with the same item index. This signals
    /// a client retry bug and must be surfaced, not masked.
    #[error("duplicate item index {item_index} for session '{session_id}'")]
    DuplicateItem {
        session_id: String,
        item_index: u32,
    },

    /// `add_item` after `finalize`.
    #[error("session '{0}' is already finalized")]
    SessionClosed(String),

    /// `finalize` on a session with no recorded items.
    #[error("session '{0}' has no recorded items")]
    EmptySession(String),

    /// `finalize` or `abandon` on a session id the engine has never seen.
    #[error("unknown session '{0}'")]
    UnknownSession(String),

    /// The session was abandoned while an item analysis was in flight.
    #[error("session '{0}' was abandoned")]
    SessionAbandoned(String),
}

impl EngineError {
    /// Errors that make a configuration unusable; fatal at startup/reload.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            EngineError::DuplicateAnalyzer(_)
                | EngineError::EmptyCategory { .. }
                | EngineError::NegativeWeight { .. }
                | EngineError::UnregisteredMetric { .. }
                | EngineError::EmptyOverall
                | EngineError::UnknownCategory(_)
                | EngineError::UnknownMetric(_)
        )
    }

    /// Caller-protocol violations (retry bugs, out-of-order calls).
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            EngineError::DuplicateItem { .. }
                | EngineError::SessionClosed(_)
                | EngineError::EmptySession(_)
                | EngineError::UnknownSession(_)
                | EngineError::SessionAbandoned(_)
        )
    }
}

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let dup = EngineError::DuplicateAnalyzer(Metric::Tone);
        assert!(dup.is_config());
        assert!(!dup.is_protocol());

        let closed = EngineError::SessionClosed("s1".to_string());
        assert!(closed.is_protocol());
        assert!(!closed.is_config());
    }

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = EngineError::DuplicateItem {
            session_id: "s1".to_string(),
            item_index: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("s1"));
        assert!(msg.contains('3'));
    }
}
