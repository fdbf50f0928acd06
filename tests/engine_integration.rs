//! End-to-end session scoring through the public engine API: replay
//! fixtures in, finalized session document out.

use speakscore::analyzer::registry::RegistryBuilder;
use speakscore::analyzer::replay::ReplayAnalyzer;
use speakscore::{
    AssessmentEngine, EngineConfig, EngineError, Evidence, Metric, WeightTaxonomy,
};
use std::io::Write;
use std::sync::Arc;

fn replay_engine() -> AssessmentEngine {
    let mut builder = RegistryBuilder::new();
    for metric in Metric::ALL.iter().copied() {
        builder = builder
            .register(Arc::new(ReplayAnalyzer::new(metric)))
            .unwrap();
    }
    AssessmentEngine::new(
        builder.build(),
        WeightTaxonomy::default(),
        EngineConfig::default(),
    )
    .unwrap()
}

fn fixture(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_session_scored_end_to_end() {
    let engine = replay_engine();

    // Item 0 carries evidence for three metrics; everything else replays
    // as confidence 0 and is renormalized around.
    let recorded = fixture(
        r#"{
            "tone": { "score": 40.0, "model": "ProsodyNet", "version": "1.1.0" },
            "content_answer_quality": { "score": 90.0 },
            "speech_style": { "score": 80.0 }
        }"#,
    );
    let item = engine
        .run_item("s1", 0, &Evidence::Path(recorded.path().to_path_buf()))
        .await
        .unwrap();

    // interaction: 0.2*40 + 0.8*90 = 80; verbal renormalizes to
    // speech_style alone = 80; body_language is unscored.
    assert!((item.categories["interaction"].score.unwrap() - 80.0).abs() < 1e-9);
    assert!((item.categories["verbal"].score.unwrap() - 80.0).abs() < 1e-9);
    assert_eq!(item.categories["body_language"].score, None);
    assert!((item.overall.as_ref().unwrap().score - 80.0).abs() < 1e-9);

    // Item 1 has no usable evidence at all; it counts toward num_items
    // but not toward any session mean.
    let empty = fixture("{}");
    let unscored = engine
        .run_item("s1", 1, &Evidence::Path(empty.path().to_path_buf()))
        .await
        .unwrap();
    assert!(unscored.overall.is_none());

    let result = engine.finalize("s1").await.unwrap();

    assert_eq!(result.meta.num_items, 2);
    assert!((result.overall.as_ref().unwrap().score - 80.0).abs() < 1e-9);
    assert!(!result.categories.contains_key("body_language"));
    assert_eq!(result.items.len(), 2);

    // Weak tone shows up in the coaching summary.
    assert!(result.summary_text.contains("Slow down"));

    // Finalize is one-shot: the second call replays the cached document
    // byte for byte.
    let replayed = engine.finalize("s1").await.unwrap();
    assert_eq!(
        serde_json::to_string(&result).unwrap(),
        serde_json::to_string(&replayed).unwrap()
    );
}

#[tokio::test]
async fn test_protocol_errors_surface_through_the_engine() {
    let engine = replay_engine();
    let recorded = fixture(r#"{ "tone": { "score": 70.0 } }"#);
    let evidence = Evidence::Path(recorded.path().to_path_buf());

    engine.run_item("s1", 0, &evidence).await.unwrap();

    // Re-sending an item index signals a client retry bug.
    let err = engine.run_item("s1", 0, &evidence).await.unwrap_err();
    assert!(matches!(err, EngineError::DuplicateItem { item_index: 0, .. }));

    engine.finalize("s1").await.unwrap();

    // The session is closed after finalization.
    let err = engine.run_item("s1", 1, &evidence).await.unwrap_err();
    assert!(matches!(err, EngineError::SessionClosed(_)));

    // Finalizing a session the engine never saw is an error, not an
    // empty result.
    let err = engine.finalize("never-opened").await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownSession(_)));
}
