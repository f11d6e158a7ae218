//! End-to-end ingestion cycle tests — MOCKS → CYCLE → STORED STATE.

use std::sync::Arc;

use adwatch_common::{PipelineError, ReportState, RetryPolicy, ThreatLevel, Verdict};
use adwatch_pipeline::classifier::ClassifierRunner;
use adwatch_pipeline::cycle::{FailureStage, Pipeline};
use adwatch_pipeline::store::{AdFilter, AdStore, MemoryStore};
use adwatch_pipeline::testing::*;

fn pipeline(
    source: MockAdSource,
    classifier: Arc<MockClassifier>,
    store: Arc<MemoryStore>,
) -> Pipeline {
    Pipeline::new(
        Arc::new(source),
        ClassifierRunner::new(classifier, RetryPolicy::immediate(3)),
        store,
    )
}

#[tokio::test]
async fn new_scam_ad_is_stored_unreported() {
    let store = Arc::new(MemoryStore::new());
    let classifier = Arc::new(
        MockClassifier::new().classifies("A1", scam_classification(ThreatLevel::High)),
    );
    let source = MockAdSource::new(vec![raw_item("A1", "Quick Cash", "Free money now")]);

    let stats = pipeline(source, Arc::clone(&classifier), Arc::clone(&store))
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(stats.fetched, 1);
    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.by_threat[ThreatLevel::High as usize], 1);
    assert!(stats.failures.is_empty());

    let record = store.get("A1").await.unwrap().unwrap().record;
    assert_eq!(record.verdict, Verdict::Scam);
    assert_eq!(record.threat_level, Some(ThreatLevel::High));
    assert_eq!(record.report_state, ReportState::Unreported);
    assert_eq!(record.report_count, 0);
}

#[tokio::test]
async fn unchanged_resight_is_noop_and_skips_classifier() {
    let store = Arc::new(MemoryStore::new());
    let classifier = Arc::new(
        MockClassifier::new().classifies("A1", scam_classification(ThreatLevel::High)),
    );

    let item = raw_item("A1", "Quick Cash", "Free money now");
    let first = pipeline(
        MockAdSource::new(vec![item.clone()]),
        Arc::clone(&classifier),
        Arc::clone(&store),
    );
    first.run_cycle().await.unwrap();

    let second = pipeline(
        MockAdSource::new(vec![item]),
        Arc::clone(&classifier),
        Arc::clone(&store),
    );
    let stats = second.run_cycle().await.unwrap();

    assert_eq!(stats.unchanged, 1);
    assert_eq!(stats.inserted, 0);
    // Classification is sticky: the known ad never reached the classifier again.
    assert_eq!(classifier.call_count("A1"), 1);
}

#[tokio::test]
async fn like_count_change_on_resight_updates_metadata_only() {
    let store = Arc::new(MemoryStore::new());
    let classifier = Arc::new(
        MockClassifier::new().classifies("A1", scam_classification(ThreatLevel::High)),
    );

    let item = raw_item("A1", "Quick Cash", "Free money now");
    pipeline(
        MockAdSource::new(vec![item.clone()]),
        Arc::clone(&classifier),
        Arc::clone(&store),
    )
    .run_cycle()
    .await
    .unwrap();

    let mut changed = item;
    changed.page_like_count = Some(5000);
    let stats = pipeline(
        MockAdSource::new(vec![changed]),
        Arc::clone(&classifier),
        Arc::clone(&store),
    )
    .run_cycle()
    .await
    .unwrap();

    assert_eq!(stats.updated, 1);
    let record = store.get("A1").await.unwrap().unwrap().record;
    assert_eq!(record.page_like_count, 5000);
    assert_eq!(record.threat_level, Some(ThreatLevel::High));
    assert_eq!(classifier.call_count("A1"), 1);
}

#[tokio::test]
async fn classifier_exhaustion_queues_manual_review() {
    let store = Arc::new(MemoryStore::new());
    let classifier = Arc::new(
        MockClassifier::new()
            .classifies("A1", scam_classification(ThreatLevel::Medium))
            .times_out("B2", 3),
    );
    let source = MockAdSource::new(vec![
        raw_item("A1", "Quick Cash", "Free money now"),
        raw_item("B2", "Miracle Pills", "Cures everything"),
    ]);

    let stats = pipeline(source, Arc::clone(&classifier), Arc::clone(&store))
        .run_cycle()
        .await
        .unwrap();

    // The cycle completed the whole batch.
    assert_eq!(stats.inserted, 2);
    assert_eq!(stats.unclassified, 1);
    assert_eq!(stats.failures.len(), 1);
    assert_eq!(stats.failures[0].stage, FailureStage::Classify);
    assert_eq!(stats.failures[0].id.as_deref(), Some("B2"));

    // All retry attempts were spent before giving up.
    assert_eq!(classifier.call_count("B2"), 3);

    // B2 is persisted for manual review, not dropped.
    let record = store.get("B2").await.unwrap().unwrap().record;
    assert_eq!(record.verdict, Verdict::Unknown);
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["is_scam"], serde_json::Value::Null);
}

#[tokio::test]
async fn transient_classifier_errors_retry_to_success() {
    let store = Arc::new(MemoryStore::new());
    let classifier = Arc::new(
        MockClassifier::new()
            .errors("A1", 2)
            .classifies("A1", scam_classification(ThreatLevel::Low)),
    );
    let source = MockAdSource::new(vec![raw_item("A1", "Quick Cash", "Free money now")]);

    let stats = pipeline(source, Arc::clone(&classifier), Arc::clone(&store))
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.unclassified, 0);
    assert_eq!(classifier.call_count("A1"), 3);
    let record = store.get("A1").await.unwrap().unwrap().record;
    assert_eq!(record.threat_level, Some(ThreatLevel::Low));
}

#[tokio::test]
async fn malformed_item_is_skipped_not_fatal() {
    let store = Arc::new(MemoryStore::new());
    let classifier = Arc::new(
        MockClassifier::new().classifies("A1", legit_classification()),
    );
    let mut bad = raw_item("", "No Id Page", "text");
    bad.id = None;
    let source = MockAdSource::new(vec![bad, raw_item("A1", "Shoes", "Buy shoes")]);

    let stats = pipeline(source, classifier, Arc::clone(&store))
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.failures.len(), 1);
    assert_eq!(stats.failures[0].stage, FailureStage::Normalize);
    assert!(stats.failures[0].id.is_none());
}

#[tokio::test]
async fn source_outage_is_cycle_fatal() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline(
        MockAdSource::failing(),
        Arc::new(MockClassifier::new()),
        Arc::clone(&store),
    );
    assert!(p.run_cycle().await.is_err());
    // The lock was released despite the failure.
    assert!(store.acquire_cycle_lock().await.unwrap());
}

#[tokio::test]
async fn overlapping_cycles_are_mutually_exclusive() {
    let store = Arc::new(MemoryStore::new());
    store.acquire_cycle_lock().await.unwrap();

    let p = pipeline(
        MockAdSource::new(vec![]),
        Arc::new(MockClassifier::new()),
        Arc::clone(&store),
    );
    let err = p.run_cycle().await.unwrap_err();
    assert!(matches!(err, PipelineError::CycleInProgress));

    store.release_cycle_lock().await.unwrap();
    assert!(p.run_cycle().await.is_ok());
}

#[tokio::test]
async fn forced_reclassification_overwrites_verdict() {
    let store = Arc::new(MemoryStore::new());
    let classifier = Arc::new(
        MockClassifier::new()
            .classifies("A1", scam_classification(ThreatLevel::High))
            .classifies("A1", scam_classification(ThreatLevel::Low)),
    );
    let item = raw_item("A1", "Quick Cash", "Free money now");

    pipeline(
        MockAdSource::new(vec![item.clone()]),
        Arc::clone(&classifier),
        Arc::clone(&store),
    )
    .run_cycle()
    .await
    .unwrap();

    let stats = pipeline(
        MockAdSource::new(vec![item]),
        Arc::clone(&classifier),
        Arc::clone(&store),
    )
    .with_force_reclassify(true)
    .run_cycle()
    .await
    .unwrap();

    assert_eq!(stats.updated, 1);
    assert_eq!(classifier.call_count("A1"), 2);
    let record = store.get("A1").await.unwrap().unwrap().record;
    assert_eq!(record.threat_level, Some(ThreatLevel::Low));
}

#[tokio::test]
async fn reportable_queue_lists_unreported_high_threat_scams() {
    let store = Arc::new(MemoryStore::new());
    let classifier = Arc::new(
        MockClassifier::new()
            .classifies("A1", scam_classification(ThreatLevel::High))
            .classifies("B2", scam_classification(ThreatLevel::Low))
            .classifies("C3", legit_classification()),
    );
    let source = MockAdSource::new(vec![
        raw_item("A1", "Quick Cash", "Free money now"),
        raw_item("B2", "Sketchy Deals", "Too good to be true"),
        raw_item("C3", "Shoes", "Buy shoes"),
    ]);

    pipeline(source, classifier, Arc::clone(&store))
        .run_cycle()
        .await
        .unwrap();

    let queue = store
        .list(&AdFilter {
            scam_only: true,
            min_threat: Some(ThreatLevel::Medium),
            report_state: Some(ReportState::Unreported),
            scraped_after: None,
        })
        .await
        .unwrap();

    let ids: Vec<&str> = queue.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["A1"]);
}
