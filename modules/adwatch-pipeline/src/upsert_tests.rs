//! Upsert engine tests — STORE STATE → DECISION → STORED STATE.

use std::sync::Arc;

use adwatch_common::{ReportEvent, ThreatLevel, Verdict};

use crate::store::{AdStore, MemoryStore};
use crate::testing::*;
use crate::upsert::{decide, UpsertDecision, UpsertEngine};

// ---------------------------------------------------------------------------
// decide()
// ---------------------------------------------------------------------------

#[test]
fn no_prior_record_inserts() {
    let candidate = scam_record("A1", ThreatLevel::High);
    assert_eq!(decide(&candidate, None, true), UpsertDecision::Insert);
}

#[test]
fn identical_resight_is_noop() {
    let stored = scam_record("A1", ThreatLevel::High);
    let candidate = stored.clone();
    assert_eq!(
        decide(&candidate, Some(&stored), false),
        UpsertDecision::NoOp
    );
}

#[test]
fn like_count_change_updates() {
    let stored = scam_record("A1", ThreatLevel::High);
    let mut candidate = stored.clone();
    candidate.page_like_count += 50;
    assert_eq!(
        decide(&candidate, Some(&stored), false),
        UpsertDecision::Update
    );
}

#[test]
fn link_set_change_updates() {
    let stored = scam_record("A1", ThreatLevel::High);
    let mut candidate = stored.clone();
    candidate
        .links_found
        .push("https://new.example/".to_string());
    assert_eq!(
        decide(&candidate, Some(&stored), false),
        UpsertDecision::Update
    );
}

#[test]
fn link_order_change_is_not_material() {
    let mut stored = scam_record("A1", ThreatLevel::High);
    stored.links_found = vec!["https://a.example/".into(), "https://b.example/".into()];
    let mut candidate = stored.clone();
    candidate.links_found = vec!["https://b.example/".into(), "https://a.example/".into()];
    assert_eq!(
        decide(&candidate, Some(&stored), false),
        UpsertDecision::NoOp
    );
}

#[test]
fn stale_classification_change_is_ignored() {
    let stored = scam_record("A1", ThreatLevel::High);
    let mut candidate = stored.clone();
    candidate.threat_level = Some(ThreatLevel::Low);
    // Classifier did not run fresh: classification drift is not material.
    assert_eq!(
        decide(&candidate, Some(&stored), false),
        UpsertDecision::NoOp
    );
}

#[test]
fn fresh_classification_change_updates() {
    let stored = scam_record("A1", ThreatLevel::High);
    let mut candidate = stored.clone();
    candidate.threat_level = Some(ThreatLevel::Low);
    assert_eq!(
        decide(&candidate, Some(&stored), true),
        UpsertDecision::Update
    );
}

// ---------------------------------------------------------------------------
// apply()
// ---------------------------------------------------------------------------

#[tokio::test]
async fn apply_is_idempotent() {
    let store = MemoryStore::new();
    let engine = UpsertEngine::new();
    let candidate = scam_record("A1", ThreatLevel::High);

    let first = engine.apply(&store, &candidate, true).await.unwrap();
    assert_eq!(first, UpsertDecision::Insert);

    let second = engine.apply(&store, &candidate, true).await.unwrap();
    assert_eq!(second, UpsertDecision::NoOp);

    let stored = store.get("A1").await.unwrap().unwrap().record;
    assert_eq!(stored, candidate);
    assert_eq!(stored.report_count, 0);
}

#[tokio::test]
async fn update_preserves_report_fields_and_scrape_date() {
    let store = MemoryStore::new();
    let engine = UpsertEngine::new();
    let original = scam_record("A1", ThreatLevel::High);
    engine.apply(&store, &original, true).await.unwrap();

    // The ad gets reported between sightings.
    store
        .transition("A1", ReportEvent::Request)
        .await
        .unwrap();
    store
        .transition("A1", ReportEvent::Confirm)
        .await
        .unwrap();

    let mut resight = original.clone();
    resight.page_like_count = 999;
    resight.date_scraped = chrono::Utc::now();
    let decision = engine.apply(&store, &resight, false).await.unwrap();
    assert_eq!(decision, UpsertDecision::Update);

    let stored = store.get("A1").await.unwrap().unwrap().record;
    assert_eq!(stored.page_like_count, 999);
    assert_eq!(stored.report_count, 1);
    assert!(stored.reported());
    // First-seen date survives metadata refreshes.
    assert_eq!(stored.date_scraped, original.date_scraped);
}

#[tokio::test]
async fn stale_rescrape_never_overwrites_classification() {
    let store = MemoryStore::new();
    let engine = UpsertEngine::new();
    let original = scam_record("A1", ThreatLevel::High);
    engine.apply(&store, &original, true).await.unwrap();

    let mut resight = original.clone();
    resight.page_like_count = 999;
    resight.verdict = Verdict::Legitimate;
    resight.threat_level = None;
    engine.apply(&store, &resight, false).await.unwrap();

    let stored = store.get("A1").await.unwrap().unwrap().record;
    assert_eq!(stored.verdict, Verdict::Scam);
    assert_eq!(stored.threat_level, Some(ThreatLevel::High));
    assert_eq!(stored.page_like_count, 999);
}

#[tokio::test]
async fn concurrent_inserts_converge_to_one_record() {
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(UpsertEngine::new());
    let candidate = scam_record("A1", ThreatLevel::High);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let engine = Arc::clone(&engine);
        let candidate = candidate.clone();
        handles.push(tokio::spawn(async move {
            engine.apply(store.as_ref(), &candidate, true).await.unwrap()
        }));
    }

    let mut inserts = 0;
    for handle in handles {
        if handle.await.unwrap() == UpsertDecision::Insert {
            inserts += 1;
        }
    }
    assert_eq!(inserts, 1);

    let all = store.list(&Default::default()).await.unwrap();
    assert_eq!(all.len(), 1);
}
