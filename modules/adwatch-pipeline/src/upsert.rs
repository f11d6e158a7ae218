//! Dedup / upsert engine. Given a candidate record and the stored record for
//! the same id, decides Insert / Update / NoOp and applies the write as a
//! bounded compare-and-set loop, so applying the same candidate twice yields
//! the same stored state and racing cycles cannot double-insert.

use std::collections::BTreeSet;

use tracing::{info, warn};

use adwatch_common::{AdRecord, PipelineError};

use crate::store::AdStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertDecision {
    Insert,
    Update,
    NoOp,
}

impl std::fmt::Display for UpsertDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpsertDecision::Insert => write!(f, "insert"),
            UpsertDecision::Update => write!(f, "update"),
            UpsertDecision::NoOp => write!(f, "noop"),
        }
    }
}

/// Materiality rules:
/// - no stored record: Insert;
/// - `page_like_count` or the link set changed: Update;
/// - classification changed AND the classifier ran fresh for this sighting:
///   Update (stale re-scrapes never overwrite classification);
/// - otherwise NoOp.
pub fn decide(
    candidate: &AdRecord,
    existing: Option<&AdRecord>,
    fresh_classification: bool,
) -> UpsertDecision {
    let Some(existing) = existing else {
        return UpsertDecision::Insert;
    };

    if existing.page_like_count != candidate.page_like_count {
        return UpsertDecision::Update;
    }
    if link_set(&existing.links_found) != link_set(&candidate.links_found) {
        return UpsertDecision::Update;
    }
    if fresh_classification && existing.classification() != candidate.classification() {
        return UpsertDecision::Update;
    }

    UpsertDecision::NoOp
}

fn link_set(links: &[String]) -> BTreeSet<&str> {
    links.iter().map(String::as_str).collect()
}

/// Merge a candidate into the stored record. Metadata refreshes; report
/// fields and the first-seen scrape date always survive; classification only
/// moves when it came from a fresh classifier run.
fn merge(stored: &AdRecord, candidate: &AdRecord, fresh_classification: bool) -> AdRecord {
    let mut merged = stored.clone();
    merged.page_name = candidate.page_name.clone();
    merged.ad_text = candidate.ad_text.clone();
    merged.page_like_count = candidate.page_like_count;
    merged.links_found = candidate.links_found.clone();
    if fresh_classification {
        merged.apply_classification(candidate.classification());
    }
    merged
}

pub struct UpsertEngine {
    max_conflict_retries: u32,
}

impl UpsertEngine {
    pub fn new() -> Self {
        Self {
            max_conflict_retries: 3,
        }
    }

    /// Decide and apply. On `StoreConflict` the decision is re-made from a
    /// fresh read, up to the retry bound.
    pub async fn apply(
        &self,
        store: &dyn AdStore,
        candidate: &AdRecord,
        fresh_classification: bool,
    ) -> Result<UpsertDecision, PipelineError> {
        let mut attempt = 0;
        loop {
            let existing = store.get(&candidate.id).await?;
            let decision = decide(
                candidate,
                existing.as_ref().map(|v| &v.record),
                fresh_classification,
            );

            let write = match (decision, existing) {
                (UpsertDecision::Insert, _) => {
                    store.insert_new(candidate.clone()).await.map(|_| ())
                }
                (UpsertDecision::Update, Some(versioned)) => {
                    let merged = merge(&versioned.record, candidate, fresh_classification);
                    store.update(versioned.version, merged).await.map(|_| ())
                }
                // Update without a prior read cannot happen; treat as a lost
                // race and re-decide.
                (UpsertDecision::Update, None) => {
                    Err(PipelineError::StoreConflict(candidate.id.clone()))
                }
                (UpsertDecision::NoOp, _) => return Ok(UpsertDecision::NoOp),
            };

            match write {
                Ok(()) => {
                    info!(ad_id = candidate.id.as_str(), decision = %decision, "Upsert applied");
                    return Ok(decision);
                }
                Err(PipelineError::StoreConflict(_)) if attempt < self.max_conflict_retries => {
                    attempt += 1;
                    warn!(
                        ad_id = candidate.id.as_str(),
                        attempt, "Upsert conflict, re-deciding from fresh read"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for UpsertEngine {
    fn default() -> Self {
        Self::new()
    }
}
