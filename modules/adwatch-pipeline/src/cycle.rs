//! Ingestion cycle orchestrator: pulls one batch from the ad source and runs
//! normalize → classify → upsert per item with bounded concurrency. The only
//! component that knows all the others.

use std::sync::Arc;

use anyhow::Context;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use adwatch_common::{AdRecord, Classification, PipelineError, ThreatLevel, Verdict};
use apify_client::RawAdItem;

use crate::classifier::ClassifierRunner;
use crate::normalizer;
use crate::store::AdStore;
use crate::traits::AdSource;
use crate::upsert::{UpsertDecision, UpsertEngine};

/// Where in the per-item pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Normalize,
    Classify,
    Upsert,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Normalize => write!(f, "normalize"),
            FailureStage::Classify => write!(f, "classify"),
            FailureStage::Upsert => write!(f, "upsert"),
        }
    }
}

/// One contained per-item failure. Surfaced on the stats instead of raised;
/// a single bad item never aborts the batch.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub id: Option<String>,
    pub page_name: Option<String>,
    pub stage: FailureStage,
    pub error: String,
}

/// Stats from one ingestion cycle.
#[derive(Debug, Default)]
pub struct CycleStats {
    pub fetched: u32,
    pub inserted: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub malformed: u32,
    pub unclassified: u32,
    pub failed: u32,
    pub by_threat: [u32; 3], // Low, Medium, High (new scam ads)
    pub failures: Vec<ItemFailure>,
}

impl std::fmt::Display for CycleStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Ingestion Cycle Complete ===")?;
        writeln!(f, "Ads fetched:     {}", self.fetched)?;
        writeln!(f, "Inserted:        {}", self.inserted)?;
        writeln!(f, "Updated:         {}", self.updated)?;
        writeln!(f, "Unchanged:       {}", self.unchanged)?;
        writeln!(f, "Malformed:       {}", self.malformed)?;
        writeln!(f, "Manual review:   {}", self.unclassified)?;
        writeln!(f, "Failed:          {}", self.failed)?;
        writeln!(f, "\nNew scam ads by threat level:")?;
        writeln!(f, "  HIGH:   {}", self.by_threat[2])?;
        writeln!(f, "  MEDIUM: {}", self.by_threat[1])?;
        writeln!(f, "  LOW:    {}", self.by_threat[0])?;
        if !self.failures.is_empty() {
            writeln!(f, "\nFailures:")?;
            for failure in &self.failures {
                writeln!(
                    f,
                    "  [{}] {} ({}): {}",
                    failure.stage,
                    failure.id.as_deref().unwrap_or("<no id>"),
                    failure.page_name.as_deref().unwrap_or("unknown page"),
                    failure.error
                )?;
            }
        }
        Ok(())
    }
}

enum ItemOutcome {
    Applied {
        decision: UpsertDecision,
        new_scam_threat: Option<ThreatLevel>,
        review: Option<ItemFailure>,
    },
    Malformed(ItemFailure),
    Failed(ItemFailure),
}

pub struct Pipeline {
    source: Arc<dyn AdSource>,
    classifier: ClassifierRunner,
    store: Arc<dyn AdStore>,
    upsert: UpsertEngine,
    concurrency: usize,
    force_reclassify: bool,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn AdSource>,
        classifier: ClassifierRunner,
        store: Arc<dyn AdStore>,
    ) -> Self {
        Self {
            source,
            classifier,
            store,
            upsert: UpsertEngine::new(),
            concurrency: 10,
            force_reclassify: false,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_force_reclassify(mut self, force: bool) -> Self {
        self.force_reclassify = force;
        self
    }

    /// Run one full ingestion cycle. Scheduled runs are mutually exclusive:
    /// a second concurrent cycle fails fast with `CycleInProgress`.
    pub async fn run_cycle(&self) -> Result<CycleStats, PipelineError> {
        if !self.store.acquire_cycle_lock().await? {
            return Err(PipelineError::CycleInProgress);
        }

        let result = self.run_inner().await;

        // Always release lock
        if let Err(e) = self.store.release_cycle_lock().await {
            error!("Failed to release cycle lock: {e}");
        }

        result
    }

    async fn run_inner(&self) -> Result<CycleStats, PipelineError> {
        let batch = self
            .source
            .fetch_batch()
            .await
            .context("Failed to fetch ad batch from source")?;

        let mut stats = CycleStats {
            fetched: batch.len() as u32,
            ..CycleStats::default()
        };
        info!(fetched = stats.fetched, "Ad batch fetched, processing");

        let outcomes: Vec<ItemOutcome> = stream::iter(
            batch.into_iter().map(|item| self.process_item(item)),
        )
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        for outcome in outcomes {
            match outcome {
                ItemOutcome::Applied {
                    decision,
                    new_scam_threat,
                    review,
                } => {
                    match decision {
                        UpsertDecision::Insert => stats.inserted += 1,
                        UpsertDecision::Update => stats.updated += 1,
                        UpsertDecision::NoOp => stats.unchanged += 1,
                    }
                    if let Some(threat) = new_scam_threat {
                        stats.by_threat[threat as usize] += 1;
                    }
                    if let Some(failure) = review {
                        stats.unclassified += 1;
                        stats.failures.push(failure);
                    }
                }
                ItemOutcome::Malformed(failure) => {
                    stats.malformed += 1;
                    stats.failures.push(failure);
                }
                ItemOutcome::Failed(failure) => {
                    stats.failed += 1;
                    stats.failures.push(failure);
                }
            }
        }

        info!("{stats}");
        Ok(stats)
    }

    /// Normalize → classify → upsert one raw item. Every failure mode maps
    /// to a contained outcome; within one id the stages run strictly in
    /// sequence.
    async fn process_item(&self, item: RawAdItem) -> ItemOutcome {
        let page_name = item.page_name.clone();

        let draft = match normalizer::normalize(&item) {
            Ok(draft) => draft,
            Err(e) => {
                warn!(page_name = page_name.as_deref(), error = %e, "Dropping malformed ad item");
                return ItemOutcome::Malformed(ItemFailure {
                    id: item.id.clone(),
                    page_name,
                    stage: FailureStage::Normalize,
                    error: e.to_string(),
                });
            }
        };

        let existing = match self.store.get(&draft.id).await {
            Ok(existing) => existing,
            Err(e) => {
                return ItemOutcome::Failed(ItemFailure {
                    id: Some(draft.id),
                    page_name,
                    stage: FailureStage::Upsert,
                    error: e.to_string(),
                })
            }
        };

        // Classification is sticky: known ads skip the classifier unless a
        // re-analysis is forced.
        let sticky = existing.as_ref().filter(|_| !self.force_reclassify);

        let (classification, fresh, review) = match sticky {
            Some(versioned) => (versioned.record.classification(), false, None),
            None => match self.classifier.classify_with_retry(&draft).await {
                Ok(classification) => (classification, true, None),
                Err(e) => {
                    let failure = ItemFailure {
                        id: Some(draft.id.clone()),
                        page_name: Some(draft.page_name.clone()),
                        stage: FailureStage::Classify,
                        error: e.to_string(),
                    };
                    match &existing {
                        // Keep the stored verdict rather than degrading it.
                        Some(versioned) => {
                            (versioned.record.classification(), false, Some(failure))
                        }
                        // First sighting: persist for manual review.
                        None => (Classification::unknown(&e.to_string()), true, Some(failure)),
                    }
                }
            },
        };

        let new_scam = existing.is_none() && classification.verdict == Verdict::Scam;
        let new_scam_threat = if new_scam {
            classification.threat_level
        } else {
            None
        };

        let candidate = AdRecord::from_parts(draft, classification);
        match self.upsert.apply(self.store.as_ref(), &candidate, fresh).await {
            Ok(decision) => ItemOutcome::Applied {
                decision,
                new_scam_threat,
                review,
            },
            Err(e) => ItemOutcome::Failed(ItemFailure {
                id: Some(candidate.id),
                page_name: Some(candidate.page_name),
                stage: FailureStage::Upsert,
                error: e.to_string(),
            }),
        }
    }
}
