//! Storage seam for the pipeline. The store is the single owner of
//! `AdRecord` state; all writes for a given id are serialized through
//! versioned compare-and-set updates and atomic report transitions.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use adwatch_common::{AdRecord, PipelineError, ReportEvent, ReportState, ThreatLevel};

/// A stored record plus its write version, the CAS token for `update`.
#[derive(Debug, Clone)]
pub struct VersionedAd {
    pub record: AdRecord,
    pub version: u64,
}

/// Filter for `list`. Empty filter returns everything.
#[derive(Debug, Clone, Default)]
pub struct AdFilter {
    pub scam_only: bool,
    pub min_threat: Option<ThreatLevel>,
    pub report_state: Option<ReportState>,
    pub scraped_after: Option<DateTime<Utc>>,
}

impl AdFilter {
    pub fn matches(&self, record: &AdRecord) -> bool {
        if self.scam_only && record.verdict.is_scam() != Some(true) {
            return false;
        }
        if let Some(min) = self.min_threat {
            match record.threat_level {
                Some(level) if level >= min => {}
                _ => return false,
            }
        }
        if let Some(state) = self.report_state {
            if record.report_state != state {
                return false;
            }
        }
        if let Some(after) = self.scraped_after {
            if record.date_scraped < after {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait AdStore: Send + Sync {
    /// Fetch one record with its version.
    async fn get(&self, id: &str) -> Result<Option<VersionedAd>, PipelineError>;

    /// Create-if-absent. Returns the initial version; `StoreConflict` when
    /// the id already exists (two racing cycles cannot both insert).
    async fn insert_new(&self, record: AdRecord) -> Result<u64, PipelineError>;

    /// Compare-and-set update keyed by the version from `get`. Returns the
    /// new version; `StoreConflict` when the stored version moved.
    async fn update(&self, expected_version: u64, record: AdRecord)
        -> Result<u64, PipelineError>;

    /// All records matching the filter, ordered by id.
    async fn list(&self, filter: &AdFilter) -> Result<Vec<AdRecord>, PipelineError>;

    /// Atomic report-state transition. Illegal transitions fail with
    /// `InvalidState` and leave the record untouched.
    async fn transition(&self, id: &str, event: ReportEvent)
        -> Result<ReportState, PipelineError>;

    /// Ingestion-cycle mutual exclusion. Returns false while another live
    /// cycle holds the lock; stale locks are broken on acquire.
    async fn acquire_cycle_lock(&self) -> Result<bool, PipelineError>;

    async fn release_cycle_lock(&self) -> Result<(), PipelineError>;
}
