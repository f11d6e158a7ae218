//! In-memory store with JSON snapshot persistence. This is the shipped
//! implementation; a database-backed one would implement the same trait.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use adwatch_common::{AdRecord, PipelineError, ReportEvent, ReportState};

use super::{AdFilter, AdStore, VersionedAd};

/// Cycle locks older than this are considered crashed and broken on acquire.
const CYCLE_LOCK_STALE_AFTER: Duration = Duration::from_secs(30 * 60);

pub struct MemoryStore {
    ads: Mutex<HashMap<String, VersionedAd>>,
    cycle_lock: Mutex<Option<Instant>>,
    lock_stale_after: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            ads: Mutex::new(HashMap::new()),
            cycle_lock: Mutex::new(None),
            lock_stale_after: CYCLE_LOCK_STALE_AFTER,
        }
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn with_lock_stale_after(mut self, stale_after: Duration) -> Self {
        self.lock_stale_after = stale_after;
        self
    }

    /// Load history from a JSON snapshot (wire-shape array). Missing file
    /// means a fresh store.
    pub fn load_snapshot(path: &Path) -> anyhow::Result<Self> {
        let store = Self::new();
        if !path.exists() {
            info!(path = %path.display(), "No snapshot found, starting fresh");
            return Ok(store);
        }
        let data = std::fs::read_to_string(path)?;
        let records: Vec<AdRecord> = serde_json::from_str(&data)?;
        {
            let mut ads = store.ads.lock().unwrap();
            for record in records {
                ads.insert(record.id.clone(), VersionedAd { record, version: 1 });
            }
            info!(count = ads.len(), path = %path.display(), "Snapshot loaded");
        }
        Ok(store)
    }

    /// Write all records to a JSON snapshot, ordered by id.
    pub fn save_snapshot(&self, path: &Path) -> anyhow::Result<()> {
        let mut records: Vec<AdRecord> = {
            let ads = self.ads.lock().unwrap();
            ads.values().map(|v| v.record.clone()).collect()
        };
        records.sort_by(|a, b| a.id.cmp(&b.id));
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(path, json)?;
        info!(count = records.len(), path = %path.display(), "Snapshot saved");
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<VersionedAd>, PipelineError> {
        Ok(self.ads.lock().unwrap().get(id).cloned())
    }

    async fn insert_new(&self, record: AdRecord) -> Result<u64, PipelineError> {
        let mut ads = self.ads.lock().unwrap();
        if ads.contains_key(&record.id) {
            return Err(PipelineError::StoreConflict(record.id));
        }
        let id = record.id.clone();
        ads.insert(id, VersionedAd { record, version: 1 });
        Ok(1)
    }

    async fn update(
        &self,
        expected_version: u64,
        record: AdRecord,
    ) -> Result<u64, PipelineError> {
        let mut ads = self.ads.lock().unwrap();
        let entry = ads
            .get_mut(&record.id)
            .ok_or_else(|| PipelineError::Store(format!("no such ad: {}", record.id)))?;
        if entry.version != expected_version {
            return Err(PipelineError::StoreConflict(record.id));
        }
        entry.version += 1;
        entry.record = record;
        Ok(entry.version)
    }

    async fn list(&self, filter: &AdFilter) -> Result<Vec<AdRecord>, PipelineError> {
        let ads = self.ads.lock().unwrap();
        let mut records: Vec<AdRecord> = ads
            .values()
            .filter(|v| filter.matches(&v.record))
            .map(|v| v.record.clone())
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn transition(
        &self,
        id: &str,
        event: ReportEvent,
    ) -> Result<ReportState, PipelineError> {
        let mut ads = self.ads.lock().unwrap();
        let entry = ads
            .get_mut(id)
            .ok_or_else(|| PipelineError::Store(format!("no such ad: {id}")))?;

        let from = entry.record.report_state;
        let next = match (&event, from) {
            (ReportEvent::Request, ReportState::Unreported) => ReportState::ReportPending,
            (ReportEvent::Confirm, ReportState::ReportPending) => {
                entry.record.report_count += 1;
                entry.record.reported_at = Some(Utc::now());
                ReportState::Reported
            }
            (ReportEvent::Fail { reason }, ReportState::ReportPending) => {
                warn!(ad_id = id, reason = reason.as_str(), "Report dispatch failed");
                ReportState::Unreported
            }
            _ => {
                return Err(PipelineError::InvalidState {
                    id: id.to_string(),
                    from,
                    event: event.name(),
                })
            }
        };

        entry.record.report_state = next;
        entry.version += 1;
        Ok(next)
    }

    async fn acquire_cycle_lock(&self) -> Result<bool, PipelineError> {
        let mut lock = self.cycle_lock.lock().unwrap();
        if let Some(started) = *lock {
            if started.elapsed() < self.lock_stale_after {
                return Ok(false);
            }
            warn!(
                held_secs = started.elapsed().as_secs(),
                "Breaking stale cycle lock"
            );
        }
        *lock = Some(Instant::now());
        Ok(true)
    }

    async fn release_cycle_lock(&self) -> Result<(), PipelineError> {
        *self.cycle_lock.lock().unwrap() = None;
        Ok(())
    }
}
