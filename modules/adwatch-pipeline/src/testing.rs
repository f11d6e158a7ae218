// Test mocks for the pipeline.
//
// Three mocks matching the three trait boundaries:
// - MockAdSource (AdSource): canned raw item batches
// - MockClassifier (AdClassifier): per-id scripted outcomes, call counting
// - MockSink (NotificationSink): fails N times then succeeds, delivery count
//
// Plus helpers for constructing RawAdItem / AdDraft / Classification /
// AdRecord fixtures.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use adwatch_common::{
    AdDraft, AdRecord, Classification, PipelineError, ScamType, ThreatLevel, Verdict,
};
use apify_client::RawAdItem;

use crate::traits::{AdClassifier, AdSource, NotificationSink};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn raw_item(id: &str, page_name: &str, text: &str) -> RawAdItem {
    RawAdItem {
        id: Some(id.to_string()),
        page_name: Some(page_name.to_string()),
        ad_text: Some(text.to_string()),
        link_url: None,
        page_like_count: Some(100),
        platform: "facebook".to_string(),
        extra: serde_json::Map::new(),
    }
}

pub fn draft(id: &str) -> AdDraft {
    AdDraft {
        id: id.to_string(),
        page_name: "Test Page".to_string(),
        ad_text: "Send money now".to_string(),
        links_found: vec!["https://scam.example/".to_string()],
        page_like_count: 100,
        date_scraped: Utc.with_ymd_and_hms(2025, 11, 3, 0, 0, 0).unwrap(),
    }
}

pub fn scam_classification(threat: ThreatLevel) -> Classification {
    Classification {
        verdict: Verdict::Scam,
        scam_type: ScamType::Scam,
        threat_level: Some(threat),
        explanation: "classic advance-fee pattern".to_string(),
        summary: vec!["promises free money".to_string()],
        scam_patterns: vec!["advance-fee".to_string()],
        red_flags: vec!["unregistered domain".to_string()],
        recommendations: vec!["report the page".to_string()],
    }
}

pub fn legit_classification() -> Classification {
    Classification {
        verdict: Verdict::Legitimate,
        scam_type: ScamType::Legit,
        threat_level: None,
        explanation: "ordinary retail ad".to_string(),
        summary: vec!["sells shoes".to_string()],
        scam_patterns: vec![],
        red_flags: vec![],
        recommendations: vec![],
    }
}

pub fn scam_record(id: &str, threat: ThreatLevel) -> AdRecord {
    AdRecord::from_parts(draft(id), scam_classification(threat))
}

// ---------------------------------------------------------------------------
// MockAdSource
// ---------------------------------------------------------------------------

/// Canned batch source. `failing()` simulates a full-source outage.
pub struct MockAdSource {
    items: Vec<RawAdItem>,
    fail: bool,
}

impl MockAdSource {
    pub fn new(items: Vec<RawAdItem>) -> Self {
        Self { items, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            items: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl AdSource for MockAdSource {
    async fn fetch_batch(&self) -> anyhow::Result<Vec<RawAdItem>> {
        if self.fail {
            anyhow::bail!("MockAdSource: scrape outage");
        }
        Ok(self.items.clone())
    }
}

// ---------------------------------------------------------------------------
// MockClassifier
// ---------------------------------------------------------------------------

enum Scripted {
    Classified(Classification),
    Timeout,
    ServiceError,
}

/// Per-id scripted classifier. Outcomes are consumed in order; calls past
/// the script (or for unregistered ids) fail with a service error.
/// Builder pattern: `.classifies()`, `.times_out()`, `.errors()`.
pub struct MockClassifier {
    scripts: Mutex<HashMap<String, Vec<Scripted>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn classifies(self, id: &str, classification: Classification) -> Self {
        self.push(id, Scripted::Classified(classification));
        self
    }

    pub fn times_out(self, id: &str, times: u32) -> Self {
        for _ in 0..times {
            self.push(id, Scripted::Timeout);
        }
        self
    }

    pub fn errors(self, id: &str, times: u32) -> Self {
        for _ in 0..times {
            self.push(id, Scripted::ServiceError);
        }
        self
    }

    pub fn call_count(&self, id: &str) -> u32 {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    fn push(&self, id: &str, outcome: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .push(outcome);
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdClassifier for MockClassifier {
    async fn classify(&self, draft: &AdDraft) -> Result<Classification, PipelineError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(draft.id.clone())
            .or_insert(0) += 1;

        let next = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(&draft.id) {
                Some(script) if !script.is_empty() => script.remove(0),
                _ => Scripted::ServiceError,
            }
        };

        match next {
            Scripted::Classified(c) => Ok(c),
            Scripted::Timeout => Err(PipelineError::ClassificationTimeout(format!(
                "MockClassifier: scripted timeout for {}",
                draft.id
            ))),
            Scripted::ServiceError => Err(PipelineError::ClassificationService(format!(
                "MockClassifier: no scripted outcome for {}",
                draft.id
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Notification sink that fails the first `fail_times` deliveries, then
/// succeeds. Counts every delivery attempt.
pub struct MockSink {
    remaining_failures: Mutex<u32>,
    deliveries: Mutex<u32>,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            remaining_failures: Mutex::new(0),
            deliveries: Mutex::new(0),
        }
    }

    pub fn fail_times(self, times: u32) -> Self {
        *self.remaining_failures.lock().unwrap() = times;
        self
    }

    pub fn delivery_count(&self) -> u32 {
        *self.deliveries.lock().unwrap()
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for MockSink {
    async fn deliver(&self, record: &AdRecord) -> Result<(), PipelineError> {
        *self.deliveries.lock().unwrap() += 1;
        let mut remaining = self.remaining_failures.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(PipelineError::NotificationDelivery(format!(
                "MockSink: scripted failure for {}",
                record.id
            )));
        }
        Ok(())
    }
}
