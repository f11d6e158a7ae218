// Trait abstractions for the pipeline's external collaborators.
//
// AdSource wraps the platform scraper, AdClassifier the AI service,
// NotificationSink the report mail transport. The seams enable deterministic
// testing with the mocks in `testing`: no network, no actor runs.

use async_trait::async_trait;

use adwatch_common::{AdDraft, AdRecord, Classification, PipelineError};
use apify_client::{ApifyClient, RawAdItem};
use mail_client::{MailClient, ReportRequest};

// ---------------------------------------------------------------------------
// AdSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AdSource: Send + Sync {
    /// Pull one batch of raw ad items. A failure here is cycle-fatal; the
    /// orchestrator does not retry the whole batch.
    async fn fetch_batch(&self) -> anyhow::Result<Vec<RawAdItem>>;
}

/// Production source: Facebook Ad Library pages scraped through Apify.
pub struct ApifyAdSource {
    client: ApifyClient,
    page_urls: Vec<String>,
    limit: u32,
}

impl ApifyAdSource {
    pub fn new(client: ApifyClient, page_urls: Vec<String>, limit: u32) -> Self {
        Self {
            client,
            page_urls,
            limit,
        }
    }
}

#[async_trait]
impl AdSource for ApifyAdSource {
    async fn fetch_batch(&self) -> anyhow::Result<Vec<RawAdItem>> {
        let ads = self
            .client
            .scrape_ad_library(&self.page_urls, self.limit)
            .await?;
        Ok(ads.into_iter().map(|ad| ad.into_raw_item()).collect())
    }
}

// ---------------------------------------------------------------------------
// AdClassifier
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AdClassifier: Send + Sync {
    /// One classification attempt. Retry policy lives in `ClassifierRunner`,
    /// not in implementations.
    async fn classify(&self, draft: &AdDraft) -> Result<Classification, PipelineError>;
}

// ---------------------------------------------------------------------------
// NotificationSink
// ---------------------------------------------------------------------------

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Dispatch one law-enforcement notification for a record. The sink is
    /// not assumed idempotent; the report state machine reconciles via
    /// confirm/fail.
    async fn deliver(&self, record: &AdRecord) -> Result<(), PipelineError>;
}

/// Production sink: the report mail service.
pub struct MailSink {
    client: MailClient,
}

impl MailSink {
    pub fn new(client: MailClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationSink for MailSink {
    async fn deliver(&self, record: &AdRecord) -> Result<(), PipelineError> {
        let request = ReportRequest {
            id: record.id.clone(),
            ad: serde_json::to_value(record).ok(),
        };
        self.client
            .send_report(&request)
            .await
            .map_err(|e| PipelineError::NotificationDelivery(e.to_string()))
    }
}
