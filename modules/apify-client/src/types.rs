use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Platform-agnostic ingestion types ---

/// A raw advertisement item from any platform scraper, consumed by the
/// ingestion pipeline's normalizer. Known fields are typed; everything else
/// the actor returned rides along in `extra` so no platform data is lost
/// before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAdItem {
    pub id: Option<String>,
    pub page_name: Option<String>,
    pub ad_text: Option<String>,
    pub link_url: Option<String>,
    pub page_like_count: Option<i64>,
    #[serde(default)]
    pub platform: String, // "facebook", "instagram", etc.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// --- Facebook Ad Library scraper types ---

/// Input for the curious_coder/facebook-ads-library-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct AdLibraryScraperInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<StartUrl>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: u32,
}

/// A start URL entry for Ad Library scraper input.
#[derive(Debug, Clone, Serialize)]
pub struct StartUrl {
    pub url: String,
}

/// A single ad from the Ad Library Apify dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct AdLibraryAd {
    #[serde(rename = "adArchiveId")]
    pub ad_archive_id: Option<String>,
    #[serde(rename = "pageName")]
    pub page_name: Option<String>,
    /// Ad creative body text.
    #[serde(rename = "adText")]
    pub ad_text: Option<String>,
    #[serde(rename = "linkUrl")]
    pub link_url: Option<String>,
    #[serde(rename = "pageLikeCount")]
    pub page_like_count: Option<i64>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "pageId")]
    pub page_id: Option<String>,
    /// Everything else the actor emitted (snapshot metadata, spend ranges,
    /// platform distribution), passed through untyped.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AdLibraryAd {
    /// Convert to a platform-agnostic RawAdItem for the ingestion pipeline.
    pub fn into_raw_item(self) -> RawAdItem {
        RawAdItem {
            id: self.ad_archive_id,
            page_name: self.page_name,
            ad_text: self.ad_text,
            link_url: self.link_url,
            page_like_count: self.page_like_count,
            platform: "facebook".to_string(),
            extra: self.extra,
        }
    }
}

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}
