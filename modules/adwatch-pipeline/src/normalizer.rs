//! Raw platform bag → canonical `AdDraft`.
//!
//! Pure transform: no I/O, no store access. Items without an extractable id
//! fail with `MalformedInput` and are dropped by the orchestrator, never
//! fatal to the cycle.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use adwatch_common::{AdDraft, PipelineError};
use apify_client::RawAdItem;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>\)\]]+"#).unwrap());

/// Alternate id keys seen across platform scrapers.
const ID_KEYS: &[&str] = &["ad_archive_id", "adArchiveId", "archive_id", "adId"];

pub fn normalize(item: &RawAdItem) -> Result<AdDraft, PipelineError> {
    let id = extract_id(item)
        .ok_or_else(|| PipelineError::MalformedInput("missing or empty ad id".to_string()))?;

    let ad_text = item.ad_text.clone().unwrap_or_default();
    let page_name = item
        .page_name
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let page_like_count = item.page_like_count.unwrap_or(0).max(0) as u64;

    Ok(AdDraft {
        id,
        page_name,
        links_found: extract_links(&ad_text, item.link_url.as_deref()),
        ad_text,
        page_like_count,
        date_scraped: Utc::now(),
    })
}

fn extract_id(item: &RawAdItem) -> Option<String> {
    if let Some(id) = item.id.as_deref() {
        if !id.trim().is_empty() {
            return Some(id.trim().to_string());
        }
    }
    for key in ID_KEYS {
        if let Some(id) = item.extra.get(*key).and_then(|v| id_string(v)) {
            return Some(id);
        }
    }
    None
}

// Some actors emit numeric archive ids.
fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Deterministic link extraction: URL-pattern matches over the ad text plus
/// the explicit link field, deduplicated in first-seen order. Candidates
/// that fail URL parsing are discarded.
fn extract_links(ad_text: &str, link_url: Option<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let candidates = link_url
        .into_iter()
        .map(str::to_string)
        .chain(URL_RE.find_iter(ad_text).map(|m| {
            m.as_str()
                .trim_end_matches(['.', ',', ';', '!', '?'])
                .to_string()
        }));

    for candidate in candidates {
        if url::Url::parse(&candidate).is_err() {
            continue;
        }
        if seen.insert(candidate.clone()) {
            links.push(candidate);
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Option<&str>, text: &str) -> RawAdItem {
        RawAdItem {
            id: id.map(str::to_string),
            page_name: Some("Test Page".to_string()),
            ad_text: Some(text.to_string()),
            link_url: None,
            page_like_count: Some(10),
            platform: "facebook".to_string(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn missing_id_is_malformed() {
        let err = normalize(&item(None, "some ad")).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(_)));
    }

    #[test]
    fn empty_id_is_malformed() {
        let err = normalize(&item(Some("   "), "some ad")).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(_)));
    }

    #[test]
    fn id_recovered_from_extra_keys() {
        let mut raw = item(None, "ad");
        raw.extra
            .insert("adArchiveId".to_string(), serde_json::json!(123456789));
        let draft = normalize(&raw).unwrap();
        assert_eq!(draft.id, "123456789");
    }

    #[test]
    fn links_extracted_and_deduped() {
        let mut raw = item(
            Some("A1"),
            "Win big at https://scam.example/win! Also see https://scam.example/win and http://other.example/x.",
        );
        raw.link_url = Some("https://scam.example/win".to_string());
        let draft = normalize(&raw).unwrap();
        assert_eq!(
            draft.links_found,
            vec![
                "https://scam.example/win".to_string(),
                "http://other.example/x".to_string(),
            ]
        );
    }

    #[test]
    fn invalid_link_candidates_discarded() {
        let mut raw = item(Some("A1"), "no urls here");
        raw.link_url = Some("not a url".to_string());
        let draft = normalize(&raw).unwrap();
        assert!(draft.links_found.is_empty());
    }

    #[test]
    fn missing_page_name_falls_back() {
        let mut raw = item(Some("A1"), "ad");
        raw.page_name = None;
        let draft = normalize(&raw).unwrap();
        assert_eq!(draft.page_name, "unknown");
    }

    #[test]
    fn negative_like_count_clamped() {
        let mut raw = item(Some("A1"), "ad");
        raw.page_like_count = Some(-5);
        assert_eq!(normalize(&raw).unwrap().page_like_count, 0);
    }
}
