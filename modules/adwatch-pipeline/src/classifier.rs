use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use adwatch_common::{
    AdDraft, Classification, PipelineError, RetryPolicy, ScamType, ThreatLevel, Verdict,
};
use claude_client::Claude;

use crate::traits::AdClassifier;

/// What the model returns for one ad.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClassifiedAd {
    /// Whether this advertisement is a scam
    pub is_scam: bool,
    /// Ad category: "SCAM", "SPAM", or "LEGIT"
    pub scam_type: String,
    /// Threat severity for scam ads: "HIGH", "MEDIUM", or "LOW"
    pub threat_level: Option<String>,
    /// One-paragraph reasoning behind the verdict
    pub explanation: String,
    /// Bullet-point summary of the ad's claims
    pub summary: Vec<String>,
    /// Known scam patterns recognized in the ad
    pub scam_patterns: Vec<String>,
    /// Specific red flags found in the ad text or links
    pub red_flags: Vec<String>,
    /// Recommended actions for someone who encountered this ad
    pub recommendations: Vec<String>,
}

const CLASSIFICATION_SYSTEM_PROMPT: &str = r#"You are a scam-advertisement analyst for a law-enforcement reporting pipeline.

Your job: given the text and metadata of one social-media advertisement, decide whether it is a scam and produce structured threat metadata.

## Verdict
- is_scam = true when the ad solicits money, credentials, or personal data under false pretenses, impersonates a brand or authority, or promises unrealistic returns.
- is_scam = false for ordinary commercial advertising, even when low quality or annoying.

## Category (scam_type)
- "SCAM": deceptive ads designed to defraud (fake investments, advance-fee loans, phishing, impersonation, counterfeit goods)
- "SPAM": unsolicited junk without a direct fraud mechanism (clickbait, engagement bait, low-quality funnels)
- "LEGIT": legitimate advertising

## Threat level (scam ads only)
- "HIGH": direct financial or credential theft, impersonation of banks/government, crypto doubling, romance/investment fraud
- "MEDIUM": misleading sales tactics, fake discounts, dubious health claims with a purchase funnel
- "LOW": borderline deceptive marketing with limited harm potential
Leave threat_level null when is_scam is false.

## Evidence fields
- summary: 2-5 short bullets describing what the ad claims and asks for
- scam_patterns: named fraud patterns you recognize ("advance-fee", "fake urgency", "brand impersonation", ...)
- red_flags: concrete observations from this ad (suspicious domain, unrealistic discount, payment via gift cards, ...)
- recommendations: concrete next steps for a consumer or investigator
Keep every bullet under 20 words. Base everything strictly on the provided ad; do not invent details."#;

/// Production classifier: one bounded-timeout model call per attempt.
pub struct ClaudeAdClassifier {
    claude: Claude,
    timeout: Duration,
}

impl ClaudeAdClassifier {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            claude: Claude::new(api_key, model),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl AdClassifier for ClaudeAdClassifier {
    async fn classify(&self, draft: &AdDraft) -> Result<Classification, PipelineError> {
        // Truncate ad text to avoid token limits
        let content = if draft.ad_text.len() > 30_000 {
            let mut end = 30_000;
            while !draft.ad_text.is_char_boundary(end) {
                end -= 1;
            }
            &draft.ad_text[..end]
        } else {
            &draft.ad_text
        };

        let user_prompt = format!(
            "Classify this advertisement.\n\nAd ID: {}\nPage: {}\nPage likes: {}\nLinks found: {}\n\n---\n\n{}",
            draft.id,
            draft.page_name,
            draft.page_like_count,
            draft.links_found.join(", "),
            content,
        );

        let raw: ClassifiedAd = tokio::time::timeout(
            self.timeout,
            self.claude.extract(CLASSIFICATION_SYSTEM_PROMPT, user_prompt),
        )
        .await
        .map_err(|_| {
            PipelineError::ClassificationTimeout(format!(
                "ad {} not classified within {}s",
                draft.id,
                self.timeout.as_secs()
            ))
        })?
        .map_err(|e| PipelineError::ClassificationService(e.to_string()))?;

        Ok(validate(raw, &draft.id))
    }
}

/// Validate the model's string-typed enums against the fixed vocabulary.
/// Unknown values are coerced (threat level to LOW for scams, category to
/// UNKNOWN) with a data-quality warning; the record is never dropped.
pub fn validate(raw: ClassifiedAd, ad_id: &str) -> Classification {
    let verdict = if raw.is_scam {
        Verdict::Scam
    } else {
        Verdict::Legitimate
    };

    let scam_type = ScamType::parse(&raw.scam_type).unwrap_or_else(|| {
        warn!(
            ad_id,
            value = raw.scam_type.as_str(),
            "Unknown scam_type from classifier"
        );
        ScamType::Unknown
    });

    let threat_level = match (verdict, raw.threat_level.as_deref()) {
        (Verdict::Scam, Some(value)) => Some(ThreatLevel::parse(value).unwrap_or_else(|| {
            warn!(
                ad_id,
                value, "Unknown threat_level from classifier, coercing to LOW"
            );
            ThreatLevel::Low
        })),
        (Verdict::Scam, None) => {
            warn!(ad_id, "Scam verdict without threat_level, coercing to LOW");
            Some(ThreatLevel::Low)
        }
        (_, value) => value.and_then(ThreatLevel::parse),
    };

    Classification {
        verdict,
        scam_type,
        threat_level,
        explanation: raw.explanation,
        summary: raw.summary,
        scam_patterns: raw.scam_patterns,
        red_flags: raw.red_flags,
        recommendations: raw.recommendations,
    }
}

// ---------------------------------------------------------------------------
// ClassifierRunner
// ---------------------------------------------------------------------------

/// Wraps any `AdClassifier` with the injected retry policy: transient
/// failures (timeout, service error) retry with exponential backoff, then
/// surface so the orchestrator can queue the ad for manual review.
pub struct ClassifierRunner {
    inner: Arc<dyn AdClassifier>,
    retry: RetryPolicy,
}

impl ClassifierRunner {
    pub fn new(inner: Arc<dyn AdClassifier>, retry: RetryPolicy) -> Self {
        Self { inner, retry }
    }

    pub async fn classify_with_retry(
        &self,
        draft: &AdDraft,
    ) -> Result<Classification, PipelineError> {
        let mut attempt = 0;
        loop {
            match self.inner.classify(draft).await {
                Ok(classification) => return Ok(classification),
                Err(
                    e @ (PipelineError::ClassificationTimeout(_)
                    | PipelineError::ClassificationService(_)),
                ) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        return Err(e);
                    }
                    let delay = self.retry.delay_for(attempt - 1);
                    warn!(
                        ad_id = draft.id.as_str(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Classification failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(is_scam: bool, scam_type: &str, threat: Option<&str>) -> ClassifiedAd {
        ClassifiedAd {
            is_scam,
            scam_type: scam_type.to_string(),
            threat_level: threat.map(str::to_string),
            explanation: "because".to_string(),
            summary: vec![],
            scam_patterns: vec![],
            red_flags: vec![],
            recommendations: vec![],
        }
    }

    #[test]
    fn valid_scam_passes_through() {
        let c = validate(raw(true, "SCAM", Some("HIGH")), "A1");
        assert_eq!(c.verdict, Verdict::Scam);
        assert_eq!(c.scam_type, ScamType::Scam);
        assert_eq!(c.threat_level, Some(ThreatLevel::High));
    }

    #[test]
    fn unknown_threat_level_coerces_to_low() {
        let c = validate(raw(true, "SCAM", Some("CATASTROPHIC")), "A1");
        assert_eq!(c.threat_level, Some(ThreatLevel::Low));
    }

    #[test]
    fn missing_threat_level_on_scam_coerces_to_low() {
        let c = validate(raw(true, "SCAM", None), "A1");
        assert_eq!(c.threat_level, Some(ThreatLevel::Low));
    }

    #[test]
    fn legit_ad_keeps_null_threat_level() {
        let c = validate(raw(false, "LEGIT", None), "A1");
        assert_eq!(c.verdict, Verdict::Legitimate);
        assert_eq!(c.threat_level, None);
    }

    #[test]
    fn unknown_scam_type_coerces() {
        let c = validate(raw(true, "PONZI", Some("HIGH")), "A1");
        assert_eq!(c.scam_type, ScamType::Unknown);
    }

    #[test]
    fn lowercase_enums_tolerated() {
        let c = validate(raw(true, "scam", Some("medium")), "A1");
        assert_eq!(c.scam_type, ScamType::Scam);
        assert_eq!(c.threat_level, Some(ThreatLevel::Medium));
    }
}
