use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// --- Enums ---

/// Ordered threat severity for scam ads. `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    /// Parse a model- or wire-provided string. Tolerates case and whitespace;
    /// anything outside the fixed enum returns `None` so callers can apply
    /// their own coercion policy.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "HIGH" => Some(ThreatLevel::High),
            "MEDIUM" => Some(ThreatLevel::Medium),
            "LOW" => Some(ThreatLevel::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreatLevel::High => write!(f, "HIGH"),
            ThreatLevel::Medium => write!(f, "MEDIUM"),
            ThreatLevel::Low => write!(f, "LOW"),
        }
    }
}

/// Classification verdict. `Unknown` marks ads whose classification failed
/// after all retries and are queued for manual review; on the wire it maps
/// to `is_scam: null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Scam,
    Legitimate,
    Unknown,
}

impl Verdict {
    pub fn is_scam(&self) -> Option<bool> {
        match self {
            Verdict::Scam => Some(true),
            Verdict::Legitimate => Some(false),
            Verdict::Unknown => None,
        }
    }

    pub fn from_is_scam(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Verdict::Scam,
            Some(false) => Verdict::Legitimate,
            None => Verdict::Unknown,
        }
    }
}

/// Coarse ad category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScamType {
    Scam,
    Spam,
    Legit,
    Unknown,
}

impl ScamType {
    /// Parse a model-provided string; unknown values fall back to `Unknown`
    /// (the caller logs the data-quality warning).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SCAM" => Some(ScamType::Scam),
            "SPAM" => Some(ScamType::Spam),
            "LEGIT" => Some(ScamType::Legit),
            "UNKNOWN" => Some(ScamType::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScamType::Scam => write!(f, "SCAM"),
            ScamType::Spam => write!(f, "SPAM"),
            ScamType::Legit => write!(f, "LEGIT"),
            ScamType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// --- Report state machine ---

/// Per-ad report lifecycle. `Reported` is terminal for a given report action;
/// a failed dispatch transitions back to `Unreported` and stays retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Unreported,
    ReportPending,
    Reported,
}

impl std::fmt::Display for ReportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportState::Unreported => write!(f, "unreported"),
            ReportState::ReportPending => write!(f, "report_pending"),
            ReportState::Reported => write!(f, "reported"),
        }
    }
}

/// Events accepted by `AdStore::transition`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Request,
    Confirm,
    Fail { reason: String },
}

impl ReportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ReportEvent::Request => "request_report",
            ReportEvent::Confirm => "confirm_report",
            ReportEvent::Fail { .. } => "fail_report",
        }
    }
}

// --- Pipeline intermediate types ---

/// Canonical draft produced by the normalizer. Downstream components never
/// see the raw platform bag.
#[derive(Debug, Clone, PartialEq)]
pub struct AdDraft {
    pub id: String,
    pub page_name: String,
    pub ad_text: String,
    pub links_found: Vec<String>,
    pub page_like_count: u64,
    pub date_scraped: DateTime<Utc>,
}

/// What the classifier returns for one ad.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub verdict: Verdict,
    pub scam_type: ScamType,
    pub threat_level: Option<ThreatLevel>,
    pub explanation: String,
    pub summary: Vec<String>,
    pub scam_patterns: Vec<String>,
    pub red_flags: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Classification {
    /// Placeholder classification for ads whose analysis failed after all
    /// retries. The record is persisted for manual review, never dropped.
    pub fn unknown(reason: &str) -> Self {
        Self {
            verdict: Verdict::Unknown,
            scam_type: ScamType::Unknown,
            threat_level: None,
            explanation: format!("Classification unavailable: {reason}"),
            summary: Vec::new(),
            scam_patterns: Vec::new(),
            red_flags: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

// --- AdRecord ---

/// The central persisted entity, upsert-keyed by the platform-stable `id`.
///
/// Serializes to the dashboard wire shape: `is_scam` is `true`/`false`/`null`
/// (from `verdict`), `reported` is `0`/`1` (from `report_state`, with
/// `ReportPending` reading as 0 so an interrupted report cycle stays visibly
/// retryable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdRecord {
    pub id: String,
    pub page_name: String,
    #[serde(default)]
    pub ad_text: String,
    #[serde(
        rename = "is_scam",
        serialize_with = "wire::verdict_ser",
        deserialize_with = "wire::verdict_de"
    )]
    pub verdict: Verdict,
    pub scam_type: ScamType,
    pub threat_level: Option<ThreatLevel>,
    pub explanation: String,
    pub summary: Vec<String>,
    pub links_found: Vec<String>,
    pub scam_patterns: Vec<String>,
    pub red_flags: Vec<String>,
    pub recommendations: Vec<String>,
    pub page_like_count: u64,
    pub report_count: u64,
    #[serde(
        rename = "reported",
        serialize_with = "wire::reported_ser",
        deserialize_with = "wire::reported_de"
    )]
    pub report_state: ReportState,
    #[serde(default)]
    pub reported_at: Option<DateTime<Utc>>,
    pub date_scraped: DateTime<Utc>,
}

impl AdRecord {
    /// Assemble a candidate record from a normalized draft and its
    /// classification. Report fields start at their initial values; the
    /// upsert engine preserves the stored ones on re-sighting.
    pub fn from_parts(draft: AdDraft, classification: Classification) -> Self {
        Self {
            id: draft.id,
            page_name: draft.page_name,
            ad_text: draft.ad_text,
            verdict: classification.verdict,
            scam_type: classification.scam_type,
            threat_level: classification.threat_level,
            explanation: classification.explanation,
            summary: classification.summary,
            links_found: draft.links_found,
            scam_patterns: classification.scam_patterns,
            red_flags: classification.red_flags,
            recommendations: classification.recommendations,
            page_like_count: draft.page_like_count,
            report_count: 0,
            report_state: ReportState::Unreported,
            reported_at: None,
            date_scraped: draft.date_scraped,
        }
    }

    pub fn reported(&self) -> bool {
        self.report_state == ReportState::Reported
    }

    /// The classification view of this record, for materiality comparison.
    pub fn classification(&self) -> Classification {
        Classification {
            verdict: self.verdict,
            scam_type: self.scam_type,
            threat_level: self.threat_level,
            explanation: self.explanation.clone(),
            summary: self.summary.clone(),
            scam_patterns: self.scam_patterns.clone(),
            red_flags: self.red_flags.clone(),
            recommendations: self.recommendations.clone(),
        }
    }

    pub fn apply_classification(&mut self, c: Classification) {
        self.verdict = c.verdict;
        self.scam_type = c.scam_type;
        self.threat_level = c.threat_level;
        self.explanation = c.explanation;
        self.summary = c.summary;
        self.scam_patterns = c.scam_patterns;
        self.red_flags = c.red_flags;
        self.recommendations = c.recommendations;
    }
}

mod wire {
    use super::*;

    pub fn verdict_ser<S: Serializer>(v: &Verdict, s: S) -> Result<S::Ok, S::Error> {
        v.is_scam().serialize(s)
    }

    pub fn verdict_de<'de, D: Deserializer<'de>>(d: D) -> Result<Verdict, D::Error> {
        Ok(Verdict::from_is_scam(Option::<bool>::deserialize(d)?))
    }

    pub fn reported_ser<S: Serializer>(state: &ReportState, s: S) -> Result<S::Ok, S::Error> {
        let flag: u8 = if *state == ReportState::Reported { 1 } else { 0 };
        flag.serialize(s)
    }

    pub fn reported_de<'de, D: Deserializer<'de>>(d: D) -> Result<ReportState, D::Error> {
        // The dashboard feed historically carried 0/1 but some exports use
        // booleans; accept both.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Flag {
            Int(u8),
            Bool(bool),
        }
        let reported = match Flag::deserialize(d)? {
            Flag::Int(n) => n != 0,
            Flag::Bool(b) => b,
        };
        Ok(if reported {
            ReportState::Reported
        } else {
            ReportState::Unreported
        })
    }
}
