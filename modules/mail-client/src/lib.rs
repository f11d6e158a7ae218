pub mod error;

pub use error::{MailError, Result};

use serde::Serialize;

/// Request body for the report endpoint. The mail service looks the ad up by
/// id and composes the notification itself; the full record rides along for
/// services that render it directly.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRequest {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad: Option<serde_json::Value>,
}

/// Client for the outbound report mail service. The service accepts a report
/// request and emails the law-enforcement contact; delivery semantics beyond
/// the HTTP status are not assumed.
pub struct MailClient {
    client: reqwest::Client,
    report_url: String,
}

impl MailClient {
    pub fn new(report_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            report_url,
        }
    }

    /// Dispatch one report. Non-2xx responses map to `MailError::Api`.
    pub async fn send_report(&self, request: &ReportRequest) -> Result<()> {
        tracing::info!(ad_id = request.id.as_str(), "Dispatching report mail");

        let resp = self
            .client
            .post(&self.report_url)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        tracing::info!(ad_id = request.id.as_str(), "Report mail accepted");
        Ok(())
    }
}
