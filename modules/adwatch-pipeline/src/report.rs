//! Report state machine driver.
//!
//! States per ad: Unreported → ReportPending → Reported, with
//! ReportPending → Unreported on delivery failure (retryable). Transition
//! legality is enforced atomically by the store, which is what makes two
//! simultaneous report requests for one ad resolve to exactly one winner.

use std::sync::Arc;

use tracing::{info, warn};

use adwatch_common::{PipelineError, ReportEvent, ReportState, RetryPolicy};

use crate::store::AdStore;
use crate::traits::NotificationSink;

pub struct Reporter {
    store: Arc<dyn AdStore>,
    sink: Arc<dyn NotificationSink>,
    retry: RetryPolicy,
}

impl Reporter {
    pub fn new(store: Arc<dyn AdStore>, sink: Arc<dyn NotificationSink>, retry: RetryPolicy) -> Self {
        Self { store, sink, retry }
    }

    /// Begin a report cycle. Legal only from `Unreported`; a concurrent or
    /// repeated request fails fast with `InvalidState` instead of queuing.
    pub async fn request_report(&self, id: &str) -> Result<(), PipelineError> {
        self.store.transition(id, ReportEvent::Request).await?;
        info!(ad_id = id, "Report requested");
        Ok(())
    }

    /// Record confirmed delivery: state becomes `Reported`, `report_count`
    /// increments exactly once, the report timestamp is stamped.
    pub async fn confirm_report(&self, id: &str) -> Result<(), PipelineError> {
        self.store.transition(id, ReportEvent::Confirm).await?;
        info!(ad_id = id, "Report confirmed");
        Ok(())
    }

    /// Record failed delivery: back to `Unreported`, counters untouched.
    pub async fn fail_report(&self, id: &str, reason: &str) -> Result<(), PipelineError> {
        self.store
            .transition(
                id,
                ReportEvent::Fail {
                    reason: reason.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    /// Drive one full report cycle: request, dispatch through the sink with
    /// the injected retry policy, then confirm or fail. Returns the final
    /// state (`Reported` on success, `Unreported` after exhausted retries).
    pub async fn report(&self, id: &str) -> Result<ReportState, PipelineError> {
        self.request_report(id).await?;

        let record = match self.store.get(id).await? {
            Some(versioned) => versioned.record,
            None => {
                // The record vanished between transition and read; unwind.
                self.fail_report(id, "record disappeared mid-report").await?;
                return Err(PipelineError::Store(format!("no such ad: {id}")));
            }
        };

        let mut attempt = 0;
        let outcome = loop {
            match self.sink.deliver(&record).await {
                Ok(()) => break Ok(()),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        break Err(e);
                    }
                    let delay = self.retry.delay_for(attempt - 1);
                    warn!(
                        ad_id = id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Notification delivery failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        };

        match outcome {
            Ok(()) => {
                self.confirm_report(id).await?;
                Ok(ReportState::Reported)
            }
            Err(e) => {
                self.fail_report(id, &e.to_string()).await?;
                Err(e)
            }
        }
    }
}
