use thiserror::Error;

use crate::types::ReportState;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Malformed raw ad item: {0}")]
    MalformedInput(String),

    #[error("Classification timed out: {0}")]
    ClassificationTimeout(String),

    #[error("Classification service error: {0}")]
    ClassificationService(String),

    #[error("Concurrent write to ad {0}, retry with a fresh read")]
    StoreConflict(String),

    #[error("Illegal {event} for ad {id}: state is {from}")]
    InvalidState {
        id: String,
        from: ReportState,
        event: &'static str,
    },

    #[error("Notification delivery failed: {0}")]
    NotificationDelivery(String),

    #[error("Ingestion cycle lock conflict: another cycle is in progress")]
    CycleInProgress,

    #[error("Store error: {0}")]
    Store(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
