use thiserror::Error;

pub type Result<T> = std::result::Result<T, MailError>;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Mail service error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        MailError::Network(err.to_string())
    }
}
