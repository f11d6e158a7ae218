pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::Config;
pub use error::PipelineError;
pub use retry::RetryPolicy;
pub use types::*;
