use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // AI provider
    pub anthropic_api_key: String,
    pub claude_model: String,

    // Scraping
    pub apify_api_key: String,
    pub ad_library_urls: Vec<String>,
    pub scrape_limit: u32,

    // Reporting
    pub mail_url: String,

    // Pipeline tuning
    pub classify_timeout_secs: u64,
    pub classify_max_attempts: u32,
    pub cycle_concurrency: usize,
    pub force_reclassify: bool,

    // Persistence
    pub snapshot_path: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            claude_model: env::var("CLAUDE_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            apify_api_key: required_env("APIFY_API_KEY"),
            ad_library_urls: env::var("AD_LIBRARY_URLS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            scrape_limit: parsed_env("SCRAPE_LIMIT", 100),
            mail_url: required_env("MAIL_URL"),
            classify_timeout_secs: parsed_env("CLASSIFY_TIMEOUT_SECS", 60),
            classify_max_attempts: parsed_env("CLASSIFY_MAX_ATTEMPTS", 3),
            cycle_concurrency: parsed_env("CYCLE_CONCURRENCY", 10),
            force_reclassify: env::var("ADWATCH_FORCE_RECLASSIFY")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            snapshot_path: env::var("SNAPSHOT_PATH").unwrap_or_else(|_| "adwatch.json".to_string()),
        }
    }

    /// Log the effective configuration with secrets redacted.
    pub fn log_redacted(&self) {
        info!(
            claude_model = self.claude_model.as_str(),
            ad_library_urls = self.ad_library_urls.len(),
            scrape_limit = self.scrape_limit,
            classify_timeout_secs = self.classify_timeout_secs,
            classify_max_attempts = self.classify_max_attempts,
            cycle_concurrency = self.cycle_concurrency,
            force_reclassify = self.force_reclassify,
            snapshot_path = self.snapshot_path.as_str(),
            anthropic_api_key = redact(&self.anthropic_api_key),
            apify_api_key = redact(&self.apify_api_key),
            mail_url = self.mail_url.as_str(),
            "Config loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number, got {v:?}")),
        Err(_) => default,
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<set>"
    }
}
