use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use adwatch_common::{Config, ReportState, RetryPolicy, ThreatLevel};
use adwatch_pipeline::classifier::{ClassifierRunner, ClaudeAdClassifier};
use adwatch_pipeline::cycle::Pipeline;
use adwatch_pipeline::report::Reporter;
use adwatch_pipeline::store::{AdFilter, AdStore, MemoryStore};
use adwatch_pipeline::traits::{ApifyAdSource, MailSink};
use apify_client::ApifyClient;
use mail_client::MailClient;

#[derive(Parser)]
#[command(name = "adwatch", about = "Scam-ad ingestion and reporting pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one ingestion cycle: scrape, classify, upsert, save the snapshot.
    Run,
    /// Report one ad to the law-enforcement mail service.
    Report {
        #[arg(long)]
        id: String,
    },
    /// Print stored ads as wire-shape JSON.
    List {
        /// Only ads classified as scams.
        #[arg(long)]
        scam_only: bool,
        /// Minimum threat level (LOW, MEDIUM, HIGH).
        #[arg(long)]
        min_threat: Option<String>,
        /// Only ads not yet reported.
        #[arg(long)]
        unreported: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("adwatch=info".parse()?))
        .init();

    info!("adwatch starting...");

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    let snapshot = PathBuf::from(&config.snapshot_path);
    let store = Arc::new(MemoryStore::load_snapshot(&snapshot)?);

    match cli.command {
        Command::Run => {
            if config.ad_library_urls.is_empty() {
                anyhow::bail!("AD_LIBRARY_URLS is empty, nothing to scrape");
            }
            let source = Arc::new(ApifyAdSource::new(
                ApifyClient::new(config.apify_api_key.clone()),
                config.ad_library_urls.clone(),
                config.scrape_limit,
            ));
            let classifier = ClassifierRunner::new(
                Arc::new(ClaudeAdClassifier::new(
                    &config.anthropic_api_key,
                    &config.claude_model,
                    Duration::from_secs(config.classify_timeout_secs),
                )),
                RetryPolicy::with_max_attempts(config.classify_max_attempts),
            );
            let pipeline = Pipeline::new(
                source,
                classifier,
                Arc::clone(&store) as Arc<dyn AdStore>,
            )
            .with_concurrency(config.cycle_concurrency)
            .with_force_reclassify(config.force_reclassify);

            let stats = pipeline.run_cycle().await?;
            store.save_snapshot(&snapshot)?;
            println!("{stats}");
        }
        Command::Report { id } => {
            let sink = Arc::new(MailSink::new(MailClient::new(config.mail_url.clone())));
            let reporter = Reporter::new(
                Arc::clone(&store) as Arc<dyn AdStore>,
                sink,
                RetryPolicy::default(),
            );
            let state = reporter.report(&id).await?;
            store.save_snapshot(&snapshot)?;
            match state {
                ReportState::Reported => println!("Ad {id} reported"),
                other => println!("Ad {id} is {other}"),
            }
        }
        Command::List {
            scam_only,
            min_threat,
            unreported,
        } => {
            let min_threat = match min_threat.as_deref() {
                Some(value) => Some(ThreatLevel::parse(value).ok_or_else(|| {
                    anyhow::anyhow!("invalid threat level {value:?}, expected LOW/MEDIUM/HIGH")
                })?),
                None => None,
            };
            let filter = AdFilter {
                scam_only,
                min_threat,
                report_state: unreported.then_some(ReportState::Unreported),
                scraped_after: None,
            };
            let records = store.list(&filter).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}
