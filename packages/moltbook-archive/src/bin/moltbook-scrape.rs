//! Moltbook scrape CLI
//!
//! Runs one scrape cycle against the configured SQLite archive, or reports
//! on what is already archived.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use moltbook_archive::{
    fingerprint_for, FirecrawlTransport, JobStore, ScrapeConfig, ScrapeRequest, Scraper,
    SqliteStore,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "moltbook-scrape", about = "Archive Moltbook pages into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one scrape cycle
    Scrape {
        /// full, submolt or agent
        #[arg(long, default_value = "full")]
        scope: String,

        /// Submolt name or agent username
        #[arg(long)]
        target: Option<String>,

        /// Scrape this URL instead of the one derived from scope
        #[arg(long)]
        url: Option<String>,

        /// Post detail pages to follow from listing links
        #[arg(long, default_value_t = 0)]
        max_post_pages: usize,

        /// Skip pages that fail instead of failing the job
        #[arg(long)]
        tolerate_page_errors: bool,
    },

    /// Print an agent's behavioral fingerprint
    Fingerprint { username: String },

    /// List recent scrape jobs
    Jobs {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

struct Env {
    database_url: String,
    base_url: Option<String>,
}

impl Env {
    fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://moltbook.db?mode=rwc".to_string()),
            base_url: std::env::var("MOLTBOOK_BASE_URL").ok(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,moltbook_archive=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let env = Env::load();

    let store = SqliteStore::new(&env.database_url)
        .await
        .with_context(|| format!("failed to open archive at {}", env.database_url))?;

    match cli.command {
        Command::Scrape {
            scope,
            target,
            url,
            max_post_pages,
            tolerate_page_errors,
        } => {
            let mut request = ScrapeRequest::parse(&scope, target).context("invalid request")?;
            if let Some(url) = url {
                request = request.with_url(url);
            }

            let mut config = ScrapeConfig::new().with_max_post_pages(max_post_pages);
            if let Some(base_url) = env.base_url {
                config = config.with_base_url(base_url);
            }
            if tolerate_page_errors {
                config = config.tolerate_page_errors();
            }

            let transport =
                FirecrawlTransport::from_env().context("FIRECRAWL_API_KEY must be set")?;
            let scraper = Scraper::with_config(store, transport, config);

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, stopping after the current page");
                    on_signal.cancel();
                }
            });

            let outcome = scraper.run_with_cancel(&request, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&outcome.job)?);
            if !outcome.is_success() {
                anyhow::bail!(
                    "scrape job {} failed: {}",
                    outcome.job.id,
                    outcome.job.error_message.unwrap_or_default()
                );
            }
        }
        Command::Fingerprint { username } => {
            let fingerprint = fingerprint_for(&store, &username, Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&fingerprint)?);
        }
        Command::Jobs { limit } => {
            for job in store.list_jobs(limit).await? {
                println!(
                    "{}  {:<9}  {:<7}  {:<20}  posts={} agents={} comments={}",
                    job.id,
                    job.status.as_str(),
                    job.scope.as_str(),
                    job.target_id.as_deref().unwrap_or("-"),
                    job.summary.posts_scraped,
                    job.summary.agents_discovered,
                    job.summary.comments_scraped,
                );
            }
        }
    }

    Ok(())
}
