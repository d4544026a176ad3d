//! The scrape cycle: fetch, extract, reconcile, record.

use chrono::Utc;
use indexmap::IndexSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ArchiveError, Result};
use crate::extractors::extract_all;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::traits::{
    store::ArchiveStore,
    transport::{FetchedPage, Transport},
};
use crate::types::{
    config::{ScrapeConfig, ScrapeRequest},
    job::{JobStatus, ScrapeJob},
};

/// Result of one scrape cycle.
///
/// A cycle that started but could not finish (transport failure,
/// cancellation) still yields an outcome; its job is `failed` and carries
/// the error message.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    /// The job as last written to storage
    pub job: ScrapeJob,

    /// Present when reconciliation ran
    pub report: Option<ReconcileReport>,

    /// URLs fetched successfully, in fetch order
    pub pages_fetched: Vec<String>,

    /// URLs skipped after a fetch error
    pub pages_failed: Vec<String>,
}

impl ScrapeOutcome {
    /// Check if the job completed.
    pub fn is_success(&self) -> bool {
        self.job.status == JobStatus::Completed
    }
}

/// Runs scrape cycles against a store and a transport.
///
/// # Example
///
/// ```rust,ignore
/// let scraper = Scraper::new(store, FirecrawlTransport::from_env()?);
///
/// let outcome = scraper.run(&ScrapeRequest::submolt("agentops")).await?;
/// println!("{} posts", outcome.job.summary.posts_scraped);
/// ```
pub struct Scraper<S: ArchiveStore, T: Transport> {
    store: S,
    transport: T,
    config: ScrapeConfig,
}

impl<S: ArchiveStore, T: Transport> Scraper<S, T> {
    /// Create a scraper with the default configuration.
    pub fn new(store: S, transport: T) -> Self {
        Self {
            store,
            transport,
            config: ScrapeConfig::default(),
        }
    }

    /// Create with custom configuration.
    pub fn with_config(store: S, transport: T, config: ScrapeConfig) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// The underlying store, for reading back results.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one cycle to completion.
    pub async fn run(&self, request: &ScrapeRequest) -> Result<ScrapeOutcome> {
        self.run_with_cancel(request, &CancellationToken::new()).await
    }

    /// Run one cycle, stopping between pages when `cancel` fires.
    ///
    /// Returns `Err` only when the request is rejected before a job exists
    /// or when the job record itself cannot be written.
    pub async fn run_with_cancel(
        &self,
        request: &ScrapeRequest,
        cancel: &CancellationToken,
    ) -> Result<ScrapeOutcome> {
        request.validate()?;
        if self.store.has_active_job().await? {
            return Err(ArchiveError::JobInProgress);
        }

        let mut job = ScrapeJob::new(request.scope, request.target_id.clone());
        self.store.create_job(&job).await?;
        job.start(Utc::now())?;
        self.store.update_job(&job).await?;

        info!(
            job_id = %job.id,
            scope = %job.scope,
            target = ?job.target_id,
            transport = self.transport.name(),
            "Scrape job started"
        );

        let mut outcome = ScrapeOutcome {
            job,
            report: None,
            pages_fetched: Vec::new(),
            pages_failed: Vec::new(),
        };

        let pages = match self.fetch_pages(request, cancel, &mut outcome).await {
            Ok(pages) => pages,
            Err(e) => return self.fail(outcome, e).await,
        };

        let markdown = self.combine(&pages);
        let now = Utc::now();
        let extraction = extract_all(&markdown, now);
        let found = extraction.counts();
        debug!(
            posts = found.posts,
            agents = found.agents,
            submolts = found.submolts,
            comments = found.comments,
            "Candidates extracted"
        );

        let report = Reconciler::new(&self.store).reconcile(&extraction, now).await;
        let mut summary = report.job_summary();
        summary.found = found;

        outcome.job.complete(summary, Utc::now())?;
        self.store.update_job(&outcome.job).await?;
        outcome.report = Some(report);

        info!(
            job_id = %outcome.job.id,
            posts_scraped = summary.posts_scraped,
            agents_discovered = summary.agents_discovered,
            comments_scraped = summary.comments_scraped,
            write_failures = summary.write_failures,
            "Scrape job completed"
        );

        Ok(outcome)
    }

    /// Fetch target pages, then follow discovered post links.
    async fn fetch_pages(
        &self,
        request: &ScrapeRequest,
        cancel: &CancellationToken,
        outcome: &mut ScrapeOutcome,
    ) -> Result<Vec<FetchedPage>> {
        let mut queue: IndexSet<String> = request.target_urls(&self.config).into_iter().collect();
        let targets = queue.len();
        let mut pages = Vec::new();
        let mut next = 0;

        while let Some(url) = queue.get_index(next).cloned() {
            next += 1;
            if cancel.is_cancelled() {
                return Err(ArchiveError::Cancelled);
            }

            let fetched = tokio::select! {
                result = self.transport.fetch_page(&url) => result,
                _ = cancel.cancelled() => return Err(ArchiveError::Cancelled),
            };

            match fetched {
                Ok(page) if page.has_content() => {
                    debug!(url = %url, links = page.links.len(), "Page fetched");
                    // Only listing pages seed detail-page following
                    if next <= targets && self.config.max_post_pages > 0 {
                        let budget = targets + self.config.max_post_pages;
                        for link in page.post_links() {
                            if queue.len() >= budget {
                                break;
                            }
                            queue.insert(link.to_string());
                        }
                    }
                    outcome.pages_fetched.push(url);
                    pages.push(page);
                }
                Ok(_) => {
                    warn!(url = %url, "Page returned no markdown, skipping");
                    outcome.pages_failed.push(url);
                }
                Err(e) if self.config.fail_on_page_error => return Err(e.into()),
                Err(e) => {
                    warn!(url = %url, error = %e, "Page fetch failed, skipping");
                    outcome.pages_failed.push(url);
                }
            }
        }

        if pages.is_empty() {
            return Err(ArchiveError::Config(format!(
                "no page content fetched from {} url(s)",
                outcome.pages_failed.len()
            )));
        }

        Ok(pages)
    }

    /// Concatenate pages, each preceded by its boundary marker.
    fn combine(&self, pages: &[FetchedPage]) -> String {
        pages
            .iter()
            .map(|page| format!("{}\n{}\n", self.config.boundary_for(&page.url), page.markdown))
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn fail(&self, mut outcome: ScrapeOutcome, error: ArchiveError) -> Result<ScrapeOutcome> {
        warn!(job_id = %outcome.job.id, error = %error, "Scrape job failed");
        outcome.job.fail(error.to_string(), Utc::now())?;
        self.store.update_job(&outcome.job).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::stores::MemoryStore;
    use crate::traits::store::{AgentStore, JobStore, PostStore};
    use crate::traits::transport::MockTransport;
    use crate::transports::MockSite;

    const LISTING: &str = "[Great idea](https://molt.test/post/abc-123) by u/researcher_bot in m/agentops ▲42▼ 💬7\n";

    fn config() -> ScrapeConfig {
        ScrapeConfig::new().with_base_url("https://molt.test")
    }

    #[tokio::test]
    async fn test_cycle_completes() {
        let site = MockSite::new().with_markdown("https://molt.test/", LISTING);
        let scraper = Scraper::with_config(MemoryStore::new(), site, config());

        let outcome = scraper.run(&ScrapeRequest::full()).await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.job.summary.posts_scraped, 1);
        assert_eq!(outcome.job.summary.found.posts, 1);
        assert_eq!(outcome.job.summary.submolts_discovered, 1);
        assert_eq!(outcome.pages_fetched, vec!["https://molt.test/"]);

        let post = scraper.store().get_post("abc-123").await.unwrap().unwrap();
        assert_eq!(post.upvotes, 42);
        let stored = scraper.store().get_job(outcome.job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_transport_failure_fails_job_without_writes() {
        let mut transport = MockTransport::new();
        transport.expect_fetch_page().returning(|_| {
            Err(TransportError::Api {
                status: 402,
                message: "Payment required".into(),
            })
        });
        transport.expect_name().return_const("mock".to_string());

        let scraper = Scraper::with_config(MemoryStore::new(), transport, config());
        let outcome = scraper.run(&ScrapeRequest::full()).await.unwrap();

        assert_eq!(outcome.job.status, JobStatus::Failed);
        assert!(outcome.report.is_none());
        assert!(outcome
            .job
            .error_message
            .as_deref()
            .unwrap()
            .contains("Payment required"));
        assert_eq!(scraper.store().post_count().unwrap(), 0);
        assert!(!scraper.store().has_active_job().await.unwrap());
    }

    #[tokio::test]
    async fn test_tolerated_page_errors() {
        let site = MockSite::new()
            .with_markdown("https://molt.test/", LISTING)
            .with_failure("https://molt.test/new", 500, "upstream down");
        let config = config().with_listing_paths(["/", "/new"]).tolerate_page_errors();
        let scraper = Scraper::with_config(MemoryStore::new(), site, config);

        let outcome = scraper.run(&ScrapeRequest::full()).await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.pages_failed, vec!["https://molt.test/new"]);
        assert_eq!(outcome.job.summary.posts_scraped, 1);
    }

    #[tokio::test]
    async fn test_all_pages_failing_fails_job_even_when_tolerated() {
        let site = MockSite::new().with_failure("https://molt.test/", 503, "unavailable");
        let scraper =
            Scraper::with_config(MemoryStore::new(), site, config().tolerate_page_errors());

        let outcome = scraper.run(&ScrapeRequest::full()).await.unwrap();
        assert_eq!(outcome.job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_invalid_request_creates_no_job() {
        let scraper = Scraper::with_config(MemoryStore::new(), MockSite::new(), config());
        let request = ScrapeRequest::agent("../../etc");

        let err = scraper.run(&request).await.unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidJob { .. }));
        assert!(scraper.store().list_jobs(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refuses_while_job_active() {
        let store = MemoryStore::new();
        store
            .create_job(&ScrapeJob::new(crate::types::job::ScrapeScope::Full, None))
            .await
            .unwrap();
        let scraper = Scraper::with_config(store, MockSite::new(), config());

        let err = scraper.run(&ScrapeRequest::full()).await.unwrap_err();
        assert!(matches!(err, ArchiveError::JobInProgress));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_page() {
        let site = MockSite::new().with_markdown("https://molt.test/", LISTING);
        let scraper = Scraper::with_config(MemoryStore::new(), site.clone(), config());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = scraper
            .run_with_cancel(&ScrapeRequest::full(), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome.job.status, JobStatus::Failed);
        assert_eq!(outcome.job.error_message.as_deref(), Some("operation cancelled"));
        assert_eq!(site.fetch_call_count(), 0);
    }

    #[tokio::test]
    async fn test_follows_post_links_up_to_limit() {
        let listing = FetchedPage::new("https://molt.test/", LISTING).with_links([
            "https://molt.test/post/abc-123",
            "https://molt.test/post/def-456",
            "https://molt.test/u/researcher_bot",
        ]);
        let detail = "# Great idea\n\n**u/reader** • 2h ago\nLove this.\n";
        let site = MockSite::new()
            .with_page(listing)
            .with_markdown("https://molt.test/post/abc-123", detail);
        let scraper = Scraper::with_config(
            MemoryStore::new(),
            site.clone(),
            config().with_max_post_pages(1),
        );

        let outcome = scraper.run(&ScrapeRequest::full()).await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(
            site.fetch_calls(),
            vec!["https://molt.test/", "https://molt.test/post/abc-123"]
        );
        assert_eq!(outcome.job.summary.comments_scraped, 1);
        let reader = scraper.store().get_agent("reader").await.unwrap().unwrap();
        assert_eq!(reader.comment_count, 1);
    }

    #[test]
    fn test_combine_prefixes_boundaries() {
        let scraper = Scraper::with_config(MemoryStore::new(), MockSite::new(), config());
        let combined = scraper.combine(&[
            FetchedPage::new("https://molt.test/a", "A"),
            FetchedPage::new("https://molt.test/b", "B"),
        ]);

        assert_eq!(
            combined,
            "<!-- moltbook-page: https://molt.test/a -->\nA\n\n<!-- moltbook-page: https://molt.test/b -->\nB\n"
        );
    }
}
